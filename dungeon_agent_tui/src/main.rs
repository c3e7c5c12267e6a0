mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use dungeon_agent_core::{
    Action, ActionPlanner, Inventory, Position, Tile,
    map::Grid,
    session::{ActionResult, Session, TurnReport, load_levels_from_string},
};
use ratatui::{
    crossterm::{
        self,
        event::{self, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::HashSet,
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Watch a map-building agent play dungeon levels", long_about = None)]
struct Args {
    /// Level file to load
    #[arg(short, long, value_name = "MAP_FILE", default_value = "maps/levels.txt")]
    map: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Visibility range in cells; overrides the config file
    #[arg(short, long, value_name = "R")]
    visibility: Option<usize>,

    /// Milliseconds between turns in the live view
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Turn budget for the whole run
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,

    /// Run without the terminal UI and print a summary
    #[arg(long)]
    headless: bool,

    /// Directory for the log file in live mode
    #[arg(long, value_name = "DIR", default_value = "logs")]
    log_dir: PathBuf,
}

impl Args {
    /// Loads the config file and applies flag overrides on top.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(range) = self.visibility {
            config.session.visibility_range = range;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.display.tick_rate_ms = tick_ms;
        }
        if let Some(max_ticks) = self.max_ticks {
            config.session.max_ticks = max_ticks;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RunState {
    Running,
    Finished,
    Stuck,
    OutOfTicks,
}

struct App {
    /// The authoritative game.
    session: Session,
    /// The agent under observation.
    planner: ActionPlanner,
    last_report: Option<TurnReport>,
    /// Consecutive turns the planner answered `Action::None`.
    stuck_turns: u32,
    stuck_limit: u32,
    max_ticks: u64,
    state: RunState,
    should_quit: bool,
}

impl App {
    fn new(session: Session, config: &Config) -> Self {
        let planner = ActionPlanner::new(
            session.width(),
            session.height(),
            session.visibility_range(),
        );
        App {
            session,
            planner,
            last_report: None,
            stuck_turns: 0,
            stuck_limit: config.session.stuck_limit,
            max_ticks: config.session.max_ticks,
            state: RunState::Running,
            should_quit: false,
        }
    }

    /// Plays one turn unless the run is over.
    fn tick(&mut self) -> Result<()> {
        if self.state != RunState::Running {
            return Ok(());
        }
        if self.session.tick() >= self.max_ticks {
            warn!(ticks = self.session.tick(), "Turn budget exhausted");
            self.state = RunState::OutOfTicks;
            return Ok(());
        }

        let report = self.session.run_turn(&mut self.planner)?;
        if report.action == Action::None {
            self.stuck_turns += 1;
        } else {
            self.stuck_turns = 0;
        }

        if report.result == ActionResult::Finished {
            info!(ticks = report.tick, "All levels complete");
            self.state = RunState::Finished;
        } else if self.stuck_turns >= self.stuck_limit {
            warn!(
                turns = self.stuck_turns,
                level = self.session.level(),
                "Agent is stuck, aborting"
            );
            self.state = RunState::Stuck;
        }
        self.last_report = Some(report);
        Ok(())
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    let file_string = std::fs::read_to_string(&args.map)
        .with_context(|| format!("Failed to read map file {}", args.map.display()))?;
    let levels = load_levels_from_string(&file_string)
        .with_context(|| format!("Failed to parse map file {}", args.map.display()))?;
    let session = Session::new(levels, config.session.visibility_range)?;

    let _guard = setup_logging(args.headless, &args.log_dir)?;
    info!(
        map = %args.map.display(),
        levels = session.level_count(),
        visibility_range = session.visibility_range(),
        "Session loaded"
    );

    let mut app = App::new(session, &config);
    if args.headless {
        return run_headless(&mut app);
    }

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, &config);
    restore_terminal(&mut terminal)?;
    result
}

/// Installs the global subscriber. The live view owns the terminal, so it
/// logs to a file; headless runs log to stderr.
fn setup_logging(headless: bool, log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "dungeon_agent.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();
    Ok(Some(guard))
}

fn run_headless(app: &mut App) -> Result<()> {
    let started = Instant::now();
    while app.state == RunState::Running {
        app.tick()?;
    }
    let elapsed = started.elapsed();
    let ticks = app.session.tick();
    let per_second = ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!("Outcome:  {:?}", app.state);
    println!(
        "Level:    {} of {}",
        app.session.level() + 1,
        app.session.level_count()
    );
    println!("Ticks:    {ticks} ({per_second:.0} per second)");
    println!();
    print!("{}", app.planner.world());

    if app.state != RunState::Finished {
        anyhow::bail!("Run ended without finishing: {:?}", app.state);
    }
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    config: &Config,
) -> Result<()> {
    let tick_rate = Duration::from_millis(config.display.tick_rate_ms);
    let mut last_tick = Instant::now();
    let mut paused = false;

    loop {
        terminal.draw(|f| ui(f, app, paused))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => paused = !paused,
                    KeyCode::Char('n') if paused => app.tick()?,
                    _ => {}
                }
            }
        }

        if !paused && last_tick.elapsed() >= tick_rate {
            app.tick()?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App, paused: bool) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(app.session.height() as u16 + 2),
            Constraint::Length(7),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let map_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_layout[0]);

    let mut true_tiles = app.session.tiles().clone();
    true_tiles[app.session.player()] = Tile::Player;
    render_map(frame, map_layout[0], "Dungeon", &true_tiles, &HashSet::new());

    let path: HashSet<Position> = app
        .planner
        .last_decision()
        .and_then(|decision| app.planner.search().path_to(decision.target))
        .unwrap_or_default()
        .into_iter()
        .collect();
    render_map(
        frame,
        map_layout[1],
        "Belief",
        app.planner.world().grid(),
        &path,
    );

    render_status(frame, main_layout[1], app);

    let help = if paused {
        "Paused. Space to resume, 'n' to step, 'q' or 'Esc' to quit."
    } else {
        "Space to pause, 'q' or 'Esc' to quit."
    };
    let help_text = Paragraph::new(help)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn tile_style(tile: Tile) -> Style {
    match tile {
        Tile::Unknown => Style::default().fg(Color::DarkGray),
        Tile::Wall => Style::default().fg(Color::Gray),
        Tile::Player => Style::default().fg(Color::Yellow).bold(),
        Tile::Exit => Style::default().fg(Color::Magenta).bold(),
        Tile::KeyRed | Tile::DoorRed => Style::default().fg(Color::Red),
        Tile::KeyGreen | Tile::DoorGreen => Style::default().fg(Color::Green),
        Tile::KeyBlue | Tile::DoorBlue => Style::default().fg(Color::Blue),
        Tile::Boulder => Style::default().fg(Color::White),
        Tile::Enemy => Style::default().fg(Color::LightRed),
        Tile::Treasure => Style::default().fg(Color::LightYellow),
        Tile::Empty => Style::default(),
    }
}

/// Renders a tile grid, highlighting the cells in `path`.
fn render_map(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    tiles: &Grid<Tile>,
    path: &HashSet<Position>,
) {
    let lines: Vec<Line> = (0..tiles.height())
        .map(|row| {
            let spans: Vec<Span> = (0..tiles.width())
                .map(|col| {
                    let pos = Position::new(row, col);
                    let tile = tiles[pos];
                    let mut style = tile_style(tile);
                    if path.contains(&pos) {
                        style = style.bg(Color::Indexed(236));
                    }
                    Span::styled(tile.glyph(), style)
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

fn inventory_span(inventory: Inventory) -> Span<'static> {
    match inventory {
        Inventory::None => Span::raw("empty"),
        Inventory::KeyRed => Span::styled("red key", tile_style(Tile::KeyRed)),
        Inventory::KeyGreen => Span::styled("green key", tile_style(Tile::KeyGreen)),
        Inventory::KeyBlue => Span::styled("blue key", tile_style(Tile::KeyBlue)),
        Inventory::Boulder => Span::styled("boulder", tile_style(Tile::Boulder)),
    }
}

/// Renders level, tick, inventory and the last decision.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let session = &app.session;
    let player = session.player();
    let decision = match app.planner.last_decision() {
        Some(decision) => format!(
            "{:?} toward ({}, {}): {:?}",
            decision.rule, decision.target.row, decision.target.col, decision.action
        ),
        None => "none".to_string(),
    };
    let outcome = match &app.last_report {
        Some(TurnReport {
            result: ActionResult::Failure(reason),
            ..
        }) => Span::styled(reason.clone(), Style::default().fg(Color::Red)),
        Some(report) => Span::raw(format!("{:?}", report.result)),
        None => Span::raw("-"),
    };

    let items = vec![
        ListItem::from(format!(
            "Level {} of {}  Tick {}  State {:?}",
            session.level() + 1,
            session.level_count(),
            session.tick(),
            app.state
        )),
        ListItem::from(Line::from(vec![
            Span::raw(format!(
                "Position ({}, {})  Sight {}  Inventory ",
                player.row,
                player.col,
                app.planner.world().visibility_range()
            )),
            inventory_span(session.inventory()),
        ])),
        ListItem::from(format!("Decision {decision}")),
        ListItem::from(Line::from(vec![Span::raw("Outcome "), outcome])),
    ];

    let status =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}
