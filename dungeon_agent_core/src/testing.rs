//! Picture-based fixtures for unit tests.

use crate::{Inventory, Observation, Position, Tile};

/// One character per cell: `#` wall, `.` empty, `P` agent, `E` exit,
/// `r`/`g`/`b` keys, `R`/`G`/`B` doors, `O` boulder, `?` unknown.
pub fn tile_from_char(c: char) -> Tile {
    match c {
        '#' => Tile::Wall,
        '.' => Tile::Empty,
        'P' => Tile::Player,
        'E' => Tile::Exit,
        'r' => Tile::KeyRed,
        'g' => Tile::KeyGreen,
        'b' => Tile::KeyBlue,
        'R' => Tile::DoorRed,
        'G' => Tile::DoorGreen,
        'B' => Tile::DoorBlue,
        'O' => Tile::Boulder,
        '?' => Tile::Unknown,
        other => panic!("unknown picture character {other:?}"),
    }
}

/// A picture revealed in one observation, with a window large enough to
/// cover the whole map from any square.
pub struct Reveal {
    pub width: usize,
    pub height: usize,
    pub visibility_range: usize,
    pub observation: Observation,
}

pub fn reveal(rows: &[&str], inventory: Inventory) -> Reveal {
    let height = rows.len();
    let width = rows[0].chars().count();
    let mut player = None;
    let mut tiles = Vec::with_capacity(width * height);
    for (row, line) in rows.iter().enumerate() {
        assert_eq!(line.chars().count(), width, "ragged picture row {row}");
        for (col, c) in line.chars().enumerate() {
            if c == 'P' {
                player = Some(Position::new(row, col));
            }
            tiles.push(tile_from_char(c));
        }
    }
    let player = player.expect("picture has no agent");
    reveal_tiles(width, height, player, &tiles, inventory)
}

pub fn reveal_tiles(
    width: usize,
    height: usize,
    player: Position,
    tiles: &[Tile],
    inventory: Inventory,
) -> Reveal {
    let range = width.max(height);
    let size = 2 * range + 1;
    let mut surroundings = vec![Tile::Unknown; size * size];
    for (i, tile) in tiles.iter().enumerate() {
        let pos = Position::from_index(i, width);
        let row = pos.row + range - player.row;
        let col = pos.col + range - player.col;
        surroundings[row * size + col] = *tile;
    }
    Reveal {
        width,
        height,
        visibility_range: range,
        observation: Observation {
            level: 1,
            player,
            inventory,
            surroundings,
        },
    }
}
