use serde::{Deserialize, Serialize};

use crate::KeyColor;

/// The content of a single cell, either observed by the session or believed
/// by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Unknown,
    Empty,
    Wall,
    Player,
    Exit,
    KeyRed,
    KeyGreen,
    KeyBlue,
    DoorRed,
    DoorGreen,
    DoorBlue,
    Boulder,
    /// Decorative to the planner; carries no passability meaning.
    Enemy,
    /// Decorative to the planner; carries no passability meaning.
    Treasure,
}

impl Tile {
    /// Passability contract used by path search.
    ///
    /// Unknown cells block until observed. Keys and the exit do not block,
    /// closed doors and boulders do.
    pub const fn is_blocking(self) -> bool {
        matches!(
            self,
            Tile::Unknown
                | Tile::Wall
                | Tile::DoorRed
                | Tile::DoorGreen
                | Tile::DoorBlue
                | Tile::Boulder
        )
    }

    pub fn key_color(self) -> Option<KeyColor> {
        match self {
            Tile::KeyRed => Some(KeyColor::Red),
            Tile::KeyGreen => Some(KeyColor::Green),
            Tile::KeyBlue => Some(KeyColor::Blue),
            _ => None,
        }
    }

    pub fn door_color(self) -> Option<KeyColor> {
        match self {
            Tile::DoorRed => Some(KeyColor::Red),
            Tile::DoorGreen => Some(KeyColor::Green),
            Tile::DoorBlue => Some(KeyColor::Blue),
            _ => None,
        }
    }

    /// Two-character glyph used when dumping a map as text.
    pub fn glyph(self) -> &'static str {
        match self {
            Tile::Unknown => ".·",
            Tile::Empty => "  ",
            Tile::Wall => "██",
            Tile::Player => "{}",
            Tile::Exit => "><",
            Tile::KeyRed => "=r",
            Tile::KeyGreen => "=g",
            Tile::KeyBlue => "=b",
            Tile::DoorRed => "#r",
            Tile::DoorGreen => "#g",
            Tile::DoorBlue => "#b",
            Tile::Boulder => "@@",
            Tile::Enemy => "&&",
            Tile::Treasure => "$$",
        }
    }

    /// Parses a two-letter level-file token. `ST` (start) is handled by the
    /// level loader and is not a tile.
    pub fn from_token(token: &str) -> Option<Tile> {
        let tile = match token {
            "BL" => Tile::Empty,
            "WL" | "WA" => Tile::Wall,
            "EX" => Tile::Exit,
            "KR" => Tile::KeyRed,
            "KG" => Tile::KeyGreen,
            "KB" => Tile::KeyBlue,
            "DR" => Tile::DoorRed,
            "DG" => Tile::DoorGreen,
            "DB" => Tile::DoorBlue,
            "BO" => Tile::Boulder,
            "EN" => Tile::Enemy,
            "TR" => Tile::Treasure,
            _ => return None,
        };
        Some(tile)
    }
}
