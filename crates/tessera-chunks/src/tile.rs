//! Tile identity.

use std::fmt;
use std::str::FromStr;

/// World tile coordinate `(x, y)`.
pub type TilePos = (i64, i64);

/// Tag carried by every tile.
///
/// `Loading` never comes out of the terrain pipeline; the front end hands it
/// out as a transient placeholder while the owning chunk is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileType {
    Land,
    Water,
    Loading,
}

impl TileType {
    /// Lowercase tag as used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TileType::Land => "land",
            TileType::Water => "water",
            TileType::Loading => "loading",
        }
    }

    /// True for the front end placeholder.
    pub fn is_placeholder(self) -> bool {
        self == TileType::Loading
    }
}

impl fmt::Display for TileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "land" => Ok(TileType::Land),
            "water" => Ok(TileType::Water),
            "loading" => Ok(TileType::Loading),
            other => Err(format!("unknown tile type '{other}'")),
        }
    }
}

/// A single tile value. Never mutated once produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: i64,
    pub y: i64,
    pub tile_type: TileType,
}

impl Tile {
    pub fn new(x: i64, y: i64, tile_type: TileType) -> Self {
        Self { x, y, tile_type }
    }

    /// Placeholder returned while the owning render chunk is not ready.
    pub fn loading(x: i64, y: i64) -> Self {
        Self::new(x, y, TileType::Loading)
    }

    pub fn pos(&self) -> TilePos {
        (self.x, self.y)
    }
}
