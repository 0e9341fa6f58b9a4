pub mod dock;
pub mod drag;
pub mod engine;
pub mod grid;
pub mod reflow;
pub mod systems;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::error;

pub use dock::Dock;
pub use drag::DragSession;
pub use engine::DockEngine;
pub use grid::{Corner, Point, Screen, SlotGrid};
pub use systems::{
    ClipSystem, DockKind, DockSystem, DrawerSystem, MainDockSystem, PlacementContext, Slide,
    SnapPlan, SnapRejection,
};

use crate::model::IconId;

slotmap::new_key_type! {
    pub struct DockId;
}

/// Slot address relative to a dock's anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const ORIGIN: GridPos = GridPos { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self { Self { x, y } }

    pub fn offset(self, dx: i32, dy: i32) -> Self { Self::new(self.x + dx, self.y + dy) }

    /// Chebyshev distance.
    pub fn distance(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{},{}", self.x, self.y) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a position of the form `x,y`, got `{0}`")]
pub struct ParseGridPosError(String);

impl FromStr for GridPos {
    type Err = ParseGridPosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseGridPosError(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(err)?;
        let x = x.trim().parse().map_err(|_| err())?;
        let y = y.trim().parse().map_err(|_| err())?;
        Ok(GridPos::new(x, y))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DockError {
    #[error("dock has no free slot")]
    Full,
    #[error("destination dock has no free slot")]
    DestinationFull,
    #[error("slot ({x}, {y}) is outside the dock's grid")]
    OutOfRange { x: i32, y: i32 },
    #[error("slot ({x}, {y}) is already taken")]
    Occupied { x: i32, y: i32 },
    #[error("icon {0} is not in this dock")]
    NotDocked(IconId),
    #[error("not applicable: {0}")]
    NotApplicable(&'static str),
    #[error("unknown dock")]
    UnknownDock,
    #[error("dock invariant violated: {0}")]
    InvariantViolation(String),
}

impl DockError {
    /// Builds an [`DockError::InvariantViolation`] and reports it; these point at
    /// a caller that already broke the tables.
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(%msg, "dock invariant violated");
        DockError::InvariantViolation(msg)
    }

    pub(crate) fn out_of_range(pos: GridPos) -> Self {
        DockError::OutOfRange { x: pos.x, y: pos.y }
    }

    pub(crate) fn occupied(pos: GridPos) -> Self { DockError::Occupied { x: pos.x, y: pos.y } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_pos_parses_legacy_position_strings() {
        assert_eq!("3,-2".parse::<GridPos>(), Ok(GridPos::new(3, -2)));
        assert_eq!(" 0 , 4".parse::<GridPos>(), Ok(GridPos::new(0, 4)));
        assert!("3;2".parse::<GridPos>().is_err());
        assert_eq!(GridPos::new(-1, 5).to_string(), "-1,5");
    }

    #[test]
    fn distance_is_chebyshev() {
        assert_eq!(GridPos::new(2, 2).distance(GridPos::new(3, 1)), 1);
        assert_eq!(GridPos::new(0, 0).distance(GridPos::new(-4, 2)), 4);
    }
}
