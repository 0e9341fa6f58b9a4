//! Per-kind placement policy.
//!
//! Every dock shares the table mechanics in [`Dock`]; what differs between
//! the main dock, a clip and a drawer is which cells are addressable, how a
//! free cell is chosen and how a dragged icon snaps. Those live here behind
//! [`DockSystem`], dispatched through the [`DockKind`] enum.

mod clip;
mod drawer;
mod main_dock;

pub use clip::ClipSystem;
pub use drawer::DrawerSystem;
use enum_dispatch::enum_dispatch;
pub use main_dock::MainDockSystem;
use serde::{Deserialize, Serialize};

use super::{Dock, DockError, DockId, GridPos, Point, Screen, SlotGrid};
use crate::common::config::GridSettings;
use crate::model::{DockType, Icon, IconFlags, IconId};

/// Everything outside the dock itself that placement decisions look at.
pub struct PlacementContext<'a> {
    pub screen: Screen,
    pub grid: &'a GridSettings,
    /// Every workspace's clip, current one included.
    pub clips: Vec<&'a Dock>,
}

impl<'a> PlacementContext<'a> {
    pub fn new(screen: Screen, grid: &'a GridSettings) -> Self {
        Self { screen, grid, clips: Vec::new() }
    }

    pub fn with_clips(mut self, clips: impl IntoIterator<Item = &'a Dock>) -> Self {
        self.clips.extend(clips);
        self
    }

    pub fn grid_for(&self, dock: &Dock) -> SlotGrid { dock.grid(self.grid.icon_size, self.screen) }
}

/// One icon sliding inside a drawer to make room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub icon: IconId,
    pub from: GridPos,
    pub to: GridPos,
}

/// Result of a successful snap: the cell the dragged icon would land on and
/// the neighbours that would have to slide for it. Nothing is applied until
/// the plan is committed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapPlan {
    pub pos: GridPos,
    pub slides: Vec<Slide>,
}

impl SnapPlan {
    pub fn at(pos: GridPos) -> Self { Self { pos, slides: Vec::new() } }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SnapRejection {
    #[error("target cell is off screen")]
    OffScreen,
    #[error("target cell is outside the dock")]
    OutOfRange,
    #[error("target cell is taken")]
    Occupied,
    #[error("no icon close enough to glue to")]
    NoNeighbour,
    #[error("dock is full")]
    Full,
    #[error("target is on the wrong side of the drawer")]
    WrongSide,
    #[error("a drawer sits on that row; open it instead")]
    DrawerInTheWay(DockId),
    #[error("{0}")]
    Inconsistent(DockError),
}

impl From<DockError> for SnapRejection {
    fn from(err: DockError) -> Self { SnapRejection::Inconsistent(err) }
}

#[enum_dispatch]
pub trait DockSystem {
    fn dock_type(&self) -> DockType;

    /// Whether `pos` is addressable in this kind of dock at all.
    fn check_slot(&self, dock: &Dock, pos: GridPos) -> Result<(), DockError>;

    fn find_free_slot(&self, dock: &Dock, ctx: &PlacementContext<'_>) -> Option<GridPos>;

    /// Maps a dragged icon's top-left corner to a target cell. Pure: the
    /// returned plan describes the change without making it.
    fn snap(
        &self,
        dock: &Dock,
        icon: &Icon,
        req: Point,
        redocking: bool,
        ctx: &PlacementContext<'_>,
    ) -> Result<SnapPlan, SnapRejection>;

    /// Adjusts an icon entering a dock of this kind.
    fn rebind(&self, icon: &mut Icon) { icon.flags.remove(IconFlags::ATTRACTED); }

    /// Kind-specific invariants over the whole table.
    fn check_dock(&self, _dock: &Dock) -> Result<(), DockError> { Ok(()) }
}

#[enum_dispatch(DockSystem)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DockKind {
    MainDock(MainDockSystem),
    Clip(ClipSystem),
    Drawer(DrawerSystem),
}

impl DockKind {
    pub fn is_clip(&self) -> bool { matches!(self, DockKind::Clip(_)) }

    pub fn is_drawer(&self) -> bool { matches!(self, DockKind::Drawer(_)) }

    pub fn workspace(&self) -> Option<usize> {
        match self {
            DockKind::Clip(clip) => Some(clip.workspace),
            _ => None,
        }
    }

    /// The main dock a drawer hangs off.
    pub fn parent(&self) -> Option<DockId> {
        match self {
            DockKind::Drawer(drawer) => Some(drawer.parent),
            _ => None,
        }
    }
}

/// Signed unit along a dock's horizontal axis.
pub(crate) fn side_sign(dock: &Dock) -> i32 { if dock.on_right_side { -1 } else { 1 } }
