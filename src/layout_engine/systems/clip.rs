use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{DockSystem, PlacementContext, SnapPlan, SnapRejection};
use crate::layout_engine::{Dock, DockError, GridPos, Point, SlotGrid};
use crate::model::{DockType, Icon};

/// Free-form cluster bound to one workspace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSystem {
    pub workspace: usize,
}

impl ClipSystem {
    fn search_radius(capacity: usize) -> i32 { ((capacity as f64).sqrt().ceil() as i32) * 2 }

    /// Clips an omnipresent icon has to coexist with.
    fn scope<'a>(dock: &'a Dock, icon: &Icon, ctx: &PlacementContext<'a>) -> Vec<&'a Dock> {
        if icon.omnipresent && !ctx.clips.is_empty() {
            ctx.clips.clone()
        } else {
            vec![dock]
        }
    }
}

impl DockSystem for ClipSystem {
    fn dock_type(&self) -> DockType { DockType::Clip }

    fn check_slot(&self, dock: &Dock, pos: GridPos) -> Result<(), DockError> {
        let cap = dock.capacity();
        if pos.x.unsigned_abs() as usize >= cap || pos.y.unsigned_abs() as usize >= cap {
            return Err(DockError::out_of_range(pos));
        }
        Ok(())
    }

    fn find_free_slot(&self, dock: &Dock, ctx: &PlacementContext<'_>) -> Option<GridPos> {
        if dock.is_full() {
            return None;
        }
        let grid = ctx.grid_for(dock);
        let usable = |pos: GridPos| dock.is_slot_free(pos) && grid.on_screen(pos);

        if let Some(corner) = grid.corner() {
            let found = grid
                .border_cells(corner)
                .take_while(|pos| self.check_slot(dock, *pos).is_ok())
                .find(|&pos| usable(pos));
            if let Some(pos) = found {
                trace!(%corner, %pos, "free slot on screen border");
                return Some(pos);
            }
        }

        (1..=Self::search_radius(dock.capacity()))
            .flat_map(SlotGrid::ring)
            .find(|&pos| usable(pos))
    }

    fn snap(
        &self,
        dock: &Dock,
        icon: &Icon,
        req: Point,
        redocking: bool,
        ctx: &PlacementContext<'_>,
    ) -> Result<SnapPlan, SnapRejection> {
        let grid = ctx.grid_for(dock);
        let ex = grid.pointer_to_slot(req.x, req.y);
        if !grid.on_screen(ex) {
            return Err(SnapRejection::OffScreen);
        }
        if self.check_slot(dock, ex).is_err() {
            return Err(SnapRejection::OutOfRange);
        }
        if !redocking && dock.is_full() {
            return Err(SnapRejection::Full);
        }

        let scope = Self::scope(dock, icon, ctx);
        for clip in &scope {
            if let Some(occupant) = clip.table().at(ex)
                && !(redocking && occupant.id == icon.id)
            {
                return Err(SnapRejection::Occupied);
            }
        }
        if dock.is_reserved(ex, Some(icon.id)) {
            return Err(SnapRejection::Occupied);
        }

        let vicinity = ctx.grid.clip_attach_vicinity;
        let glued = scope.iter().any(|clip| {
            clip.icons().any(|other| other.id != icon.id && other.pos().distance(ex) <= vicinity)
        });
        if !glued {
            return Err(SnapRejection::NoNeighbour);
        }
        Ok(SnapPlan::at(ex))
    }

    fn rebind(&self, _icon: &mut Icon) {}
}
