use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{DockSystem, PlacementContext, SnapPlan, SnapRejection};
use crate::layout_engine::{Dock, DockError, GridPos, Point};
use crate::model::{DockType, Icon};

/// The screen-edge column. Icons only ever sit at `x == 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainDockSystem;

impl MainDockSystem {
    fn rows(capacity: i32) -> impl Iterator<Item = GridPos> {
        (1..capacity).flat_map(|r| [GridPos::new(0, r), GridPos::new(0, -r)])
    }

    fn is_free_for(dock: &Dock, pos: GridPos, icon: &Icon) -> bool {
        dock.table().at(pos).is_none_or(|occupant| occupant.id == icon.id)
    }

    fn blocked(dock: &Dock, pos: GridPos) -> SnapRejection {
        match dock.table().at(pos).and_then(Icon::drawer) {
            Some(drawer) => SnapRejection::DrawerInTheWay(drawer),
            None => SnapRejection::Occupied,
        }
    }
}

impl DockSystem for MainDockSystem {
    fn dock_type(&self) -> DockType { DockType::Dock }

    fn check_slot(&self, dock: &Dock, pos: GridPos) -> Result<(), DockError> {
        if pos.x != 0 || pos.y.unsigned_abs() as usize >= dock.capacity() {
            return Err(DockError::out_of_range(pos));
        }
        Ok(())
    }

    fn find_free_slot(&self, dock: &Dock, ctx: &PlacementContext<'_>) -> Option<GridPos> {
        if dock.is_full() {
            return None;
        }
        let grid = ctx.grid_for(dock);
        Self::rows(dock.capacity() as i32)
            .find(|&pos| dock.is_slot_free(pos) && grid.on_screen(pos))
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
        if ex.y.unsigned_abs() as usize >= dock.capacity() {
            return Err(SnapRejection::OutOfRange);
        }

        if !redocking {
            if ex.x != 0 {
                return Err(SnapRejection::OutOfRange);
            }
            if !grid.on_screen(ex) {
                return Err(SnapRejection::OffScreen);
            }
            if dock.is_full() {
                return Err(SnapRejection::Full);
            }
            if dock.table().at(ex).is_some() {
                return Err(Self::blocked(dock, ex));
            }
            return Ok(SnapPlan::at(ex));
        }

        let threshold = ctx.grid.detach_threshold;
        if ex.x.abs() > threshold {
            return Err(SnapRejection::OutOfRange);
        }
        let row = GridPos::new(0, ex.y);
        if !grid.on_screen(row) {
            return Err(SnapRejection::OffScreen);
        }
        if Self::is_free_for(dock, row, icon) {
            return Ok(SnapPlan::at(row));
        }

        // Look for the closest free row, first on the side the icon is
        // coming from.
        let toward = match (icon.grid_y - ex.y).signum() {
            0 => 1,
            s => s,
        };
        let cap = dock.capacity() as i32;
        for step in 1..=threshold {
            for dir in [toward, -toward] {
                let y = ex.y + dir * step;
                let pos = GridPos::new(0, y);
                if y == 0 || y.abs() >= cap || !grid.on_screen(pos) {
                    continue;
                }
                if Self::is_free_for(dock, pos, icon) {
                    trace!(from = %row, to = %pos, "snapped to closest free row");
                    return Ok(SnapPlan::at(pos));
                }
            }
        }
        Err(Self::blocked(dock, row))
    }
}
