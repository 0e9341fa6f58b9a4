use serde::{Deserialize, Serialize};

use super::{DockSystem, PlacementContext, SnapPlan, SnapRejection, side_sign};
use crate::layout_engine::{Dock, DockError, DockId, GridPos, Point, reflow};
use crate::model::{DockType, Icon};

/// One-dimensional row hanging off a tile of the main dock. Icons sit at
/// `x = ±1..` on the side away from the screen edge, always contiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawerSystem {
    pub parent: DockId,
}

impl DockSystem for DrawerSystem {
    fn dock_type(&self) -> DockType { DockType::Drawer }

    fn check_slot(&self, dock: &Dock, pos: GridPos) -> Result<(), DockError> {
        let on_side = pos.x.signum() == side_sign(dock);
        if pos.y != 0 || !on_side || pos.x.unsigned_abs() as usize >= dock.capacity() {
            return Err(DockError::out_of_range(pos));
        }
        Ok(())
    }

    fn find_free_slot(&self, dock: &Dock, _ctx: &PlacementContext<'_>) -> Option<GridPos> {
        if dock.is_full() {
            return None;
        }
        let sign = side_sign(dock);
        let next = GridPos::new(sign * dock.occupied_count() as i32, 0);
        if dock.is_slot_free(next) {
            return Some(next);
        }
        (1..dock.capacity() as i32)
            .map(|x| GridPos::new(sign * x, 0))
            .find(|&pos| dock.is_slot_free(pos))
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
        if ex.y != 0 {
            return Err(SnapRejection::OutOfRange);
        }
        let sign = side_sign(dock);
        if ex.x * sign < 0 {
            return Err(SnapRejection::WrongSide);
        }
        let occupied = dock.occupied_count() as i32;
        if ex.x.abs() - occupied > ctx.grid.detach_threshold {
            return Err(SnapRejection::OutOfRange);
        }
        if !redocking && dock.is_full() {
            return Err(SnapRejection::Full);
        }

        // Past the end of the row snaps to the last usable index.
        let last = if redocking { occupied - 1 } else { occupied };
        let index = ex.x.abs().clamp(1, last.max(1));
        let target = GridPos::new(sign * index, 0);
        if !grid.on_screen(target) {
            return Err(SnapRejection::OffScreen);
        }

        let hole = reflow::hole_index(dock, icon.id, redocking)?;
        let slides = reflow::slide_plan(dock, icon.id, target, hole)?;
        Ok(SnapPlan { pos: target, slides })
    }

    fn check_dock(&self, dock: &Dock) -> Result<(), DockError> {
        let members = dock.occupied_count() - 1;
        let mut seen = vec![false; members];
        for icon in dock.table().members() {
            let x = icon.grid_x.unsigned_abs() as usize;
            match seen.get_mut(x.wrapping_sub(1)) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(DockError::invariant(format!(
                        "drawer {:?} has a hole: index {} with {members} icons",
                        dock.id(),
                        icon.grid_x
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout_engine::Slide;
    use crate::layout_engine::testing::*;
    use crate::model::IconId;

    const CELL: i32 = 64;

    fn drawer(count: u64, on_right_side: bool) -> Dock {
        let ids = dock_ids(2);
        let mut dock = dock(ids[1], DrawerSystem { parent: ids[0] }, Point::new(640, 128), 6, None);
        dock.on_right_side = on_right_side;
        let sign = side_sign(&dock);
        for n in 1..=count {
            dock.attach(launcher(n), GridPos::new(sign * n as i32, 0)).expect("attach");
        }
        dock
    }

    fn pointer(dock: &Dock, x: i32, y: i32) -> Point {
        Point::new(dock.origin().x + x * CELL, dock.origin().y + y * CELL)
    }

    #[test]
    fn free_slot_is_the_next_index_on_the_drawers_side() {
        let settings = settings();
        let ctx = PlacementContext::new(screen(), &settings);
        let left = drawer(2, true);
        assert_eq!(left.kind().find_free_slot(&left, &ctx), Some(GridPos::new(-3, 0)));
        let right = drawer(2, false);
        assert_eq!(right.kind().find_free_slot(&right, &ctx), Some(GridPos::new(3, 0)));
        let full = drawer(5, false);
        assert_eq!(full.kind().find_free_slot(&full, &ctx), None);
    }

    #[test]
    fn slots_are_restricted_to_one_side_of_one_row() {
        let dock = drawer(0, true);
        let system = DrawerSystem { parent: dock.kind().parent().unwrap() };
        assert!(system.check_slot(&dock, GridPos::new(-2, 0)).is_ok());
        assert!(system.check_slot(&dock, GridPos::new(2, 0)).is_err());
        assert!(system.check_slot(&dock, GridPos::new(-2, 1)).is_err());
        assert!(system.check_slot(&dock, GridPos::new(0, 0)).is_err());
        assert!(system.check_slot(&dock, GridPos::new(-6, 0)).is_err());
    }

    #[test]
    fn arriving_icon_clamps_to_the_end_and_pushes_the_rest_out() {
        let settings = settings();
        let ctx = PlacementContext::new(screen(), &settings);
        let dock = drawer(2, false);
        let fresh = launcher(9);

        // Far past the end snaps to the next free index with no slides.
        let plan = dock.kind().snap(&dock, &fresh, pointer(&dock, 5, 0), false, &ctx);
        assert_eq!(plan, Ok(SnapPlan::at(GridPos::new(3, 0))));

        // Onto the first icon: both existing icons slide one step outward.
        let plan = dock.kind().snap(&dock, &fresh, pointer(&dock, 1, 0), false, &ctx).unwrap();
        assert_eq!(plan.pos, GridPos::new(1, 0));
        assert_eq!(plan.slides, vec![
            Slide { icon: IconId::new(1), from: GridPos::new(1, 0), to: GridPos::new(2, 0) },
            Slide { icon: IconId::new(2), from: GridPos::new(2, 0), to: GridPos::new(3, 0) },
        ]);

        // Dropping on the anchor means "first slot".
        let plan = dock.kind().snap(&dock, &fresh, pointer(&dock, 0, 0), false, &ctx).unwrap();
        assert_eq!(plan.pos, GridPos::new(1, 0));
    }

    #[test]
    fn snap_rejects_other_rows_sides_and_far_drops() {
        let settings = settings();
        let ctx = PlacementContext::new(screen(), &settings);
        let dock = drawer(2, false);
        let fresh = launcher(9);

        let snap = |x, y| dock.kind().snap(&dock, &fresh, pointer(&dock, x, y), false, &ctx);
        assert_eq!(snap(1, 1), Err(SnapRejection::OutOfRange));
        assert_eq!(snap(-1, 0), Err(SnapRejection::WrongSide));
        assert_eq!(snap(7, 0), Err(SnapRejection::OutOfRange));

        let full = drawer(5, false);
        assert_eq!(
            full.kind().snap(&full, &fresh, pointer(&full, 2, 0), false, &ctx),
            Err(SnapRejection::Full)
        );
    }

    #[test]
    fn redocking_within_the_row_slides_neighbours_into_the_vacated_slot() {
        let settings = settings();
        let ctx = PlacementContext::new(screen(), &settings);
        let dock = drawer(3, true);
        let moving = dock.icon(IconId::new(3)).cloned().unwrap();

        let plan = dock.kind().snap(&dock, &moving, pointer(&dock, -1, 0), true, &ctx).unwrap();
        assert_eq!(plan.pos, GridPos::new(-1, 0));
        assert_eq!(plan.slides.len(), 2);
        assert!(plan.slides.iter().all(|slide| slide.to.x == slide.from.x - 1));

        // Redocking past the end stops at the icon's own last slot.
        let plan = dock.kind().snap(&dock, &moving, pointer(&dock, -5, 0), true, &ctx).unwrap();
        assert_eq!(plan, SnapPlan::at(GridPos::new(-3, 0)));
    }

    #[test]
    fn holes_break_the_drawer_invariant() {
        let mut dock = drawer(3, false);
        assert!(dock.check_invariants().is_ok());
        dock.detach(IconId::new(2)).unwrap();
        assert!(matches!(dock.check_invariants(), Err(DockError::InvariantViolation(_))));
    }
}
