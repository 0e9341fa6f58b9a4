//! Keeps a drawer's one-dimensional index space free of holes.
//!
//! Drawer icons sit at `x = ±1, ±2, …` with the sign fixed by the drawer's
//! side. Whenever an icon leaves, arrives or moves, the others slide by one
//! so that the magnitudes stay exactly `1..=members`.

use tracing::{debug, trace};

use super::systems::{Slide, side_sign};
use super::{Dock, DockError, GridPos};
use crate::model::IconId;

fn magnitudes(dock: &Dock, except: Option<IconId>) -> impl Iterator<Item = (IconId, i32)> + '_ {
    dock.table()
        .members()
        .filter(move |icon| Some(icon.id) != except)
        .map(|icon| (icon.id, icon.grid_x.abs()))
}

/// Signed index of the one gap among the drawer's members other than
/// `moving`.
///
/// With `redocking` the moving icon is still in the drawer and the others
/// span `1..occupied_count - 1`; otherwise it is not (or no longer) counted
/// and they span `1..occupied_count`. Either way exactly one index is
/// missing and it is found as the difference of a triangular number and
/// the sum of the indices present.
pub fn hole_index(dock: &Dock, moving: IconId, redocking: bool) -> Result<i32, DockError> {
    let occupied = dock.occupied_count() as i64;
    let n = if redocking { occupied - 1 } else { occupied };
    let present: i64 = magnitudes(dock, Some(moving)).map(|(_, x)| i64::from(x)).sum();
    let hole = n * (n + 1) / 2 - present;

    if n < 1 || hole < 1 || hole > n {
        return Err(DockError::invariant(format!(
            "hole index {hole} outside 1..={n} in drawer {:?}",
            dock.id()
        )));
    }
    trace!(dock = ?dock.id(), %moving, redocking, hole, "hole index");
    Ok(side_sign(dock) * hole as i32)
}

/// Slides needed so that `moving` can take `target` when the gap is at
/// `hole`: members between the two shift one step toward the gap.
pub fn slide_plan(
    dock: &Dock,
    moving: IconId,
    target: GridPos,
    hole: i32,
) -> Result<Vec<Slide>, DockError> {
    let sign = side_sign(dock);
    let (t, h) = (target.x.abs(), hole.abs());
    let slides: Vec<Slide> = magnitudes(dock, Some(moving))
        .filter_map(|(icon, x)| {
            let step = if t < h && (t..h).contains(&x) {
                1
            } else if h < t && (h + 1..=t).contains(&x) {
                -1
            } else {
                return None;
            };
            Some(Slide {
                icon,
                from: GridPos::new(sign * x, 0),
                to: GridPos::new(sign * (x + step), 0),
            })
        })
        .collect();

    let expected = (t - h).unsigned_abs() as usize;
    if slides.len() != expected {
        return Err(DockError::invariant(format!(
            "moving to {target} past hole {hole} needs {expected} slides, found {}",
            slides.len()
        )));
    }
    Ok(slides)
}

/// Closes the gap left by `moving`: everything beyond it moves one step
/// toward the anchor.
///
/// With `redocking` the moving icon is still in the drawer; it is parked at
/// the far end so the others can close up around it.
pub fn fill_gap(dock: &mut Dock, moving: IconId, redocking: bool) -> Result<Vec<Slide>, DockError> {
    let hole = hole_index(dock, moving, redocking)?.abs();
    let sign = side_sign(dock);
    let mut slides: Vec<Slide> = magnitudes(dock, Some(moving))
        .filter(|&(_, x)| x > hole)
        .map(|(icon, x)| Slide {
            icon,
            from: GridPos::new(sign * x, 0),
            to: GridPos::new(sign * (x - 1), 0),
        })
        .collect();
    if redocking && let Some(icon) = dock.icon(moving) {
        let last = dock.occupied_count() as i32 - 1;
        if icon.grid_x.abs() != last {
            slides.push(Slide { icon: moving, from: icon.pos(), to: GridPos::new(sign * last, 0) });
        }
    }

    apply(dock, &slides)?;
    debug!(dock = ?dock.id(), hole, moved = slides.len(), "filled drawer gap");
    Ok(slides)
}

/// Squeezes out every gap, e.g. after several icons were removed at once.
/// Returns no slides when the drawer is already contiguous.
pub fn consolidate(dock: &mut Dock) -> Result<Vec<Slide>, DockError> {
    let sign = side_sign(dock);
    let mut members: Vec<(IconId, i32)> = magnitudes(dock, None).collect();
    let original: Vec<(IconId, i32)> = members.clone();

    let mut rounds = 0;
    loop {
        let max = members.iter().map(|&(_, x)| x).max().unwrap_or(0);
        if max as usize == members.len() {
            break;
        }
        rounds += 1;
        if rounds > dock.capacity() {
            return Err(DockError::invariant(format!(
                "drawer {:?} did not settle within {} rounds",
                dock.id(),
                dock.capacity()
            )));
        }
        let gap = (1..max).find(|x| members.iter().all(|&(_, m)| m != *x)).unwrap_or(max);
        for (_, x) in members.iter_mut().filter(|(_, x)| *x > gap) {
            *x -= 1;
        }
    }

    let slides: Vec<Slide> = original
        .iter()
        .zip(&members)
        .filter(|((_, before), (_, after))| before != after)
        .map(|(&(icon, before), &(_, after))| Slide {
            icon,
            from: GridPos::new(sign * before, 0),
            to: GridPos::new(sign * after, 0),
        })
        .collect();
    apply(dock, &slides)?;
    if !slides.is_empty() {
        debug!(dock = ?dock.id(), rounds, moved = slides.len(), "consolidated drawer");
    }
    Ok(slides)
}

pub(crate) fn apply(dock: &mut Dock, slides: &[Slide]) -> Result<(), DockError> {
    if slides.is_empty() {
        return Ok(());
    }
    let moves: Vec<(IconId, GridPos)> = slides.iter().map(|slide| (slide.icon, slide.to)).collect();
    dock.relocate(&moves)
}

/// Undoes [`apply`].
pub(crate) fn revert(dock: &mut Dock, slides: &[Slide]) -> Result<(), DockError> {
    let moves: Vec<(IconId, GridPos)> =
        slides.iter().map(|slide| (slide.icon, slide.from)).collect();
    if moves.is_empty() { Ok(()) } else { dock.relocate(&moves) }
}
