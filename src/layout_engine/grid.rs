//! Pure slot geometry: mapping between grid cells and screen pixels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{GridPos, ParseGridPosError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Self { x, y } }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{},{}", self.x, self.y) }
}

impl FromStr for Point {
    type Err = ParseGridPosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let GridPos { x, y } = s.parse()?;
        Ok(Point::new(x, y))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub width: i32,
    pub height: i32,
}

impl Default for Screen {
    fn default() -> Self { Self { width: 1920, height: 1080 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Corner {
    /// Unit step pointing away from both screen edges.
    pub fn step(self) -> (i32, i32) {
        match self {
            Corner::NorthWest => (1, 1),
            Corner::NorthEast => (-1, 1),
            Corner::SouthWest => (1, -1),
            Corner::SouthEast => (-1, -1),
        }
    }
}

/// Grid anchored at one dock's origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotGrid {
    pub origin: Point,
    pub icon_size: i32,
    pub screen: Screen,
}

impl SlotGrid {
    pub fn new(origin: Point, icon_size: i32, screen: Screen) -> Self {
        Self { origin, icon_size, screen }
    }

    /// Top-left pixel of a cell.
    pub fn slot_origin(&self, pos: GridPos) -> Point {
        Point::new(self.origin.x + pos.x * self.icon_size, self.origin.y + pos.y * self.icon_size)
    }

    /// Whether the whole cell is visible.
    pub fn on_screen(&self, pos: GridPos) -> bool {
        let p = self.slot_origin(pos);
        p.x >= 0
            && p.y >= 0
            && p.x + self.icon_size <= self.screen.width
            && p.y + self.icon_size <= self.screen.height
    }

    /// Cell under a dragged icon whose top-left corner is at `(x, y)`.
    ///
    /// Offsets are pushed half a cell away from the origin before the
    /// truncating division, so each cell captures the half-cells around it.
    pub fn pointer_to_slot(&self, x: i32, y: i32) -> GridPos {
        let half = self.icon_size / 2;
        let axis = |req: i32, origin: i32| {
            let offset = req - origin;
            if req < origin {
                (offset - half) / self.icon_size
            } else {
                (offset + half) / self.icon_size
            }
        };
        GridPos::new(axis(x, self.origin.x), axis(y, self.origin.y))
    }

    /// Corner the origin sits in, if it is within one cell of two adjacent
    /// screen edges.
    pub fn corner(&self) -> Option<Corner> {
        let size = self.icon_size;
        let left = self.origin.x < size;
        let right = self.origin.x + size > self.screen.width - size;
        let top = self.origin.y < size;
        let bottom = self.origin.y + size > self.screen.height - size;
        match (left, right, top, bottom) {
            (true, _, true, _) => Some(Corner::NorthWest),
            (true, _, _, true) => Some(Corner::SouthWest),
            (_, true, true, _) => Some(Corner::NorthEast),
            (_, true, _, true) => Some(Corner::SouthEast),
            _ => None,
        }
    }

    /// Cells on the horizontal and vertical screen borders leaving `corner`,
    /// nearest first; at equal distance the horizontal cell comes first.
    pub fn border_cells(&self, corner: Corner) -> impl Iterator<Item = GridPos> + use<> {
        let (sx, sy) = corner.step();
        let reach = self.screen.width.max(self.screen.height) / self.icon_size.max(1);
        (1..=reach).flat_map(move |d| [GridPos::new(sx * d, 0), GridPos::new(0, sy * d)])
    }

    /// Cells at Chebyshev distance `radius`: top edge, bottom edge, then the
    /// left and right edges without their corners.
    pub fn ring(radius: i32) -> impl Iterator<Item = GridPos> {
        let r = radius.max(0);
        let top = (-r..=r).map(move |x| GridPos::new(x, -r));
        let bottom = (-r..=r).map(move |x| GridPos::new(x, r)).filter(move |_| r > 0);
        let sides = (-r + 1..r).flat_map(move |y| [GridPos::new(-r, y), GridPos::new(r, y)]);
        let (left, right): (Vec<_>, Vec<_>) = sides.partition(|pos| pos.x == -r);
        top.chain(bottom).chain(left).chain(right)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn grid(x: i32, y: i32) -> SlotGrid {
        SlotGrid::new(Point::new(x, y), 64, Screen { width: 1280, height: 1024 })
    }

    #[test]
    fn snapping_captures_half_cells_on_both_sides() {
        let grid = grid(640, 512);
        assert_eq!(grid.pointer_to_slot(640 + 31, 512), GridPos::new(0, 0));
        assert_eq!(grid.pointer_to_slot(640 + 32, 512), GridPos::new(1, 0));
        assert_eq!(grid.pointer_to_slot(640 - 31, 512), GridPos::new(0, 0));
        assert_eq!(grid.pointer_to_slot(640 - 32, 512), GridPos::new(-1, 0));
        assert_eq!(grid.pointer_to_slot(640, 512 + 64 * 3 + 10), GridPos::new(0, 3));
    }

    #[test]
    fn on_screen_requires_the_whole_cell() {
        let grid = grid(0, 0);
        assert!(grid.on_screen(GridPos::new(0, 0)));
        assert!(!grid.on_screen(GridPos::new(-1, 0)));
        assert!(grid.on_screen(GridPos::new(19, 15)));
        assert!(!grid.on_screen(GridPos::new(20, 0)));
        assert!(!grid.on_screen(GridPos::new(0, 16)));
    }

    #[test]
    fn corners_are_detected_from_the_origin() {
        assert_eq!(grid(0, 0).corner(), Some(Corner::NorthWest));
        assert_eq!(grid(1280 - 64, 0).corner(), Some(Corner::NorthEast));
        assert_eq!(grid(0, 1024 - 64).corner(), Some(Corner::SouthWest));
        assert_eq!(grid(1280 - 64, 1024 - 64).corner(), Some(Corner::SouthEast));
        assert_eq!(grid(0, 400).corner(), None);
        assert_eq!(grid(600, 400).corner(), None);
    }

    #[test]
    fn border_cells_alternate_outward() {
        let cells: Vec<_> = grid(1280 - 64, 0).border_cells(Corner::NorthEast).take(4).collect();
        assert_eq!(cells, vec![
            GridPos::new(-1, 0),
            GridPos::new(0, 1),
            GridPos::new(-2, 0),
            GridPos::new(0, 2)
        ]);
    }

    #[test]
    fn ring_covers_the_square_once() {
        assert_eq!(SlotGrid::ring(0).collect::<Vec<_>>(), vec![GridPos::ORIGIN]);

        let ring: Vec<_> = SlotGrid::ring(1).collect();
        assert_eq!(ring.len(), 8);
        assert_eq!(&ring[..3], &[GridPos::new(-1, -1), GridPos::new(0, -1), GridPos::new(1, -1)]);
        assert_eq!(ring[6], GridPos::new(-1, 0));
        assert_eq!(ring[7], GridPos::new(1, 0));

        let ring2: Vec<_> = SlotGrid::ring(2).collect();
        assert_eq!(ring2.len(), 16);
        assert!(ring2.iter().all(|pos| pos.distance(GridPos::ORIGIN) == 2));
    }
}
