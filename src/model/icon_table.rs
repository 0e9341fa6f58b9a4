use serde::{Deserialize, Serialize};

use super::{Icon, IconId};
use crate::common::collections::{HashMap, HashSet};
use crate::layout_engine::{DockError, GridPos};

/// Fixed-capacity sparse array of the icons one dock owns.
///
/// Index 0 always holds the dock's anchor at `(0, 0)`; every other icon goes
/// to the first free index. Coordinates are unique within a table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IconTable {
    slots: Vec<Option<Icon>>,
    occupied: usize,
}

impl IconTable {
    pub fn new(capacity: usize, mut anchor: Icon) -> Self {
        let capacity = capacity.max(1);
        anchor.set_pos(GridPos::ORIGIN);
        let mut slots = vec![None; capacity];
        slots[0] = Some(anchor);
        Self { slots, occupied: 1 }
    }

    pub fn capacity(&self) -> usize { self.slots.len() }

    pub fn occupied_count(&self) -> usize { self.occupied }

    pub fn is_full(&self) -> bool { self.occupied >= self.slots.len() }

    pub fn anchor(&self) -> Option<&Icon> { self.slots[0].as_ref() }

    pub fn get(&self, index: usize) -> Option<&Icon> { self.slots.get(index)?.as_ref() }

    /// Occupied slots, anchor first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Icon)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|icon| (idx, icon)))
    }

    /// Occupied slots except the anchor.
    pub fn members(&self) -> impl Iterator<Item = &Icon> + '_ {
        self.iter().filter(|(idx, _)| *idx != 0).map(|(_, icon)| icon)
    }

    pub fn index_of(&self, id: IconId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.as_ref().is_some_and(|icon| icon.id == id))
    }

    pub fn icon(&self, id: IconId) -> Option<&Icon> { self.get(self.index_of(id)?) }

    pub fn icon_mut(&mut self, id: IconId) -> Option<&mut Icon> {
        let idx = self.index_of(id)?;
        self.slots[idx].as_mut()
    }

    pub fn at(&self, pos: GridPos) -> Option<&Icon> {
        self.iter().map(|(_, icon)| icon).find(|icon| icon.pos() == pos)
    }

    pub fn is_free(&self, pos: GridPos) -> bool { self.at(pos).is_none() }

    pub(crate) fn insert(&mut self, icon: Icon) -> Result<usize, DockError> {
        let pos = icon.pos();
        if self.at(pos).is_some() {
            return Err(DockError::Occupied { x: pos.x, y: pos.y });
        }
        let idx = self
            .slots
            .iter()
            .skip(1)
            .position(Option::is_none)
            .map(|idx| idx + 1)
            .ok_or(DockError::Full)?;
        self.slots[idx] = Some(icon);
        self.occupied += 1;
        Ok(idx)
    }

    pub(crate) fn remove(&mut self, id: IconId) -> Result<Icon, DockError> {
        match self.index_of(id) {
            None => Err(DockError::NotDocked(id)),
            Some(0) => Err(DockError::NotApplicable("the anchor cannot leave its dock")),
            Some(idx) => {
                self.occupied -= 1;
                self.slots[idx].take().ok_or(DockError::NotDocked(id))
            }
        }
    }

    /// Moves several icons at once. Either every move lands on a distinct
    /// cell and all are applied, or nothing changes.
    pub(crate) fn relocate(&mut self, moves: &[(IconId, GridPos)]) -> Result<(), DockError> {
        let mut targets: HashMap<IconId, GridPos> = HashMap::default();
        for &(id, pos) in moves {
            match self.index_of(id) {
                None => return Err(DockError::NotDocked(id)),
                Some(0) if pos != GridPos::ORIGIN => {
                    return Err(DockError::NotApplicable("the anchor cannot move"));
                }
                Some(_) => {
                    targets.insert(id, pos);
                }
            }
        }

        let mut seen: HashSet<GridPos> = HashSet::default();
        for (_, icon) in self.iter() {
            let pos = targets.get(&icon.id).copied().unwrap_or(icon.pos());
            if !seen.insert(pos) {
                return Err(DockError::Occupied { x: pos.x, y: pos.y });
            }
        }

        for slot in self.slots.iter_mut().flatten() {
            if let Some(&pos) = targets.get(&slot.id) {
                slot.set_pos(pos);
            }
        }
        Ok(())
    }

    /// Checks the anchor, uniqueness and count invariants.
    pub fn check(&self) -> Result<(), DockError> {
        match self.anchor() {
            Some(anchor) if anchor.pos() == GridPos::ORIGIN => {}
            Some(_) => return Err(DockError::invariant("anchor is not at (0, 0)")),
            None => return Err(DockError::invariant("slot 0 is empty")),
        }

        let mut seen: HashSet<GridPos> = HashSet::default();
        let mut count = 0;
        for (_, icon) in self.iter() {
            count += 1;
            if !seen.insert(icon.pos()) {
                return Err(DockError::invariant(format!(
                    "two icons share slot {}",
                    icon.pos()
                )));
            }
        }
        if count != self.occupied {
            return Err(DockError::invariant(format!(
                "occupied count {} does not match {} filled slots",
                self.occupied, count
            )));
        }
        Ok(())
    }
}
