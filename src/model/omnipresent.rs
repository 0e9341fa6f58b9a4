use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::IconId;
use crate::layout_engine::{DockError, DockId, GridPos};

/// Icon shown in every workspace's clip. It lives in `clip`, and `pos` is
/// reserved in all the others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmnipresentEntry {
    pub icon: IconId,
    pub clip: DockId,
    pub pos: GridPos,
}

/// Per-screen set of omnipresent icons.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OmnipresentRegistry {
    entries: Vec<OmnipresentEntry>,
}

/// Handle injected into every clip of a screen.
pub type SharedRegistry = Arc<RwLock<OmnipresentRegistry>>;

impl OmnipresentRegistry {
    pub fn shared() -> SharedRegistry { Arc::new(RwLock::new(Self::default())) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &OmnipresentEntry> + '_ { self.entries.iter() }

    pub fn get(&self, icon: IconId) -> Option<&OmnipresentEntry> {
        self.entries.iter().find(|entry| entry.icon == icon)
    }

    pub fn contains(&self, icon: IconId) -> bool { self.get(icon).is_some() }

    pub fn add(&mut self, entry: OmnipresentEntry) -> Result<(), DockError> {
        if self.contains(entry.icon) {
            return Err(DockError::invariant(format!(
                "icon {} is already omnipresent",
                entry.icon
            )));
        }
        if let Some(other) = self.reserved_at(entry.pos) {
            return Err(DockError::Occupied { x: other.pos.x, y: other.pos.y });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, icon: IconId) -> Option<OmnipresentEntry> {
        let idx = self.entries.iter().position(|entry| entry.icon == icon)?;
        Some(self.entries.remove(idx))
    }

    /// Follows an omnipresent icon to a new clip or cell.
    pub fn update(&mut self, icon: IconId, clip: DockId, pos: GridPos) -> bool {
        match self.entries.iter_mut().find(|entry| entry.icon == icon) {
            Some(entry) => {
                entry.clip = clip;
                entry.pos = pos;
                true
            }
            None => false,
        }
    }

    pub fn reserved_at(&self, pos: GridPos) -> Option<&OmnipresentEntry> {
        self.entries.iter().find(|entry| entry.pos == pos)
    }

    /// Whether `pos` is held in `clip` by an omnipresent icon living
    /// elsewhere, other than `except`.
    pub fn is_reserved_for(&self, clip: DockId, pos: GridPos, except: Option<IconId>) -> bool {
        self.reserved_at(pos).is_some_and(|entry| entry.clip != clip && Some(entry.icon) != except)
    }

    /// Omnipresent icons that will move into `clip` when it becomes current.
    pub fn foreign_count(&self, clip: DockId) -> usize {
        self.entries.iter().filter(|entry| entry.clip != clip).count()
    }

    pub fn in_clip(&self, clip: DockId) -> impl Iterator<Item = &OmnipresentEntry> + '_ {
        self.entries.iter().filter(move |entry| entry.clip == clip)
    }

}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn clips() -> (DockId, DockId) {
        let mut map: SlotMap<DockId, ()> = SlotMap::with_key();
        (map.insert(()), map.insert(()))
    }

    #[test]
    fn reservation_only_applies_to_other_clips() {
        let (home, other) = clips();
        let mut registry = OmnipresentRegistry::default();
        registry
            .add(OmnipresentEntry { icon: IconId::new(1), clip: home, pos: GridPos::new(1, 1) })
            .expect("add");

        assert!(registry.is_reserved_for(other, GridPos::new(1, 1), None));
        assert!(!registry.is_reserved_for(other, GridPos::new(1, 1), Some(IconId::new(1))));
        assert!(!registry.is_reserved_for(home, GridPos::new(1, 1), None));
        assert!(!registry.is_reserved_for(other, GridPos::new(1, 2), None));
        assert_eq!(registry.foreign_count(other), 1);
        assert_eq!(registry.foreign_count(home), 0);
    }

    #[test]
    fn add_refuses_duplicates_and_taken_cells() {
        let (home, other) = clips();
        let mut registry = OmnipresentRegistry::default();
        let entry = OmnipresentEntry { icon: IconId::new(1), clip: home, pos: GridPos::new(1, 1) };
        registry.add(entry).expect("add");

        assert!(matches!(registry.add(entry), Err(DockError::InvariantViolation(_))));
        assert_eq!(
            registry.add(OmnipresentEntry { icon: IconId::new(2), clip: other, pos: entry.pos }),
            Err(DockError::Occupied { x: 1, y: 1 })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn update_and_remove_track_the_icon() {
        let (home, other) = clips();
        let mut registry = OmnipresentRegistry::default();
        registry
            .add(OmnipresentEntry { icon: IconId::new(7), clip: home, pos: GridPos::new(2, 0) })
            .unwrap();

        assert!(registry.update(IconId::new(7), other, GridPos::new(2, 0)));
        assert_eq!(registry.in_clip(other).count(), 1);
        assert!(!registry.update(IconId::new(8), other, GridPos::new(0, 2)));

        assert!(registry.remove(IconId::new(7)).is_some());
        assert!(registry.is_empty());
    }
}
