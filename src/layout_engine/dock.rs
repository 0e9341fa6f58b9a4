use tracing::trace;

use super::systems::{DockKind, DockSystem};
use super::{DockError, DockId, GridPos, Point, Screen, SlotGrid};
use crate::actor::auto_visibility::DockTimers;
use crate::model::{DockType, Icon, IconFlags, IconId, IconRole, IconTable, SharedRegistry};

/// One docking container: its icon table plus placement and visibility state.
#[derive(Debug)]
pub struct Dock {
    id: DockId,
    kind: DockKind,
    origin: Point,
    table: IconTable,
    pub collapsed: bool,
    pub lowered: bool,
    pub auto_collapse: bool,
    pub auto_raise_lower: bool,
    pub attract_icons: bool,
    pub on_right_side: bool,
    pub(crate) timers: DockTimers,
    registry: Option<SharedRegistry>,
}

impl Dock {
    pub(crate) fn new(
        id: DockId,
        kind: DockKind,
        origin: Point,
        capacity: usize,
        mut anchor: Icon,
        registry: Option<SharedRegistry>,
    ) -> Self {
        anchor.role = IconRole::Anchor;
        anchor.owner = Some(id);
        anchor.dock_type = Some(kind.dock_type());
        anchor.flags |= IconFlags::DOCKED;
        Self {
            id,
            table: IconTable::new(capacity, anchor),
            registry: if kind.is_clip() { registry } else { None },
            kind,
            origin,
            collapsed: false,
            lowered: false,
            auto_collapse: false,
            auto_raise_lower: false,
            attract_icons: false,
            on_right_side: false,
            timers: DockTimers::default(),
        }
    }

    pub fn id(&self) -> DockId { self.id }

    pub fn kind(&self) -> &DockKind { &self.kind }

    pub(crate) fn kind_mut(&mut self) -> &mut DockKind { &mut self.kind }

    pub fn dock_type(&self) -> DockType { self.kind.dock_type() }

    pub fn origin(&self) -> Point { self.origin }

    pub(crate) fn set_origin(&mut self, origin: Point) { self.origin = origin; }

    pub fn table(&self) -> &IconTable { &self.table }

    pub fn capacity(&self) -> usize { self.table.capacity() }

    pub fn occupied_count(&self) -> usize { self.table.occupied_count() }

    pub fn is_full(&self) -> bool { self.effective_count() >= self.capacity() }

    pub fn icon(&self, id: IconId) -> Option<&Icon> { self.table.icon(id) }

    pub fn icons(&self) -> impl Iterator<Item = &Icon> + '_ {
        self.table.iter().map(|(_, icon)| icon)
    }

    pub fn registry(&self) -> Option<&SharedRegistry> { self.registry.as_ref() }

    pub fn grid(&self, icon_size: i32, screen: Screen) -> SlotGrid {
        SlotGrid::new(self.origin, icon_size, screen)
    }

    /// Occupied slots plus, for a clip, the omnipresent icons of other clips
    /// that keep a slot reserved here.
    pub fn effective_count(&self) -> usize {
        let foreign = self.registry.as_ref().map_or(0, |reg| reg.read().foreign_count(self.id));
        self.table.occupied_count() + foreign
    }

    /// Whether `pos` is held here by an omnipresent icon other than `except`.
    pub fn is_reserved(&self, pos: GridPos, except: Option<IconId>) -> bool {
        self.registry.as_ref().is_some_and(|reg| reg.read().is_reserved_for(self.id, pos, except))
    }

    /// Whether an icon could be dropped at `pos` right now.
    pub fn is_slot_free(&self, pos: GridPos) -> bool {
        self.kind.check_slot(self, pos).is_ok()
            && self.table.is_free(pos)
            && !self.is_reserved(pos, None)
    }

    fn check_target(&self, pos: GridPos, moving: Option<IconId>) -> Result<(), DockError> {
        self.kind.check_slot(self, pos)?;
        match self.table.at(pos) {
            Some(occupant) if Some(occupant.id) != moving => return Err(DockError::occupied(pos)),
            _ => {}
        }
        if self.is_reserved(pos, moving) {
            return Err(DockError::occupied(pos));
        }
        Ok(())
    }

    fn bind(&self, icon: &mut Icon, pos: GridPos) {
        icon.set_pos(pos);
        icon.owner = Some(self.id);
        icon.dock_type = Some(self.dock_type());
        icon.flags |= IconFlags::DOCKED;
        self.kind.rebind(icon);
    }

    fn unbind(icon: &mut Icon) {
        icon.set_pos(GridPos::new(-1, -1));
        icon.owner = None;
        icon.dock_type = None;
        icon.omnipresent = false;
        icon.flags.remove(IconFlags::DOCKED | IconFlags::ATTRACTED);
    }

    /// Places `icon` at `pos`. Omnipresence is never carried in by a plain
    /// attach; it is granted through the registry afterwards.
    pub fn attach(&mut self, mut icon: Icon, pos: GridPos) -> Result<(), DockError> {
        if self.is_full() {
            return Err(DockError::Full);
        }
        if self.table.index_of(icon.id).is_some() {
            return Err(DockError::invariant(format!("icon {} is already docked here", icon.id)));
        }
        self.check_target(pos, None)?;

        icon.omnipresent = false;
        self.bind(&mut icon, pos);
        let id = icon.id;
        let idx = self.table.insert(icon)?;
        trace!(dock = ?self.id, icon = %id, idx, %pos, "attached");
        Ok(())
    }

    /// Removes an icon and hands it back with its placement reset.
    pub fn detach(&mut self, id: IconId) -> Result<Icon, DockError> {
        let icon = self.table.icon(id).ok_or(DockError::NotDocked(id))?;
        if icon.is_anchor() {
            return Err(DockError::NotApplicable("the anchor cannot leave its dock"));
        }
        // Leave the registry while the icon still names its owner.
        if icon.omnipresent
            && let Some(registry) = &self.registry
        {
            registry.write().remove(id);
        }

        let mut icon = self.table.remove(id)?;
        Self::unbind(&mut icon);
        trace!(dock = ?self.id, icon = %id, "detached");
        Ok(icon)
    }

    /// Moves an icon between two docks. Fails before touching either table if
    /// the destination cannot take it.
    pub fn move_between(
        src: &mut Dock,
        dest: &mut Dock,
        id: IconId,
        pos: GridPos,
    ) -> Result<(), DockError> {
        let icon = src.table.icon(id).ok_or(DockError::NotDocked(id))?;
        match icon.role {
            IconRole::Anchor => {
                return Err(DockError::NotApplicable("the anchor cannot leave its dock"));
            }
            IconRole::DrawerTile(_) => {
                return Err(DockError::NotApplicable("a drawer tile stays in the main dock"));
            }
            IconRole::Launcher => {}
        }

        let keep_omnipresent = icon.omnipresent && dest.kind.is_clip();
        // An omnipresent icon moving between clips already counts against
        // the destination through its reservation.
        let reserved_here = usize::from(keep_omnipresent);
        if dest.effective_count() - reserved_here >= dest.capacity() {
            return Err(DockError::DestinationFull);
        }
        dest.check_target(pos, Some(id))?;

        let mut icon = src.table.remove(id)?;
        let original = icon.clone();
        if icon.omnipresent {
            let registry = src.registry.as_ref().or(dest.registry.as_ref());
            if let Some(registry) = registry {
                let mut registry = registry.write();
                if keep_omnipresent {
                    registry.update(id, dest.id, pos);
                } else {
                    registry.remove(id);
                }
            }
        }
        icon.omnipresent = keep_omnipresent;
        dest.bind(&mut icon, pos);

        if let Err(err) = dest.table.insert(icon) {
            // The checks above make this unreachable; put the icon back.
            let restored = src.table.insert(original);
            return Err(DockError::invariant(format!(
                "move of {id} failed after validation: {err} (restored: {})",
                restored.is_ok()
            )));
        }
        trace!(from = ?src.id, to = ?dest.id, icon = %id, %pos, "moved");
        Ok(())
    }

    /// Repositions icons inside this dock atomically.
    pub(crate) fn relocate(&mut self, moves: &[(IconId, GridPos)]) -> Result<(), DockError> {
        for &(id, pos) in moves {
            self.kind.check_slot(self, pos)?;
            if self.is_reserved(pos, Some(id)) {
                return Err(DockError::occupied(pos));
            }
        }
        self.table.relocate(moves)?;
        if let Some(registry) = &self.registry {
            let mut registry = registry.write();
            for &(id, pos) in moves {
                if self.table.icon(id).is_some_and(|icon| icon.omnipresent) {
                    registry.update(id, self.id, pos);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn icon_mut(&mut self, id: IconId) -> Option<&mut Icon> { self.table.icon_mut(id) }

    /// Checks the table, icon ownership and slot ranges, then whatever the
    /// dock kind adds on top.
    pub fn check_invariants(&self) -> Result<(), DockError> {
        self.table.check()?;
        for (_, icon) in self.table.iter() {
            if icon.owner != Some(self.id) {
                return Err(DockError::invariant(format!(
                    "icon {} in {:?} names another owner",
                    icon.id, self.id
                )));
            }
            if !icon.is_anchor() {
                self.kind.check_slot(self, icon.pos())?;
            }
        }
        self.kind.check_dock(self)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use slotmap::SlotMap;

    use super::*;
    use crate::layout_engine::{ClipSystem, MainDockSystem};
    use crate::model::{OmnipresentEntry, OmnipresentRegistry};

    fn anchor() -> Icon { Icon::bare(IconId::new(0), IconRole::Anchor) }

    fn launcher(id: u64) -> Icon { Icon::launcher(IconId::new(id), format!("app{id}"), None) }

    fn two_clips() -> (Dock, Dock, SharedRegistry) {
        let mut ids: SlotMap<DockId, ()> = SlotMap::with_key();
        let registry = OmnipresentRegistry::shared();
        let a = Dock::new(
            ids.insert(()),
            ClipSystem { workspace: 0 }.into(),
            Point::new(0, 0),
            6,
            anchor(),
            Some(registry.clone()),
        );
        let b = Dock::new(
            ids.insert(()),
            ClipSystem { workspace: 1 }.into(),
            Point::new(0, 0),
            6,
            anchor(),
            Some(registry.clone()),
        );
        (a, b, registry)
    }

    #[test]
    fn attach_and_detach_keep_counts() {
        let mut ids: SlotMap<DockId, ()> = SlotMap::with_key();
        let mut dock =
            Dock::new(ids.insert(()), MainDockSystem.into(), Point::new(0, 0), 3, anchor(), None);

        dock.attach(launcher(1), GridPos::new(0, 1)).expect("attach");
        assert_eq!(dock.occupied_count(), 2);
        assert_eq!(dock.icon(IconId::new(1)).and_then(|i| i.owner), Some(dock.id()));

        assert_eq!(dock.attach(launcher(2), GridPos::new(1, 1)), Err(DockError::OutOfRange {
            x: 1,
            y: 1
        }));
        dock.attach(launcher(2), GridPos::new(0, 2)).expect("attach");
        assert_eq!(dock.attach(launcher(3), GridPos::new(0, -1)), Err(DockError::Full));

        let icon = dock.detach(IconId::new(1)).expect("detach");
        assert_eq!(icon.pos(), GridPos::new(-1, -1));
        assert_eq!(icon.owner, None);
        assert_eq!(dock.occupied_count(), 2);
        assert!(dock.check_invariants().is_ok());
    }

    #[test]
    fn detach_of_omnipresent_icon_releases_the_reservation() {
        let (mut a, b, registry) = two_clips();
        a.attach(launcher(1), GridPos::new(1, 1)).unwrap();
        a.icon_mut(IconId::new(1)).unwrap().omnipresent = true;
        registry
            .write()
            .add(OmnipresentEntry { icon: IconId::new(1), clip: a.id(), pos: GridPos::new(1, 1) })
            .unwrap();
        assert!(b.is_reserved(GridPos::new(1, 1), None));
        assert_eq!(b.effective_count(), 2);

        a.detach(IconId::new(1)).unwrap();
        assert!(registry.read().is_empty());
        assert!(!b.is_reserved(GridPos::new(1, 1), None));
    }

    #[test]
    fn attach_refuses_cells_reserved_by_other_clips() {
        let (mut a, mut b, registry) = two_clips();
        a.attach(launcher(1), GridPos::new(1, 1)).unwrap();
        registry
            .write()
            .add(OmnipresentEntry { icon: IconId::new(1), clip: a.id(), pos: GridPos::new(1, 1) })
            .unwrap();

        assert_eq!(b.attach(launcher(2), GridPos::new(1, 1)), Err(DockError::Occupied {
            x: 1,
            y: 1
        }));
        assert_eq!(b.occupied_count(), 1);
    }

    #[test]
    fn move_between_is_atomic_when_destination_is_full() {
        let mut ids: SlotMap<DockId, ()> = SlotMap::with_key();
        let mut src =
            Dock::new(ids.insert(()), MainDockSystem.into(), Point::new(0, 0), 4, anchor(), None);
        let mut dest =
            Dock::new(ids.insert(()), MainDockSystem.into(), Point::new(0, 0), 2, anchor(), None);
        src.attach(launcher(1), GridPos::new(0, 1)).unwrap();
        dest.attach(launcher(2), GridPos::new(0, 1)).unwrap();

        let err = Dock::move_between(&mut src, &mut dest, IconId::new(1), GridPos::new(0, 2));
        assert_eq!(err, Err(DockError::DestinationFull));
        assert_eq!(src.icon(IconId::new(1)).map(Icon::pos), Some(GridPos::new(0, 1)));
        assert_eq!(dest.occupied_count(), 2);
    }

    #[test]
    fn attracted_mark_is_dropped_outside_clips() {
        let (mut clip, _, _) = two_clips();
        let mut ids: SlotMap<DockId, ()> = SlotMap::with_key();
        ids.insert(());
        ids.insert(());
        let mut main =
            Dock::new(ids.insert(()), MainDockSystem.into(), Point::new(0, 0), 4, anchor(), None);
        let mut icon = launcher(1);
        icon.flags |= IconFlags::ATTRACTED;
        clip.attach(icon, GridPos::new(1, 0)).unwrap();
        assert!(clip.icon(IconId::new(1)).is_some_and(|i| i.flags.contains(IconFlags::ATTRACTED)));

        Dock::move_between(&mut clip, &mut main, IconId::new(1), GridPos::new(0, 1)).unwrap();
        let moved = main.icon(IconId::new(1)).expect("moved");
        assert!(!moved.flags.contains(IconFlags::ATTRACTED));
        assert_eq!(moved.dock_type, Some(DockType::Dock));
    }

    #[test]
    fn omnipresence_follows_moves_between_clips() {
        let (mut a, mut b, registry) = two_clips();
        a.attach(launcher(1), GridPos::new(1, 0)).unwrap();
        a.icon_mut(IconId::new(1)).unwrap().omnipresent = true;
        registry
            .write()
            .add(OmnipresentEntry { icon: IconId::new(1), clip: a.id(), pos: GridPos::new(1, 0) })
            .unwrap();

        Dock::move_between(&mut a, &mut b, IconId::new(1), GridPos::new(1, 0)).expect("move");
        assert!(b.icon(IconId::new(1)).is_some_and(|icon| icon.omnipresent));
        assert_eq!(registry.read().get(IconId::new(1)).map(|e| e.clip), Some(b.id()));
        assert!(a.is_reserved(GridPos::new(1, 0), None));
    }
}
