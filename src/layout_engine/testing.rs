//! Fixtures shared by the layout engine's unit tests.

use slotmap::SlotMap;

use super::systems::DockKind;
use super::{Dock, DockId, Point, Screen};
use crate::common::config::GridSettings;
use crate::model::{Icon, IconId, IconRole, SharedRegistry};

pub fn settings() -> GridSettings { GridSettings::default() }

pub fn screen() -> Screen { Screen { width: 1280, height: 1024 } }

pub fn launcher(id: u64) -> Icon { Icon::launcher(IconId::new(id), format!("app{id}"), None) }

pub fn dock_ids(n: usize) -> Vec<DockId> {
    let mut ids: SlotMap<DockId, ()> = SlotMap::with_key();
    (0..n).map(|_| ids.insert(())).collect()
}

pub fn dock(
    id: DockId,
    kind: impl Into<DockKind>,
    origin: Point,
    capacity: usize,
    registry: Option<SharedRegistry>,
) -> Dock {
    Dock::new(
        id,
        kind.into(),
        origin,
        capacity,
        Icon::bare(IconId::new(id_seed(id)), IconRole::Anchor),
        registry,
    )
}

fn id_seed(id: DockId) -> u64 {
    use slotmap::Key;
    1_000_000 + (id.data().as_ffi() & 0xffff_ffff)
}
