use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::layout_engine::{DockId, GridPos};

/// Stable identity of an icon, allocated by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IconId(u64);

impl IconId {
    pub const fn new(raw: u64) -> Self { Self(raw) }

    pub fn get(self) -> u64 { self.0 }

    pub fn next(self) -> Self { Self(self.0 + 1) }
}

impl fmt::Display for IconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Which flavour of dock an icon lives in.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DockType {
    Dock,
    Clip,
    Drawer,
}

bitflags! {
    /// Lifecycle bits consumed by the launcher and renderer; the placement
    /// engine only carries them around.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct IconFlags: u8 {
        const DOCKED = 1 << 0;
        const RUNNING = 1 << 1;
        const LAUNCHING = 1 << 2;
        /// Captured into a clip automatically rather than dragged there.
        const ATTRACTED = 1 << 3;
        const LOCKED = 1 << 4;
        const AUTO_LAUNCH = 1 << 5;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconRole {
    #[default]
    Launcher,
    /// Slot 0 of a dock: the dock's own tile.
    Anchor,
    /// Tile in the main dock column standing for an attached drawer.
    DrawerTile(DockId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    pub id: IconId,
    /// `instance.class` of the application the icon launches.
    pub name: Option<String>,
    pub command: Option<String>,
    pub grid_x: i32,
    pub grid_y: i32,
    pub owner: Option<DockId>,
    pub dock_type: Option<DockType>,
    pub omnipresent: bool,
    pub flags: IconFlags,
    pub role: IconRole,
}

impl Icon {
    pub fn launcher(id: IconId, name: impl Into<String>, command: Option<String>) -> Self {
        Self {
            name: Some(name.into()),
            command,
            ..Self::bare(id, IconRole::Launcher)
        }
    }

    pub(crate) fn bare(id: IconId, role: IconRole) -> Self {
        Self {
            id,
            name: None,
            command: None,
            grid_x: -1,
            grid_y: -1,
            owner: None,
            dock_type: None,
            omnipresent: false,
            flags: IconFlags::empty(),
            role,
        }
    }

    pub fn pos(&self) -> GridPos { GridPos::new(self.grid_x, self.grid_y) }

    pub(crate) fn set_pos(&mut self, pos: GridPos) {
        self.grid_x = pos.x;
        self.grid_y = pos.y;
    }

    pub fn is_docked(&self) -> bool { self.owner.is_some() }

    pub fn is_running(&self) -> bool { self.flags.contains(IconFlags::RUNNING) }

    pub fn is_anchor(&self) -> bool { self.role == IconRole::Anchor }

    pub fn drawer(&self) -> Option<DockId> {
        match self.role {
            IconRole::DrawerTile(drawer) => Some(drawer),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match (self.role, self.name.as_deref()) {
            (IconRole::Anchor, _) => "anchor".to_string(),
            (IconRole::DrawerTile(_), _) => "drawer".to_string(),
            (IconRole::Launcher, Some(name)) => name.to_string(),
            (IconRole::Launcher, None) => format!("icon {}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn fresh_launcher_is_undocked() {
        let icon = Icon::launcher(IconId::new(3), "xterm.XTerm", Some("xterm".into()));
        assert_eq!(icon.pos(), GridPos::new(-1, -1));
        assert!(!icon.is_docked());
        assert_eq!(icon.label(), "xterm.XTerm");
    }

    #[test]
    fn dock_type_parses_from_snake_case() {
        assert_eq!(DockType::from_str("drawer").ok(), Some(DockType::Drawer));
        assert_eq!(DockType::Clip.to_string(), "clip");
    }
}
