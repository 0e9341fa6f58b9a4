//! Saved-session records.
//!
//! Keys follow the window manager's traditional state file: PascalCase
//! names and positions written as `"x,y"` strings.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use super::{DockType, Icon, IconFlags, IconId, IconRole};
use crate::layout_engine::{DockError, DockId, GridPos, Point, Screen};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IconEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde_as(as = "DisplayFromStr")]
    pub position: GridPos,
    #[serde(default)]
    pub omnipresent: bool,
    pub dock: DockType,
    #[serde(default)]
    pub auto_launch: bool,
    #[serde(default)]
    pub lock: bool,
}

/// One dock's own state plus its launchers. The anchor and drawer tiles are
/// implied by the dock's place in the session and not listed.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockEntry {
    #[serde_as(as = "DisplayFromStr")]
    pub position: Point,
    #[serde(default)]
    pub lowered: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub auto_collapse: bool,
    #[serde(default)]
    pub auto_raise_lower: bool,
    #[serde(default)]
    pub attract_icons: bool,
    #[serde(default)]
    pub on_right_side: bool,
    #[serde(default)]
    pub applications: Vec<IconEntry>,
}

/// A drawer and the main-dock row its tile sits on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DrawerEntry {
    pub row: i32,
    pub dock: DockEntry,
}

/// Everything needed to rebuild an engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionState {
    pub screen: Screen,
    #[serde(default)]
    pub current_workspace: usize,
    pub dock: DockEntry,
    #[serde(default)]
    pub drawers: Vec<DrawerEntry>,
    /// One clip per workspace, in workspace order.
    pub clips: Vec<DockEntry>,
}

/// Something a saved session asked for that the restored engine could not
/// honour as written.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RestoreIssue {
    #[error("drawer on row {row} dropped: {err}")]
    Drawer { row: i32, err: DockError },
    #[error("icon {name:?} at {pos} dropped: {err}")]
    Icon { name: Option<String>, pos: GridPos, err: DockError },
    #[error("icon at {pos} is no longer omnipresent: {err}")]
    Omnipresent { pos: GridPos, err: DockError },
    #[error("drawer {dock:?} had holes and was compacted")]
    DrawerHoles { dock: DockId },
    #[error("drawer {dock:?} could not be compacted: {err}")]
    Compaction { dock: DockId, err: DockError },
    #[error("workspace {0} does not exist")]
    Workspace(usize),
}

/// Saved form of a docked launcher.
pub fn serialize_icon(icon: &Icon) -> Result<IconEntry, DockError> {
    if icon.role != IconRole::Launcher {
        return Err(DockError::NotApplicable("only launchers are saved as icons"));
    }
    let dock = icon.dock_type.ok_or(DockError::NotDocked(icon.id))?;
    Ok(IconEntry {
        name: icon.name.clone(),
        command: icon.command.clone(),
        position: icon.pos(),
        omnipresent: icon.omnipresent,
        dock,
        auto_launch: icon.flags.contains(IconFlags::AUTO_LAUNCH),
        lock: icon.flags.contains(IconFlags::LOCKED),
    })
}

/// Rebuilds an icon from its saved form. The result carries its placement
/// but no owner; attaching it is up to the caller.
pub fn restore_icon(entry: &IconEntry, id: IconId) -> Icon {
    let mut icon = Icon::bare(id, IconRole::Launcher);
    icon.name = entry.name.clone();
    icon.command = entry.command.clone();
    icon.set_pos(entry.position);
    icon.omnipresent = entry.omnipresent;
    icon.dock_type = Some(entry.dock);
    icon.flags.set(IconFlags::AUTO_LAUNCH, entry.auto_launch);
    icon.flags.set(IconFlags::LOCKED, entry.lock);
    icon
}
