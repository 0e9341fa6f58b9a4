//! Slot placement engine for a window manager's docks.
//!
//! A main dock, one clip per workspace and any number of drawers hold
//! launcher icons in fixed-capacity slot grids. The [`layout_engine`] decides
//! where icons live; [`actor`] drives the timer-based auto raise/lower and
//! collapse behaviour; [`model`] holds the plain data shared by both.

pub mod actor;
pub mod common;
pub mod layout_engine;
pub mod model;

pub use actor::broadcast::DockNotification;
pub use layout_engine::{DockEngine, DockError, DockId, DragSession, GridPos};
pub use model::persist::SessionState;
pub use model::{Icon, IconId};
