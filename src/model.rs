mod icon;
mod icon_table;
pub mod omnipresent;
pub mod persist;

pub use icon::{DockType, Icon, IconFlags, IconId, IconRole};
pub use icon_table::IconTable;
pub use omnipresent::{OmnipresentEntry, OmnipresentRegistry, SharedRegistry};
