use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::actor;
use crate::layout_engine::{DockId, GridPos};
use crate::model::IconId;

/// What the renderer needs to hear about after the engine changed something.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DockNotification {
    /// The icon is (or, while dragging, would be) drawn at `pos` in `dock`.
    IconMoved { dock: DockId, icon: IconId, pos: GridPos },
    IconRemoved { dock: DockId, icon: IconId },
    DockVisibilityChanged { dock: DockId, collapsed: bool, lowered: bool },
}

pub type BroadcastSender = actor::Sender<DockNotification>;
pub type BroadcastReceiver = actor::Receiver<DockNotification>;

/// Optional fan-out to the renderer. Without a subscriber every notification
/// is dropped.
#[derive(Clone, Debug, Default)]
pub struct Broadcast {
    tx: Option<BroadcastSender>,
}

impl Broadcast {
    pub fn subscribe(&mut self) -> BroadcastReceiver {
        let (tx, rx) = actor::channel();
        self.tx = Some(tx);
        rx
    }

    pub fn publish(&self, notification: DockNotification) {
        trace!(?notification, "publish");
        if let Some(tx) = &self.tx {
            tx.send(notification);
        }
    }

    pub fn icon_moved(&self, dock: DockId, icon: IconId, pos: GridPos) {
        self.publish(DockNotification::IconMoved { dock, icon, pos });
    }

    pub fn icon_removed(&self, dock: DockId, icon: IconId) {
        self.publish(DockNotification::IconRemoved { dock, icon });
    }

    pub fn visibility_changed(&self, dock: DockId, collapsed: bool, lowered: bool) {
        self.publish(DockNotification::DockVisibilityChanged { dock, collapsed, lowered });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_engine::testing::dock_ids;

    #[test]
    fn notifications_reach_the_latest_subscriber() {
        let mut broadcast = Broadcast::default();
        let dock = dock_ids(1)[0];
        broadcast.icon_removed(dock, IconId::new(1));

        let mut rx = broadcast.subscribe();
        broadcast.icon_moved(dock, IconId::new(2), GridPos::new(0, 1));
        let (_, event) = rx.try_recv().expect("notification");
        assert_eq!(event, DockNotification::IconMoved {
            dock,
            icon: IconId::new(2),
            pos: GridPos::new(0, 1)
        });
        assert!(rx.try_recv().is_err());
    }
}
