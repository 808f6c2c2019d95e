use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::web::models::websocket_models::GroupEvent;

/// One broadcast channel per group. Channels are created on first join and
/// dropped once a publish finds nobody listening.
#[derive(Debug)]
pub struct GroupBroadcaster {
    channels: DashMap<i32, broadcast::Sender<GroupEvent>>,
    capacity: usize,
}

impl GroupBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn join(&self, group_id: i32) -> broadcast::Receiver<GroupEvent> {
        self.channels
            .entry(group_id)
            .or_insert_with(|| {
                debug!(group_id, "Opening group channel.");
                broadcast::channel(self.capacity).0
            })
            .subscribe()
    }

    /// Delivers `event` to every receiver on its group's channel and returns
    /// how many there were. Nobody listening is not an error.
    pub fn publish(&self, event: GroupEvent) -> usize {
        let group_id = event.group_id();
        let name = event.name();
        // Clone the sender so no map guard is held across `remove_if`.
        let Some(sender) = self.channels.get(&group_id).map(|s| s.value().clone()) else {
            trace!(group_id, event = name, "No channel for group, event dropped.");
            return 0;
        };

        match sender.send(event) {
            Ok(receivers) => {
                trace!(group_id, event = name, receivers, "Broadcast group event.");
                receivers
            }
            Err(_) => {
                self.channels
                    .remove_if(&group_id, |_, s| s.receiver_count() == 0);
                debug!(group_id, "Closed idle group channel.");
                0
            }
        }
    }

    pub fn receiver_count(&self, group_id: i32) -> usize {
        self.channels
            .get(&group_id)
            .map_or(0, |s| s.receiver_count())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn members_only_see_their_group() {
        let broadcaster = GroupBroadcaster::new(16);
        let mut g5_a = broadcaster.join(5);
        let mut g5_b = broadcaster.join(5);
        let mut g6 = broadcaster.join(6);

        assert_eq!(broadcaster.publish(GroupEvent::ChatCleared { group_id: 5 }), 2);
        assert_eq!(broadcaster.publish(GroupEvent::MessageDeleted { id: 1, group_id: 5 }), 2);

        for rx in [&mut g5_a, &mut g5_b] {
            assert_eq!(rx.recv().await.unwrap(), GroupEvent::ChatCleared { group_id: 5 });
            assert_eq!(rx.recv().await.unwrap(), GroupEvent::MessageDeleted { id: 1, group_id: 5 });
        }
        assert!(matches!(g6.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn late_joiners_miss_earlier_events() {
        let broadcaster = GroupBroadcaster::new(16);
        let _early = broadcaster.join(1);
        broadcaster.publish(GroupEvent::ChatCleared { group_id: 1 });

        let mut late = broadcaster.join(1);
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn idle_channels_are_removed_on_publish() {
        let broadcaster = GroupBroadcaster::new(4);
        let rx = broadcaster.join(3);
        assert_eq!(broadcaster.channel_count(), 1);
        drop(rx);

        assert_eq!(broadcaster.publish(GroupEvent::ChatCleared { group_id: 3 }), 0);
        assert_eq!(broadcaster.channel_count(), 0);
        assert_eq!(broadcaster.publish(GroupEvent::ChatCleared { group_id: 42 }), 0);
    }
}
