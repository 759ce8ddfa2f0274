use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::{dto::sse::ServerEvent, state::code::GameCode};

/// Per-game broadcast hubs, created on first subscription.
pub struct SseHubs {
    capacity: usize,
    hubs: DashMap<GameCode, Arc<SseHub>>,
}

impl SseHubs {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hubs: DashMap::new(),
        }
    }

    /// Hub for `code`, creating it when missing.
    pub fn hub(&self, code: &GameCode) -> Arc<SseHub> {
        self.hubs
            .entry(code.clone())
            .or_insert_with(|| Arc::new(SseHub::new(self.capacity)))
            .clone()
    }

    /// Hub for `code` only if someone subscribed before.
    pub fn existing(&self, code: &GameCode) -> Option<Arc<SseHub>> {
        self.hubs.get(code).map(|entry| entry.value().clone())
    }

    /// Send `event` to the subscribers of every game.
    pub fn broadcast_all(&self, event: ServerEvent) {
        for hub in self.hubs.iter() {
            hub.value().broadcast(event.clone());
        }
    }

    /// Drop the hub of `code` once nobody listens anymore.
    pub fn prune(&self, code: &GameCode) {
        self.hubs
            .remove_if(code, |_, hub| hub.receiver_count() == 0);
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hubs_are_per_game() {
        let hubs = SseHubs::new(4);
        let a = GameCode::parse("AAAAAA").unwrap();
        let b = GameCode::parse("BBBBBB").unwrap();

        let mut rx_a = hubs.hub(&a).subscribe();
        let mut rx_b = hubs.hub(&b).subscribe();
        hubs.hub(&a).broadcast(ServerEvent::new(Some("ping".into()), "a".into()));

        assert_eq!(rx_a.recv().await.unwrap().data, "a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_all_reaches_every_game() {
        let hubs = SseHubs::new(4);
        let mut rx_a = hubs.hub(&GameCode::parse("AAAAAA").unwrap()).subscribe();
        let mut rx_b = hubs.hub(&GameCode::parse("BBBBBB").unwrap()).subscribe();
        hubs.broadcast_all(ServerEvent::new(Some("system.status".into()), "{}".into()));

        assert_eq!(rx_a.recv().await.unwrap().data, "{}");
        assert_eq!(rx_b.recv().await.unwrap().data, "{}");
    }

    #[test]
    fn prune_keeps_hubs_with_listeners() {
        let hubs = SseHubs::new(4);
        let code = GameCode::parse("ABC123").unwrap();
        let rx = hubs.hub(&code).subscribe();

        hubs.prune(&code);
        assert!(hubs.existing(&code).is_some());

        drop(rx);
        hubs.prune(&code);
        assert!(hubs.existing(&code).is_none());
    }
}
