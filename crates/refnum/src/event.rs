//
// event.rs
//
// Index lifecycle events
//

use serde::Serialize;
use tokio::sync::broadcast;

/// Outcome of the startup import batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitializationStats {
    pub duration_ms: u64,
    pub files: usize,
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// The store changed; carries the revision after the change
    Updated { revision: u64 },
    /// Numbering of one document was recomputed
    PageUpdated { path: String },
    /// The startup batch finished
    Initialized(InitializationStats),
    LocalSettingsUpdated { path: String },
    GlobalSettingsUpdated,
}

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel for [`IndexEvent`]s. Emitting with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IndexEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: IndexEvent) {
        log::trace!("Emitting {:?}", event);
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(IndexEvent::Updated { revision: 1 });
        bus.emit(IndexEvent::GlobalSettingsUpdated);
        assert_eq!(rx.recv().await.unwrap(), IndexEvent::Updated { revision: 1 });
        assert_eq!(rx.recv().await.unwrap(), IndexEvent::GlobalSettingsUpdated);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(IndexEvent::PageUpdated { path: "a.md".into() });
    }
}
