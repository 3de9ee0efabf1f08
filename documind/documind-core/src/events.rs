use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    Uploaded { id: Uuid },
    Approved { id: Uuid },
    Rejected { id: Uuid },
    Trashed { id: Uuid },
    Restored { id: Uuid },
    Removed { id: Uuid },
    FolderCreated { id: Uuid },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
