use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Row-level change kinds, named the way realtime clients expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub event: ChangeKind,
    pub record: Value,
    /// Row as it was before an UPDATE or DELETE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_record: Option<Value>,
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: &str, record: &T) -> Self {
        Self {
            table: table.to_string(),
            event: ChangeKind::Insert,
            record: serde_json::to_value(record).unwrap_or(Value::Null),
            old_record: None,
        }
    }

    pub fn update<T: Serialize>(table: &str, old: &T, new: &T) -> Self {
        Self {
            table: table.to_string(),
            event: ChangeKind::Update,
            record: serde_json::to_value(new).unwrap_or(Value::Null),
            old_record: serde_json::to_value(old).ok(),
        }
    }
}

/// In-process fan-out of committed writes.
///
/// Delivery is best effort: a subscriber that falls behind the channel capacity loses
/// events and is told it lagged.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
