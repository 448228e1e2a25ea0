//! Notification sink that records every event it sees.

use std::sync::Mutex;

use serde_json::Value;

use crate::notify::{NotificationSink, Topic};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Topic, Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Topic, Value)> {
        self.events.lock().unwrap().clone()
    }

    /// Payloads emitted on `topic`, in order.
    pub fn on_topic(&self, topic: Topic) -> Vec<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, topic: Topic, payload: &Value) {
        self.events.lock().unwrap().push((topic, payload.clone()));
    }
}
