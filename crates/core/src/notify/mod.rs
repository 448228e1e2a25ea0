//! Fire-and-forget queue notifications.
//!
//! The queue emits an event on admission, progress and every terminal
//! transition. Sinks must never block the queue or surface errors into it.

use serde_json::Value;
use tracing::debug;

/// Topics the queue publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Queued,
    Started,
    Progress,
    Complete,
    Cancelled,
    Removed,
    Forwarded,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Queued => "queued",
            Topic::Started => "started",
            Topic::Progress => "progress",
            Topic::Complete => "complete",
            Topic::Cancelled => "cancelled",
            Topic::Removed => "removed",
            Topic::Forwarded => "forwarded",
        }
    }
}

/// A notification receiver. Implementations swallow their own failures.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, topic: Topic, payload: &Value);
}

/// Default sink: structured log lines only.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn emit(&self, topic: Topic, payload: &Value) {
        debug!(topic = topic.as_str(), payload = %payload, "Queue event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::Queued.as_str(), "queued");
        assert_eq!(Topic::Forwarded.as_str(), "forwarded");
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        LogSink.emit(Topic::Progress, &json!({"pid": "m0000001", "percent": 42.0}));
    }
}
