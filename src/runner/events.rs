//! Lifecycle events emitted by the runner.
//!
//! Events flow through a bounded channel to whatever renderer the caller
//! wired up. The producer never blocks: if the consumer is terminally slow
//! the overflow is dropped. The channel closes once the runner has emitted
//! `RunnerStopped` and dropped its sink.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// Capacity of the event channel. Ample for normal operation; only a stuck
/// consumer ever fills it.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// The closed set of lifecycle events observable from outside the runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    RunnerStarted {
        board_name: String,
        board_id: String,
        /// Column name → column id, for the four resolved columns.
        columns: HashMap<String, String>,
    },
    Polling,
    NoTasks {
        next_poll_secs: u64,
    },
    CardStarted {
        card_id: String,
        card_name: String,
        branch: String,
    },
    /// Emitted instead of the full lifecycle when `--dry-run` is set.
    CardDryRun {
        card_id: String,
        card_name: String,
    },
    TextOutput {
        text: String,
    },
    ToolStart {
        tool_name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        tool_name: String,
        duration_ms: u64,
        truncated: bool,
    },
    StatsUpdate {
        input_tokens: u64,
        output_tokens: u64,
        /// Zero for per-turn updates; the final session update carries the
        /// total turn count.
        turns: u32,
    },
    ReviewStarted {
        pr_url: String,
    },
    ReviewDone {
        pr_url: String,
        exit_code: i32,
    },
    CardDone {
        card_id: String,
        card_name: String,
        pr_url: String,
        duration_secs: u64,
    },
    CardFailed {
        card_id: String,
        card_name: String,
        err_msg: String,
        duration_secs: u64,
    },
    RunnerError {
        message: String,
    },
    RunnerStopped,
}

/// Cloneable producer half of the event channel.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RunnerEvent>,
}

impl EventSink {
    /// Emit an event without blocking. Overflow and closed-channel sends are
    /// dropped; the runner must never stall on a slow renderer.
    pub fn emit(&self, event: RunnerEvent) {
        let _ = self.tx.try_send(event);
    }
}

/// Create the bounded event channel the runner publishes on.
pub fn channel() -> (EventSink, mpsc::Receiver<RunnerEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = RunnerEvent::CardStarted {
            card_id: "c1".to_string(),
            card_name: "Fix".to_string(),
            branch: "task/c1-fix".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"card_started""#));
    }

    #[tokio::test]
    async fn emit_drops_on_overflow_instead_of_blocking() {
        let (sink, mut rx) = channel();
        for _ in 0..(EVENT_CHANNEL_CAPACITY + 10) {
            sink.emit(RunnerEvent::Polling);
        }
        // The channel holds at most its capacity; the extra sends vanished.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, EVENT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn channel_closes_when_sink_is_dropped() {
        let (sink, mut rx) = channel();
        sink.emit(RunnerEvent::RunnerStopped);
        drop(sink);
        assert_eq!(rx.recv().await, Some(RunnerEvent::RunnerStopped));
        assert_eq!(rx.recv().await, None);
    }
}
