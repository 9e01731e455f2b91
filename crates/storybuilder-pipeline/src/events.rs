//! Batch event system for observability.
//!
//! Emits [`BatchEvent`]s via a [`tokio::sync::broadcast`] channel so observers
//! (the CLI, tests) can follow per-headline progress without parsing logs.

use serde::{Deserialize, Serialize};

/// Events emitted while a batch runs. `index` is 1-based within the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    BatchStarted {
        run_id: String,
        personality: String,
        headline_count: usize,
        dry_run: bool,
    },
    HeadlineSkipped {
        index: usize,
        headline: String,
    },
    HeadlineStarted {
        index: usize,
        total: usize,
        headline: String,
    },
    Analyzed {
        index: usize,
        query_count: usize,
        has_thesis: bool,
    },
    Researched {
        index: usize,
        findings: usize,
    },
    Drafted {
        index: usize,
        title: String,
        content_chars: usize,
    },
    DraftFailed {
        index: usize,
        reason: String,
    },
    ImageAttempted {
        index: usize,
        image_url: Option<String>,
    },
    Previewed {
        index: usize,
        title: String,
    },
    Published {
        index: usize,
        permalink: String,
    },
    PublishFailed {
        index: usize,
        reason: String,
    },
    HistoryUpdated {
        index: usize,
        history_size: usize,
    },
    BatchCompleted {
        run_id: String,
        processed: usize,
        duration_ms: u64,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<BatchEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers. Dropped when nobody listens.
    pub fn emit(&self, event: BatchEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
