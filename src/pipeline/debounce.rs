//! Decides when an edit starts the validation pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// Permission to run the pipeline for one text value
#[derive(Debug, Clone)]
pub struct Ticket {
    sequence: u64,
    latest: Arc<AtomicU64>,
    delay: Duration,
}

impl Ticket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether no newer text has been scheduled since this ticket
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.sequence
    }

    /// Wait out the quiet period.
    ///
    /// Returns false when a newer text was scheduled meanwhile; the work for
    /// this ticket should then not start.
    pub async fn settle(&self) -> bool {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.is_current()
    }
}

/// Suppresses pipeline runs for text that was already dispatched and tags
/// each run with a sequence number
#[derive(Debug)]
pub struct DebounceCoordinator {
    last_text: Option<String>,
    latest: Arc<AtomicU64>,
    delay: Duration,
    discard_stale: bool,
}

impl DebounceCoordinator {
    pub fn new(delay: Duration, discard_stale: bool) -> Self {
        Self {
            last_text: None,
            latest: Arc::new(AtomicU64::new(0)),
            delay,
            discard_stale,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.debounce(), config.discard_stale_reports)
    }

    /// Schedule a pipeline run for `text` unless the last run was for the
    /// same text
    pub fn schedule(&mut self, text: &str) -> Option<Ticket> {
        if self.last_text.as_deref() == Some(text) {
            return None;
        }
        self.last_text = Some(text.to_string());

        let sequence = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!("Scheduled pipeline run {}", sequence);

        Some(Ticket {
            sequence,
            latest: Arc::clone(&self.latest),
            delay: self.delay,
        })
    }

    /// Sequence number of the most recent schedule
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Whether a result produced for run `sequence` may be stored.
    ///
    /// Results are accepted last-write-wins unless stale discarding is on.
    pub fn accepts(&self, sequence: u64) -> bool {
        !self.discard_stale || sequence >= self.latest()
    }
}
