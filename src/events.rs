//! Structured run events and the sinks that render them.
//!
//! Matching code never logs. The run emits [`RunEvent`]s to an injected
//! [`EventSink`]; the host decides how they are rendered.

use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::{EntryId, ExternalId, MatchKind, Source};
use crate::run::RunReport;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        dry_run: bool,
    },
    SnapshotsLoaded {
        entries: usize,
        library: usize,
        wishlist: Option<usize>, // None when the wishlist source is unavailable
    },
    MatchFound {
        entry_id: EntryId,
        title: Option<String>,
        source: Source,
        kind: MatchKind,
        external_id: Option<ExternalId>,
        score: f64,
    },
    WriteFailed {
        entry_id: EntryId,
        message: String,
    },
    RunFinished {
        report: RunReport,
    },
    RunFailed {
        kind: String,
        message: String,
    },
}

/// Observability seam for reconciliation runs.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RunEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &RunEvent) {}
}

/// Renders events as `tracing` records with structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted { dry_run } => info!(dry_run, "reconciliation run started"),
            RunEvent::SnapshotsLoaded {
                entries,
                library,
                wishlist,
            } => info!(entries, library, wishlist = ?wishlist, "snapshots loaded"),
            RunEvent::MatchFound {
                entry_id,
                title,
                source,
                kind,
                external_id,
                score,
            } => debug!(
                entry_id = %entry_id,
                title = title.as_deref().unwrap_or(""),
                source = source.as_str(),
                kind = kind.as_str(),
                external_id = external_id.as_ref().map(ExternalId::as_str).unwrap_or(""),
                score,
                "duplicate found"
            ),
            RunEvent::WriteFailed { entry_id, message } => {
                warn!(entry_id = %entry_id, error = %message, "tag write failed")
            }
            RunEvent::RunFinished { report } => info!(
                scanned = report.entries_scanned,
                library_duplicates = report.library_duplicates,
                wishlist_duplicates = report.wishlist_duplicates,
                matched = report.entries_matched,
                writes_planned = report.writes_planned,
                writes_applied = report.writes_applied,
                write_failures = report.write_failures.len(),
                elapsed_seconds = report.elapsed_seconds,
                "reconciliation run finished"
            ),
            RunEvent::RunFailed { kind, message } => {
                error!(kind = %kind, error = %message, "reconciliation run aborted")
            }
        }
    }
}

/// Keeps every event in memory; used by tests and embedders that post-process runs.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
