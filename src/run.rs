//! Reconciliation run: snapshots → matching → result set → tag writes.
//!
//! A run holds no state across invocations. Any failure while acquiring
//! snapshots aborts the run before a single write is submitted.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::CatalogSource;
use crate::config::Settings;
use crate::error::Result;
use crate::events::{EventSink, RunEvent};
use crate::matcher::{match_entry, ReferenceCatalog};
use crate::models::{ListOptions, LocalEntry, MatchKind, MatchResult, Source, WriteFailure, WriteRequest};
use crate::reconcile::{plan_writes, submit_writes, BatchOutcome};
use crate::result_set::ResultSet;
use crate::store::LocalStore;

// ============================================================================
// Report
// ============================================================================

/// Per-run counters, reported to the caller and rendered by event sinks.
/// Library and wishlist duplicates are counted independently.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub entries_scanned: usize,
    pub wishlist_available: bool,

    pub library_exact: usize,
    pub library_fuzzy: usize,
    pub library_duplicates: usize,

    pub wishlist_exact: usize,
    pub wishlist_fuzzy: usize,
    pub wishlist_duplicates: usize,

    pub entries_matched: usize, // Distinct entries across both sources
    pub writes_planned: usize,
    pub writes_applied: usize,
    pub write_failures: Vec<WriteFailure>,
    pub dry_run: bool,

    pub elapsed_seconds: f64,
}

impl RunReport {
    fn from_results(entries_scanned: usize, wishlist_available: bool, results: &ResultSet) -> Self {
        Self {
            entries_scanned,
            wishlist_available,
            library_exact: results.count_kind(Source::Library, MatchKind::Exact),
            library_fuzzy: results.count_kind(Source::Library, MatchKind::Fuzzy),
            library_duplicates: results.count_source(Source::Library),
            wishlist_exact: results.count_kind(Source::Wishlist, MatchKind::Exact),
            wishlist_fuzzy: results.count_kind(Source::Wishlist, MatchKind::Fuzzy),
            wishlist_duplicates: results.count_source(Source::Wishlist),
            entries_matched: results.len(),
            ..Self::default()
        }
    }

    /// Log report to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[REPORT:{}]\n{}", phase, json);
        }
    }

    /// Write report to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Everything a completed run produced.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub results: ResultSet,
    pub writes: Vec<WriteRequest>,
    pub report: RunReport,
}

// ============================================================================
// Matching
// ============================================================================

/// Match every vault entry against the library and, when present, the wishlist.
///
/// The outer loop runs in parallel over entries; collection preserves snapshot
/// order, so identical inputs always produce identical result sets.
pub fn build_result_set(
    entries: &[LocalEntry],
    library: &ReferenceCatalog,
    wishlist: Option<&ReferenceCatalog>,
    duplicate_tag: &str,
) -> ResultSet {
    let catalogs: Vec<&ReferenceCatalog> = std::iter::once(library).chain(wishlist).collect();

    let verdicts: Vec<Vec<MatchResult>> = entries
        .par_iter()
        .map(|entry| {
            catalogs
                .iter()
                .filter_map(|catalog| match_entry(entry, catalog, duplicate_tag))
                .collect()
        })
        .collect();

    let mut results = ResultSet::new();
    for (entry, found) in entries.iter().zip(verdicts) {
        for result in found {
            results.insert(entry, result);
        }
    }
    results
}

// ============================================================================
// Reconciler
// ============================================================================

struct Snapshots {
    entries: Vec<LocalEntry>,
    library: ReferenceCatalog,
    wishlist: Option<ReferenceCatalog>,
}

/// Runs reconciliation against injected collaborators.
pub struct Reconciler {
    settings: Settings,
    store: Arc<dyn LocalStore>,
    catalog: Arc<dyn CatalogSource>,
    events: Arc<dyn EventSink>,
}

impl Reconciler {
    pub fn new(
        settings: Settings,
        store: Arc<dyn LocalStore>,
        catalog: Arc<dyn CatalogSource>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            settings,
            store,
            catalog,
            events,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute one complete run. Blocking.
    pub fn run(&self) -> Result<RunOutcome> {
        let started = Instant::now();
        self.events.emit(&RunEvent::RunStarted {
            dry_run: self.settings.dry_run,
        });

        match self.execute(started) {
            Ok(outcome) => {
                self.events.emit(&RunEvent::RunFinished {
                    report: outcome.report.clone(),
                });
                Ok(outcome)
            }
            Err(e) => {
                self.events.emit(&RunEvent::RunFailed {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn execute(&self, started: Instant) -> Result<RunOutcome> {
        self.settings.validate()?;
        let tag = self.settings.duplicate_tag.as_str();

        let snapshots = self.load_snapshots()?;
        self.events.emit(&RunEvent::SnapshotsLoaded {
            entries: snapshots.entries.len(),
            library: snapshots.library.len(),
            wishlist: snapshots.wishlist.as_ref().map(ReferenceCatalog::len),
        });

        let results = build_result_set(
            &snapshots.entries,
            &snapshots.library,
            snapshots.wishlist.as_ref(),
            tag,
        );
        for matched in results.entries() {
            for result in matched.results() {
                self.events.emit(&RunEvent::MatchFound {
                    entry_id: result.entry_id.clone(),
                    title: matched.title.clone(),
                    source: result.source,
                    kind: result.kind,
                    external_id: result.external_id.clone(),
                    score: result.score,
                });
            }
        }

        let writes = plan_writes(&results, tag);
        let batch = if self.settings.dry_run {
            BatchOutcome::default()
        } else {
            submit_writes(self.store.as_ref(), &writes)
        };
        for failure in &batch.failures {
            self.events.emit(&RunEvent::WriteFailed {
                entry_id: failure.entry_id.clone(),
                message: failure.message.clone(),
            });
        }

        let mut report = RunReport::from_results(
            snapshots.entries.len(),
            snapshots.wishlist.is_some(),
            &results,
        );
        report.writes_planned = writes.len();
        report.writes_applied = batch.applied;
        report.write_failures = batch.failures;
        report.dry_run = self.settings.dry_run;
        report.elapsed_seconds = started.elapsed().as_secs_f64();

        Ok(RunOutcome {
            results,
            writes,
            report,
        })
    }

    /// Vault listing and catalog fetches are independent and run concurrently.
    fn load_snapshots(&self) -> Result<Snapshots> {
        let (entries, catalogs) = rayon::join(
            || self.store.list_entries(ListOptions::for_reconcile()),
            || self.fetch_catalogs(),
        );
        let (library, wishlist) = catalogs?;
        Ok(Snapshots {
            entries: entries?,
            library,
            wishlist,
        })
    }

    fn fetch_catalogs(&self) -> Result<(ReferenceCatalog, Option<ReferenceCatalog>)> {
        let owned = self.catalog.fetch_owned()?;
        let wishlist = self.catalog.fetch_wishlist()?;
        Ok((
            ReferenceCatalog::new(Source::Library, owned),
            wishlist.map(|w| ReferenceCatalog::new(Source::Wishlist, w)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceEntry;

    const TAG: &str = "duplicate";

    #[test]
    fn test_build_result_set_orders_by_snapshot() {
        let entries = vec![
            LocalEntry::new("e1", "Portal 2"),
            LocalEntry::new("e2", "Tetris"),
            LocalEntry::new("e3", "Halo: Combat Evolved"),
        ];
        let library = ReferenceCatalog::new(
            Source::Library,
            vec![
                ReferenceEntry::new("900", "Halo - Combat Evolved"),
                ReferenceEntry::new("620", "Portal 2"),
            ],
        );

        let results = build_result_set(&entries, &library, None, TAG);
        let ids: Vec<&str> = results.entries().iter().map(|m| m.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }

    #[test]
    fn test_build_result_set_counts_sources_independently() {
        let entries = vec![
            LocalEntry::new("e1", "Portal 2"),
            LocalEntry::new("e2", "Celeste"),
        ];
        let library = ReferenceCatalog::new(Source::Library, vec![ReferenceEntry::new("620", "Portal 2")]);
        let wishlist = ReferenceCatalog::new(
            Source::Wishlist,
            vec![
                ReferenceEntry::new("504230", "Celeste"),
                ReferenceEntry::new("620", "Portal 2"),
            ],
        );

        let results = build_result_set(&entries, &library, Some(&wishlist), TAG);
        assert_eq!(results.len(), 2);
        assert_eq!(results.count_source(Source::Library), 1);
        assert_eq!(results.count_source(Source::Wishlist), 2);
    }

    #[test]
    fn test_report_from_results() {
        let entries = vec![LocalEntry::new("e1", "Portal 2")];
        let library = ReferenceCatalog::new(Source::Library, vec![ReferenceEntry::new("620", "Portal 2")]);
        let results = build_result_set(&entries, &library, None, TAG);

        let report = RunReport::from_results(1, false, &results);
        assert_eq!(report.library_fuzzy, 1);
        assert_eq!(report.library_duplicates, 1);
        assert_eq!(report.wishlist_duplicates, 0);
        assert_eq!(report.entries_matched, 1);
        assert!(!report.wishlist_available);
    }
}
