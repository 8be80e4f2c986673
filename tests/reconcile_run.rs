use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vault_reconcile::catalog::{CatalogSource, JsonSnapshotCatalog, StaticCatalog};
use vault_reconcile::config::Settings;
use vault_reconcile::events::{CollectingSink, NullSink, RunEvent};
use vault_reconcile::models::{EntryId, ListOptions, LocalEntry, MatchKind, ReferenceEntry, Source};
use vault_reconcile::store::{LocalStore, SqliteVault};
use vault_reconcile::{Error, Reconciler, StoreError};

const HALO_URL: &str = "https://store.steampowered.com/app/900/Halo/";

fn vault_with(entries: &[LocalEntry]) -> Arc<SqliteVault> {
    let vault = SqliteVault::open_in_memory().unwrap();
    for entry in entries {
        vault.insert_entry(entry).unwrap();
    }
    Arc::new(vault)
}

fn reconciler(store: Arc<dyn LocalStore>, catalog: impl CatalogSource + 'static) -> Reconciler {
    Reconciler::new(Settings::default(), store, Arc::new(catalog), Arc::new(NullSink))
}

fn tags_of(store: &dyn LocalStore, id: &str) -> Vec<String> {
    store
        .list_entries(ListOptions::for_reconcile())
        .unwrap()
        .into_iter()
        .find(|e| e.id.as_str() == id)
        .map(|e| e.tags)
        .unwrap_or_default()
}

fn library() -> Vec<ReferenceEntry> {
    vec![
        ReferenceEntry::new("900", "Halo - Combat Evolved"),
        ReferenceEntry::new("620", "Portal 2"),
    ]
}

struct DownCatalog;

impl CatalogSource for DownCatalog {
    fn fetch_owned(&self) -> vault_reconcile::Result<Vec<ReferenceEntry>> {
        Err(Error::fetch(502, "Bad Gateway"))
    }

    fn fetch_wishlist(&self) -> vault_reconcile::Result<Option<Vec<ReferenceEntry>>> {
        Ok(None)
    }
}

/// Vault wrapper that rejects writes for one entry.
struct RejectingStore {
    inner: Arc<SqliteVault>,
    reject: EntryId,
}

impl LocalStore for RejectingStore {
    fn list_entries(&self, options: ListOptions) -> Result<Vec<LocalEntry>, StoreError> {
        self.inner.list_entries(options)
    }

    fn update_tags(&self, id: &EntryId, tags: &[String]) -> Result<(), StoreError> {
        if *id == self.reject {
            return Err(StoreError::Unavailable("entry is locked".to_string()));
        }
        self.inner.update_tags(id, tags)
    }
}

/// Vault whose listing always fails; counts attempted writes.
#[derive(Default)]
struct UnreadableStore {
    writes: AtomicUsize,
}

impl LocalStore for UnreadableStore {
    fn list_entries(&self, _options: ListOptions) -> Result<Vec<LocalEntry>, StoreError> {
        Err(StoreError::Unavailable("vault file is locked".to_string()))
    }

    fn update_tags(&self, _id: &EntryId, _tags: &[String]) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn write_json(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(json.as_bytes()).unwrap();
    path
}

// -------------------------------------------------------------------------
// Matching Scenarios
// -------------------------------------------------------------------------

#[test]
fn test_fuzzy_title_match_is_tagged() {
    let vault = vault_with(&[LocalEntry::new("e1", "Halo: Combat Evolved")]);
    let outcome = reconciler(vault.clone(), StaticCatalog::new(library(), None))
        .run()
        .unwrap();

    let matched = outcome.results.get(&EntryId::from("e1")).unwrap();
    let verdict = matched.get(Source::Library).unwrap();
    assert_eq!(verdict.kind, MatchKind::Fuzzy);
    assert!(verdict.score > 0.9);
    assert_eq!(tags_of(&*vault, "e1"), vec!["duplicate"]);
}

#[test]
fn test_store_reference_wins_over_dissimilar_name() {
    let vault = vault_with(&[LocalEntry::new("e1", "My Favourite Shooter").with_refs(["notes", HALO_URL])]);
    let catalog = StaticCatalog::new(vec![ReferenceEntry::new("900", "Totally Different Name")], None);
    let outcome = reconciler(vault, catalog).run().unwrap();

    let verdict = outcome.results.get(&EntryId::from("e1")).unwrap().get(Source::Library).unwrap();
    assert_eq!(verdict.kind, MatchKind::Exact);
    assert_eq!(verdict.score, 1.0);
    assert_eq!(verdict.external_id.as_ref().unwrap().as_str(), "900");
}

#[test]
fn test_unrelated_title_produces_nothing() {
    let vault = vault_with(&[LocalEntry::new("e1", "Tetris")]);
    let catalog = StaticCatalog::new(vec![ReferenceEntry::new("1", "Chess")], None);
    let outcome = reconciler(vault.clone(), catalog).run().unwrap();

    assert!(outcome.results.is_empty());
    assert!(outcome.writes.is_empty());
    assert_eq!(outcome.report.writes_applied, 0);
    assert!(tags_of(&*vault, "e1").is_empty());
}

// -------------------------------------------------------------------------
// Run Properties
// -------------------------------------------------------------------------

#[test]
fn test_second_run_writes_nothing() {
    let vault = vault_with(&[
        LocalEntry::new("e1", "Portal 2").with_tags(["puzzle"]),
        LocalEntry::new("e2", "Halo: Combat Evolved"),
    ]);
    let reconciler = reconciler(vault.clone(), StaticCatalog::new(library(), None));

    let first = reconciler.run().unwrap();
    assert_eq!(first.report.writes_applied, 2);
    assert_eq!(tags_of(&*vault, "e1"), vec!["puzzle", "duplicate"]);

    let second = reconciler.run().unwrap();
    assert!(second.writes.is_empty());
    assert_eq!(second.report.entries_matched, 0);
    assert_eq!(tags_of(&*vault, "e1"), vec!["puzzle", "duplicate"]);
}

#[test]
fn test_identical_snapshots_give_identical_results() {
    let entries: Vec<LocalEntry> = (0..50)
        .map(|i| LocalEntry::new(format!("e{i}"), if i % 3 == 0 { "Portal 2" } else { "Unknown Game" }))
        .collect();
    let catalog = StaticCatalog::new(library(), None);

    let settings = Settings {
        dry_run: true,
        ..Settings::default()
    };
    let a = Reconciler::new(settings.clone(), vault_with(&entries), Arc::new(catalog.clone()), Arc::new(NullSink))
        .run()
        .unwrap();
    let b = Reconciler::new(settings, vault_with(&entries), Arc::new(catalog), Arc::new(NullSink))
        .run()
        .unwrap();

    assert_eq!(a.results, b.results);
    assert_eq!(a.writes, b.writes);
    assert_eq!(a.results.len(), 17);
}

#[test]
fn test_one_write_for_entry_in_both_sources() {
    let vault = vault_with(&[LocalEntry::new("e1", "Portal 2").with_refs(["https://store.steampowered.com/app/620"])]);
    let catalog = StaticCatalog::new(library(), Some(vec![ReferenceEntry::new("620", "")]));
    let outcome = reconciler(vault.clone(), catalog).run().unwrap();

    assert_eq!(outcome.report.library_duplicates, 1);
    assert_eq!(outcome.report.wishlist_duplicates, 1);
    assert_eq!(outcome.report.entries_matched, 1);
    assert_eq!(outcome.writes.len(), 1);
    assert_eq!(tags_of(&*vault, "e1"), vec!["duplicate"]);
}

#[test]
fn test_sources_are_counted_independently() {
    let vault = vault_with(&[
        LocalEntry::new("e1", "Portal 2"),
        LocalEntry::new("e2", "Celeste"),
        LocalEntry::new("e3", "Tetris"),
    ]);
    let wishlist = vec![ReferenceEntry::new("504230", "Celeste")];
    let outcome = reconciler(vault.clone(), StaticCatalog::new(library(), Some(wishlist)))
        .run()
        .unwrap();

    let report = &outcome.report;
    assert!(report.wishlist_available);
    assert_eq!(report.library_duplicates, 1);
    assert_eq!(report.library_fuzzy, 1);
    assert_eq!(report.wishlist_duplicates, 1);
    assert_eq!(report.entries_matched, 2);
    assert_eq!(report.entries_scanned, 3);

    let e2_writes = outcome
        .writes
        .iter()
        .filter(|w| w.entry_id == EntryId::from("e2"))
        .count();
    assert_eq!(e2_writes, 1);
    assert_eq!(tags_of(&*vault, "e2"), vec!["duplicate"]);
    assert!(tags_of(&*vault, "e3").is_empty());
}

// -------------------------------------------------------------------------
// Failure Handling
// -------------------------------------------------------------------------

#[test]
fn test_fetch_failure_aborts_before_writes() {
    let vault = vault_with(&[LocalEntry::new("e1", "Portal 2")]);
    let sink = Arc::new(CollectingSink::new());
    let reconciler = Reconciler::new(Settings::default(), vault.clone(), Arc::new(DownCatalog), sink.clone());

    let err = reconciler.run().unwrap_err();
    assert!(matches!(err, Error::Fetch { status: 502, .. }));
    assert!(tags_of(&*vault, "e1").is_empty());

    let events = sink.events();
    assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
    assert!(matches!(events.last(), Some(RunEvent::RunFailed { kind, .. }) if kind == "fetch"));
}

#[test]
fn test_vault_read_failure_aborts_before_writes() {
    let store = Arc::new(UnreadableStore::default());
    let sink = Arc::new(CollectingSink::new());
    let reconciler = Reconciler::new(
        Settings::default(),
        store.clone(),
        Arc::new(StaticCatalog::new(library(), Some(Vec::new()))),
        sink.clone(),
    );

    assert!(matches!(reconciler.run(), Err(Error::Store(StoreError::Unavailable(_)))));
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);

    let events = sink.events();
    assert!(!events.iter().any(|e| matches!(e, RunEvent::SnapshotsLoaded { .. })));
    assert!(matches!(events.last(), Some(RunEvent::RunFailed { kind, .. }) if kind == "store"));
}

#[test]
fn test_blank_tag_is_rejected() {
    let vault = vault_with(&[LocalEntry::new("e1", "Portal 2")]);
    let settings = Settings {
        duplicate_tag: "  ".to_string(),
        dry_run: false,
    };
    let reconciler = Reconciler::new(
        settings,
        vault.clone(),
        Arc::new(StaticCatalog::new(library(), None)),
        Arc::new(NullSink),
    );

    assert!(matches!(reconciler.run(), Err(Error::Config(_))));
    assert!(tags_of(&*vault, "e1").is_empty());
}

#[test]
fn test_failed_write_is_reported_per_entry() {
    let inner = vault_with(&[LocalEntry::new("e1", "Portal 2"), LocalEntry::new("e2", "Halo: Combat Evolved")]);
    let store = Arc::new(RejectingStore {
        inner: inner.clone(),
        reject: EntryId::from("e1"),
    });
    let sink = Arc::new(CollectingSink::new());
    let reconciler = Reconciler::new(
        Settings::default(),
        store,
        Arc::new(StaticCatalog::new(library(), None)),
        sink.clone(),
    );

    let outcome = reconciler.run().unwrap();
    assert_eq!(outcome.report.writes_planned, 2);
    assert_eq!(outcome.report.writes_applied, 1);
    assert_eq!(outcome.report.write_failures.len(), 1);
    assert_eq!(outcome.report.write_failures[0].entry_id, EntryId::from("e1"));
    assert!(tags_of(&*inner, "e1").is_empty());
    assert_eq!(tags_of(&*inner, "e2"), vec!["duplicate"]);

    let failed_events = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, RunEvent::WriteFailed { .. }))
        .count();
    assert_eq!(failed_events, 1);
}

#[test]
fn test_dry_run_leaves_vault_untouched() {
    let vault = vault_with(&[LocalEntry::new("e1", "Portal 2")]);
    let settings = Settings {
        dry_run: true,
        ..Settings::default()
    };
    let reconciler = Reconciler::new(
        settings,
        vault.clone(),
        Arc::new(StaticCatalog::new(library(), None)),
        Arc::new(NullSink),
    );

    let outcome = reconciler.run().unwrap();
    assert_eq!(outcome.writes.len(), 1);
    assert_eq!(outcome.report.writes_planned, 1);
    assert_eq!(outcome.report.writes_applied, 0);
    assert!(outcome.report.dry_run);
    assert!(tags_of(&*vault, "e1").is_empty());
}

// -------------------------------------------------------------------------
// Snapshot Files
// -------------------------------------------------------------------------

#[test]
fn test_snapshot_files_drive_a_run_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let owned = write_json(
        dir.path(),
        "owned.json",
        r#"{"response": {"game_count": 1, "games": [{"appid": 620, "name": "Portal 2"}]}}"#,
    );
    let wishlist = dir.path().join("wishlist.json");

    let vault_path = dir.path().join("vault.sqlite3");
    {
        let vault = SqliteVault::open(&vault_path).unwrap();
        vault.insert_entry(&LocalEntry::new("e1", "Portal 2")).unwrap();
    }

    let store: Arc<dyn LocalStore> = Arc::new(SqliteVault::open(&vault_path).unwrap());
    let sink = Arc::new(CollectingSink::new());
    let reconciler = Reconciler::new(
        Settings::default(),
        store,
        Arc::new(JsonSnapshotCatalog::new(owned, Some(wishlist))),
        sink.clone(),
    );

    let outcome = reconciler.run().unwrap();
    assert!(!outcome.report.wishlist_available);
    assert_eq!(outcome.report.writes_applied, 1);

    let reopened = SqliteVault::open(&vault_path).unwrap();
    assert_eq!(tags_of(&reopened, "e1"), vec!["duplicate"]);

    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, RunEvent::SnapshotsLoaded { wishlist: None, library: 1, .. })));
}
