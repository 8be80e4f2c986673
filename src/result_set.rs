//! Aggregated match results for one run.
//!
//! Keyed by stable entry id, one slot per source, in discovery order.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::models::{EntryId, LocalEntry, MatchKind, MatchResult, Source};

/// All verdicts for one vault entry, plus the tag snapshot the reconciler needs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedEntry {
    pub entry_id: EntryId,
    pub title: Option<String>,
    pub tags: Vec<String>, // Snapshot at read time
    pub library: Option<MatchResult>,
    pub wishlist: Option<MatchResult>,
}

impl MatchedEntry {
    fn new(entry: &LocalEntry) -> Self {
        Self {
            entry_id: entry.id.clone(),
            title: entry.title.clone(),
            tags: entry.tags.clone(),
            library: None,
            wishlist: None,
        }
    }

    pub fn get(&self, source: Source) -> Option<&MatchResult> {
        match source {
            Source::Library => self.library.as_ref(),
            Source::Wishlist => self.wishlist.as_ref(),
        }
    }

    fn slot_mut(&mut self, source: Source) -> &mut Option<MatchResult> {
        match source {
            Source::Library => &mut self.library,
            Source::Wishlist => &mut self.wishlist,
        }
    }

    /// Verdicts in source order (library before wishlist).
    pub fn results(&self) -> impl Iterator<Item = &MatchResult> {
        self.library.iter().chain(self.wishlist.iter())
    }
}

/// Deduplicated match results keyed by entry id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<MatchedEntry>,
    index: FxHashMap<EntryId, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verdict. The first verdict for a (entry, source) pair is kept;
    /// later ones for the same pair are ignored. Returns whether it was recorded.
    pub fn insert(&mut self, entry: &LocalEntry, result: MatchResult) -> bool {
        let idx = match self.index.get(&entry.id) {
            Some(&idx) => idx,
            None => {
                self.entries.push(MatchedEntry::new(entry));
                self.index.insert(entry.id.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let slot = self.entries[idx].slot_mut(result.source);
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        true
    }

    pub fn get(&self, id: &EntryId) -> Option<&MatchedEntry> {
        self.index.get(id).map(|&idx| &self.entries[idx])
    }

    /// Matched entries in discovery order.
    pub fn entries(&self) -> &[MatchedEntry] {
        &self.entries
    }

    /// Every verdict in discovery order.
    pub fn results(&self) -> impl Iterator<Item = &MatchResult> {
        self.entries.iter().flat_map(MatchedEntry::results)
    }

    /// Number of distinct vault entries with at least one verdict
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matched in the given source, counted independently of other sources.
    pub fn count_source(&self, source: Source) -> usize {
        self.entries.iter().filter(|e| e.get(source).is_some()).count()
    }

    pub fn count_kind(&self, source: Source, kind: MatchKind) -> usize {
        self.entries
            .iter()
            .filter_map(|e| e.get(source))
            .filter(|r| r.kind == kind)
            .count()
    }
}
