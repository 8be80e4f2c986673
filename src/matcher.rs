//! Match aggregation: one vault entry against one reference catalog.
//!
//! Two tiers, in order:
//! 1. Exact: the entry's extracted external id appears in the catalog.
//! 2. Fuzzy: the first catalog entry (in catalog order) whose normalized name
//!    scores above [`MATCH_THRESHOLD`](crate::scoring::MATCH_THRESHOLD) against the entry title.
//!
//! An exact hit short-circuits the fuzzy scan. Entries already carrying the
//! duplicate tag are never evaluated.

use rustc_hash::FxHashMap;

use crate::extract::extract;
use crate::models::{ExternalId, LocalEntry, MatchKind, MatchResult, ReferenceEntry, Source};
use crate::normalize::normalize_name;
use crate::scoring::{is_match, normalized_similarity};

/// Index mapping external id to its first position in the catalog
pub type ExternalIdIndex = FxHashMap<ExternalId, usize>;

// ============================================================================
// Reference Catalog
// ============================================================================

/// Immutable snapshot of one reference catalog with precomputed lookup data.
/// Shared read-only across the parallel match loop.
#[derive(Clone, Debug)]
pub struct ReferenceCatalog {
    source: Source,
    entries: Vec<ReferenceEntry>,
    names_norm: Vec<String>, // Parallel to `entries`
    id_index: ExternalIdIndex,
}

impl ReferenceCatalog {
    pub fn new(source: Source, entries: Vec<ReferenceEntry>) -> Self {
        let names_norm = entries.iter().map(|e| normalize_name(&e.name)).collect();

        let mut id_index = ExternalIdIndex::default();
        for (idx, entry) in entries.iter().enumerate() {
            if !entry.external_id.as_str().is_empty() {
                id_index.entry(entry.external_id.clone()).or_insert(idx);
            }
        }

        Self {
            source,
            entries,
            names_norm,
            id_index,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First catalog entry carrying this external id.
    pub fn find_by_id(&self, id: &ExternalId) -> Option<&ReferenceEntry> {
        self.id_index.get(id).map(|&idx| &self.entries[idx])
    }

    /// First catalog entry, in catalog order, whose name clears the threshold.
    /// First-match-wins, not best-match.
    pub fn first_fuzzy(&self, title_norm: &str) -> Option<(&ReferenceEntry, f64)> {
        if title_norm.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .zip(&self.names_norm)
            .filter(|(_, name_norm)| !name_norm.is_empty())
            .map(|(entry, name_norm)| (entry, normalized_similarity(title_norm, name_norm)))
            .find(|&(_, score)| is_match(score))
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Match one vault entry against one reference catalog.
/// Returns at most one verdict; None when already tagged or nothing matched.
pub fn match_entry(
    entry: &LocalEntry,
    catalog: &ReferenceCatalog,
    duplicate_tag: &str,
) -> Option<MatchResult> {
    if entry.has_tag(duplicate_tag) {
        return None;
    }

    if let Some(id) = extract(entry) {
        if let Some(reference) = catalog.find_by_id(&id) {
            return Some(MatchResult {
                entry_id: entry.id.clone(),
                source: catalog.source(),
                kind: MatchKind::Exact,
                external_id: Some(reference.external_id.clone()),
                score: 1.0,
            });
        }
    }

    let title_norm = normalize_name(entry.title()?);
    let (reference, score) = catalog.first_fuzzy(&title_norm)?;

    Some(MatchResult {
        entry_id: entry.id.clone(),
        source: catalog.source(),
        kind: MatchKind::Fuzzy,
        external_id: Some(reference.external_id.clone()).filter(|id| !id.as_str().is_empty()),
        score,
    })
}
