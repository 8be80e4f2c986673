//! Core data models for vault reconciliation.
//!
//! This module contains the entities a run builds from collaborator snapshots,
//! the per-run match verdicts, and the write requests handed back to the vault.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier of a vault entry, as assigned by the local store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of an item in an external catalog.
/// Integer identifiers are kept in their decimal string form so equality is string equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for ExternalId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Catalog payloads carry ids as either JSON strings or JSON integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawExternalId {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawExternalId::deserialize(deserializer)? {
            RawExternalId::Text(s) => ExternalId(s.trim().to_string()),
            RawExternalId::Number(n) => ExternalId(n.to_string()),
        })
    }
}

// ============================================================================
// Vault Models
// ============================================================================

/// Entry from the local vault snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    pub id: EntryId,
    pub title: Option<String>,
    pub tags: Vec<String>,          // Preserved in stored order for write-back
    pub external_refs: Vec<String>, // Ordered; scanned first-to-last for an identifier
}

impl LocalEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: EntryId::new(id),
            title: Some(title.into()),
            tags: Vec::new(),
            external_refs: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_refs = refs.into_iter().map(Into::into).collect();
        self
    }

    /// Display title, or None when missing or blank.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Options recognized by `LocalStore::list_entries`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListOptions {
    pub include_relations: bool, // Load tags and external refs
    pub include_deleted: bool,   // Include soft-deleted entries
}

impl ListOptions {
    /// Relations included, soft-deleted entries excluded.
    pub fn for_reconcile() -> Self {
        Self {
            include_relations: true,
            include_deleted: false,
        }
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

/// Which reference catalog produced a match.
/// The two catalogs never share an identifier space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Library,
    Wishlist,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Library => "library",
            Source::Wishlist => "wishlist",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item from an external catalog snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    #[serde(rename = "id", alias = "appid")]
    pub external_id: ExternalId,
    #[serde(default)]
    pub name: String,
}

impl ReferenceEntry {
    pub fn new(external_id: impl Into<ExternalId>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Match Models
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// External identifier equality
    Exact,
    /// Normalized name similarity above the threshold
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
        }
    }
}

/// Verdict for one vault entry against one reference catalog.
/// Produced and consumed within a single run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub entry_id: EntryId,
    pub source: Source,
    pub kind: MatchKind,
    pub external_id: Option<ExternalId>,
    pub score: f64, // 1.0 for exact matches
}

// ============================================================================
// Write Models
// ============================================================================

/// Replacement tag set for one vault entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteRequest {
    pub entry_id: EntryId,
    pub tags: Vec<String>,
}

/// Per-entry write failure reported by the tag reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub entry_id: EntryId,
    pub message: String,
}
