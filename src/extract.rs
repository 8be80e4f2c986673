//! Identifier extraction from free-form vault metadata.
//!
//! Vault entries carry an ordered list of reference strings (store links,
//! wiki pages, notes). The first one that looks like a catalog item page
//! yields the entry's external identifier.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ExternalId, LocalEntry};

/// Matches a catalog store page: `https://store.steampowered.com/app/<id>[/slug][?query]`.
/// Scheme and `www.` are optional, host is case-insensitive.
pub static ITEM_PAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:https?://)?(?:www\.)?(?i:store\.steampowered\.com)/app/(\d+)(?:[/?#]\S*)?\s*$")
        .unwrap()
});

/// Extract the identifier from a single reference string.
pub fn extract_from_ref(reference: &str) -> Option<ExternalId> {
    ITEM_PAGE_URL
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| ExternalId::new(m.as_str()))
}

/// First identifier found across an ordered sequence of reference strings.
pub fn extract_first<'a, I>(refs: I) -> Option<ExternalId>
where
    I: IntoIterator<Item = &'a str>,
{
    refs.into_iter().find_map(extract_from_ref)
}

/// Extract the external identifier for a vault entry.
pub fn extract(entry: &LocalEntry) -> Option<ExternalId> {
    extract_first(entry.external_refs.iter().map(String::as_str))
}
