//! Tag reconciler: turn a result set into the minimal batch of tag writes.
//!
//! One write per matched entry, appending the duplicate tag, and only when
//! the entry's snapshot does not already carry it. Writes are independent;
//! a failed write is reported for that entry and never rolls back others.

use rayon::prelude::*;
use serde::Serialize;

use crate::models::{WriteFailure, WriteRequest};
use crate::result_set::ResultSet;
use crate::store::LocalStore;

/// Result of submitting a write batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub applied: usize,
    pub failures: Vec<WriteFailure>,
}

/// Plan one write request per distinct matched entry that still lacks the tag.
pub fn plan_writes(results: &ResultSet, duplicate_tag: &str) -> Vec<WriteRequest> {
    results
        .entries()
        .iter()
        .filter(|matched| !matched.tags.iter().any(|t| t == duplicate_tag))
        .map(|matched| {
            let mut tags = matched.tags.clone();
            tags.push(duplicate_tag.to_string());
            WriteRequest {
                entry_id: matched.entry_id.clone(),
                tags,
            }
        })
        .collect()
}

/// Submit writes concurrently. Failures are collected per entry in request order.
pub fn submit_writes(store: &dyn LocalStore, writes: &[WriteRequest]) -> BatchOutcome {
    let failures: Vec<WriteFailure> = writes
        .par_iter()
        .filter_map(|write| {
            store
                .update_tags(&write.entry_id, &write.tags)
                .err()
                .map(|e| WriteFailure {
                    entry_id: write.entry_id.clone(),
                    message: e.to_string(),
                })
        })
        .collect();

    BatchOutcome {
        applied: writes.len() - failures.len(),
        failures,
    }
}
