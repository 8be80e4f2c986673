//! Vault reconciliation library - detects vault entries that already exist in
//! an external owned-items list or wishlist and tags them.

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod reconcile;
pub mod result_set;
pub mod run;
pub mod scheduler;
pub mod scoring;
pub mod store;

pub use error::{Error, Result, StoreError};
pub use run::{Reconciler, RunOutcome, RunReport};
