//! Per-identity request quotas for the gatekeeper.
//!
//! This crate provides:
//! - [`QuotaPolicy`], the static mapping from identity class to requests per window
//! - [`UsageTracker`], the fixed-window admission decision over a usage store
//! - [`InMemoryStorage`], the process-local usage store with stale record eviction
//!
//! Usage is not persisted and not shared between processes.

#![deny(missing_docs)]

mod policy;
mod storage;
mod tracker;

pub use policy::{QuotaPolicy, describe_window};
pub use storage::{InMemoryStorage, UsageRecord, UsageStorage};
pub use tracker::{AdmissionResult, UsageSnapshot, UsageTracker};
