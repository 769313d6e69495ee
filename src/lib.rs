//! # tsgate
//!
//! Coordination and query-merge core for a horizontally-sharded time-series
//! front end. Storage nodes each own a disjoint set of hash-ring tokens; a
//! stateless gateway routes writes to owning nodes and fans reads out, then
//! recombines the per-node partial results into the answer a non-sharded
//! dataset would have produced.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              tsgate gateway              │
//! │  decompose → fan out → merge             │
//! └─────┬──────────────┬──────────────┬──────┘
//!       │              │              │
//! ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//! │  Shard A  │  │  Shard B  │  │  Shard C  │
//! │ tokens 0‥ │  │ tokens n‥ │  │ tokens m‥ │
//! └───────────┘  └───────────┘  └───────────┘
//!        ▲  token assignments & reservations  ▲
//!        └───────────── etcd ─────────────────┘
//! ```
//!
//! Two subsystems carry the weight:
//! - [`cluster`]: durable token → node assignments and TTL-bound migration
//!   reservations, backed by a linearizable coordination store
//! - [`merge`]: decomposes aggregate queries into shard-computable partial
//!   columns and recombines the raw partial results, including means,
//!   top-k merges and derived arithmetic expressions

pub mod cluster;
pub mod common;
pub mod gateway;
pub mod merge;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use gateway::Gateway;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
