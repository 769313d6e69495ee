//! Cluster coordination
//!
//! Token ownership and migration leases, backed by an external linearizable
//! key/value store:
//! - Durable token → node assignments
//! - Ephemeral, TTL-bound reservations taken while a node imports a token
//! - Key → token partitioning against an assignment snapshot

pub mod partitioner;
pub mod store;
pub mod tokens;

pub use partitioner::Partitioner;
pub use store::{CoordinationStore, EtcdStore, MemoryStore};
pub use tokens::{TokenCoordinator, RESERVATION_TTL};
