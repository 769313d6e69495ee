//! Token coordination
//!
//! The cluster's hash ring is divided into integer tokens. Each token has a
//! durable owner (an assignment) and may carry a short-lived reservation
//! while a node imports that token's data during rebalancing. Both live in
//! the coordination store:
//!
//! - `<namespace>/tokens/<token>`: durable assignment, value = owning node
//! - `<namespace>/reservedTokens/<token>`: reservation, value = reserving
//!   node, expires after [`RESERVATION_TTL`] unless refreshed or released
//!
//! Reservations are an optimistic per-token lease: at most one node holds a
//! token's reservation at a time, and a crashed importer's claim lapses on
//! its own. Losing the race is a normal outcome, not a fault.

use crate::cluster::store::CoordinationStore;
use crate::common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How long a reservation lives without a refresh
pub const RESERVATION_TTL: Duration = Duration::from_secs(60);

/// Durable assignment and lease management for ring tokens
pub struct TokenCoordinator {
    store: Arc<dyn CoordinationStore>,
    namespace: String,
    reservation_ttl: Duration,
}

impl TokenCoordinator {
    pub fn new(store: Arc<dyn CoordinationStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            reservation_ttl: RESERVATION_TTL,
        }
    }

    /// Override the reservation TTL (tests use short leases)
    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    fn assignment_key(&self, token: u64) -> String {
        format!("{}/tokens/{}", self.namespace, token)
    }

    fn assignment_prefix(&self) -> String {
        format!("{}/tokens/", self.namespace)
    }

    fn reservation_key(&self, token: u64) -> String {
        format!("{}/reservedTokens/{}", self.namespace, token)
    }

    /// Durably assign `token` to `node`. Last writer wins; callers must hold
    /// a valid reservation or cluster-level authority before assigning.
    pub async fn assign(&self, token: u64, node: &str) -> Result<()> {
        self.store
            .put(&self.assignment_key(token), node, None)
            .await?;
        tracing::debug!(token, node, "assigned token");
        Ok(())
    }

    /// Snapshot of the full token → node assignment map. An empty or
    /// missing namespace yields an empty map.
    pub async fn get(&self) -> Result<HashMap<u64, String>> {
        let prefix = self.assignment_prefix();
        let entries = self.store.list(&prefix).await?;
        let mut assignments = HashMap::with_capacity(entries.len());
        for (key, node) in entries {
            // Keys that do not end in a token number are ignored
            if let Some(token) = key.rsplit('/').next().and_then(|s| s.parse().ok()) {
                assignments.insert(token, node);
            }
        }
        Ok(assignments)
    }

    /// Try to reserve `token` for `node` for the reservation TTL.
    ///
    /// Returns `Ok(true)` if the reservation was placed or refreshed, and
    /// `Ok(false)` if another node currently holds it. A conditional write
    /// against the value we read closes the window between the read and the
    /// write; losing that race also reports `Ok(false)`.
    pub async fn reserve(&self, token: u64, node: &str) -> Result<bool> {
        let key = self.reservation_key(token);
        let current = self.store.get(&key).await?;
        match current.as_deref() {
            Some(holder) if holder != node => {
                tracing::debug!(token, holder, "token reserved by another node");
                Ok(false)
            }
            holder => {
                let granted = self
                    .store
                    .compare_and_set(&key, holder, node, Some(self.reservation_ttl))
                    .await?;
                if granted {
                    tracing::debug!(token, node, "reserved token");
                }
                Ok(granted)
            }
        }
    }

    /// Drop the reservation for `token`. Releasing an unreserved token is
    /// not an error.
    pub async fn release(&self, token: u64) -> Result<()> {
        self.store.delete(&self.reservation_key(token)).await?;
        tracing::debug!(token, "released token reservation");
        Ok(())
    }
}
