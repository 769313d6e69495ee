//! Coordination store abstraction
//!
//! The token coordinator talks to a linearizable key/value store through the
//! `CoordinationStore` trait so any consensus-backed store can sit behind it.
//! `EtcdStore` is the production implementation; `MemoryStore` is an
//! in-process fake with the same conditional-write semantics, used by tests
//! and single-node runs.

use crate::common::Result;
use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, GetOptions, PutOptions, Txn, TxnOp};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Linearizable key/value store interface
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Get the value at `key`, or `None` if it does not exist
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set `key` to `value`, with an optional time-to-live
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all (key, value) pairs under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Conditional write: set `key` to `value` only if its current value
    /// matches `expected` (`None` means the key must be absent). Returns
    /// whether the write was applied.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool>;
}

/// etcd-backed coordination store
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to an etcd cluster
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn lease_for(&self, ttl: Duration) -> Result<i64> {
        let mut client = self.client.clone();
        let lease = client.lease_grant(ttl.as_secs().max(1) as i64, None).await?;
        Ok(lease.id())
    }

    async fn put_options(&self, ttl: Option<Duration>) -> Result<Option<PutOptions>> {
        match ttl {
            Some(ttl) => {
                let lease = self.lease_for(ttl).await?;
                Ok(Some(PutOptions::new().with_lease(lease)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        match resp.kvs().first() {
            Some(kv) => Ok(Some(kv.value_str()?.to_string())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let options = self.put_options(ttl).await?;
        let mut client = self.client.clone();
        client.put(key, value, options).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut client = self.client.clone();
        client.delete(key, None).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut client = self.client.clone();
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;
        let mut entries = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            entries.push((kv.key_str()?.to_string(), kv.value_str()?.to_string()));
        }
        Ok(entries)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let compare = match expected {
            Some(v) => Compare::value(key, CompareOp::Equal, v),
            // create_revision == 0 means the key does not exist
            None => Compare::create_revision(key, CompareOp::Equal, 0),
        };
        let options = self.put_options(ttl).await?;
        let txn = Txn::new()
            .when(vec![compare])
            .and_then(vec![TxnOp::put(key, value, options)]);
        let mut client = self.client.clone();
        let resp = client.txn(txn).await?;
        Ok(resp.succeeded())
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory coordination store with real expiry semantics
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(ttl: Option<Duration>, value: &str) -> MemoryEntry {
        MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if e.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(e) => Ok(Some(e.value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), Self::entry(ttl, value));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.expired())
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let current = match entries.get(key) {
            Some(e) if e.expired() => {
                entries.remove(key);
                None
            }
            Some(e) => Some(e.value.clone()),
            None => None,
        };
        if current.as_deref() != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), Self::entry(ttl, value));
        Ok(true)
    }
}
