//! Shard fan-out
//!
//! Sends the rewritten partial query to every target node and collects the
//! raw results for merging. A shard that fails to answer contributes no
//! data for its groups; whether that is acceptable is the caller's policy,
//! so it is logged here rather than failing the whole query.

use crate::common::{Error, Result};
use crate::merge::decompose::PartialColumn;
use crate::merge::source::{GroupKey, RawResult};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The rewritten query each shard executes locally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialQuery {
    pub measurement: String,
    /// Partial columns the shard must compute
    pub columns: Vec<PartialColumn>,
    #[serde(default)]
    pub group_tags: Vec<String>,
    #[serde(default)]
    pub window_ms: Option<u64>,
    #[serde(default)]
    pub condition: Option<String>,
}

/// One time-series point on the write path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    #[serde(default)]
    pub tags: GroupKey,
    pub fields: BTreeMap<String, f64>,
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
}

impl Point {
    /// Series key used for partitioning: measurement plus sorted tags
    pub fn series_key(&self) -> String {
        let mut key = self.measurement.clone();
        for (tag, value) in &self.tags {
            key.push(',');
            key.push_str(tag);
            key.push('=');
            key.push_str(value);
        }
        key
    }
}

/// Transport to a storage node
#[async_trait]
pub trait ShardClient: Send + Sync {
    /// Execute a partial query on `node`
    async fn query(&self, node: &str, query: &PartialQuery) -> Result<RawResult>;

    /// Write points to `node`
    async fn write(&self, node: &str, points: &[Point]) -> Result<()>;
}

/// HTTP transport to storage nodes
pub struct HttpShardClient {
    client: reqwest::Client,
}

impl HttpShardClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn url(node: &str, path: &str) -> String {
        if node.starts_with("http://") || node.starts_with("https://") {
            format!("{}/{}", node.trim_end_matches('/'), path)
        } else {
            format!("http://{}/{}", node, path)
        }
    }
}

#[async_trait]
impl ShardClient for HttpShardClient {
    async fn query(&self, node: &str, query: &PartialQuery) -> Result<RawResult> {
        let resp = self
            .client
            .post(Self::url(node, "query/partial"))
            .json(query)
            .send()
            .await
            .map_err(|e| Error::ShardUnreachable {
                node: node.to_string(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(Error::ShardUnreachable {
                node: node.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }
        let result = resp
            .json::<RawResult>()
            .await
            .map_err(|e| Error::MalformedResult(e.to_string()))?;
        Ok(result)
    }

    async fn write(&self, node: &str, points: &[Point]) -> Result<()> {
        let resp = self
            .client
            .post(Self::url(node, "write"))
            .json(points)
            .send()
            .await
            .map_err(|e| Error::ShardUnreachable {
                node: node.to_string(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(Error::ShardUnreachable {
                node: node.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }
        Ok(())
    }
}

/// Fan a partial query out to all target nodes concurrently. Unreachable
/// shards are logged and skipped; their data is simply absent in the merge.
pub async fn fan_out(
    client: &dyn ShardClient,
    nodes: &[String],
    query: &PartialQuery,
) -> Vec<RawResult> {
    let requests = nodes.iter().map(|node| async move {
        match client.query(node, query).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(node = %node, error = %e, "shard did not answer, merging without it");
                None
            }
        }
    });
    join_all(requests).await.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::source::Series;
    use serde_json::json;

    struct FlakyClient;

    #[async_trait]
    impl ShardClient for FlakyClient {
        async fn query(&self, node: &str, _query: &PartialQuery) -> Result<RawResult> {
            if node == "down" {
                return Err(Error::ShardUnreachable {
                    node: node.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(RawResult {
                series: vec![Series {
                    tags: GroupKey::new(),
                    columns: vec!["sum_value".to_string()],
                    values: vec![vec![json!(1.0)]],
                }],
            })
        }

        async fn write(&self, _node: &str, _points: &[Point]) -> Result<()> {
            Ok(())
        }
    }

    fn partial_query() -> PartialQuery {
        PartialQuery {
            measurement: "cpu".to_string(),
            columns: vec![],
            group_tags: vec![],
            window_ms: None,
            condition: None,
        }
    }

    #[tokio::test]
    async fn test_fan_out_skips_unreachable_shards() {
        let nodes = vec!["up-1".to_string(), "down".to_string(), "up-2".to_string()];
        let results = fan_out(&FlakyClient, &nodes, &partial_query()).await;
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_series_key_is_sorted_and_stable() {
        let mut tags = GroupKey::new();
        tags.insert("region".to_string(), "eu".to_string());
        tags.insert("host".to_string(), "a".to_string());
        let point = Point {
            measurement: "cpu".to_string(),
            tags,
            fields: BTreeMap::new(),
            timestamp_ms: None,
        };
        assert_eq!(point.series_key(), "cpu,host=a,region=eu");
    }

    #[test]
    fn test_url_handles_schemes() {
        assert_eq!(
            HttpShardClient::url("node-a:8086", "write"),
            "http://node-a:8086/write"
        );
        assert_eq!(
            HttpShardClient::url("https://node-a:8086/", "write"),
            "https://node-a:8086/write"
        );
    }
}
