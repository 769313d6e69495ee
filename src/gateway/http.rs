//! HTTP surface of the gateway
//!
//! Thin glue over the core: `/query` takes the parser's abstract query
//! shape, decomposes it, fans the partial query out to the shards and
//! returns the merged rows; `/write` routes points to their owning nodes
//! using the token assignment snapshot.

use crate::cluster::{Partitioner, TokenCoordinator};
use crate::common::{retry_with_backoff, timestamp_now_millis, Error, Result};
use crate::gateway::fanout::{fan_out, PartialQuery, Point, ShardClient};
use crate::merge::{decompose, merge_rows, MergedRow, QueryShape, ResultSource};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: Arc<TokenCoordinator>,
    pub partitioner: Partitioner,
    pub shards: Arc<dyn ShardClient>,
}

pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(handle_query))
        .route("/write", post(handle_write))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn error_response(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    (e.to_http_status(), Json(json!({ "error": e.to_string() })))
}

async fn handle_query(
    State(state): State<GatewayState>,
    Json(shape): Json<QueryShape>,
) -> impl IntoResponse {
    match run_query(&state, shape).await {
        Ok(rows) => (StatusCode::OK, Json(json!({ "rows": rows }))),
        Err(e) => error_response(e),
    }
}

async fn run_query(state: &GatewayState, shape: QueryShape) -> Result<Vec<MergedRow>> {
    // Decomposition failures abort before any shard is contacted
    let plan = decompose(&shape.fields)?;

    let assignments = snapshot_assignments(state).await?;
    let mut nodes: Vec<String> = assignments.values().cloned().collect();
    nodes.sort();
    nodes.dedup();
    tracing::debug!(fields = shape.fields.len(), nodes = nodes.len(), "fanning out query");

    let partial = PartialQuery {
        measurement: shape.measurement,
        columns: plan.partials.clone(),
        group_tags: shape.group_tags,
        window_ms: shape.window_ms,
        condition: shape.condition,
    };
    let results = fan_out(state.shards.as_ref(), &nodes, &partial).await;

    let mut source = ResultSource::new(results);
    merge_rows(&plan.fields, &mut source)
}

/// Assignment snapshots retry on a transiently unavailable store; only a
/// persistent outage surfaces to the client.
async fn snapshot_assignments(state: &GatewayState) -> Result<HashMap<u64, String>> {
    let coordinator = &state.coordinator;
    retry_with_backoff(move || coordinator.get(), 3, Duration::from_millis(100)).await
}

async fn handle_write(
    State(state): State<GatewayState>,
    Json(points): Json<Vec<Point>>,
) -> impl IntoResponse {
    match run_write(&state, points).await {
        Ok(written) => (StatusCode::OK, Json(json!({ "written": written }))),
        Err(e) => error_response(e),
    }
}

async fn run_write(state: &GatewayState, points: Vec<Point>) -> Result<usize> {
    let assignments = snapshot_assignments(state).await?;

    // Points without a timestamp are stamped with arrival time
    let now = timestamp_now_millis() as i64;
    let mut by_node: HashMap<String, Vec<Point>> = HashMap::new();
    for mut point in points {
        point.timestamp_ms.get_or_insert(now);
        let key = point.series_key();
        let Some(node) = state.partitioner.node_for_key(&key, &assignments) else {
            return Err(Error::Internal(format!(
                "no node owns token for series {}",
                key
            )));
        };
        by_node.entry(node.to_string()).or_default().push(point);
    }

    let mut written = 0;
    for (node, batch) in by_node {
        state.shards.write(&node, &batch).await?;
        written += batch.len();
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryStore;
    use crate::merge::{FieldExpr, GroupKey, RawResult, Series};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct StaticShards {
        responses: HashMap<String, RawResult>,
        writes: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ShardClient for StaticShards {
        async fn query(&self, node: &str, _query: &PartialQuery) -> Result<RawResult> {
            self.responses
                .get(node)
                .cloned()
                .ok_or_else(|| Error::ShardUnreachable {
                    node: node.to_string(),
                    reason: "no response".to_string(),
                })
        }

        async fn write(&self, node: &str, points: &[Point]) -> Result<()> {
            self.writes
                .lock()
                .unwrap()
                .push((node.to_string(), points.len()));
            Ok(())
        }
    }

    fn sum_shard(values: Vec<f64>) -> RawResult {
        RawResult {
            series: vec![Series {
                tags: GroupKey::new(),
                columns: vec!["sum_value".to_string()],
                values: values.into_iter().map(|v| vec![json!(v)]).collect(),
            }],
        }
    }

    async fn state_with(responses: HashMap<String, RawResult>) -> GatewayState {
        let coordinator = Arc::new(TokenCoordinator::new(
            Arc::new(MemoryStore::new()),
            "test-cluster",
        ));
        GatewayState {
            coordinator,
            partitioner: Partitioner::new(4),
            shards: Arc::new(StaticShards {
                responses,
                writes: Mutex::new(Vec::new()),
            }),
        }
    }

    #[tokio::test]
    async fn test_run_query_merges_across_nodes() {
        let mut responses = HashMap::new();
        responses.insert("node-a".to_string(), sum_shard(vec![5.0]));
        responses.insert("node-b".to_string(), sum_shard(vec![3.0]));
        let state = state_with(responses).await;
        state.coordinator.assign(0, "node-a").await.unwrap();
        state.coordinator.assign(1, "node-b").await.unwrap();

        let shape = QueryShape {
            measurement: "cpu".to_string(),
            fields: vec![FieldExpr::call("sum", vec![FieldExpr::column("value")])],
            group_tags: vec![],
            window_ms: None,
            condition: None,
        };
        let rows = run_query(&state, shape).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![vec![8.0]]);
    }

    #[tokio::test]
    async fn test_run_query_rejects_unknown_function_without_fanout() {
        let state = state_with(HashMap::new()).await;
        let shape = QueryShape {
            measurement: "cpu".to_string(),
            fields: vec![FieldExpr::call("median", vec![FieldExpr::column("value")])],
            group_tags: vec![],
            window_ms: None,
            condition: None,
        };
        assert!(matches!(
            run_query(&state, shape).await,
            Err(Error::UnsupportedExpression(_))
        ));
    }

    #[tokio::test]
    async fn test_run_write_routes_by_token() {
        let state = state_with(HashMap::new()).await;
        // Every token owned by node-a so routing always resolves
        for token in 0..4 {
            state.coordinator.assign(token, "node-a").await.unwrap();
        }

        let point = Point {
            measurement: "cpu".to_string(),
            tags: BTreeMap::new(),
            fields: BTreeMap::from([("value".to_string(), 1.0)]),
            timestamp_ms: Some(0),
        };
        let written = run_write(&state, vec![point]).await.unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_run_write_fails_without_owner() {
        let state = state_with(HashMap::new()).await;
        let point = Point {
            measurement: "cpu".to_string(),
            tags: BTreeMap::new(),
            fields: BTreeMap::from([("value".to_string(), 1.0)]),
            timestamp_ms: None,
        };
        assert!(run_write(&state, vec![point]).await.is_err());
    }
}
