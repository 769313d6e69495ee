//! Cursor over raw per-shard result sets
//!
//! A query fans out to every relevant shard and each shard answers with a
//! `RawResult`. The `ResultSource` stitches those together: rows are grouped
//! by tag-set (series identity) and stepped by time bucket, and the merge
//! evaluator pulls a named partial column's values across all shards at the
//! current position. Shards arrive with rows already sorted by time; no
//! re-sorting happens here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Series identity: its tag-set
pub type GroupKey = BTreeMap<String, String>;

/// One shard's answer to a partial query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResult {
    #[serde(default)]
    pub series: Vec<Series>,
}

/// One series within a shard's result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub tags: GroupKey,
    pub columns: Vec<String>,
    /// One row per time bucket, in bucket order
    pub values: Vec<Vec<Value>>,
}

impl Series {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Cursor-based view over all shards' results for one query
///
/// The cursor is owned by a single query's merge pass; `step`/`reset` are
/// the only mutable state shared between field evaluations.
pub struct ResultSource {
    /// Per group: the series each shard reported for it, groups in tag order
    groups: Vec<(GroupKey, Vec<Series>)>,
    group_idx: usize,
    step: usize,
}

impl ResultSource {
    pub fn new(results: Vec<RawResult>) -> Self {
        let mut by_group: BTreeMap<GroupKey, Vec<Series>> = BTreeMap::new();
        for result in results {
            for series in result.series {
                by_group.entry(series.tags.clone()).or_default().push(series);
            }
        }
        Self {
            groups: by_group.into_iter().collect(),
            group_idx: 0,
            step: 0,
        }
    }

    fn current_series(&self) -> &[Series] {
        self.groups
            .get(self.group_idx)
            .map(|(_, series)| series.as_slice())
            .unwrap_or(&[])
    }

    /// Values of `column` across all shards at the current group and step.
    /// A shard without data for this position contributes nothing. A row
    /// value may be a number or an array of numbers (top-k partials); arrays
    /// are flattened in shard order.
    pub fn next(&self, column: &str) -> Vec<f64> {
        let mut values = Vec::new();
        for series in self.current_series() {
            let Some(idx) = series.column_index(column) else {
                continue;
            };
            let Some(row) = series.values.get(self.step) else {
                continue;
            };
            match row.get(idx) {
                Some(Value::Number(n)) => {
                    if let Some(v) = n.as_f64() {
                        values.push(v);
                    }
                }
                Some(Value::Array(items)) => {
                    values.extend(items.iter().filter_map(Value::as_f64));
                }
                _ => {}
            }
        }
        values
    }

    /// The "time" column value at the current position, from the first shard
    /// that reported one
    pub fn time(&self) -> Option<Value> {
        for series in self.current_series() {
            if let Some(idx) = series.column_index("time") {
                if let Some(v) = series.values.get(self.step).and_then(|row| row.get(idx)) {
                    return Some(v.clone());
                }
            }
        }
        None
    }

    /// Number of time buckets in the current group (the longest shard's row
    /// count; sparse shards simply run out early)
    pub fn steps(&self) -> usize {
        self.current_series()
            .iter()
            .map(|s| s.values.len())
            .max()
            .unwrap_or(0)
    }

    /// Advance to the next time bucket. Stepping past the group's last
    /// bucket is a no-op; the caller's evaluation loop owns termination.
    pub fn step(&mut self) {
        if self.step + 1 < self.steps() {
            self.step += 1;
        }
    }

    /// Rewind to the first bucket of the current group
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Tag-set of the current group, or `None` when exhausted
    pub fn group(&self) -> Option<&GroupKey> {
        self.groups.get(self.group_idx).map(|(tags, _)| tags)
    }

    /// Move to the next group and rewind the step cursor. Returns whether a
    /// group is available.
    pub fn next_group(&mut self) -> bool {
        self.step = 0;
        if self.group_idx < self.groups.len() {
            self.group_idx += 1;
        }
        self.group_idx < self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shard(rows: Vec<Vec<Value>>) -> RawResult {
        RawResult {
            series: vec![Series {
                tags: GroupKey::new(),
                columns: vec!["time".to_string(), "sum_value".to_string()],
                values: rows,
            }],
        }
    }

    fn two_shard_source() -> ResultSource {
        let a = shard(vec![
            vec![json!("1970-01-01T00:00:00Z"), json!(5.0)],
            vec![json!("1970-01-02T00:00:00Z"), json!(8.0)],
        ]);
        let b = shard(vec![
            vec![json!("1970-01-01T00:00:00Z"), json!(3.0)],
            vec![json!("1970-01-02T00:00:00Z"), json!(12.0)],
        ]);
        ResultSource::new(vec![a, b])
    }

    #[test]
    fn test_next_collects_across_shards() {
        let mut source = two_shard_source();
        assert_eq!(source.next("sum_value"), vec![5.0, 3.0]);
        source.step();
        assert_eq!(source.next("sum_value"), vec![8.0, 12.0]);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut source = two_shard_source();
        source.step();
        source.reset();
        assert_eq!(source.next("sum_value"), vec![5.0, 3.0]);
    }

    #[test]
    fn test_step_clamps_at_last_bucket() {
        let mut source = two_shard_source();
        source.step();
        source.step();
        source.step();
        assert_eq!(source.next("sum_value"), vec![8.0, 12.0]);
    }

    #[test]
    fn test_missing_column_contributes_nothing() {
        let source = two_shard_source();
        assert!(source.next("count_value").is_empty());
    }

    #[test]
    fn test_sparse_shard_is_omitted() {
        let a = shard(vec![
            vec![json!("1970-01-01T00:00:00Z"), json!(5.0)],
            vec![json!("1970-01-02T00:00:00Z"), json!(8.0)],
        ]);
        let b = shard(vec![vec![json!("1970-01-01T00:00:00Z"), json!(3.0)]]);
        let mut source = ResultSource::new(vec![a, b]);

        assert_eq!(source.next("sum_value"), vec![5.0, 3.0]);
        source.step();
        assert_eq!(source.next("sum_value"), vec![8.0]);
    }

    #[test]
    fn test_array_values_flatten() {
        let a = RawResult {
            series: vec![Series {
                tags: GroupKey::new(),
                columns: vec!["top_value_2".to_string()],
                values: vec![vec![json!([9.0, 7.0])]],
            }],
        };
        let source = ResultSource::new(vec![a]);
        assert_eq!(source.next("top_value_2"), vec![9.0, 7.0]);
    }

    #[test]
    fn test_groups_iterate_in_tag_order() {
        let mut tags_b = GroupKey::new();
        tags_b.insert("host".to_string(), "b".to_string());
        let mut tags_a = GroupKey::new();
        tags_a.insert("host".to_string(), "a".to_string());

        let result = RawResult {
            series: vec![
                Series {
                    tags: tags_b.clone(),
                    columns: vec!["sum_value".to_string()],
                    values: vec![vec![json!(2.0)]],
                },
                Series {
                    tags: tags_a.clone(),
                    columns: vec!["sum_value".to_string()],
                    values: vec![vec![json!(1.0)]],
                },
            ],
        };
        let mut source = ResultSource::new(vec![result]);

        assert_eq!(source.group(), Some(&tags_a));
        assert_eq!(source.next("sum_value"), vec![1.0]);
        assert!(source.next_group());
        assert_eq!(source.group(), Some(&tags_b));
        assert_eq!(source.next("sum_value"), vec![2.0]);
        assert!(!source.next_group());
        assert_eq!(source.group(), None);
    }

    #[test]
    fn test_empty_results() {
        let mut source = ResultSource::new(vec![]);
        assert_eq!(source.steps(), 0);
        assert!(source.next("anything").is_empty());
        assert!(!source.next_group());
    }
}
