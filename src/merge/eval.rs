//! Merge tree evaluation
//!
//! Each output field carries an `EvalNode` tree describing how to rebuild
//! the non-sharded answer from per-shard partial columns. Evaluation reads
//! the `ResultSource` at its current cursor position; the caller drives the
//! group/step iteration and must evaluate all fields at a step before
//! advancing.

use crate::common::{Error, Result};
use crate::merge::decompose::FieldPlan;
use crate::merge::expr::BinaryOp;
use crate::merge::source::{GroupKey, ResultSource};
use serde::Serialize;
use std::cmp::Ordering;

/// One node of a per-field recombination tree
///
/// A closed set: the supported function vocabulary is fixed, and anything
/// outside it is rejected at decomposition time.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalNode {
    /// Read a partial column's values across shards at the cursor
    Leaf { column: String },
    /// Collapse the child's values into their sum
    Sum { child: Box<EvalNode> },
    /// Divide merged sum by merged count; a zero count means no data
    Mean {
        sum: Box<EvalNode>,
        count: Box<EvalNode>,
    },
    /// Merge all shards' top-k lists, re-sort descending, keep k
    TopK { child: Box<EvalNode>, k: usize },
    /// Elementwise arithmetic on two children
    Binary {
        op: BinaryOp,
        lhs: Box<EvalNode>,
        rhs: Box<EvalNode>,
    },
    /// Constant from the query text
    Literal { value: f64 },
}

impl EvalNode {
    /// Merged value(s) for this tree at the source's current group and step.
    ///
    /// Normally one value; a top-k node yields up to k. An empty vector
    /// means no data at this position (sparse group, or zero-count mean).
    pub fn evaluate(&self, source: &ResultSource) -> Result<Vec<f64>> {
        match self {
            EvalNode::Leaf { column } => Ok(source.next(column)),
            EvalNode::Sum { child } => {
                let values = child.evaluate(source)?;
                if values.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![values.iter().sum()])
                }
            }
            EvalNode::Mean { sum, count } => {
                let sums = sum.evaluate(source)?;
                let counts = count.evaluate(source)?;
                match (sums.first(), counts.first()) {
                    (Some(s), Some(c)) if *c != 0.0 => Ok(vec![s / c]),
                    _ => Ok(Vec::new()),
                }
            }
            EvalNode::TopK { child, k } => {
                let mut values = child.evaluate(source)?;
                values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
                values.truncate(*k);
                Ok(values)
            }
            EvalNode::Binary { op, lhs, rhs } => {
                let left = lhs.evaluate(source)?;
                let right = rhs.evaluate(source)?;
                apply_elementwise(*op, left, right)
            }
            EvalNode::Literal { value } => Ok(vec![*value]),
        }
    }
}

/// Elementwise arithmetic with scalar broadcast. No data on either side
/// propagates as no data; anything else requires matching arities.
fn apply_elementwise(op: BinaryOp, left: Vec<f64>, right: Vec<f64>) -> Result<Vec<f64>> {
    if left.is_empty() || right.is_empty() {
        return Ok(Vec::new());
    }
    if left.len() == right.len() {
        return Ok(left
            .iter()
            .zip(right.iter())
            .map(|(a, b)| op.apply(*a, *b))
            .collect());
    }
    if right.len() == 1 {
        let b = right[0];
        return Ok(left.iter().map(|a| op.apply(*a, b)).collect());
    }
    if left.len() == 1 {
        let a = left[0];
        return Ok(right.iter().map(|b| op.apply(a, *b)).collect());
    }
    Err(Error::ArityMismatch {
        left: left.len(),
        right: right.len(),
    })
}

/// One merged output row: a group's values at one time bucket
#[derive(Debug, Clone, Serialize)]
pub struct MergedRow {
    pub tags: GroupKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<serde_json::Value>,
    /// Per output field, in query order; empty means no data at this bucket
    pub values: Vec<Vec<f64>>,
}

/// Drive the full merge: every group, every time bucket, every field.
///
/// A field whose evaluation fails poisons only itself; its slot is reported
/// as no data and the error is logged, per-field independence.
pub fn merge_rows(fields: &[FieldPlan], source: &mut ResultSource) -> Result<Vec<MergedRow>> {
    let mut rows = Vec::new();
    loop {
        let Some(tags) = source.group().cloned() else {
            break;
        };
        let steps = source.steps();
        source.reset();
        for step in 0..steps {
            if step > 0 {
                source.step();
            }
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                match field.root.evaluate(source) {
                    Ok(merged) => values.push(merged),
                    Err(e) => {
                        tracing::warn!(field = %field.name, error = %e, "field evaluation failed");
                        values.push(Vec::new());
                    }
                }
            }
            rows.push(MergedRow {
                tags: tags.clone(),
                time: source.time(),
                values,
            });
        }
        if !source.next_group() {
            break;
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::source::{RawResult, Series};
    use serde_json::json;

    fn leaf(column: &str) -> EvalNode {
        EvalNode::Leaf {
            column: column.to_string(),
        }
    }

    fn source_with(columns: Vec<&str>, shards: Vec<Vec<Vec<serde_json::Value>>>) -> ResultSource {
        let results = shards
            .into_iter()
            .map(|values| RawResult {
                series: vec![Series {
                    tags: GroupKey::new(),
                    columns: columns.iter().map(|c| c.to_string()).collect(),
                    values,
                }],
            })
            .collect();
        ResultSource::new(results)
    }

    #[test]
    fn test_sum_collapses_shards() {
        let source = source_with(
            vec!["sum_value"],
            vec![vec![vec![json!(5.0)]], vec![vec![json!(3.0)]]],
        );
        let node = EvalNode::Sum {
            child: Box::new(leaf("sum_value")),
        };
        assert_eq!(node.evaluate(&source).unwrap(), vec![8.0]);
    }

    #[test]
    fn test_sum_of_nothing_is_no_data() {
        let source = source_with(vec!["sum_value"], vec![]);
        let node = EvalNode::Sum {
            child: Box::new(leaf("sum_value")),
        };
        assert!(node.evaluate(&source).unwrap().is_empty());
    }

    #[test]
    fn test_mean_divides_merged_sums() {
        let source = source_with(
            vec!["sum_value", "count_value"],
            vec![
                vec![vec![json!(5.0), json!(1.0)]],
                vec![vec![json!(3.0), json!(1.0)]],
            ],
        );
        let node = EvalNode::Mean {
            sum: Box::new(EvalNode::Sum {
                child: Box::new(leaf("sum_value")),
            }),
            count: Box::new(EvalNode::Sum {
                child: Box::new(leaf("count_value")),
            }),
        };
        assert_eq!(node.evaluate(&source).unwrap(), vec![4.0]);
    }

    #[test]
    fn test_mean_zero_count_is_no_data() {
        let source = source_with(
            vec!["sum_value", "count_value"],
            vec![vec![vec![json!(5.0), json!(0.0)]]],
        );
        let node = EvalNode::Mean {
            sum: Box::new(EvalNode::Sum {
                child: Box::new(leaf("sum_value")),
            }),
            count: Box::new(EvalNode::Sum {
                child: Box::new(leaf("count_value")),
            }),
        };
        assert!(node.evaluate(&source).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_merges_and_resorts() {
        let source = source_with(
            vec!["top_value_2"],
            vec![
                vec![vec![json!([9.0, 2.0])]],
                vec![vec![json!([7.0, 5.0])]],
            ],
        );
        let node = EvalNode::TopK {
            child: Box::new(leaf("top_value_2")),
            k: 2,
        };
        assert_eq!(node.evaluate(&source).unwrap(), vec![9.0, 7.0]);
    }

    #[test]
    fn test_binary_broadcasts_scalar() {
        let source = source_with(
            vec!["top_value_2"],
            vec![vec![vec![json!([4.0, 2.0])]]],
        );
        let node = EvalNode::Binary {
            op: BinaryOp::Mul,
            lhs: Box::new(EvalNode::TopK {
                child: Box::new(leaf("top_value_2")),
                k: 2,
            }),
            rhs: Box::new(EvalNode::Literal { value: 10.0 }),
        };
        assert_eq!(node.evaluate(&source).unwrap(), vec![40.0, 20.0]);
    }

    #[test]
    fn test_binary_arity_mismatch() {
        assert!(matches!(
            apply_elementwise(BinaryOp::Add, vec![1.0, 2.0], vec![1.0, 2.0, 3.0]),
            Err(Error::ArityMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn test_binary_no_data_propagates() {
        assert!(apply_elementwise(BinaryOp::Add, vec![], vec![1.0])
            .unwrap()
            .is_empty());
    }
}
