//! Query decomposition
//!
//! Splits each requested output field into (a) partial columns every shard
//! can compute locally and (b) an evaluation tree that recombines those
//! partials into the answer a non-sharded dataset would have produced:
//!
//! - `sum(x)`   → partial `sum_x`;            recombine by summing
//! - `count(x)` → partial `count_x`;          recombine by summing
//! - `mean(x)`  → partials `sum_x`+`count_x`; recombine as Σsum / Σcount
//! - `top(x,k)` → partial `top_x_k`;          merge lists, re-sort, keep k
//! - arithmetic composition recurses and applies the operator elementwise
//! - a bare column passes through as a leaf read
//!
//! Fields decompose independently but share one partial-column set, so a
//! query selecting both `mean(x)` and `sum(x)` requests `sum_x` once.

use crate::common::{Error, Result};
use crate::merge::eval::EvalNode;
use crate::merge::expr::FieldExpr;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shard-side aggregate behind a partial column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialFunc {
    Sum,
    Count,
    Top,
    /// Raw column read, no shard-side aggregation
    Raw,
}

/// One column every shard must be asked to produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialColumn {
    /// Column name in the partial query and in shard results
    pub name: String,
    pub func: PartialFunc,
    /// Source field the aggregate reads
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

/// One output field's recombination plan
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// Display name, derived from the expression text
    pub name: String,
    pub root: EvalNode,
}

/// Result of decomposing a query's field list
#[derive(Debug, Clone)]
pub struct DecomposedQuery {
    /// Deduplicated partial columns, in first-use order
    pub partials: Vec<PartialColumn>,
    pub fields: Vec<FieldPlan>,
}

#[derive(Default)]
struct PartialRegistry {
    columns: Vec<PartialColumn>,
    seen: HashSet<String>,
}

impl PartialRegistry {
    /// Register a partial column, deduplicating by name. Returns the name.
    fn add(&mut self, func: PartialFunc, source: &str, k: Option<usize>) -> String {
        let name = match func {
            PartialFunc::Sum => format!("sum_{}", source),
            PartialFunc::Count => format!("count_{}", source),
            PartialFunc::Top => format!("top_{}_{}", source, k.unwrap_or(1)),
            PartialFunc::Raw => source.to_string(),
        };
        if self.seen.insert(name.clone()) {
            self.columns.push(PartialColumn {
                name: name.clone(),
                func,
                source: source.to_string(),
                k,
            });
        }
        name
    }
}

/// Decompose a query's output fields. Fails fast on the first unsupported
/// expression, before any shard is contacted.
pub fn decompose(fields: &[FieldExpr]) -> Result<DecomposedQuery> {
    let mut registry = PartialRegistry::default();
    let mut plans = Vec::with_capacity(fields.len());
    for field in fields {
        let root = decompose_expr(field, &mut registry)?;
        plans.push(FieldPlan {
            name: field.to_string(),
            root,
        });
    }
    Ok(DecomposedQuery {
        partials: registry.columns,
        fields: plans,
    })
}

fn decompose_expr(expr: &FieldExpr, registry: &mut PartialRegistry) -> Result<EvalNode> {
    match expr {
        FieldExpr::Column { name } => {
            let column = registry.add(PartialFunc::Raw, name, None);
            Ok(EvalNode::Leaf { column })
        }
        FieldExpr::Literal { value } => Ok(EvalNode::Literal { value: *value }),
        FieldExpr::Binary { op, lhs, rhs } => Ok(EvalNode::Binary {
            op: *op,
            lhs: Box::new(decompose_expr(lhs, registry)?),
            rhs: Box::new(decompose_expr(rhs, registry)?),
        }),
        FieldExpr::Call { func, args } => match func.as_str() {
            "sum" => {
                let source = single_column_arg(func, args)?;
                let column = registry.add(PartialFunc::Sum, source, None);
                Ok(sum_of(column))
            }
            "count" => {
                let source = single_column_arg(func, args)?;
                let column = registry.add(PartialFunc::Count, source, None);
                Ok(sum_of(column))
            }
            "mean" => {
                let source = single_column_arg(func, args)?;
                let sum_column = registry.add(PartialFunc::Sum, source, None);
                let count_column = registry.add(PartialFunc::Count, source, None);
                Ok(EvalNode::Mean {
                    sum: Box::new(sum_of(sum_column)),
                    count: Box::new(sum_of(count_column)),
                })
            }
            "top" => {
                let (source, k) = column_and_k(func, args)?;
                let column = registry.add(PartialFunc::Top, source, Some(k));
                Ok(EvalNode::TopK {
                    child: Box::new(EvalNode::Leaf { column }),
                    k,
                })
            }
            other => Err(Error::UnsupportedExpression(format!(
                "unknown aggregate function: {}",
                other
            ))),
        },
    }
}

fn sum_of(column: String) -> EvalNode {
    EvalNode::Sum {
        child: Box::new(EvalNode::Leaf { column }),
    }
}

fn single_column_arg<'a>(func: &str, args: &'a [FieldExpr]) -> Result<&'a str> {
    match args {
        [FieldExpr::Column { name }] => Ok(name),
        _ => Err(Error::UnsupportedExpression(format!(
            "{} takes exactly one column argument",
            func
        ))),
    }
}

fn column_and_k<'a>(func: &str, args: &'a [FieldExpr]) -> Result<(&'a str, usize)> {
    match args {
        [FieldExpr::Column { name }, FieldExpr::Literal { value }]
            if *value >= 1.0 && value.fract() == 0.0 =>
        {
            Ok((name, *value as usize))
        }
        _ => Err(Error::UnsupportedExpression(format!(
            "{} takes a column and a positive integer",
            func
        ))),
    }
}
