//! Distributed aggregate merge engine
//!
//! Rebuilds the single correct result of an aggregate query from the raw
//! partial results contributed by each shard:
//! - `decompose` turns parsed output fields into shard-computable partial
//!   columns plus per-field recombination trees
//! - `ResultSource` steps through the shards' raw results by group and
//!   time bucket
//! - `EvalNode::evaluate` / `merge_rows` walk the trees to produce final rows

pub mod decompose;
pub mod eval;
pub mod expr;
pub mod source;

pub use decompose::{decompose, DecomposedQuery, FieldPlan, PartialColumn, PartialFunc};
pub use eval::{merge_rows, EvalNode, MergedRow};
pub use expr::{BinaryOp, FieldExpr, QueryShape};
pub use source::{GroupKey, RawResult, ResultSource, Series};
