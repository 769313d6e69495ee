//! Parsed query field representation
//!
//! The query parser is an external collaborator; it hands the gateway one
//! `FieldExpr` per requested output field plus the query's grouping. These
//! types are the wire contract for that hand-off, so they are serde-derived
//! and deliberately dumb: validation happens during decomposition.

use serde::{Deserialize, Serialize};

/// One output field of a SELECT-like query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldExpr {
    /// Bare reference to a source column
    Column { name: String },
    /// Numeric literal
    Literal { value: f64 },
    /// Aggregate function call, e.g. `mean(value)` or `top(value, 3)`
    Call { func: String, args: Vec<FieldExpr> },
    /// Arithmetic composition of two sub-expressions
    Binary {
        op: BinaryOp,
        lhs: Box<FieldExpr>,
        rhs: Box<FieldExpr>,
    },
}

impl FieldExpr {
    pub fn column(name: impl Into<String>) -> Self {
        FieldExpr::Column { name: name.into() }
    }

    pub fn literal(value: f64) -> Self {
        FieldExpr::Literal { value }
    }

    pub fn call(func: impl Into<String>, args: Vec<FieldExpr>) -> Self {
        FieldExpr::Call {
            func: func.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, lhs: FieldExpr, rhs: FieldExpr) -> Self {
        FieldExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl std::fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldExpr::Column { name } => write!(f, "{}", name),
            FieldExpr::Literal { value } => write!(f, "{}", value),
            FieldExpr::Call { func, args } => {
                write!(f, "{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            FieldExpr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
        }
    }
}

/// Arithmetic operators usable in field expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{}", op)
    }
}

/// Abstract shape of one parsed query, as produced by the external parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryShape {
    /// Source measurement
    pub measurement: String,
    /// Requested output fields
    pub fields: Vec<FieldExpr>,
    /// Tags to group by
    #[serde(default)]
    pub group_tags: Vec<String>,
    /// Time-window width in milliseconds, if the query is windowed
    #[serde(default)]
    pub window_ms: Option<u64>,
    /// Raw time-range condition, passed through to the shards
    #[serde(default)]
    pub condition: Option<String>,
}
