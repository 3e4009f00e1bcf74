//! Abstract syntax for the subscription filter grammar (spec.md §6).
//!
//! A `Filter` is a semicolon-separated conjunction of `Term`s; there is no
//! OR, no negation, no parenthesized grouping — deliberately flatter than a
//! general query language, since this grammar exists only to gate which
//! change-log entries a subscription receives.

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub operator: Operator,
    pub path: Path,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Cont,
    NCont,
    Eq,
    NEq,
    In,
    NIn,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "cont" => Self::Cont,
            "ncont" => Self::NCont,
            "eq" => Self::Eq,
            "neq" => Self::NEq,
            "in" => Self::In,
            "nin" => Self::NIn,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            _ => return None,
        })
    }
}

/// A `/`-separated path into the projected JSON object. `@key` segments
/// denote a map-key lookup rather than a field name (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Field(String),
    /// `@key`: the unescaped text following `@` is a map key, not a struct
    /// field name.
    Key(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}
