//! Filter expressions built from request parameters
//!
//! A [`FilterExpression`] is the store-agnostic form of the `where` part of a
//! list query: one [`Condition`] per field, AND'ed together, plus an optional
//! group of [`TextMatch`]es that are OR'ed with each other (free-text search).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The comparison operators a client may request
///
/// Only these four are translated. Anything else a client sends inside a
/// bracketed key is discarded by the filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    /// Parse an operator token
    ///
    /// Accepts the bare form (`gte`) and the form already written in the
    /// store's native prefix convention (`$gte`).
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.strip_prefix('$').unwrap_or(token);
        match token {
            "gt" => Some(CmpOp::Gt),
            "gte" => Some(CmpOp::Gte),
            "lt" => Some(CmpOp::Lt),
            "lte" => Some(CmpOp::Lte),
            _ => None,
        }
    }

    /// Bare operator name
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Gt => "gt",
            CmpOp::Gte => "gte",
            CmpOp::Lt => "lt",
            CmpOp::Lte => "lte",
        }
    }

    /// Operator name in the document store's native convention
    pub fn native(&self) -> &'static str {
        match self {
            CmpOp::Gt => "$gt",
            CmpOp::Gte => "$gte",
            CmpOp::Lt => "$lt",
            CmpOp::Lte => "$lte",
        }
    }

    /// Whether an ordering between a document value and the operand satisfies this operator
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Gt => ordering == Greater,
            CmpOp::Gte => ordering != Less,
            CmpOp::Lt => ordering == Less,
            CmpOp::Lte => ordering != Greater,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operand of a range condition
///
/// The operand is kept as the client's string: the store decides how to
/// compare it with the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub op: CmpOp,
    pub value: String,
}

/// Condition on a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// `field == value`
    Equals { value: String },

    /// `field` equals any of the values (repeated query key)
    OneOf { values: Vec<String> },

    /// All comparisons hold (`price[gte]=10&price[lt]=20`)
    Range { comparisons: Vec<Comparison> },
}

/// Case-insensitive literal substring match on one field
///
/// `pattern` is already regex-escaped: it matches the search term literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    pub field: String,
    pub pattern: String,
}

/// Store-agnostic filter of a list query
///
/// Semantics: every entry of `fields` must hold, and when `any_of` is not
/// empty at least one of its matches must hold as well. An empty expression
/// matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpression {
    pub fields: IndexMap<String, Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<TextMatch>,
}

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the expression matches everything
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.any_of.is_empty()
    }

    /// Set the condition for a field (last write wins)
    pub fn insert(&mut self, field: impl Into<String>, condition: Condition) {
        self.fields.insert(field.into(), condition);
    }

    /// Condition currently set for a field
    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.fields.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
