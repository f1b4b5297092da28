//! Record trait and index query types

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A value stored in the index table for filtering
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

/// Comparison operator for index filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    /// Substring match, strings only
    Contains,
}

impl FilterOp {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
            FilterOp::Contains => "LIKE",
        }
    }
}

/// A single filter on an indexed field
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Shorthand for an equality filter
    pub fn eq(field: impl Into<String>, value: IndexValue) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        }
    }
}

/// Anything that can be persisted in a [`crate::Store`]
pub trait Record: Serialize + DeserializeOwned {
    /// Primary key, unique within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds), used for ordering and expiry
    fn updated_at(&self) -> i64;

    /// Logical collection (table partition) name
    fn collection_name() -> &'static str;

    /// Fields written to the index table
    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}
