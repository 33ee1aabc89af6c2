use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Field value equals one of the values in the filter's array.
    In,
    /// Field value equals none of the values in the filter's array.
    NotIn,
    /// Field is an array containing the filter value.
    ArrayContains,
    /// Field is an array containing at least one of the filter's values.
    ArrayContainsAny,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name; nested fields use dotted paths.
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Declarative query constraints forwarded to a document store.
///
/// Constraints are composed with the builder methods and compared by value,
/// so two queries built from the same steps are equal. An empty query
/// selects the whole collection in the store's natural order.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use vellum_core::{Direction, FilterOp, Query};
///
/// let query = Query::new()
///     .filter("status", FilterOp::Eq, json!("Published"))
///     .order_by("startDate", Direction::Desc)
///     .limit(10);
/// assert_eq!(query.filters.len(), 1);
/// assert_eq!(query.limit, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    /// An unconstrained query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Shorthand for an equality filter.
    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value.into())
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if the query carries no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.order_by.is_empty() && self.limit.is_none()
    }
}
