//! Local evaluation of [`Query`] constraints.
//!
//! Semantics follow the hosted document database: a document lacking a
//! filtered or ordered field never matches, and values of different types
//! sort by type rank (null, bool, number, string, array, object).

use std::cmp::Ordering;

use serde_json::Value;

use vellum_core::{Direction, Document, Filter, FilterOp, Query};

/// Apply filters, ordering and limit to `docs`, which must already be in
/// insertion order.
pub(crate) fn apply(query: &Query, docs: Vec<Document>) -> Vec<Document> {
    let mut matched: Vec<Document> = docs
        .into_iter()
        .filter(|doc| query.filters.iter().all(|f| matches(f, doc)))
        .filter(|doc| query.order_by.iter().all(|o| doc.field(&o.field).is_some()))
        .collect();

    if !query.order_by.is_empty() {
        // Stable sort keeps insertion order among equal keys.
        matched.sort_by(|a, b| {
            for key in &query.order_by {
                let (Some(left), Some(right)) = (a.field(&key.field), b.field(&key.field)) else {
                    continue;
                };
                let ord = total_order(left, right);
                let ord = match key.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
}

fn matches(filter: &Filter, doc: &Document) -> bool {
    let Some(actual) = doc.field(&filter.field) else {
        return false;
    };
    let expected = &filter.value;
    match filter.op {
        FilterOp::Eq => values_equal(actual, expected),
        FilterOp::Ne => !values_equal(actual, expected),
        FilterOp::Lt => compare(actual, expected) == Some(Ordering::Less),
        FilterOp::Le => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
        FilterOp::Ge => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOp::In => expected
            .as_array()
            .is_some_and(|options| options.iter().any(|o| values_equal(actual, o))),
        FilterOp::NotIn => expected
            .as_array()
            .is_some_and(|options| !options.iter().any(|o| values_equal(actual, o))),
        FilterOp::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|i| values_equal(i, expected))),
        FilterOp::ArrayContainsAny => match (actual.as_array(), expected.as_array()) {
            (Some(items), Some(options)) => items
                .iter()
                .any(|i| options.iter().any(|o| values_equal(i, o))),
            _ => false,
        },
    }
}

/// Compare two values of the same scalar type. `None` for mismatched or
/// non-scalar types.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare(a, b).map_or_else(|| a == b, |ord| ord == Ordering::Equal)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn total_order(a: &Value, b: &Value) -> Ordering {
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| compare(a, b).unwrap_or(Ordering::Equal))
}
