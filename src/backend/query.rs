//! Table query primitives
//!
//! Provider-neutral description of a table read: filter predicates,
//! ordering and an inclusive row range (limit/offset).

use serde_json::Value;

/// A table row as returned by the backend
pub type Row = serde_json::Map<String, Value>;

/// Filter predicate applied to a table operation
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// column = value
    Eq(String, Value),
    /// column <> value
    Neq(String, Value),
    /// Case-insensitive SQL pattern match (`%` and `_` wildcards)
    ILike(String, String),
    /// column >= value
    Gte(String, Value),
    /// column <= value
    Lte(String, Value),
    /// column is one of the values
    In(String, Vec<Value>),
    /// Any of the nested predicates holds
    Or(Vec<Filter>),
    /// All of the nested predicates hold
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Neq(column.into(), value.into())
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::ILike(column.into(), pattern.into())
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(column.into(), value.into())
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(column.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A select against a named table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    /// Inclusive row range `(from, to)`
    pub range: Option<(usize, usize)>,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Builder method: order by a column
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Builder method: inclusive row range
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.range = Some((from, to));
        self
    }

    /// Builder method: limit/offset page
    ///
    /// A page reaching past `usize::MAX` is cut short there.
    pub fn page(self, limit: usize, offset: usize) -> Self {
        let to = offset.saturating_add(limit.max(1) - 1);
        self.range(offset, to)
    }
}

/// Escape SQL pattern wildcards in user input so it matches literally
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_to_inclusive_range() {
        let q = TableQuery::new().page(10, 0);
        assert_eq!(q.range, Some((0, 9)));

        let q = TableQuery::new().page(10, 20);
        assert_eq!(q.range, Some((20, 29)));
    }

    #[test]
    fn test_page_at_usize_max_saturates() {
        let q = TableQuery::new().page(10, usize::MAX);
        assert_eq!(q.range, Some((usize::MAX, usize::MAX)));

        let q = TableQuery::new().page(usize::MAX, 1);
        assert_eq!(q.range, Some((1, usize::MAX)));
    }

    #[test]
    fn test_builders() {
        let q = TableQuery::new()
            .filter(Filter::eq("status", "pending"))
            .order("created_at", false);

        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0], Filter::Eq("status".into(), Value::from("pending")));
        assert_eq!(q.order.as_ref().map(|o| o.ascending), Some(false));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("al_ice%"), "al\\_ice\\%");
        assert_eq!(escape_like("bob"), "bob");
    }
}
