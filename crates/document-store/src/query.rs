use crate::DocumentEnvelope;

/// Ordering applied to query results, by insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently inserted first.
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
}

/// Equality filter on a dotted body path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub path: String,
    pub value: serde_json::Value,
}

/// Builder for constructing document queries.
///
/// All filters are combined with AND. `limit` and `offset` are ignored when
/// counting matches.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Body fields that must equal the given values.
    pub equals: Vec<FieldFilter>,

    /// Body fields that must be absent or null.
    pub missing: Vec<String>,

    /// Result ordering.
    pub sort: SortOrder,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query matching every document of a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            equals: Vec::new(),
            missing: Vec::new(),
            sort: SortOrder::default(),
            limit: None,
            offset: None,
        }
    }

    /// Requires a body field to equal a value.
    pub fn field_eq(mut self, path: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.equals.push(FieldFilter {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    /// Requires a body field to be absent or null.
    pub fn field_missing(mut self, path: impl Into<String>) -> Self {
        self.missing.push(path.into());
        self
    }

    /// Sets the result ordering.
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Limits the number of documents returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many documents before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the document satisfies every filter of this query.
    pub fn matches(&self, document: &DocumentEnvelope) -> bool {
        if document.collection != self.collection {
            return false;
        }

        let equals = self
            .equals
            .iter()
            .all(|filter| document.field(&filter.path) == Some(&filter.value));

        let missing = self.missing.iter().all(|path| {
            matches!(document.field(path), None | Some(serde_json::Value::Null))
        });

        equals && missing
    }

    /// Splits a dotted path into its segments.
    pub(crate) fn path_segments(path: &str) -> Vec<String> {
        path.split('.').map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentId;

    fn order(body: serde_json::Value) -> DocumentEnvelope {
        DocumentEnvelope::new("orders", DocumentId::new(), body)
    }

    #[test]
    fn query_builder_chain() {
        let query = DocumentQuery::new("orders")
            .field_eq("status", "ready")
            .field_missing("driver")
            .sort(SortOrder::OldestFirst)
            .limit(20)
            .offset(40);

        assert_eq!(query.collection, "orders");
        assert_eq!(query.equals.len(), 1);
        assert_eq!(query.missing, vec!["driver".to_string()]);
        assert_eq!(query.sort, SortOrder::OldestFirst);
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, Some(40));
    }

    #[test]
    fn matches_equality_and_missing() {
        let query = DocumentQuery::new("orders")
            .field_eq("status", "ready")
            .field_missing("driver");

        assert!(query.matches(&order(serde_json::json!({"status": "ready"}))));
        assert!(query.matches(&order(serde_json::json!({"status": "ready", "driver": null}))));
        assert!(!query.matches(&order(serde_json::json!({"status": "ready", "driver": "d-1"}))));
        assert!(!query.matches(&order(serde_json::json!({"status": "pending"}))));
    }

    #[test]
    fn collection_must_match() {
        let query = DocumentQuery::new("pharmacies");
        assert!(!query.matches(&order(serde_json::json!({}))));
    }

    #[test]
    fn path_segments_split_on_dots() {
        assert_eq!(
            DocumentQuery::path_segments("guestCustomer.email"),
            vec!["guestCustomer".to_string(), "email".to_string()]
        );
    }
}
