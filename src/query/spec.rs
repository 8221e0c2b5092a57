//! Structured listing requests

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ast::SortDirection;

/// Comparison requested for a search predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    Eq,
    /// Case-insensitive prefix match on strings
    Regex,
}

/// One search predicate over an attribute, by attribute name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPredicate {
    pub key: String,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Candidate values, OR-ed together
    pub values: Vec<Value>,
    #[serde(default)]
    pub priority: i32,
}

impl SearchPredicate {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            operator: FilterOperator::Eq,
            values: vec![value.into()],
            priority: 0,
        }
    }

    pub fn regex(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: FilterOperator::Regex,
            values: vec![Value::String(value.into())],
            priority: 0,
        }
    }

    pub fn any_of<I, V>(key: impl Into<String>, operator: FilterOperator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            key: key.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Conjunction of search predicates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateFilter {
    #[serde(default)]
    pub predicates: Vec<SearchPredicate>,
}

impl AggregateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: SearchPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Predicates by descending priority; equal priorities keep input order
    pub fn ordered(&self) -> Vec<&SearchPredicate> {
        let mut ordered: Vec<&SearchPredicate> = self.predicates.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
        ordered
    }
}

/// Restrict equipment to those linked from a related entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedFilters {
    /// Product swidtag
    #[serde(default)]
    pub product: Option<String>,
    /// Application id, via its instances
    #[serde(default)]
    pub application: Option<String>,
    /// Instance id
    #[serde(default)]
    pub instance: Option<String>,
}

impl RelatedFilters {
    pub fn is_empty(&self) -> bool {
        self.product.is_none() && self.application.is_none() && self.instance.is_none()
    }
}

/// A paginated listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub offset: u64,
    pub page_size: u64,
    #[serde(default)]
    pub sort_by: String,
    #[serde(default)]
    pub sort_order: SortDirection,
    #[serde(default)]
    pub filter: AggregateFilter,
    #[serde(default)]
    pub related: RelatedFilters,
}

impl QuerySpec {
    pub fn new(page_size: u64) -> Self {
        Self {
            offset: 0,
            page_size,
            sort_by: String::new(),
            sort_order: SortDirection::Asc,
            filter: AggregateFilter::default(),
            related: RelatedFilters::default(),
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn sorted_by(mut self, sort_by: impl Into<String>, order: SortDirection) -> Self {
        self.sort_by = sort_by.into();
        self.sort_order = order;
        self
    }

    pub fn with_filter(mut self, filter: AggregateFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_product(mut self, swidtag: impl Into<String>) -> Self {
        self.related.product = Some(swidtag.into());
        self
    }

    pub fn with_application(mut self, application_id: impl Into<String>) -> Self {
        self.related.application = Some(application_id.into());
        self
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.related.instance = Some(instance_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_by_descending_priority() {
        let filter = AggregateFilter::new()
            .with(SearchPredicate::eq("a", "1").with_priority(1))
            .with(SearchPredicate::eq("b", "2").with_priority(5))
            .with(SearchPredicate::eq("c", "3").with_priority(1));
        let keys: Vec<&str> = filter.ordered().iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: QuerySpec = serde_json::from_str(r#"{"page_size": 10}"#).unwrap();
        assert_eq!(spec.offset, 0);
        assert_eq!(spec.sort_order, SortDirection::Asc);
        assert!(spec.filter.is_empty());
        assert!(spec.related.is_empty());
    }

    #[test]
    fn test_predicate_deserializes() {
        let p: SearchPredicate =
            serde_json::from_str(r#"{"key": "cores", "operator": "regex", "values": ["8"]}"#).unwrap();
        assert_eq!(p.operator, FilterOperator::Regex);
        assert_eq!(p.priority, 0);
    }
}
