use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    #[default]
    Eq,
    Neq,
    Like,
    Nlike,
    In,
    Nin,
    Gt,
    Gteq,
    Lt,
    Lteq,
    Null,
    Notnull,
}

impl ConditionType {
    /// Conditions that compare against no value.
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Null | Self::Notnull)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Neq => write!(f, "<>"),
            Self::Like => write!(f, "ILIKE"),
            Self::Nlike => write!(f, "NOT ILIKE"),
            Self::In => write!(f, "IN"),
            Self::Nin => write!(f, "NOT IN"),
            Self::Gt => write!(f, ">"),
            Self::Gteq => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lteq => write!(f, "<="),
            Self::Null => write!(f, "IS NULL"),
            Self::Notnull => write!(f, "IS NOT NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub condition_type: ConditionType,
}

impl Filter {
    pub fn new(field: impl Into<String>, condition_type: ConditionType, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            condition_type,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionType::Eq, value)
    }

    /// Values for `in`/`nin`: a JSON array, or a comma-separated string.
    pub fn values(&self) -> Vec<Value> {
        match &self.value {
            Value::Array(items) => items.clone(),
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// Filters inside a group are combined with OR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Declarative filter/sort/paginate request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub filter_groups: Vec<FilterGroup>,
    #[serde(default)]
    pub sort_orders: Vec<SortOrder>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub current_page: Option<u64>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter_group(mut self, filters: Vec<Filter>) -> Self {
        self.filter_groups.push(FilterGroup { filters });
        self
    }

    pub fn with_sort_order(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_orders.push(SortOrder::new(field, direction));
        self
    }

    pub fn with_page(mut self, page_size: u64, current_page: u64) -> Self {
        self.page_size = Some(page_size);
        self.current_page = Some(current_page);
        self
    }
}

/// Criteria echoed back with the requested slice and the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults<E> {
    pub search_criteria: SearchCriteria,
    pub items: Vec<E>,
    pub total_count: u64,
}

/// One page of a query: 1-based page number, `size` rows per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: u64,
    pub current: u64,
}

impl Page {
    pub fn new(size: u64, current: u64) -> Self {
        Self {
            size,
            current: current.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.current - 1).saturating_mul(self.size)
    }
}

/// Storage-level query: groups are ANDed, filters inside a group are ORed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub groups: Vec<FilterGroup>,
    pub orders: Vec<SortOrder>,
    pub page: Option<Page>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn criteria_deserialize_with_defaults() {
        let criteria: SearchCriteria = serde_json::from_value(json!({
            "filter_groups": [{ "filters": [{ "field": "title", "value": "%news%", "condition_type": "like" }] }],
            "sort_orders": [{ "field": "created_at", "direction": "desc" }],
            "page_size": 10
        }))
        .unwrap();

        assert_eq!(criteria.filter_groups[0].filters[0].condition_type, ConditionType::Like);
        assert_eq!(criteria.sort_orders[0].direction, SortDirection::Desc);
        assert_eq!(criteria.current_page, None);

        let empty: SearchCriteria = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, SearchCriteria::default());
    }

    #[test]
    fn in_values_accept_lists_and_csv() {
        assert_eq!(Filter::new("post_id", ConditionType::In, json!([1, 2])).values().len(), 2);
        assert_eq!(
            Filter::new("post_id", ConditionType::In, "3, 4,,5").values(),
            vec![json!("3"), json!("4"), json!("5")]
        );
    }

    #[test]
    fn page_zero_is_first_page() {
        let page = Page::new(20, 0);
        assert_eq!(page.current, 1);
        assert_eq!(page.offset(), 0);
        assert_eq!(Page::new(20, 3).offset(), 40);
    }
}
