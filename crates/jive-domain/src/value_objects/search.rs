//! Search, filter, and pagination value objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A fixed-dimension embedding vector.
///
/// Derived from record text by the embedding provider; owned by the storage
/// engine and never exposed through the tool surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Number of dimensions.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// Euclidean (L2) distance to another vector.
    ///
    /// Mismatched dimensions compare only the shared prefix; the storage
    /// engine guarantees uniform dimensions per table.
    #[must_use]
    pub fn l2_distance(&self, other: &Embedding) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Search mode for content queries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SearchMode {
    /// Embed the query and rank by vector distance
    #[serde(alias = "semantic")]
    #[strum(to_string = "vector", serialize = "semantic")]
    Vector,
    /// Case-insensitive substring match over title/description text
    Keyword,
    /// Weighted union of vector and keyword results
    Hybrid,
}

/// Sort direction for list queries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One filter value: a scalar means equality, a list means any-of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Match any of the listed values
    Many(Vec<serde_json::Value>),
    /// Match this value exactly
    One(serde_json::Value),
}

impl FilterValue {
    /// True when `candidate` satisfies this filter.
    ///
    /// Comparison is string-insensitive for string values so status/type
    /// enums match regardless of representation.
    #[must_use]
    pub fn matches(&self, candidate: &serde_json::Value) -> bool {
        match self {
            Self::One(expected) => value_eq(expected, candidate),
            Self::Many(options) => options.iter().any(|v| value_eq(v, candidate)),
        }
    }
}

fn value_eq(expected: &serde_json::Value, candidate: &serde_json::Value) -> bool {
    match (expected, candidate) {
        (serde_json::Value::String(a), serde_json::Value::String(b)) => a.eq_ignore_ascii_case(b),
        // A scalar filter matches an array field when any element matches
        (_, serde_json::Value::Array(items)) => items.iter().any(|i| value_eq(expected, i)),
        _ => expected == candidate,
    }
}

/// Field → filter map; `BTreeMap` keeps iteration deterministic.
pub type Filters = BTreeMap<String, FilterValue>;

/// A bounded list query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Field filters
    #[serde(default)]
    pub filters: Filters,
    /// Page size (engine default applies when absent)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Page offset
    #[serde(default)]
    pub offset: Option<usize>,
    /// Sort field
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Sort direction
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
}

/// A search request against one table.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query text
    pub query: String,
    /// Search mode
    pub mode: SearchMode,
    /// Field filters applied after scoring
    pub filters: Filters,
    /// Maximum results
    pub limit: usize,
}

impl SearchRequest {
    /// Convenience constructor with empty filters.
    #[must_use]
    pub fn new(query: impl Into<String>, mode: SearchMode, limit: usize) -> Self {
        Self {
            query: query.into(),
            mode,
            filters: Filters::new(),
            limit,
        }
    }
}

/// A record paired with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scored<T> {
    /// The matched record
    pub item: T,
    /// Combined relevance in [0, 1]
    pub score: f64,
    /// Raw vector distance, when vector search participated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl<T> Scored<T> {
    /// Map the inner item, keeping the scores.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Scored<U> {
        Scored {
            item: f(self.item),
            score: self.score,
            distance: self.distance,
        }
    }
}

/// Convert a vector distance to a relevance score in (0, 1].
#[must_use]
pub fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_scalar_and_list() {
        let one = FilterValue::One(serde_json::json!("task"));
        assert!(one.matches(&serde_json::json!("task")));
        assert!(one.matches(&serde_json::json!("TASK")));
        assert!(!one.matches(&serde_json::json!("story")));

        let many = FilterValue::Many(vec![serde_json::json!("epic"), serde_json::json!("task")]);
        assert!(many.matches(&serde_json::json!("task")));
        assert!(!many.matches(&serde_json::json!("feature")));
    }

    #[test]
    fn filter_matches_array_fields() {
        let tag = FilterValue::One(serde_json::json!("backend"));
        assert!(tag.matches(&serde_json::json!(["frontend", "backend"])));
        assert!(!tag.matches(&serde_json::json!(["frontend"])));
    }

    #[test]
    fn semantic_is_an_alias_for_vector() {
        let m: SearchMode = serde_json::from_str("\"semantic\"").unwrap();
        assert_eq!(m, SearchMode::Vector);
    }

    #[test]
    fn l2_distance_basics() {
        let a = Embedding(vec![0.0, 0.0]);
        let b = Embedding(vec![3.0, 4.0]);
        assert!((a.l2_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.l2_distance(&a), 0.0);
    }

    #[test]
    fn distance_score_inversion() {
        assert_eq!(distance_to_score(0.0), 1.0);
        assert!(distance_to_score(1.0) < distance_to_score(0.5));
    }
}
