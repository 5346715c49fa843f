//! Institutional memory entities
//!
//! Two namespaced stores: architecture specifications and troubleshooting
//! solutions. Both are slug-addressed and semantically searchable; the
//! embedding vectors are derived storage columns and never leave the store.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum length of a memory item title.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum length of the markdown body (`ai_requirements` / `ai_solutions`).
pub const MAX_BODY_LEN: usize = 10_000;
/// Maximum number of when-to-use / use-case entries.
pub const MAX_USE_CASES: usize = 10;
/// Maximum number of keywords.
pub const MAX_KEYWORDS: usize = 20;
/// Maximum number of child slugs on an architecture item.
pub const MAX_CHILDREN: usize = 50;
/// Maximum number of related slugs / linked epic ids.
pub const MAX_RELATED: usize = 20;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static slug pattern compiles")
});

/// The two memory namespaces.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MemoryNamespace {
    /// Architecture specifications
    Architecture,
    /// Troubleshooting solutions
    Troubleshoot,
}

/// Validate and normalize a memory slug.
///
/// Slugs are `[a-zA-Z0-9_-]+` on input, at most 100 chars, and lower-cased
/// before storage so lookups are case-insensitive.
///
/// # Errors
///
/// Returns a validation error naming the `unique_slug` field on bad input.
pub fn validate_slug(slug: &str) -> Result<String> {
    if slug.is_empty() || slug.len() > 100 || !SLUG_RE.is_match(slug) {
        return Err(Error::validation_field(
            "Slug must contain only alphanumeric characters, hyphens, and underscores",
            "unique_slug",
            Some(serde_json::Value::String(slug.to_owned())),
            Some("^[a-zA-Z0-9_-]{1,100}$".to_owned()),
        ));
    }
    Ok(slug.to_lowercase())
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::validation_field(
            format!("{field} must not exceed {max} entries/characters (got {len})"),
            field,
            None,
            Some(format!("at most {max}")),
        ));
    }
    Ok(())
}

/// One architecture specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureItem {
    /// Canonical identity
    pub id: Uuid,
    /// Unique slug within the architecture namespace
    pub unique_slug: String,
    /// Human-friendly short name
    pub title: String,
    /// Markdown specification body
    pub ai_requirements: String,
    /// Short descriptions of when to apply this architecture
    #[serde(default)]
    pub ai_when_to_use: Vec<String>,
    /// Discovery keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Slugs of child architecture items, in declaration order
    #[serde(default)]
    pub children_slugs: Vec<String>,
    /// Slugs of related architecture items
    #[serde(default)]
    pub related_slugs: Vec<String>,
    /// Epic work item ids referencing this architecture
    #[serde(default)]
    pub linked_epic_ids: Vec<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque caller metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Creation timestamp (UTC)
    pub created_on: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub last_updated_on: DateTime<Utc>,
}

impl ArchitectureItem {
    /// Text contributing to the derived embedding vector.
    #[must_use]
    pub fn embed_text(&self) -> String {
        self.ai_requirements.clone()
    }

    /// Validate field caps and slug format; normalizes the slug in place.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&mut self) -> Result<()> {
        self.unique_slug = validate_slug(&self.unique_slug)?;
        if self.title.trim().is_empty() {
            return Err(Error::validation_field(
                "Title must not be empty",
                "title",
                None,
                Some("non-empty string".to_owned()),
            ));
        }
        check_len("title", self.title.len(), MAX_TITLE_LEN)?;
        check_len("ai_requirements", self.ai_requirements.len(), MAX_BODY_LEN)?;
        check_len("ai_when_to_use", self.ai_when_to_use.len(), MAX_USE_CASES)?;
        check_len("keywords", self.keywords.len(), MAX_KEYWORDS)?;
        check_len("children_slugs", self.children_slugs.len(), MAX_CHILDREN)?;
        check_len("related_slugs", self.related_slugs.len(), MAX_RELATED)?;
        check_len("linked_epic_ids", self.linked_epic_ids.len(), MAX_RELATED)?;
        Ok(())
    }
}

/// One troubleshooting solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroubleshootItem {
    /// Canonical identity
    pub id: Uuid,
    /// Unique slug within the troubleshoot namespace
    pub unique_slug: String,
    /// Human-friendly short name
    pub title: String,
    /// Short problem descriptions this solution applies to
    #[serde(default)]
    pub ai_use_case: Vec<String>,
    /// Markdown solution body
    pub ai_solutions: String,
    /// Discovery keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque caller metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Times this solution has been retrieved in mark-as-used mode
    #[serde(default)]
    pub usage_count: u64,
    /// Times this solution was marked successful
    #[serde(default)]
    pub success_count: u64,
    /// Creation timestamp (UTC)
    pub created_on: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub last_updated_on: DateTime<Utc>,
}

impl TroubleshootItem {
    /// Text contributing to the derived embedding vector: the use cases plus
    /// the solution body.
    #[must_use]
    pub fn embed_text(&self) -> String {
        let mut parts = self.ai_use_case.clone();
        parts.push(self.ai_solutions.clone());
        parts.join(" ")
    }

    /// Fraction of retrievals marked successful, with a floor of one use.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.success_count as f64 / self.usage_count.max(1) as f64
    }

    /// Validate field caps, counters, and slug format; normalizes the slug.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&mut self) -> Result<()> {
        self.unique_slug = validate_slug(&self.unique_slug)?;
        if self.title.trim().is_empty() {
            return Err(Error::validation_field(
                "Title must not be empty",
                "title",
                None,
                Some("non-empty string".to_owned()),
            ));
        }
        check_len("title", self.title.len(), MAX_TITLE_LEN)?;
        check_len("ai_solutions", self.ai_solutions.len(), MAX_BODY_LEN)?;
        check_len("ai_use_case", self.ai_use_case.len(), MAX_USE_CASES)?;
        check_len("keywords", self.keywords.len(), MAX_KEYWORDS)?;
        if self.success_count > self.usage_count {
            return Err(Error::validation_field(
                "success_count cannot exceed usage_count",
                "success_count",
                Some(serde_json::Value::from(self.success_count)),
                Some(format!("<= {}", self.usage_count)),
            ));
        }
        Ok(())
    }
}

/// Condensed architecture item used by token-budgeted retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureItemSummary {
    /// Architecture item slug
    pub slug: String,
    /// Architecture item title
    pub title: String,
    /// When to apply this architecture
    pub when_to_use: Vec<String>,
    /// Condensed key requirements
    pub key_requirements: String,
    /// Number of child items
    pub children_count: usize,
    /// Number of related items
    pub related_count: usize,
}

/// A troubleshooting solution matched to a problem description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroubleshootMatch {
    /// Troubleshoot item slug
    pub slug: String,
    /// Troubleshoot item title
    pub title: String,
    /// Match relevance in [0, 1]
    pub relevance_score: f64,
    /// Use cases that matched the problem
    pub matched_use_cases: Vec<String>,
    /// Preview of the solution body
    pub solution_preview: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(slug: &str) -> ArchitectureItem {
        let now = Utc::now();
        ArchitectureItem {
            id: Uuid::new_v4(),
            unique_slug: slug.to_owned(),
            title: "Event Sourcing".to_owned(),
            ai_requirements: "Use an append-only event log.".to_owned(),
            ai_when_to_use: vec!["audit trails".to_owned()],
            keywords: vec!["events".to_owned()],
            children_slugs: Vec::new(),
            related_slugs: Vec::new(),
            linked_epic_ids: Vec::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
            created_on: now,
            last_updated_on: now,
        }
    }

    #[test]
    fn slugs_are_normalized_to_lowercase() {
        let mut item = arch("Event-Sourcing_V2");
        item.validate().unwrap();
        assert_eq!(item.unique_slug, "event-sourcing_v2");
    }

    #[test]
    fn invalid_slugs_rejected() {
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug("dots.are.bad").is_err());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("ok-slug_1").is_ok());
    }

    #[test]
    fn body_cap_enforced() {
        let mut item = arch("big");
        item.ai_requirements = "x".repeat(MAX_BODY_LEN + 1);
        assert!(item.validate().is_err());
    }

    #[test]
    fn success_rate_floors_at_one_use() {
        let now = Utc::now();
        let mut item = TroubleshootItem {
            id: Uuid::new_v4(),
            unique_slug: "conn-reset".to_owned(),
            title: "Connection resets".to_owned(),
            ai_use_case: vec!["connection reset by peer".to_owned()],
            ai_solutions: "Check keepalive settings.".to_owned(),
            keywords: Vec::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
            usage_count: 0,
            success_count: 0,
            created_on: now,
            last_updated_on: now,
        };
        assert_eq!(item.success_rate(), 0.0);
        item.usage_count = 10;
        item.success_count = 9;
        assert!((item.success_rate() - 0.9).abs() < 1e-9);
        item.success_count = 11;
        assert!(item.validate().is_err());
    }
}
