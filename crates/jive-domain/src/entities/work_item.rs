//! Work item entity and its enumerations
//!
//! A work item is one node in the Initiative → Epic → Feature → Story → Task
//! hierarchy. Status and progress are dual representations; the conversion
//! table lives here so every layer derives them the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Work item type within the hierarchy
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
pub enum WorkItemType {
    /// Top-level strategic initiative; always a hierarchy root
    Initiative,
    /// Large body of work under an initiative
    Epic,
    /// Deliverable feature under an epic
    Feature,
    /// User story under a feature
    Story,
    /// Smallest unit of work, under a story
    Task,
}

impl WorkItemType {
    /// Parent types a child of this type may attach to.
    ///
    /// Initiatives return an empty slice: they must be roots.
    #[must_use]
    pub fn allowed_parent_types(self) -> &'static [WorkItemType] {
        match self {
            Self::Initiative => &[],
            Self::Epic => &[WorkItemType::Initiative],
            Self::Feature => &[WorkItemType::Epic],
            Self::Story => &[WorkItemType::Feature],
            Self::Task => &[WorkItemType::Story],
        }
    }
}

/// Work item lifecycle status
///
/// `backlog` and `done` are accepted as input aliases and normalize to
/// `not_started` and `completed` on output.
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
pub enum WorkItemStatus {
    /// Not yet begun
    #[serde(alias = "backlog")]
    #[strum(to_string = "not_started", serialize = "backlog")]
    NotStarted,
    /// Actively being worked
    InProgress,
    /// Blocked on a dependency or external condition
    Blocked,
    /// Finished successfully
    #[serde(alias = "done")]
    #[strum(to_string = "completed", serialize = "done")]
    Completed,
    /// Abandoned
    Cancelled,
}

impl WorkItemStatus {
    /// Leaf progress percentage derived from status.
    #[must_use]
    pub fn leaf_progress(self) -> f64 {
        match self {
            Self::Completed => 100.0,
            Self::InProgress => 50.0,
            Self::Blocked => 25.0,
            Self::NotStarted | Self::Cancelled => 0.0,
        }
    }

    /// Terminal states never re-enter active work during propagation.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Status derived from an explicit progress value.
    #[must_use]
    pub fn from_progress(progress: f64) -> Self {
        if progress >= 100.0 {
            Self::Completed
        } else if progress > 0.0 {
            Self::InProgress
        } else {
            Self::NotStarted
        }
    }
}

/// Work item priority
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Estimated implementation complexity
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
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// One node in the work-item hierarchy.
///
/// The embedding vector over `title + " " + description` is a derived storage
/// column and deliberately not part of the entity: it must never appear in
/// tool responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Canonical identity
    pub id: Uuid,
    /// Hierarchy type
    #[serde(rename = "type")]
    pub item_type: WorkItemType,
    /// Short human-readable title
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Lifecycle status
    pub status: WorkItemStatus,
    /// Priority
    pub priority: Priority,
    /// Optional parent work item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Work items this item is blocked by
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    /// Progress in [0, 100]
    #[serde(default)]
    pub progress_percentage: f64,
    /// Acceptance criteria, in order
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Context tags used by retrieval
    #[serde(default)]
    pub context_tags: Vec<String>,
    /// Estimated complexity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    /// Estimated effort in hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_estimate: Option<f64>,
    /// Actual hours spent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    /// Assigned agent or user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Reporting agent or user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp, set when status becomes terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque caller metadata
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_metadata() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl WorkItem {
    /// Create a new work item with derived defaults.
    #[must_use]
    pub fn new(item_type: WorkItemType, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_type,
            title,
            description: String::new(),
            status: WorkItemStatus::NotStarted,
            priority: Priority::Medium,
            parent_id: None,
            dependencies: Vec::new(),
            progress_percentage: 0.0,
            acceptance_criteria: Vec::new(),
            tags: Vec::new(),
            context_tags: Vec::new(),
            complexity: None,
            effort_estimate: None,
            actual_hours: None,
            assignee: None,
            reporter: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            metadata: default_metadata(),
        }
    }

    /// Text contributing to the derived embedding vector.
    #[must_use]
    pub fn embed_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Validate entity invariants that do not need storage access.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the status/progress duality or the
    /// progress range is violated, or when the item depends on itself.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation_field(
                "Title must not be empty",
                "title",
                Some(serde_json::Value::String(self.title.clone())),
                Some("non-empty string".to_owned()),
            ));
        }
        if !(0.0..=100.0).contains(&self.progress_percentage) {
            return Err(Error::validation_field(
                "Progress must be within [0, 100]",
                "progress_percentage",
                serde_json::Number::from_f64(self.progress_percentage)
                    .map(serde_json::Value::Number),
                Some("0 <= progress <= 100".to_owned()),
            ));
        }
        let progress_complete = (self.progress_percentage - 100.0).abs() < f64::EPSILON;
        if progress_complete != (self.status == WorkItemStatus::Completed) {
            return Err(Error::validation_field(
                "Progress 100 requires status completed (and vice versa)",
                "progress_percentage",
                serde_json::Number::from_f64(self.progress_percentage)
                    .map(serde_json::Value::Number),
                Some(format!("consistent with status '{}'", self.status)),
            ));
        }
        if self.dependencies.contains(&self.id) {
            return Err(Error::validation_field(
                "A work item cannot depend on itself",
                "dependencies",
                Some(serde_json::Value::String(self.id.to_string())),
                None,
            ));
        }
        if self.updated_at < self.created_at {
            return Err(Error::validation("updated_at must not precede created_at"));
        }
        Ok(())
    }

    /// Validate that `parent_type` is an allowed parent for this item's type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHierarchy` naming both types when the rule fails.
    pub fn validate_parent_type(&self, parent_type: WorkItemType) -> Result<()> {
        validate_parent_child(parent_type, self.item_type)
    }
}

/// Check the allowed-parent table for a `(parent, child)` pair.
///
/// # Errors
///
/// Returns `InvalidHierarchy` when the pairing is not allowed, including the
/// case of an initiative being given any parent at all.
pub fn validate_parent_child(parent: WorkItemType, child: WorkItemType) -> Result<()> {
    let allowed = child.allowed_parent_types();
    if allowed.is_empty() {
        return Err(Error::invalid_hierarchy(format!(
            "{child} items must be hierarchy roots and cannot have a parent"
        )));
    }
    if !allowed.contains(&parent) {
        return Err(Error::invalid_hierarchy(format!(
            "{child} items cannot be children of {parent} items (allowed: {})",
            allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(())
}
