//! The contract a record type fulfills to live in a [`super::Table`]

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use jive_domain::entities::{ArchitectureItem, ExecutionRecord, TroubleshootItem, WorkItem};

/// A record storable in a typed table.
///
/// `field_value` backs the filter/sort language: the set of legal field
/// names is fixed per record type, and unknown names are rejected by the
/// table as `InvalidFilter` before any matching happens.
pub trait TableRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Primary key.
    fn id(&self) -> Uuid;

    /// Unique slug, for tables that declare one.
    fn slug(&self) -> Option<&str> {
        None
    }

    /// Text for the vector column; empty means the record carries no vector.
    fn embed_text(&self) -> String;

    /// Text searched by keyword mode (title + description-like fields).
    fn keyword_text(&self) -> String;

    /// Refresh the update timestamp on write.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Legal filter/sort field names for this record type.
    fn known_fields() -> &'static [&'static str];

    /// The record's value for `field`, `Null` when the field is unset.
    ///
    /// Callers must have checked `field` against [`Self::known_fields`].
    fn field_value(&self, field: &str) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get(field).cloned())
            .unwrap_or(serde_json::Value::Null)
    }
}

impl TableRecord for WorkItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn embed_text(&self) -> String {
        WorkItem::embed_text(self)
    }

    fn keyword_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn known_fields() -> &'static [&'static str] {
        &[
            "id",
            "type",
            "title",
            "description",
            "status",
            "priority",
            "parent_id",
            "dependencies",
            "progress_percentage",
            "acceptance_criteria",
            "tags",
            "context_tags",
            "complexity",
            "effort_estimate",
            "actual_hours",
            "assignee",
            "reporter",
            "created_at",
            "updated_at",
            "completed_at",
        ]
    }
}

impl TableRecord for ArchitectureItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.unique_slug)
    }

    fn embed_text(&self) -> String {
        ArchitectureItem::embed_text(self)
    }

    fn keyword_text(&self) -> String {
        format!("{} {}", self.title, self.ai_requirements)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_on = now;
    }

    fn known_fields() -> &'static [&'static str] {
        &[
            "id",
            "unique_slug",
            "title",
            "keywords",
            "children_slugs",
            "related_slugs",
            "linked_epic_ids",
            "tags",
            "created_on",
            "last_updated_on",
        ]
    }
}

impl TableRecord for TroubleshootItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.unique_slug)
    }

    fn embed_text(&self) -> String {
        TroubleshootItem::embed_text(self)
    }

    fn keyword_text(&self) -> String {
        format!("{} {}", self.title, self.ai_solutions)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_on = now;
    }

    fn known_fields() -> &'static [&'static str] {
        &[
            "id",
            "unique_slug",
            "title",
            "keywords",
            "tags",
            "usage_count",
            "success_count",
            "created_on",
            "last_updated_on",
        ]
    }
}

impl TableRecord for ExecutionRecord {
    fn id(&self) -> Uuid {
        self.execution_id
    }

    fn embed_text(&self) -> String {
        // Execution records are not semantically searchable
        String::new()
    }

    fn keyword_text(&self) -> String {
        String::new()
    }

    fn touch(&mut self, _now: DateTime<Utc>) {}

    fn known_fields() -> &'static [&'static str] {
        &[
            "execution_id",
            "work_item_id",
            "status",
            "progress_percentage",
            "start_time",
            "end_time",
            "execution_mode",
        ]
    }
}
