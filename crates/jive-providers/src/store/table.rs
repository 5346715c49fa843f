//! One typed table: records, vector column, persistence

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use jive_domain::error::{Error, Result};
use jive_domain::value_objects::{
    Embedding, Filters, ListQuery, SortOrder, distance_to_score,
};

use super::record::TableRecord;

/// Default page size for list queries.
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Serialize, Deserialize)]
struct PersistedRow<T> {
    record: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vector: Option<Embedding>,
}

struct TableInner<T> {
    records: HashMap<Uuid, T>,
    vectors: HashMap<Uuid, Embedding>,
    slugs: HashMap<String, Uuid>,
}

/// A typed table with an embedded vector column.
///
/// The single `RwLock` serializes writes per table while allowing
/// concurrent reads; no lock is held across an await that performs I/O on
/// behalf of another table.
pub struct Table<T: TableRecord> {
    name: &'static str,
    inner: RwLock<TableInner<T>>,
    path: Option<PathBuf>,
}

impl<T: TableRecord> Table<T> {
    /// Create an empty table; `path` enables JSONL persistence.
    #[must_use]
    pub fn new(name: &'static str, path: Option<PathBuf>) -> Self {
        Self {
            name,
            inner: RwLock::new(TableInner {
                records: HashMap::new(),
                vectors: HashMap::new(),
                slugs: HashMap::new(),
            }),
            path,
        }
    }

    /// Table name (persistence layout name).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rehydrate the table from its persistence file, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error on unreadable or corrupt rows.
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(Error::storage_with_source(
                    format!("Cannot read table file for {}", self.name),
                    e,
                ));
            }
        };

        let mut inner = self.inner.write().await;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let row: PersistedRow<T> = serde_json::from_str(line).map_err(|e| {
                Error::storage_with_source(format!("Corrupt row in table {}", self.name), e)
            })?;
            let id = row.record.id();
            if let Some(slug) = row.record.slug() {
                inner.slugs.insert(slug.to_owned(), id);
            }
            if let Some(vector) = row.vector {
                inner.vectors.insert(id, vector);
            }
            inner.records.insert(id, row.record);
        }
        tracing::debug!(table = self.name, rows = inner.records.len(), "table loaded");
        Ok(())
    }

    async fn persist(&self, inner: &TableInner<T>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut out = String::new();
        for (id, record) in &inner.records {
            let row = PersistedRow {
                record: record.clone(),
                vector: inner.vectors.get(id).cloned(),
            };
            out.push_str(&serde_json::to_string(&row)?);
            out.push('\n');
        }
        tokio::fs::write(path, out).await.map_err(|e| {
            Error::storage_with_source(format!("Cannot persist table {}", self.name), e)
        })
    }

    /// Insert a record, failing on duplicate id or slug.
    ///
    /// # Errors
    ///
    /// `Conflict` on duplicates; storage errors from persistence.
    pub async fn insert(&self, record: T, vector: Option<Embedding>) -> Result<T> {
        let mut inner = self.inner.write().await;
        let id = record.id();
        if inner.records.contains_key(&id) {
            return Err(Error::conflict(format!(
                "Record {id} already exists in table {}",
                self.name
            )));
        }
        if let Some(slug) = record.slug() {
            if inner.slugs.contains_key(slug) {
                return Err(Error::conflict(format!(
                    "Slug '{slug}' already exists in table {}",
                    self.name
                )));
            }
            inner.slugs.insert(slug.to_owned(), id);
        }
        if let Some(vector) = vector {
            inner.vectors.insert(id, vector);
        }
        inner.records.insert(id, record.clone());
        self.persist(&inner).await?;
        Ok(record)
    }

    /// Replace an existing record; `vector = None` keeps the stored vector.
    ///
    /// Implemented as remove + insert under one write lock so readers never
    /// observe a half-written record.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids; `Conflict` when a slug change collides.
    pub async fn replace(&self, record: T, vector: Option<Embedding>) -> Result<T> {
        let mut inner = self.inner.write().await;
        let id = record.id();
        let Some(previous) = inner.records.remove(&id) else {
            return Err(Error::not_found(id.to_string()));
        };
        if let Some(old_slug) = previous.slug() {
            inner.slugs.remove(old_slug);
        }
        if let Some(slug) = record.slug() {
            if let Some(other) = inner.slugs.get(slug) {
                if *other != id {
                    // Roll the removal back before reporting the collision
                    let prev_slug = previous.slug().map(ToOwned::to_owned);
                    if let Some(s) = prev_slug {
                        inner.slugs.insert(s, id);
                    }
                    inner.records.insert(id, previous);
                    return Err(Error::conflict(format!(
                        "Slug '{slug}' already exists in table {}",
                        self.name
                    )));
                }
            }
            inner.slugs.insert(slug.to_owned(), id);
        }
        if let Some(vector) = vector {
            inner.vectors.insert(id, vector);
        }
        inner.records.insert(id, record.clone());
        self.persist(&inner).await?;
        Ok(record)
    }

    /// Remove a record; returns whether one existed.
    ///
    /// # Errors
    ///
    /// Storage errors from persistence.
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.records.remove(&id) else {
            return Ok(false);
        };
        if let Some(slug) = record.slug() {
            inner.slugs.remove(slug);
        }
        inner.vectors.remove(&id);
        self.persist(&inner).await?;
        Ok(true)
    }

    /// Fetch by id.
    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.inner.read().await.records.get(&id).cloned()
    }

    /// Fetch by slug (exact, case-insensitive via stored lowercase form).
    pub async fn get_by_slug(&self, slug: &str) -> Option<T> {
        let inner = self.inner.read().await;
        let id = inner.slugs.get(&slug.to_lowercase())?;
        inner.records.get(id).cloned()
    }

    /// Every record, unordered.
    pub async fn all(&self) -> Vec<T> {
        self.inner.read().await.records.values().cloned().collect()
    }

    /// Number of records.
    pub async fn count(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Filtered, sorted, paginated listing.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown filter or sort fields.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<T>> {
        validate_fields::<T>(&query.filters)?;
        if let Some(sort_by) = &query.sort_by {
            if !T::known_fields().contains(&sort_by.as_str()) {
                return Err(Error::InvalidFilter {
                    field: sort_by.clone(),
                });
            }
        }

        let inner = self.inner.read().await;
        let mut rows: Vec<&T> = inner
            .records
            .values()
            .filter(|r| matches_filters(*r, &query.filters))
            .collect();

        let sort_field = query.sort_by.as_deref().unwrap_or("created_at");
        let effective_sort = if T::known_fields().contains(&sort_field) {
            sort_field
        } else {
            T::known_fields()[0]
        };
        rows.sort_by(|a, b| {
            compare_values(&a.field_value(effective_sort), &b.field_value(effective_sort))
        });
        if query.sort_order == Some(SortOrder::Descending) {
            rows.reverse();
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
    }

    /// Vector search: L2 distance over the table's vector column.
    ///
    /// Returns `(record, distance)` pairs, nearest first. Records without a
    /// vector never match.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown filter fields.
    pub async fn vector_search(
        &self,
        query: &Embedding,
        limit: usize,
        filters: &Filters,
    ) -> Result<Vec<(T, f64)>> {
        validate_fields::<T>(filters)?;
        let inner = self.inner.read().await;
        let mut scored: Vec<(T, f64)> = inner
            .vectors
            .iter()
            .filter_map(|(id, vector)| {
                let record = inner.records.get(id)?;
                if !matches_filters(record, filters) {
                    return None;
                }
                Some((record.clone(), f64::from(vector.l2_distance(query))))
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Keyword search: case-insensitive contains over the keyword text.
    ///
    /// The score is the fraction of query tokens found in the record text,
    /// already normalized to (0, 1].
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown filter fields.
    pub async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        filters: &Filters,
    ) -> Result<Vec<(T, f64)>> {
        validate_fields::<T>(filters)?;
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        let mut scored: Vec<(T, f64)> = inner
            .records
            .values()
            .filter(|r| matches_filters(*r, filters))
            .filter_map(|record| {
                let text = record.keyword_text().to_lowercase();
                let matched = tokens.iter().filter(|t| text.contains(t.as_str())).count();
                if matched == 0 {
                    return None;
                }
                Some((record.clone(), matched as f64 / tokens.len() as f64))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Hybrid search: weighted union of vector and keyword results by id.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown filter fields.
    pub async fn hybrid_search(
        &self,
        query_vector: &Embedding,
        query_text: &str,
        limit: usize,
        filters: &Filters,
        vector_weight: f64,
        keyword_weight: f64,
    ) -> Result<Vec<(T, f64, Option<f64>)>> {
        // Oversample both sides so the fused ranking is stable at `limit`
        let pool = limit.saturating_mul(2).max(limit);
        let vector_hits = self.vector_search(query_vector, pool, filters).await?;
        let keyword_hits = self.keyword_search(query_text, pool, filters).await?;

        let mut merged: HashMap<Uuid, (T, f64, Option<f64>)> = HashMap::new();
        for (record, distance) in vector_hits {
            let score = vector_weight * distance_to_score(distance);
            merged.insert(record.id(), (record, score, Some(distance)));
        }
        for (record, keyword_score) in keyword_hits {
            merged
                .entry(record.id())
                .and_modify(|(_, score, _)| *score += keyword_weight * keyword_score)
                .or_insert((record, keyword_weight * keyword_score, None));
        }

        let mut fused: Vec<(T, f64, Option<f64>)> = merged.into_values().collect();
        fused.sort_by(|a, b| b.1.total_cmp(&a.1));
        fused.truncate(limit);
        Ok(fused)
    }
}

fn validate_fields<T: TableRecord>(filters: &Filters) -> Result<()> {
    for field in filters.keys() {
        if !T::known_fields().contains(&field.as_str()) {
            return Err(Error::InvalidFilter {
                field: field.clone(),
            });
        }
    }
    Ok(())
}

fn matches_filters<T: TableRecord>(record: &T, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(field, filter)| filter.matches(&record.field_value(field)))
}

fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> std::cmp::Ordering {
    use serde_json::Value;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => std::cmp::Ordering::Equal,
        (Value::Null, _) => std::cmp::Ordering::Less,
        (_, Value::Null) => std::cmp::Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_domain::entities::{WorkItem, WorkItemStatus, WorkItemType};
    use jive_domain::value_objects::FilterValue;

    fn work_item(title: &str) -> WorkItem {
        WorkItem::new(WorkItemType::Task, title.to_owned(), Utc::now())
    }

    fn table() -> Table<WorkItem> {
        Table::new("WorkItem", None)
    }

    #[tokio::test]
    async fn insert_get_roundtrip() {
        let t = table();
        let item = work_item("Build parser");
        let id = item.id;
        t.insert(item, None).await.unwrap();
        assert_eq!(t.get(id).await.unwrap().title, "Build parser");
    }

    #[tokio::test]
    async fn duplicate_id_conflicts() {
        let t = table();
        let item = work_item("First");
        t.insert(item.clone(), None).await.unwrap();
        let err = t.insert(item, None).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn unknown_filter_field_rejected() {
        let t = table();
        let mut query = ListQuery::default();
        query.filters.insert(
            "no_such_field".to_owned(),
            FilterValue::One(serde_json::json!("x")),
        );
        let err = t.list(&query).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn status_filter_any_of() {
        let t = table();
        let mut a = work_item("One");
        a.status = WorkItemStatus::InProgress;
        a.progress_percentage = 50.0;
        let b = work_item("Two");
        t.insert(a, None).await.unwrap();
        t.insert(b, None).await.unwrap();

        let mut query = ListQuery::default();
        query.filters.insert(
            "status".to_owned(),
            FilterValue::Many(vec![
                serde_json::json!("in_progress"),
                serde_json::json!("blocked"),
            ]),
        );
        let rows = t.list(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "One");
    }

    #[tokio::test]
    async fn keyword_search_scores_by_matched_fraction() {
        let t = table();
        let mut full = work_item("Payment Integration");
        full.description = "Stripe payment gateway".to_owned();
        let mut partial = work_item("Integration tests");
        partial.description = "CI pipeline".to_owned();
        t.insert(full, None).await.unwrap();
        t.insert(partial, None).await.unwrap();

        let hits = t
            .keyword_search("payment integration", 10, &Filters::new())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.title, "Payment Integration");
        assert_eq!(hits[0].1, 1.0);
        assert_eq!(hits[1].1, 0.5);
    }

    #[tokio::test]
    async fn vector_search_orders_by_distance() {
        let t = table();
        let near = work_item("near");
        let far = work_item("far");
        let near_id = near.id;
        t.insert(near, Some(Embedding(vec![1.0, 0.0])))
            .await
            .unwrap();
        t.insert(far, Some(Embedding(vec![0.0, 1.0]))).await.unwrap();

        let hits = t
            .vector_search(&Embedding(vec![0.9, 0.1]), 10, &Filters::new())
            .await
            .unwrap();
        assert_eq!(hits[0].0.id, near_id);
        assert!(hits[0].1 < hits[1].1);
    }

    #[tokio::test]
    async fn persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WorkItem.jsonl");

        let t: Table<WorkItem> = Table::new("WorkItem", Some(path.clone()));
        let item = work_item("Persisted");
        let id = item.id;
        t.insert(item, Some(Embedding(vec![0.5; 4]))).await.unwrap();

        let reloaded: Table<WorkItem> = Table::new("WorkItem", Some(path));
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.get(id).await.unwrap().title, "Persisted");
        let hits = reloaded
            .vector_search(&Embedding(vec![0.5; 4]), 1, &Filters::new())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn list_paginates_deterministically() {
        let t = table();
        for i in 0..5 {
            t.insert(work_item(&format!("Item {i}")), None).await.unwrap();
        }
        let mut query = ListQuery {
            sort_by: Some("title".to_owned()),
            limit: Some(2),
            offset: Some(2),
            ..ListQuery::default()
        };
        let page = t.list(&query).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "Item 2");
        query.sort_order = Some(SortOrder::Descending);
        query.offset = Some(0);
        let page = t.list(&query).await.unwrap();
        assert_eq!(page[0].title, "Item 4");
    }
}
