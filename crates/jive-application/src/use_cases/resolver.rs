//! Flexible work-item identifier resolution
//!
//! Accepts a UUID, an exact title, or a keyword phrase and maps it to a
//! canonical work item id. Misses carry up to three candidate titles so the
//! tool surface can suggest corrections.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use jive_domain::entities::WorkItem;
use jive_domain::error::{Error, Result};
use jive_domain::ports::WorkItemRepository;
use jive_domain::utils::{id, text};

/// Maximum suggestions returned on a failed resolution.
const MAX_SUGGESTIONS: usize = 3;

/// Result of a resolution attempt.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The canonical id, when resolution succeeded
    pub id: Option<Uuid>,
    /// Candidate titles for error messages, on a miss
    pub suggestions: Vec<String>,
}

/// Resolver with a short-lived positive cache.
pub struct IdentifierResolver {
    work_items: Arc<dyn WorkItemRepository>,
    cache: Cache<String, Uuid>,
}

impl IdentifierResolver {
    /// Create a resolver over the work item repository.
    #[must_use]
    pub fn new(work_items: Arc<dyn WorkItemRepository>) -> Self {
        Self {
            work_items,
            cache: Cache::builder()
                .max_capacity(1024)
                .time_to_live(Duration::from_secs(60))
                .build(),
        }
    }

    /// Drop every cached resolution; called after any work-item mutation.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    /// Resolve an identifier string to a work item id.
    ///
    /// First match wins: well-formed UUID with an existing record, unique
    /// exact case-insensitive title, then first record containing every
    /// keyword in `title + " " + description`.
    ///
    /// # Errors
    ///
    /// Storage errors only; a plain miss is `Ok` with `id = None`.
    pub async fn resolve(&self, input: &str) -> Result<Resolution> {
        let key = input.trim().to_lowercase();
        if let Some(cached) = self.cache.get(&key).await {
            // A stale hit is possible after deletion; verify before trusting
            if self.work_items.get(cached).await?.is_some() {
                return Ok(Resolution {
                    id: Some(cached),
                    suggestions: Vec::new(),
                });
            }
            self.cache.invalidate(&key).await;
        }

        if let Some(uuid) = id::parse(input) {
            if self.work_items.get(uuid).await?.is_some() {
                self.cache.insert(key, uuid).await;
                return Ok(Resolution {
                    id: Some(uuid),
                    suggestions: Vec::new(),
                });
            }
            // A syntactically valid but unknown UUID falls through to
            // keyword matching like any other string
        }

        let items = self.work_items.list_all().await?;

        let needle = input.trim().to_lowercase();
        let exact: Vec<&WorkItem> = items
            .iter()
            .filter(|w| w.title.to_lowercase() == needle)
            .collect();
        if exact.len() == 1 {
            let found = exact[0].id;
            self.cache.insert(key, found).await;
            return Ok(Resolution {
                id: Some(found),
                suggestions: Vec::new(),
            });
        }

        let tokens = text::tokenize(input);
        if !tokens.is_empty() {
            let hit = items.iter().find(|w| {
                let haystack = format!("{} {}", w.title, w.description).to_lowercase();
                tokens.iter().all(|t| haystack.contains(t.as_str()))
            });
            if let Some(found) = hit {
                self.cache.insert(key, found.id).await;
                return Ok(Resolution {
                    id: Some(found.id),
                    suggestions: Vec::new(),
                });
            }
        }

        Ok(Resolution {
            id: None,
            suggestions: suggest(&items, input),
        })
    }

    /// Resolve or fail with `NOT_FOUND` carrying suggestions.
    ///
    /// # Errors
    ///
    /// `NotFound` with up to three candidate titles when nothing matches.
    pub async fn resolve_required(&self, input: &str) -> Result<Uuid> {
        let resolution = self.resolve(input).await?;
        resolution.id.ok_or_else(|| {
            Error::not_found_with_suggestions(input.to_owned(), resolution.suggestions)
        })
    }
}

/// Rank candidate titles: prefix matches first, then by shared-token count.
/// With no ranked candidate at all, the first few titles stand in so error
/// messages always have something to offer.
fn suggest(items: &[WorkItem], input: &str) -> Vec<String> {
    let needle = input.trim().to_lowercase();
    let mut ranked: Vec<(u32, usize, &str)> = items
        .iter()
        .filter_map(|w| {
            let title_lower = w.title.to_lowercase();
            let prefix = title_lower.starts_with(&needle) || needle.starts_with(&title_lower);
            let overlap = text::shared_token_count(&w.title, input);
            if !prefix && overlap == 0 {
                return None;
            }
            Some((u32::from(prefix), overlap, w.title.as_str()))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(b.2)));
    if ranked.is_empty() {
        let mut titles: Vec<&str> = items.iter().map(|w| w.title.as_str()).collect();
        titles.sort_unstable();
        return titles
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(ToOwned::to_owned)
            .collect();
    }
    ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, _, title)| title.to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_domain::entities::WorkItemType;
    use jive_providers::{DocumentStore, HashEmbeddingProvider, WorkItemRepositoryImpl};
    use jive_providers::retry::RetryPolicy;

    async fn repo_with(titles: &[&str]) -> Arc<dyn WorkItemRepository> {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        let repo = Arc::new(WorkItemRepositoryImpl::new(store, RetryPolicy::immediate()));
        for title in titles {
            let mut item = WorkItem::new(WorkItemType::Task, (*title).to_owned(), Utc::now());
            item.description = "integration work".to_owned();
            repo.create(item).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn resolves_exact_title_case_insensitively() {
        let repo = repo_with(&["Payment Integration"]).await;
        let resolver = IdentifierResolver::new(Arc::clone(&repo));

        let by_exact = resolver.resolve("Payment Integration").await.unwrap();
        assert!(by_exact.id.is_some());
        let by_case = resolver.resolve("payment integration").await.unwrap();
        assert_eq!(by_case.id, by_exact.id);
    }

    #[tokio::test]
    async fn resolves_by_keyword_containment() {
        let repo = repo_with(&["Payment Integration"]).await;
        let resolver = IdentifierResolver::new(repo);
        let hit = resolver.resolve("payment").await.unwrap();
        assert!(hit.id.is_some());
    }

    #[tokio::test]
    async fn resolves_uuid_directly() {
        let repo = repo_with(&["Anything"]).await;
        let items = repo.list_all().await.unwrap();
        let resolver = IdentifierResolver::new(repo);
        let hit = resolver.resolve(&items[0].id.to_string()).await.unwrap();
        assert_eq!(hit.id, Some(items[0].id));
    }

    #[tokio::test]
    async fn miss_returns_suggestions() {
        let repo = repo_with(&["Payment Integration", "Search Revamp"]).await;
        let resolver = IdentifierResolver::new(repo);
        let miss = resolver.resolve("payment gateway overhaul").await.unwrap();
        assert!(miss.id.is_none());
        assert_eq!(miss.suggestions, vec!["Payment Integration".to_owned()]);

        let err = resolver.resolve_required("nonexistent").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn cache_survives_repeat_lookups_and_invalidation() {
        let repo = repo_with(&["Cached Item"]).await;
        let resolver = IdentifierResolver::new(repo);
        let first = resolver.resolve("Cached Item").await.unwrap();
        let second = resolver.resolve("cached item").await.unwrap();
        assert_eq!(first.id, second.id);
        resolver.invalidate();
        let third = resolver.resolve("Cached Item").await.unwrap();
        assert_eq!(first.id, third.id);
    }
}
