//! Problem → solution matching over troubleshoot memory
//!
//! Semantic search scored by `1/(1+distance)`, optionally boosted by the
//! solution's historical success rate. Search itself is side-effect free;
//! usage counters move only through the explicit fetch/feedback paths.

use std::sync::Arc;

use serde::Serialize;

use jive_domain::entities::{TroubleshootItem, TroubleshootMatch};
use jive_domain::error::Result;
use jive_domain::ports::TroubleshootRepository;
use jive_domain::utils::text;
use jive_domain::value_objects::{SearchMode, SearchRequest};

/// Solution preview length in characters.
const PREVIEW_CHARS: usize = 200;
/// Minimum shared tokens for a use case to count as matched.
const USE_CASE_TOKEN_OVERLAP: usize = 2;
/// Success-rate boost factor: up to +20 % relevance.
const SUCCESS_BOOST: f64 = 0.2;

/// Constraints for a matching run.
#[derive(Debug, Clone)]
pub struct MatchingContext {
    /// Maximum matches returned
    pub max_results: usize,
    /// Drop matches scoring below this relevance
    pub min_relevance_score: f64,
    /// Weight proven solutions higher
    pub boost_by_success_rate: bool,
}

impl Default for MatchingContext {
    fn default() -> Self {
        Self {
            max_results: 5,
            min_relevance_score: 0.3,
            boost_by_success_rate: true,
        }
    }
}

/// Full solution detail returned by the fetch path.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedSolution {
    /// Item slug
    pub slug: String,
    /// Item title
    pub title: String,
    /// Problem descriptions this applies to
    pub use_cases: Vec<String>,
    /// Full markdown solution body
    pub solutions: String,
    /// Discovery keywords
    pub keywords: Vec<String>,
    /// Times retrieved in mark-as-used mode
    pub usage_count: u64,
    /// Times marked successful
    pub success_count: u64,
    /// `success_count / max(1, usage_count)`
    pub success_rate: f64,
}

/// Problem → solution matcher.
pub struct ProblemMatcher {
    troubleshoot: Arc<dyn TroubleshootRepository>,
}

impl ProblemMatcher {
    /// Create the matcher over the troubleshoot repository.
    #[must_use]
    pub fn new(troubleshoot: Arc<dyn TroubleshootRepository>) -> Self {
        Self { troubleshoot }
    }

    /// Match a problem description to relevant solutions.
    ///
    /// # Errors
    ///
    /// Storage and embedding errors.
    pub async fn match_problem(
        &self,
        problem: &str,
        context: &MatchingContext,
    ) -> Result<Vec<TroubleshootMatch>> {
        // Oversample so min-score filtering still fills the result
        let hits = self
            .troubleshoot
            .search(SearchRequest::new(
                problem,
                SearchMode::Vector,
                context.max_results.saturating_mul(2).max(1),
            ))
            .await?;

        let mut matches: Vec<TroubleshootMatch> = hits
            .into_iter()
            .filter_map(|scored| {
                let mut relevance = scored.score;
                if relevance < context.min_relevance_score {
                    return None;
                }
                let item = scored.item;
                if context.boost_by_success_rate && item.usage_count > 0 {
                    relevance = (relevance * (1.0 + SUCCESS_BOOST * item.success_rate())).min(1.0);
                }
                let matched_use_cases = matched_use_cases(problem, &item);
                Some(TroubleshootMatch {
                    slug: item.unique_slug.clone(),
                    title: item.title.clone(),
                    relevance_score: relevance.min(1.0),
                    matched_use_cases,
                    solution_preview: text::truncate_preview(&item.ai_solutions, PREVIEW_CHARS),
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        matches.truncate(context.max_results);
        Ok(matches)
    }

    /// Full solution detail; `mark_as_used` bumps the usage counter once.
    ///
    /// # Errors
    ///
    /// Storage errors; a miss is `Ok(None)`.
    pub async fn get_detailed_solution(
        &self,
        slug: &str,
        mark_as_used: bool,
    ) -> Result<Option<DetailedSolution>> {
        let Some(item) = self.troubleshoot.get_by_slug(slug).await? else {
            return Ok(None);
        };
        let item = if mark_as_used {
            self.troubleshoot.increment_usage(slug, false).await?
        } else {
            item
        };
        Ok(Some(detail(&item)))
    }

    /// Record feedback for a retrieved solution: one more use, successful or
    /// not.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown slugs.
    pub async fn mark_solution_outcome(
        &self,
        slug: &str,
        worked: bool,
    ) -> Result<DetailedSolution> {
        let item = self.troubleshoot.increment_usage(slug, worked).await?;
        Ok(detail(&item))
    }
}

fn detail(item: &TroubleshootItem) -> DetailedSolution {
    DetailedSolution {
        slug: item.unique_slug.clone(),
        title: item.title.clone(),
        use_cases: item.ai_use_case.clone(),
        solutions: item.ai_solutions.clone(),
        keywords: item.keywords.clone(),
        usage_count: item.usage_count,
        success_count: item.success_count,
        success_rate: item.success_rate(),
    }
}

/// Use cases sharing at least two tokens with the problem; the first two
/// declared entries when nothing overlaps.
fn matched_use_cases(problem: &str, item: &TroubleshootItem) -> Vec<String> {
    let overlapping: Vec<String> = item
        .ai_use_case
        .iter()
        .filter(|case| text::shared_token_count(problem, case) >= USE_CASE_TOKEN_OVERLAP)
        .cloned()
        .collect();
    if overlapping.is_empty() {
        item.ai_use_case.iter().take(2).cloned().collect()
    } else {
        overlapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jive_providers::retry::RetryPolicy;
    use jive_providers::{DocumentStore, HashEmbeddingProvider, TroubleshootRepositoryImpl};
    use uuid::Uuid;

    async fn repo() -> Arc<dyn TroubleshootRepository> {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        Arc::new(TroubleshootRepositoryImpl::new(
            store,
            RetryPolicy::immediate(),
        ))
    }

    fn item(slug: &str, use_case: &str, usage: u64, success: u64) -> TroubleshootItem {
        let now = jive_domain::utils::time::now();
        TroubleshootItem {
            id: Uuid::new_v4(),
            unique_slug: slug.to_owned(),
            title: format!("Solution {slug}"),
            ai_use_case: vec![use_case.to_owned()],
            ai_solutions: "Check the connection settings. Then restart the worker pool."
                .to_owned(),
            keywords: Vec::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
            usage_count: usage,
            success_count: success,
            created_on: now,
            last_updated_on: now,
        }
    }

    #[tokio::test]
    async fn success_boost_breaks_semantic_ties() {
        let repo = repo().await;
        // Same use-case text: semantically equidistant from the problem
        repo.create(item("proven", "database connection pool exhausted", 10, 9))
            .await
            .unwrap();
        repo.create(item("unproven", "database connection pool exhausted", 1, 0))
            .await
            .unwrap();
        let matcher = ProblemMatcher::new(Arc::clone(&repo));

        let boosted = matcher
            .match_problem(
                "database connection pool exhausted",
                &MatchingContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(boosted[0].slug, "proven");
        assert!(boosted[0].relevance_score > boosted[1].relevance_score);

        let unboosted = matcher
            .match_problem(
                "database connection pool exhausted",
                &MatchingContext {
                    boost_by_success_rate: false,
                    ..MatchingContext::default()
                },
            )
            .await
            .unwrap();
        // Without the boost the tie breaks on slug order
        assert_eq!(unboosted[0].relevance_score, unboosted[1].relevance_score);
        assert_eq!(unboosted[0].slug, "proven");
    }

    #[tokio::test]
    async fn min_relevance_filters_weak_matches() {
        let repo = repo().await;
        repo.create(item("niche", "obscure kernel panic on boot", 0, 0))
            .await
            .unwrap();
        let matcher = ProblemMatcher::new(repo);

        let matches = matcher
            .match_problem(
                "spreadsheet formula renders wrong currency",
                &MatchingContext {
                    min_relevance_score: 0.9,
                    ..MatchingContext::default()
                },
            )
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn matched_use_cases_fall_back_to_declared_order() {
        let repo = repo().await;
        let mut multi = item("multi", "database connection pool exhausted", 0, 0);
        multi.ai_use_case = vec![
            "first declared case".to_owned(),
            "second declared case".to_owned(),
            "third declared case".to_owned(),
        ];
        repo.create(multi).await.unwrap();
        let matcher = ProblemMatcher::new(repo);

        let matches = matcher
            .match_problem(
                "declared case lookup",
                &MatchingContext {
                    min_relevance_score: 0.0,
                    ..MatchingContext::default()
                },
            )
            .await
            .unwrap();
        // "declared case" shares two tokens with every entry
        assert_eq!(matches[0].matched_use_cases.len(), 3);

        let fallback = matcher
            .match_problem(
                "zzz qqq",
                &MatchingContext {
                    min_relevance_score: 0.0,
                    ..MatchingContext::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            fallback[0].matched_use_cases,
            vec!["first declared case", "second declared case"]
        );
    }

    #[tokio::test]
    async fn detailed_fetch_increments_usage_exactly_once() {
        let repo = repo().await;
        repo.create(item("fetch-me", "broken deploy", 0, 0))
            .await
            .unwrap();
        let matcher = ProblemMatcher::new(Arc::clone(&repo));

        let detail = matcher
            .get_detailed_solution("fetch-me", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.usage_count, 1);

        // Read-only fetch leaves counters alone
        let detail = matcher
            .get_detailed_solution("fetch-me", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.usage_count, 1);

        let after = matcher.mark_solution_outcome("fetch-me", true).await.unwrap();
        assert_eq!(after.usage_count, 2);
        assert_eq!(after.success_count, 1);
    }

    #[tokio::test]
    async fn preview_is_bounded_and_sentence_aware() {
        let repo = repo().await;
        let mut long = item("long", "service timeout", 0, 0);
        long.ai_solutions =
            "Inspect the gateway logs for connection resets. ".repeat(20);
        repo.create(long).await.unwrap();
        let matcher = ProblemMatcher::new(repo);

        let matches = matcher
            .match_problem(
                "service timeout",
                &MatchingContext {
                    min_relevance_score: 0.0,
                    ..MatchingContext::default()
                },
            )
            .await
            .unwrap();
        let preview = &matches[0].solution_preview;
        assert!(preview.chars().count() <= PREVIEW_CHARS + text::TRUNCATION_MARKER.len());
        assert!(preview.ends_with('.') || preview.ends_with(text::TRUNCATION_MARKER));
    }
}
