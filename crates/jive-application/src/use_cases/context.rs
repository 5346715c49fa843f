//! Token-budgeted architecture context assembly
//!
//! Builds a bounded context bundle around a primary architecture item: the
//! primary requirements verbatim, child items summarized with half the
//! remaining budget, related items as short previews with the rest. Emits
//! both the structured object and a deterministic markdown rendering.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use jive_domain::entities::{ArchitectureItem, ArchitectureItemSummary};
use jive_domain::error::{Error, Result};
use jive_domain::ports::ArchitectureRepository;
use jive_domain::utils::text;

/// Default token budget when the caller does not provide one.
pub const DEFAULT_TOKEN_BUDGET: usize = 4000;
/// Tokens reserved for headings and the usage ledger.
const SUMMARY_OVERHEAD_TOKENS: usize = 100;
/// Target size of one child summary.
const CHILD_SUMMARY_TOKENS: usize = 150;
/// Ceiling on one related-item preview.
const RELATED_PREVIEW_TOKENS: usize = 100;

/// Request for a context bundle.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    /// Slug of the primary architecture item
    pub slug: String,
    /// Token budget (`chars / 4` estimation)
    pub max_tokens: usize,
}

impl ContextRequest {
    /// Request with the default budget.
    #[must_use]
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_owned(),
            max_tokens: DEFAULT_TOKEN_BUDGET,
        }
    }
}

/// A related item rendered as a preview.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedPreview {
    /// Related item slug
    pub slug: String,
    /// Related item title
    pub title: String,
    /// Bounded preview of the requirements
    pub preview: String,
}

/// Token accounting for the bundle.
#[derive(Debug, Clone, Serialize)]
pub struct TokenLedger {
    /// Budget the request carried
    pub budget: usize,
    /// Tokens spent on the primary body
    pub primary: usize,
    /// Tokens spent on child summaries
    pub children: usize,
    /// Tokens spent on related previews
    pub related: usize,
    /// Total estimated usage including overhead reserve
    pub total: usize,
}

/// The assembled context bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ArchitectureContext {
    /// Primary item slug
    pub slug: String,
    /// Primary item title
    pub title: String,
    /// When-to-use guidance from the primary item
    pub when_to_use: Vec<String>,
    /// Primary requirements, verbatim
    pub requirements: String,
    /// Child summaries that fit the sub-budget, declaration order
    pub children: Vec<ArchitectureItemSummary>,
    /// Related previews that fit the remaining budget
    pub related: Vec<RelatedPreview>,
    /// True when anything was summarized away or omitted
    pub truncation_applied: bool,
    /// Token accounting
    pub token_usage: TokenLedger,
    /// Deterministic markdown rendering of the bundle
    pub markdown: String,
}

/// Context assembly service.
pub struct ArchitectureContextService {
    architecture: Arc<dyn ArchitectureRepository>,
}

impl ArchitectureContextService {
    /// Create the service over the architecture repository.
    #[must_use]
    pub fn new(architecture: Arc<dyn ArchitectureRepository>) -> Self {
        Self { architecture }
    }

    /// Assemble a context bundle for `request.slug`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown primary slug; storage errors. Unknown
    /// child or related slugs are skipped, not fatal.
    pub async fn get_context(&self, request: ContextRequest) -> Result<ArchitectureContext> {
        let primary = self
            .architecture
            .get_by_slug(&request.slug)
            .await?
            .ok_or_else(|| Error::not_found(request.slug.clone()))?;

        let mut truncation_applied = false;
        let primary_tokens = text::estimate_tokens(&primary.ai_requirements);
        let remaining = request
            .max_tokens
            .saturating_sub(primary_tokens)
            .saturating_sub(SUMMARY_OVERHEAD_TOKENS);

        // Half the remainder goes to children, in declaration order
        let children_budget = remaining / 2;
        let mut children = Vec::new();
        let mut children_tokens = 0usize;
        for child_slug in &primary.children_slugs {
            let Some(child) = self.architecture.get_by_slug(child_slug).await? else {
                tracing::warn!(slug = %child_slug, "child slug does not resolve; skipping");
                continue;
            };
            let summary_text =
                text::truncate_to_tokens(&child.ai_requirements, CHILD_SUMMARY_TOKENS);
            let cost = text::estimate_tokens(&summary_text);
            if children_tokens + cost > children_budget {
                // The first child that does not fit ends the section
                truncation_applied = true;
                break;
            }
            if summary_text.len() < child.ai_requirements.trim().len() {
                truncation_applied = true;
            }
            children_tokens += cost;
            children.push(summarize(&child, summary_text));
        }

        // The rest funds related previews
        let related_budget = remaining.saturating_sub(children_tokens);
        let mut related = Vec::new();
        let mut related_tokens = 0usize;
        for related_slug in &primary.related_slugs {
            let Some(item) = self.architecture.get_by_slug(related_slug).await? else {
                tracing::warn!(slug = %related_slug, "related slug does not resolve; skipping");
                continue;
            };
            let preview = text::truncate_to_tokens(&item.ai_requirements, RELATED_PREVIEW_TOKENS);
            let cost = text::estimate_tokens(&preview);
            if related_tokens + cost > related_budget {
                truncation_applied = true;
                break;
            }
            if preview.len() < item.ai_requirements.trim().len() {
                truncation_applied = true;
            }
            related_tokens += cost;
            related.push(RelatedPreview {
                slug: item.unique_slug.clone(),
                title: item.title.clone(),
                preview,
            });
        }

        let token_usage = TokenLedger {
            budget: request.max_tokens,
            primary: primary_tokens,
            children: children_tokens,
            related: related_tokens,
            total: primary_tokens + children_tokens + related_tokens + SUMMARY_OVERHEAD_TOKENS,
        };

        let markdown = render_markdown(&primary, &children, &related, &token_usage);

        Ok(ArchitectureContext {
            slug: primary.unique_slug.clone(),
            title: primary.title.clone(),
            when_to_use: primary.ai_when_to_use.clone(),
            requirements: primary.ai_requirements,
            children,
            related,
            truncation_applied,
            token_usage,
            markdown,
        })
    }
}

fn summarize(item: &ArchitectureItem, key_requirements: String) -> ArchitectureItemSummary {
    ArchitectureItemSummary {
        slug: item.unique_slug.clone(),
        title: item.title.clone(),
        when_to_use: item.ai_when_to_use.clone(),
        key_requirements,
        children_count: item.children_slugs.len(),
        related_count: item.related_slugs.len(),
    }
}

fn render_markdown(
    primary: &ArchitectureItem,
    children: &[ArchitectureItemSummary],
    related: &[RelatedPreview],
    ledger: &TokenLedger,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", primary.title);
    if !primary.ai_when_to_use.is_empty() {
        let _ = writeln!(out, "## When to Use\n");
        for entry in &primary.ai_when_to_use {
            let _ = writeln!(out, "- {entry}");
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "## Requirements\n");
    let _ = writeln!(out, "{}\n", primary.ai_requirements);

    if !children.is_empty() {
        let _ = writeln!(out, "## Children\n");
        for child in children {
            let _ = writeln!(out, "### {} (`{}`)\n", child.title, child.slug);
            let _ = writeln!(out, "{}\n", child.key_requirements);
        }
    }
    if !related.is_empty() {
        let _ = writeln!(out, "## Related\n");
        for item in related {
            let _ = writeln!(out, "### {} (`{}`)\n", item.title, item.slug);
            let _ = writeln!(out, "{}\n", item.preview);
        }
    }
    let _ = writeln!(out, "---");
    let _ = write!(
        out,
        "*Context tokens: {} of {} budgeted*",
        ledger.total, ledger.budget
    );
    out
}
