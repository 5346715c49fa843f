//! Memory item ⇄ markdown with YAML front matter
//!
//! Export writes front matter (`type`, `slug`, `version`, timestamps, plus
//! usage counters for troubleshoot items) followed by a canonical body.
//! Import parses the front matter first, checks the type against the
//! caller's namespace, then pulls each section by header with
//! inline-backtick extraction for slug lists.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use jive_domain::entities::{
    ArchitectureItem, MemoryNamespace, TroubleshootItem, validate_slug,
};
use jive_domain::error::{Error, Result};
use jive_domain::utils::{id, time};

/// Export format version stamped into front matter.
const FORMAT_VERSION: &str = "1.0";

static H1_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?m)^#\s+(.+)$").expect("static pattern compiles")
});
static BACKTICK_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"`([^`]+)`").expect("static pattern compiles")
});
static BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?m)^-\s+(.+)$").expect("static pattern compiles")
});

/// How imported items merge with existing ones.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ImportMode {
    /// Fail on existing slugs
    CreateOnly,
    /// Fail on unknown slugs
    UpdateOnly,
    /// Create or update as needed (default)
    CreateOrUpdate,
    /// Delete any existing item, then create
    Replace,
}

/// A parsed memory item of either namespace.
#[derive(Debug, Clone)]
pub enum ParsedMemoryItem {
    /// An architecture specification
    Architecture(ArchitectureItem),
    /// A troubleshooting solution
    Troubleshoot(TroubleshootItem),
}

impl ParsedMemoryItem {
    /// Slug of the parsed item.
    #[must_use]
    pub fn slug(&self) -> &str {
        match self {
            Self::Architecture(item) => &item.unique_slug,
            Self::Troubleshoot(item) => &item.unique_slug,
        }
    }
}

/// Render an architecture item to exportable markdown.
#[must_use]
pub fn export_architecture(item: &ArchitectureItem) -> String {
    let mut front = BTreeMap::new();
    front.insert("type", serde_yaml::Value::from("architecture"));
    front.insert("slug", serde_yaml::Value::from(item.unique_slug.as_str()));
    front.insert("version", serde_yaml::Value::from(FORMAT_VERSION));
    front.insert(
        "created_on",
        serde_yaml::Value::from(time::to_rfc3339(item.created_on)),
    );
    front.insert(
        "last_updated_on",
        serde_yaml::Value::from(time::to_rfc3339(item.last_updated_on)),
    );

    let mut out = render_front_matter(&front);
    let _ = writeln!(out, "# {}\n", item.title);

    if !item.ai_when_to_use.is_empty() {
        let _ = writeln!(out, "## When to Use\n");
        for entry in &item.ai_when_to_use {
            let _ = writeln!(out, "- {entry}");
        }
        let _ = writeln!(out);
    }
    if !item.keywords.is_empty() {
        let _ = writeln!(out, "## Keywords\n");
        let _ = writeln!(out, "{}\n", backticked(&item.keywords));
    }
    let _ = writeln!(out, "## Requirements\n");
    let _ = writeln!(out, "{}\n", item.ai_requirements.trim_end());

    if !item.children_slugs.is_empty() || !item.related_slugs.is_empty() {
        let _ = writeln!(out, "## Relationships\n");
        if !item.children_slugs.is_empty() {
            let _ = writeln!(out, "### Children\n");
            for child in &item.children_slugs {
                let _ = writeln!(out, "- `{child}`");
            }
            let _ = writeln!(out);
        }
        if !item.related_slugs.is_empty() {
            let _ = writeln!(out, "### Related\n");
            for related in &item.related_slugs {
                let _ = writeln!(out, "- `{related}`");
            }
            let _ = writeln!(out);
        }
    }
    if !item.linked_epic_ids.is_empty() {
        let _ = writeln!(out, "## Epic Links\n");
        for epic in &item.linked_epic_ids {
            let _ = writeln!(out, "- `{epic}`");
        }
        let _ = writeln!(out);
    }
    if !item.tags.is_empty() {
        let _ = writeln!(out, "## Tags\n");
        let _ = writeln!(out, "{}\n", backticked(&item.tags));
    }

    let _ = writeln!(out, "---");
    let _ = write!(
        out,
        "*Last updated: {}*",
        item.last_updated_on.format("%Y-%m-%d")
    );
    out
}

/// Render a troubleshoot item to exportable markdown.
#[must_use]
pub fn export_troubleshoot(item: &TroubleshootItem) -> String {
    let mut front = BTreeMap::new();
    front.insert("type", serde_yaml::Value::from("troubleshoot"));
    front.insert("slug", serde_yaml::Value::from(item.unique_slug.as_str()));
    front.insert("version", serde_yaml::Value::from(FORMAT_VERSION));
    front.insert(
        "created_on",
        serde_yaml::Value::from(time::to_rfc3339(item.created_on)),
    );
    front.insert(
        "last_updated_on",
        serde_yaml::Value::from(time::to_rfc3339(item.last_updated_on)),
    );
    front.insert("usage_count", serde_yaml::Value::from(item.usage_count));
    front.insert("success_count", serde_yaml::Value::from(item.success_count));

    let mut out = render_front_matter(&front);
    let _ = writeln!(out, "# {}\n", item.title);

    if !item.ai_use_case.is_empty() {
        let _ = writeln!(out, "## Problem / Use Cases\n");
        for case in &item.ai_use_case {
            let _ = writeln!(out, "- {case}");
        }
        let _ = writeln!(out);
    }
    if !item.keywords.is_empty() {
        let _ = writeln!(out, "## Keywords\n");
        let _ = writeln!(out, "{}\n", backticked(&item.keywords));
    }
    let _ = writeln!(out, "## Solutions\n");
    let _ = writeln!(out, "{}\n", item.ai_solutions.trim_end());

    if !item.tags.is_empty() {
        let _ = writeln!(out, "## Tags\n");
        let _ = writeln!(out, "{}\n", backticked(&item.tags));
    }

    let success_rate = if item.usage_count > 0 {
        item.success_count as f64 / item.usage_count as f64 * 100.0
    } else {
        0.0
    };
    let _ = writeln!(out, "---");
    let _ = write!(
        out,
        "*Last updated: {} | Usage: {} times | Success Rate: {:.0}%*",
        item.last_updated_on.format("%Y-%m-%d"),
        item.usage_count,
        success_rate
    );
    out
}

/// Parse exported markdown back into a memory item.
///
/// # Errors
///
/// Validation errors for missing/invalid front matter, a namespace
/// mismatch, a bad slug, or a missing title/body.
pub fn parse_memory_markdown(
    content: &str,
    expected: MemoryNamespace,
) -> Result<ParsedMemoryItem> {
    let (front, body) = split_front_matter(content)?;

    let item_type = front_str(&front, "type")?;
    let parsed_ns: MemoryNamespace = item_type.parse().map_err(|_| {
        Error::validation_field(
            format!("Unknown memory type '{item_type}'"),
            "type",
            Some(serde_json::Value::String(item_type.clone())),
            Some("architecture | troubleshoot".to_owned()),
        )
    })?;
    if parsed_ns != expected {
        return Err(Error::validation_field(
            format!("File is a {parsed_ns} item but the {expected} namespace was requested"),
            "type",
            Some(serde_json::Value::String(item_type)),
            Some(expected.to_string()),
        ));
    }

    let slug = validate_slug(&front_str(&front, "slug")?)?;
    let created_on = front_datetime(&front, "created_on").unwrap_or_else(time::now);
    let title = H1_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .ok_or_else(|| Error::validation("Markdown body is missing its '# title' heading"))?;

    let sections = split_sections(body);

    match expected {
        MemoryNamespace::Architecture => {
            let requirements = sections
                .get("requirements")
                .map(|s| s.trim().to_owned())
                .ok_or_else(|| Error::validation("Missing '## Requirements' section"))?;
            let relationships = sections.get("relationships").map(String::as_str).unwrap_or("");
            let (children_slugs, related_slugs) = parse_relationships(relationships);

            let mut item = ArchitectureItem {
                id: id::generate(),
                unique_slug: slug,
                title,
                ai_requirements: requirements,
                ai_when_to_use: sections
                    .get("when to use")
                    .map(|s| bullets(s))
                    .unwrap_or_default(),
                keywords: sections
                    .get("keywords")
                    .map(|s| backtick_list(s))
                    .unwrap_or_default(),
                children_slugs,
                related_slugs,
                linked_epic_ids: sections
                    .get("epic links")
                    .map(|s| backtick_list(s))
                    .unwrap_or_default(),
                tags: sections
                    .get("tags")
                    .map(|s| backtick_list(s))
                    .unwrap_or_default(),
                metadata: serde_json::Value::Object(serde_json::Map::new()),
                created_on,
                last_updated_on: time::now(),
            };
            item.validate()?;
            Ok(ParsedMemoryItem::Architecture(item))
        }
        MemoryNamespace::Troubleshoot => {
            let solutions = sections
                .get("solutions")
                .map(|s| s.trim().to_owned())
                .ok_or_else(|| Error::validation("Missing '## Solutions' section"))?;

            let mut item = TroubleshootItem {
                id: id::generate(),
                unique_slug: slug,
                title,
                ai_use_case: sections
                    .get("problem / use cases")
                    .map(|s| bullets(s))
                    .unwrap_or_default(),
                ai_solutions: solutions,
                keywords: sections
                    .get("keywords")
                    .map(|s| backtick_list(s))
                    .unwrap_or_default(),
                tags: sections
                    .get("tags")
                    .map(|s| backtick_list(s))
                    .unwrap_or_default(),
                metadata: serde_json::Value::Object(serde_json::Map::new()),
                usage_count: front_u64(&front, "usage_count").unwrap_or(0),
                success_count: front_u64(&front, "success_count").unwrap_or(0),
                created_on,
                last_updated_on: time::now(),
            };
            item.validate()?;
            Ok(ParsedMemoryItem::Troubleshoot(item))
        }
    }
}

fn render_front_matter(front: &BTreeMap<&str, serde_yaml::Value>) -> String {
    let mut out = String::from("---\n");
    for (key, value) in front {
        let rendered = match value {
            serde_yaml::Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other)
                .unwrap_or_default()
                .trim_end()
                .to_owned(),
        };
        let _ = writeln!(out, "{key}: {rendered}");
    }
    out.push_str("---\n\n");
    out
}

fn split_front_matter(content: &str) -> Result<(BTreeMap<String, serde_yaml::Value>, &str)> {
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| Error::validation("Markdown file is missing YAML front matter"))?;
    let end = rest
        .find("\n---")
        .ok_or_else(|| Error::validation("Unterminated YAML front matter"))?;
    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('\n');
    let front: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml)
        .map_err(|e| Error::validation(format!("Invalid YAML front matter: {e}")))?;
    Ok((front, body))
}

fn front_str(front: &BTreeMap<String, serde_yaml::Value>, key: &str) -> Result<String> {
    front
        .get(key)
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            Error::validation_field(
                format!("Front matter is missing '{key}'"),
                key,
                None,
                Some("string".to_owned()),
            )
        })
}

fn front_u64(front: &BTreeMap<String, serde_yaml::Value>, key: &str) -> Option<u64> {
    front.get(key).and_then(serde_yaml::Value::as_u64)
}

fn front_datetime(front: &BTreeMap<String, serde_yaml::Value>, key: &str) -> Option<DateTime<Utc>> {
    front
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split the body into `## `-headed sections, keyed by lowercased header.
/// The footer rule (`---`) ends the final section.
fn split_sections(body: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in body.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            if let Some((name, lines)) = current.take() {
                sections.insert(name, lines.join("\n"));
            }
            current = Some((header.trim().to_lowercase(), Vec::new()));
        } else if line.trim() == "---" {
            if let Some((name, lines)) = current.take() {
                sections.insert(name, lines.join("\n"));
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((name, lines)) = current.take() {
        sections.insert(name, lines.join("\n"));
    }
    sections
}

/// Children/Related sub-lists from the Relationships section.
fn parse_relationships(section: &str) -> (Vec<String>, Vec<String>) {
    let mut children = Vec::new();
    let mut related = Vec::new();
    let mut target: Option<&mut Vec<String>> = None;

    for line in section.lines() {
        if let Some(sub) = line.strip_prefix("### ") {
            target = match sub.trim().to_lowercase().as_str() {
                "children" => Some(&mut children),
                "related" => Some(&mut related),
                _ => None,
            };
        } else if let Some(list) = target.as_mut() {
            if let Some(entry) = BULLET_RE.captures(line).and_then(|c| c.get(1)) {
                let raw = entry.as_str().trim();
                let cleaned = BACKTICK_RE
                    .captures(raw)
                    .and_then(|c| c.get(1))
                    .map_or(raw, |m| m.as_str());
                list.push(cleaned.to_owned());
            }
        }
    }
    (children, related)
}

fn bullets(section: &str) -> Vec<String> {
    BULLET_RE
        .captures_iter(section)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .collect()
}

fn backtick_list(section: &str) -> Vec<String> {
    BACKTICK_RE
        .captures_iter(section)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
        .collect()
}

fn backticked(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("`{v}`"))
        .collect::<Vec<_>>()
        .join(", ")
}
