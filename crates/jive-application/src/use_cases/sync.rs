//! Markdown export/import over the filesystem
//!
//! Batch companion to the codec: dumps each memory namespace into its own
//! directory of `.md` files and imports them back under one of the four
//! merge modes. Troubleshoot imports preserve stored usage counters on
//! update.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use jive_domain::entities::MemoryNamespace;
use jive_domain::error::{Error, Result};
use jive_domain::utils::time;
use jive_domain::value_objects::ListQuery;

use super::markdown::{
    ImportMode, ParsedMemoryItem, export_architecture, export_troubleshoot, parse_memory_markdown,
};
use super::memory::MemoryService;

/// Outcome of a batch export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Namespace exported
    pub namespace: MemoryNamespace,
    /// Files written
    pub exported: usize,
    /// Export timestamp
    pub exported_at: String,
    /// Directory written into
    pub directory: PathBuf,
}

/// Outcome of a batch import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Items newly created
    pub created: usize,
    /// Items updated in place
    pub updated: usize,
    /// Files skipped (mode constraints)
    pub skipped: usize,
    /// Per-file failures, as `file: reason`
    pub failures: Vec<String>,
}

/// Storage-vs-filesystem summary.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Stored architecture items
    pub architecture_items: usize,
    /// Stored troubleshoot items
    pub troubleshoot_items: usize,
    /// Markdown files present per namespace directory
    pub architecture_files: usize,
    /// Markdown files present per namespace directory
    pub troubleshoot_files: usize,
}

/// Filesystem sync facade over the memory service.
pub struct SyncService {
    memory: Arc<MemoryService>,
}

impl SyncService {
    /// Create the service over the memory facade.
    #[must_use]
    pub fn new(memory: Arc<MemoryService>) -> Self {
        Self { memory }
    }

    /// Export one namespace into `dir/<namespace>/<slug>.md`.
    ///
    /// # Errors
    ///
    /// I/O errors creating the directory or writing files.
    pub async fn export_namespace(
        &self,
        namespace: MemoryNamespace,
        dir: &Path,
    ) -> Result<ExportReport> {
        let target = dir.join(namespace.to_string());
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| Error::io_with_source("Cannot create export directory", e))?;

        let mut exported = 0;
        match namespace {
            MemoryNamespace::Architecture => {
                let items = self.memory.list_architecture(unbounded()).await?;
                for item in items {
                    let path = target.join(format!("{}.md", item.unique_slug));
                    tokio::fs::write(&path, export_architecture(&item))
                        .await
                        .map_err(|e| Error::io_with_source("Cannot write export file", e))?;
                    exported += 1;
                }
            }
            MemoryNamespace::Troubleshoot => {
                let items = self.memory.list_troubleshoot(unbounded()).await?;
                for item in items {
                    let path = target.join(format!("{}.md", item.unique_slug));
                    tokio::fs::write(&path, export_troubleshoot(&item))
                        .await
                        .map_err(|e| Error::io_with_source("Cannot write export file", e))?;
                    exported += 1;
                }
            }
        }

        Ok(ExportReport {
            namespace,
            exported,
            exported_at: time::to_rfc3339(time::now()),
            directory: target,
        })
    }

    /// Import every `.md` file under `dir/<namespace>/`.
    ///
    /// Individual file failures are collected, not fatal.
    ///
    /// # Errors
    ///
    /// I/O errors reading the directory listing.
    pub async fn import_namespace(
        &self,
        namespace: MemoryNamespace,
        dir: &Path,
        mode: ImportMode,
    ) -> Result<ImportReport> {
        let source = dir.join(namespace.to_string());
        let mut report = ImportReport::default();

        let mut entries = match tokio::fs::read_dir(&source).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => {
                return Err(Error::io_with_source("Cannot read import directory", e));
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_source("Cannot iterate import directory", e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            match self.import_file(namespace, &path, mode).await {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) => report
                    .failures
                    .push(format!("{}: {err}", path.display())),
            }
        }
        Ok(report)
    }

    /// Compare stored item counts against exported files.
    ///
    /// # Errors
    ///
    /// Storage errors; missing directories count as zero files.
    pub async fn status(&self, dir: &Path) -> Result<SyncStatus> {
        Ok(SyncStatus {
            architecture_items: self.memory.list_architecture(unbounded()).await?.len(),
            troubleshoot_items: self.memory.list_troubleshoot(unbounded()).await?.len(),
            architecture_files: count_md_files(
                &dir.join(MemoryNamespace::Architecture.to_string()),
            )
            .await,
            troubleshoot_files: count_md_files(
                &dir.join(MemoryNamespace::Troubleshoot.to_string()),
            )
            .await,
        })
    }

    async fn import_file(
        &self,
        namespace: MemoryNamespace,
        path: &Path,
        mode: ImportMode,
    ) -> Result<Outcome> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_source("Cannot read import file", e))?;
        let parsed = parse_memory_markdown(&content, namespace)?;

        match parsed {
            ParsedMemoryItem::Architecture(mut item) => {
                let existing = self.memory.get_architecture(&item.unique_slug).await?;
                match plan(mode, existing.is_some()) {
                    Plan::Skip => Ok(Outcome::Skipped),
                    Plan::Create => {
                        self.memory.create_architecture(item).await?;
                        Ok(Outcome::Created)
                    }
                    Plan::Update => {
                        let current = existing.ok_or_else(|| {
                            Error::not_found(item.unique_slug.clone())
                        })?;
                        item.id = current.id;
                        item.created_on = current.created_on;
                        self.memory.update_architecture(item).await?;
                        Ok(Outcome::Updated)
                    }
                    Plan::Replace => {
                        if let Some(current) = existing {
                            self.memory.architecture().delete(current.id).await?;
                        }
                        self.memory.create_architecture(item).await?;
                        Ok(Outcome::Created)
                    }
                }
            }
            ParsedMemoryItem::Troubleshoot(mut item) => {
                let existing = self.memory.get_troubleshoot(&item.unique_slug).await?;
                match plan(mode, existing.is_some()) {
                    Plan::Skip => Ok(Outcome::Skipped),
                    Plan::Create => {
                        self.memory.create_troubleshoot(item).await?;
                        Ok(Outcome::Created)
                    }
                    Plan::Update => {
                        let current = existing.ok_or_else(|| {
                            Error::not_found(item.unique_slug.clone())
                        })?;
                        item.id = current.id;
                        item.created_on = current.created_on;
                        // Stored usage counters survive a markdown update
                        item.usage_count = current.usage_count;
                        item.success_count = current.success_count;
                        self.memory.update_troubleshoot(item).await?;
                        Ok(Outcome::Updated)
                    }
                    Plan::Replace => {
                        if let Some(current) = existing {
                            self.memory.troubleshoot().delete(current.id).await?;
                        }
                        self.memory.create_troubleshoot(item).await?;
                        Ok(Outcome::Created)
                    }
                }
            }
        }
    }
}

enum Outcome {
    Created,
    Updated,
    Skipped,
}

enum Plan {
    Create,
    Update,
    Replace,
    Skip,
}

fn plan(mode: ImportMode, exists: bool) -> Plan {
    match (mode, exists) {
        (ImportMode::CreateOnly, false) | (ImportMode::CreateOrUpdate, false) => Plan::Create,
        (ImportMode::CreateOnly, true) | (ImportMode::UpdateOnly, false) => Plan::Skip,
        (ImportMode::UpdateOnly | ImportMode::CreateOrUpdate, true) => Plan::Update,
        (ImportMode::Replace, _) => Plan::Replace,
    }
}

fn unbounded() -> ListQuery {
    ListQuery {
        limit: Some(usize::MAX),
        ..ListQuery::default()
    }
}

async fn count_md_files(dir: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().extension().is_some_and(|ext| ext == "md") {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use jive_providers::retry::RetryPolicy;
    use jive_providers::{
        ArchitectureRepositoryImpl, DocumentStore, HashEmbeddingProvider,
        TroubleshootRepositoryImpl,
    };

    async fn service() -> SyncService {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        let memory = Arc::new(MemoryService::new(
            Arc::new(ArchitectureRepositoryImpl::new(
                Arc::clone(&store),
                RetryPolicy::immediate(),
            )),
            Arc::new(TroubleshootRepositoryImpl::new(
                store,
                RetryPolicy::immediate(),
            )),
        ));
        SyncService::new(memory)
    }

    #[tokio::test]
    async fn export_then_import_round_trips() {
        let svc = service().await;
        let dir = tempfile::tempdir().unwrap();

        let mut item = MemoryService::new_architecture_item(
            "layered-design",
            "Layered Design",
            "Separate domain from infrastructure.",
        );
        item.keywords = vec!["layers".to_owned()];
        svc.memory.create_architecture(item).await.unwrap();

        let report = svc
            .export_namespace(MemoryNamespace::Architecture, dir.path())
            .await
            .unwrap();
        assert_eq!(report.exported, 1);
        assert!(report.directory.join("layered-design.md").exists());

        // Wipe and re-import
        svc.memory.delete_architecture("layered-design").await.unwrap();
        let imported = svc
            .import_namespace(
                MemoryNamespace::Architecture,
                dir.path(),
                ImportMode::CreateOrUpdate,
            )
            .await
            .unwrap();
        assert_eq!(imported.created, 1);
        assert!(imported.failures.is_empty());

        let restored = svc
            .memory
            .get_architecture("layered-design")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.keywords, vec!["layers".to_owned()]);
    }

    #[tokio::test]
    async fn create_only_skips_existing() {
        let svc = service().await;
        let dir = tempfile::tempdir().unwrap();
        svc.memory
            .create_architecture(MemoryService::new_architecture_item("dup", "Dup", "v1"))
            .await
            .unwrap();
        svc.export_namespace(MemoryNamespace::Architecture, dir.path())
            .await
            .unwrap();

        let report = svc
            .import_namespace(
                MemoryNamespace::Architecture,
                dir.path(),
                ImportMode::CreateOnly,
            )
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn update_preserves_troubleshoot_counters() {
        let svc = service().await;
        let dir = tempfile::tempdir().unwrap();

        let mut item =
            MemoryService::new_troubleshoot_item("flaky-test", "Flaky tests", "Quarantine them.");
        item.ai_use_case = vec!["test fails intermittently".to_owned()];
        svc.memory.create_troubleshoot(item).await.unwrap();
        svc.export_namespace(MemoryNamespace::Troubleshoot, dir.path())
            .await
            .unwrap();

        // Counters move after the export
        svc.memory
            .troubleshoot()
            .increment_usage("flaky-test", true)
            .await
            .unwrap();

        let report = svc
            .import_namespace(
                MemoryNamespace::Troubleshoot,
                dir.path(),
                ImportMode::CreateOrUpdate,
            )
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let after = svc
            .memory
            .get_troubleshoot("flaky-test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.usage_count, 1);
        assert_eq!(after.success_count, 1);
    }

    #[tokio::test]
    async fn status_counts_items_and_files() {
        let svc = service().await;
        let dir = tempfile::tempdir().unwrap();
        svc.memory
            .create_architecture(MemoryService::new_architecture_item("one", "One", "x"))
            .await
            .unwrap();
        svc.export_namespace(MemoryNamespace::Architecture, dir.path())
            .await
            .unwrap();

        let status = svc.status(dir.path()).await.unwrap();
        assert_eq!(status.architecture_items, 1);
        assert_eq!(status.architecture_files, 1);
        assert_eq!(status.troubleshoot_items, 0);
        assert_eq!(status.troubleshoot_files, 0);
    }
}
