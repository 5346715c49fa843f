//! Hybrid document + vector storage engine
//!
//! A typed document store keyed by UUID. Each table holds scalar records,
//! a parallel vector column over the record's embed-text, and an optional
//! JSONL persistence file. Writes are serialized per table; reads are
//! concurrent.

mod record;
mod table;

pub use record::TableRecord;
pub use table::Table;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jive_domain::entities::{ArchitectureItem, ExecutionRecord, TroubleshootItem, WorkItem};
use jive_domain::error::Result;
use jive_domain::ports::EmbeddingProvider;

/// Table names, mirroring the persistence layout.
pub mod tables {
    /// Work item table
    pub const WORK_ITEMS: &str = "WorkItem";
    /// Architecture memory table
    pub const ARCHITECTURE: &str = "ArchitectureMemory";
    /// Troubleshoot memory table
    pub const TROUBLESHOOT: &str = "TroubleshootMemory";
    /// Execution log table
    pub const EXECUTIONS: &str = "ExecutionLog";
}

/// The process-wide storage engine: one table per entity plus the shared
/// embedding provider used to maintain the vector columns.
pub struct DocumentStore {
    embedder: Arc<dyn EmbeddingProvider>,
    work_items: Table<WorkItem>,
    architecture: Table<ArchitectureItem>,
    troubleshoot: Table<TroubleshootItem>,
    executions: Table<ExecutionRecord>,
}

impl DocumentStore {
    /// Open the store, rehydrating any persisted tables under `data_dir`.
    ///
    /// With `data_dir = None` the store is purely in-memory (tests, dry
    /// runs).
    ///
    /// # Errors
    ///
    /// Returns a storage error when a persistence file exists but cannot be
    /// read or parsed.
    pub async fn open(
        data_dir: Option<&Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let path_for = |name: &str| -> Option<PathBuf> {
            data_dir.map(|dir| dir.join(format!("{name}.jsonl")))
        };

        let store = Self {
            embedder,
            work_items: Table::new(tables::WORK_ITEMS, path_for(tables::WORK_ITEMS)),
            architecture: Table::new(tables::ARCHITECTURE, path_for(tables::ARCHITECTURE)),
            troubleshoot: Table::new(tables::TROUBLESHOOT, path_for(tables::TROUBLESHOOT)),
            executions: Table::new(tables::EXECUTIONS, path_for(tables::EXECUTIONS)),
        };

        if let Some(dir) = data_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| jive_domain::Error::io_with_source("Cannot create data dir", e))?;
            store.work_items.load().await?;
            store.architecture.load().await?;
            store.troubleshoot.load().await?;
            store.executions.load().await?;
        }

        Ok(store)
    }

    /// The shared embedding provider.
    #[must_use]
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    /// Work item table.
    #[must_use]
    pub fn work_items(&self) -> &Table<WorkItem> {
        &self.work_items
    }

    /// Architecture memory table.
    #[must_use]
    pub fn architecture(&self) -> &Table<ArchitectureItem> {
        &self.architecture
    }

    /// Troubleshoot memory table.
    #[must_use]
    pub fn troubleshoot(&self) -> &Table<TroubleshootItem> {
        &self.troubleshoot
    }

    /// Execution log table.
    #[must_use]
    pub fn executions(&self) -> &Table<ExecutionRecord> {
        &self.executions
    }
}
