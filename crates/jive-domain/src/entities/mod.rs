//! Domain entities
//!
//! Work items, institutional memory items, and execution records.

mod execution;
mod memory;
mod work_item;

pub use execution::{ExecutionMode, ExecutionRecord, ExecutionStatus};
pub use memory::{
    ArchitectureItem, ArchitectureItemSummary, MemoryNamespace, TroubleshootItem,
    TroubleshootMatch, validate_slug,
};
pub use work_item::{
    Complexity, Priority, WorkItem, WorkItemStatus, WorkItemType, validate_parent_child,
};
