//! Application layer for MCP Jive.
//!
//! Use-case services orchestrating the domain ports. Each service owns no
//! state beyond its port handles (the execution tracker's in-memory record
//! map being the one deliberate exception) and is safe to share behind an
//! `Arc`.

pub mod use_cases;

pub use use_cases::context::{ArchitectureContext, ArchitectureContextService, ContextRequest};
pub use use_cases::dependency::{
    DependencyIssue, DependencyService, DependencyValidation, GraphStats, SuggestedFix,
};
pub use use_cases::execution::{ExecutionService, StartOptions};
pub use use_cases::hierarchy::HierarchyService;
pub use use_cases::markdown::{ImportMode, ParsedMemoryItem};
pub use use_cases::matching::{DetailedSolution, MatchingContext, ProblemMatcher};
pub use use_cases::memory::MemoryService;
pub use use_cases::progress::{ProgressReport, ProgressService, ProgressUpdate, RecalculationReport};
pub use use_cases::resolver::{IdentifierResolver, Resolution};
pub use use_cases::search::{ContentSearchService, SearchScope, UnifiedSearchHit};
pub use use_cases::sync::{ImportReport, SyncService, SyncStatus};
