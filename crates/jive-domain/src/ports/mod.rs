//! Port traits implemented outside the domain layer
//!
//! | Port | Description |
//! | ------ | ------------- |
//! | `EmbeddingProvider` | Text embedding generation |
//! | `WorkItemRepository` | Work item persistence and search |
//! | `ArchitectureRepository` | Architecture memory persistence |
//! | `TroubleshootRepository` | Troubleshoot memory persistence |
//! | `ExecutionRepository` | Execution record persistence |

mod providers;
mod repositories;

pub use providers::EmbeddingProvider;
pub use repositories::{
    ArchitectureRepository, ExecutionRepository, TroubleshootRepository, WorkItemRepository,
};
