//! Value objects shared across layers

mod search;

pub use search::{
    Embedding, FilterValue, Filters, ListQuery, Scored, SearchMode, SearchRequest, SortOrder,
    distance_to_score,
};
