//! Search: engines, title grammar and the resolution pipeline.

mod cli;
mod native;
mod resolution;
pub mod title;
mod types;

pub use cli::CliEngine;
pub use native::NativeEngine;
pub use resolution::SearchResolver;
pub use types::{
    Facet, FacetValue, MediaKind, Pagination, SearchEngine, SearchError, SearchFilters,
    SearchResponse, SearchResult, SourceRequest,
};
