//! Wine catalog domain: input normalization, search orchestration, comments and images.

pub mod sanitize;
mod service;
pub mod types;

pub use service::{
    CatalogApi, CatalogService, FACET_LIST_CAP, PROVINCE_LIST_CAP, RESULT_LIMIT,
    resolve_content_type, tidy_facet_values,
};
pub use types::{
    CatalogError, Comment, CommentForm, FacetLists, FieldScope, FilterState, GeoPoint, GeoSearch,
    GeoSkip, ImageAsset, Lookup, NormalizedForm, SearchForm, SearchOutcome, SortKey, StatsResult,
    TextSearch, WineRecord,
};
