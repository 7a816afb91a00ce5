//! MongoDB document store integration.

pub mod client;
pub mod filters;
pub mod pipelines;
pub mod types;

pub use client::{CatalogStore, WineStore};
pub use filters::{
    build_search_filter, combine, geo_within_clause, list_projection, sort_document,
};
pub use pipelines::{centroid_pipeline, country_stats_pipeline, decode_centroid, decode_stats};
pub use types::{StoreError, StoredBlob};
