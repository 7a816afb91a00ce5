//! Domain types and error definitions for the wine catalog.

use crate::mongo::StoreError;
use mongodb::bson::{Bson, DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Identifier did not parse as a database key.
    #[error("Invalid ID")]
    InvalidId,
    /// Comment body was blank after trimming.
    #[error("Comment text is required")]
    EmptyComment,
    /// Identifier was well formed but nothing matched it.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Backend read failed.
    #[error("Catalog query failed: {0}")]
    Store(#[from] StoreError),
    /// Comment append failed for a reason other than a missing record.
    #[error("Error adding comment: {0}")]
    CommentFailed(#[source] StoreError),
}

/// Outcome of an optional sub-query whose failure must not fail the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The sub-query produced a value.
    Found(T),
    /// The sub-query was not applicable or matched nothing.
    Absent,
    /// The sub-query failed; the failure has already been logged.
    Failed,
}

impl<T> Lookup<T> {
    /// Collapse into an `Option`, treating failures like absence.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Absent | Lookup::Failed => None,
        }
    }

    /// Borrowing variant of [`Lookup::found`].
    pub fn as_found(&self) -> Option<&T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Absent | Lookup::Failed => None,
        }
    }
}

/// GeoJSON point; coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    kind: PointKind,
    coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum PointKind {
    Point,
}

impl GeoPoint {
    /// Build a point from a longitude/latitude pair.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: PointKind::Point,
            coordinates: [longitude, latitude],
        }
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    /// Coordinate pair in the order the geo operators expect.
    pub fn coordinates(&self) -> [f64; 2] {
        self.coordinates
    }
}

/// User comment embedded in a wine record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Fresh identifier assigned when the comment is appended.
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Trimmed comment body.
    pub text: String,
    /// Display name, `anonymous` when none was given.
    pub author: String,
    /// UTC creation time.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
}

/// Wine document as stored in the catalog collection.
///
/// Every field apart from the key is optional: list views fetch a projection, and the loaded
/// data set is not uniform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineRecord {
    /// Database key.
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Label title.
    #[serde(default)]
    pub title: Option<String>,
    /// Country facet.
    #[serde(default)]
    pub country: Option<String>,
    /// Province facet.
    #[serde(default)]
    pub province: Option<String>,
    /// Grape variety.
    #[serde(default)]
    pub variety: Option<String>,
    /// Producer.
    #[serde(default)]
    pub winery: Option<String>,
    /// Tasting note; excluded from list projections.
    #[serde(default)]
    pub description: Option<String>,
    /// Review score.
    #[serde(default)]
    pub points: Option<f64>,
    /// Bottle price.
    #[serde(default)]
    pub price: Option<f64>,
    /// Geo point used by radius searches.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    /// Flag image reference; loaders have written both ObjectIds and hex strings.
    #[serde(default)]
    pub country_image: Option<Bson>,
    /// Embedded comments, oldest first; empty when the document has none.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl WineRecord {
    /// Hex identifier of the flag image, if the record carries one.
    pub fn country_image_id(&self) -> Option<String> {
        match self.country_image.as_ref()? {
            Bson::ObjectId(id) => Some(id.to_hex()),
            Bson::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            _ => None,
        }
    }
}

/// Aggregated statistics for one country.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResult {
    /// Mean price over the country's records.
    pub avg_price: Option<f64>,
    /// Mean score over the country's records.
    pub avg_points: Option<f64>,
    /// Most frequent non-empty variety.
    pub top_variety: Option<String>,
}

/// Distinct facet values used to populate the selection controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetLists {
    /// Sorted distinct countries.
    pub countries: Vec<String>,
    /// Sorted distinct provinces.
    pub provinces: Vec<String>,
}

/// Raw `/search` query string. Every parameter is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
    /// Query text.
    #[serde(default)]
    pub q: Option<String>,
    /// Field selector: `all`, `title`, `description`, `variety` or `winery`.
    #[serde(default)]
    pub field: Option<String>,
    /// `1` switches to the full-text index.
    #[serde(default)]
    pub text: Option<String>,
    /// Country facet.
    #[serde(default)]
    pub country: Option<String>,
    /// Province facet.
    #[serde(default)]
    pub province: Option<String>,
    /// `by_area` or `by_coords`.
    #[serde(default)]
    pub geo_mode: Option<String>,
    /// Latitude for `by_coords`.
    #[serde(default)]
    pub lat: Option<String>,
    /// Longitude for `by_coords`.
    #[serde(default)]
    pub lon: Option<String>,
    /// Radius in kilometers.
    #[serde(default)]
    pub radius: Option<String>,
    /// Sort key name.
    #[serde(default)]
    pub sort_by: Option<String>,
}

/// Search form after trimming and defaulting; echoed back into the page.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedForm {
    /// Trimmed query text.
    pub q: String,
    /// Field selector, `all` by default.
    pub field: String,
    /// Whether the full-text index was requested.
    pub use_text: bool,
    /// Trimmed country facet.
    pub country: String,
    /// Trimmed province facet.
    pub province: String,
    /// Geo mode, `by_area` by default.
    pub geo_mode: String,
    /// Raw latitude text.
    pub lat: String,
    /// Raw longitude text.
    pub lon: String,
    /// Radius in kilometers, `50` by default.
    pub radius: String,
    /// Sort key name, `points_desc` by default.
    pub sort_by: String,
}

/// Fields a pattern search may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Any of title, description, winery or variety.
    All,
    /// Title only.
    Title,
    /// Description only.
    Description,
    /// Variety only.
    Variety,
    /// Winery only.
    Winery,
}

impl FieldScope {
    /// Document fields covered by the `all` selector.
    pub const ALL_FIELDS: [&'static str; 4] = ["title", "description", "winery", "variety"];

    /// Recognize a field selector; unknown selectors yield `None`.
    pub fn parse(selector: &str) -> Option<Self> {
        match selector {
            "all" => Some(Self::All),
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "variety" => Some(Self::Variety),
            "winery" => Some(Self::Winery),
            _ => None,
        }
    }

    /// Document field for single-field scopes; `None` for [`FieldScope::All`].
    pub fn field_name(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Title => Some("title"),
            Self::Description => Some("description"),
            Self::Variety => Some("variety"),
            Self::Winery => Some("winery"),
        }
    }
}

/// Decision taken for the free-text part of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum TextSearch {
    /// No query text.
    None,
    /// Query against the collection's text index.
    FullText(String),
    /// Case-insensitive literal substring match.
    Pattern {
        /// Fields the pattern is matched against.
        scope: FieldScope,
        /// Raw query text, escaped when the pattern is built.
        query: String,
    },
    /// Field selector not recognized; the text predicate is dropped.
    UnknownField {
        /// Selector as submitted.
        field: String,
    },
}

/// Reason a geo radius filter was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoSkip {
    /// Radius missing, malformed, or zero.
    NoRadius,
    /// Area mode without a country or province to center on.
    NoArea,
    /// Coordinate mode with a latitude or longitude that is not a finite number.
    MalformedCoords,
    /// Unrecognized `geo_mode` value.
    UnknownMode,
}

/// Decision taken for the geographic part of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoSearch {
    /// Center on the centroid of the records in the selected area.
    ByArea {
        /// Country the centroid is computed over.
        country: Option<String>,
        /// Province the centroid is computed over.
        province: Option<String>,
        /// Radius in meters.
        radius_m: f64,
    },
    /// Center on an explicit point.
    ByCoords {
        /// Parsed center.
        center: GeoPoint,
        /// Radius in meters.
        radius_m: f64,
    },
    /// No radius filter.
    Off(GeoSkip),
}

impl GeoSearch {
    /// Radius to apply, when geo filtering is on.
    pub fn radius_meters(&self) -> Option<f64> {
        match self {
            GeoSearch::ByArea { radius_m, .. } | GeoSearch::ByCoords { radius_m, .. } => {
                Some(*radius_m)
            }
            GeoSearch::Off(_) => None,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Cheapest first.
    PriceAsc,
    /// Most expensive first.
    PriceDesc,
    /// Lowest score first.
    PointsAsc,
    /// Highest score first.
    #[default]
    PointsDesc,
}

impl SortKey {
    /// Map a `sort_by` value; anything unrecognized falls back to the default ordering.
    pub fn parse(value: &str) -> Self {
        match value {
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "points_asc" => Self::PointsAsc,
            _ => Self::PointsDesc,
        }
    }
}

/// Per-request search state derived from a [`NormalizedForm`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    /// Free-text decision.
    pub text: TextSearch,
    /// Exact-match country facet.
    pub country: Option<String>,
    /// Exact-match province facet.
    pub province: Option<String>,
    /// Radius decision.
    pub geo: GeoSearch,
    /// Result ordering.
    pub sort: SortKey,
}

/// Everything the search page needs after a query ran.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Matches across the full collection, not just the returned page.
    pub total: u64,
    /// First page of projected records.
    pub results: Vec<WineRecord>,
    /// Radius center that was applied, if any.
    pub center: Lookup<GeoPoint>,
    /// Country statistics when a country facet was set.
    pub stats: Lookup<StatsResult>,
    /// Facet lists for repopulating the form.
    pub facets: FacetLists,
}

/// Form body of `POST /wine/{id}/comment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    /// Comment body.
    #[serde(default)]
    pub text: Option<String>,
    /// Optional display name.
    #[serde(default)]
    pub author: Option<String>,
}

/// Binary asset ready to be sent to the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// MIME type for the `Content-Type` header.
    pub content_type: String,
    /// Stored blobs are immutable and may be cached by the browser.
    pub cacheable: bool,
}
