//! Filter helpers for MongoDB search queries.

use mongodb::bson::{Bson, Document, Regex, doc};

use crate::catalog::{FieldScope, FilterState, GeoPoint, SortKey, TextSearch};

/// Earth's mean radius used to turn meters into `$centerSphere` radians.
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// Fields returned for list views; comments and descriptions stay on the detail page.
pub const LIST_FIELDS: [&str; 8] = [
    "title",
    "country",
    "province",
    "variety",
    "winery",
    "points",
    "price",
    "country_image",
];

/// Case-insensitive regex matching `query` as a literal substring.
pub fn literal_pattern(query: &str) -> Regex {
    Regex {
        pattern: regex::escape(query),
        options: "i".to_string(),
    }
}

/// Compose the text and facet clauses of a search.
///
/// The geo clause is appended separately because its center may need a round-trip.
pub fn build_search_filter(state: &FilterState) -> Vec<Document> {
    let mut clauses = Vec::new();

    match &state.text {
        TextSearch::FullText(query) => {
            clauses.push(doc! { "$text": { "$search": query.as_str() } });
        }
        TextSearch::Pattern { scope, query } => {
            let pattern = literal_pattern(query);
            match scope.field_name() {
                Some(field) => clauses.push(doc! { field: pattern }),
                None => {
                    let any_field: Vec<Document> = FieldScope::ALL_FIELDS
                        .iter()
                        .map(|field| doc! { *field: pattern.clone() })
                        .collect();
                    clauses.push(doc! { "$or": any_field });
                }
            }
        }
        TextSearch::UnknownField { field } => {
            tracing::debug!(field = %field, "Ignoring text query for unknown field selector");
        }
        TextSearch::None => {}
    }

    if let Some(country) = state.country.as_deref() {
        clauses.push(doc! { "country": country });
    }
    if let Some(province) = state.province.as_deref() {
        clauses.push(doc! { "province": province });
    }

    clauses
}

/// Radius containment clause around `center`.
pub fn geo_within_clause(center: &GeoPoint, radius_m: f64) -> Document {
    let [lon, lat] = center.coordinates();
    doc! {
        "location": {
            "$geoWithin": {
                "$centerSphere": [[lon, lat], radius_m / EARTH_RADIUS_METERS]
            }
        }
    }
}

/// AND the clauses together; no clauses matches every record.
pub fn combine(clauses: Vec<Document>) -> Document {
    if clauses.is_empty() {
        Document::new()
    } else {
        doc! { "$and": clauses }
    }
}

/// Sort specification for a [`SortKey`].
pub fn sort_document(sort: SortKey) -> Document {
    match sort {
        SortKey::PriceAsc => doc! { "price": 1 },
        SortKey::PriceDesc => doc! { "price": -1 },
        SortKey::PointsAsc => doc! { "points": 1 },
        SortKey::PointsDesc => doc! { "points": -1 },
    }
}

/// Projection keeping only [`LIST_FIELDS`].
pub fn list_projection() -> Document {
    LIST_FIELDS
        .iter()
        .map(|field| (field.to_string(), Bson::Int32(1)))
        .collect()
}

/// Equality filter on a single facet, or everything when the value is blank.
pub fn facet_filter(field: &str, value: &str) -> Document {
    let value = value.trim();
    if value.is_empty() {
        Document::new()
    } else {
        doc! { field: value }
    }
}
