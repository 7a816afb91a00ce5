//! Aggregation pipelines for area centroids and per-country statistics.
//!
//! Builders are pure so the exact stages can be asserted without a server; decoders turn the
//! single result document back into domain values.

use mongodb::bson::{Bson, Document, doc};

use crate::catalog::{GeoPoint, StatsResult};

/// Average the point coordinates of every geo-tagged record in the area.
pub fn centroid_pipeline(country: Option<&str>, province: Option<&str>) -> Vec<Document> {
    let mut area = Document::new();
    if let Some(country) = country.filter(|value| !value.is_empty()) {
        area.insert("country", country);
    }
    if let Some(province) = province.filter(|value| !value.is_empty()) {
        area.insert("province", province);
    }

    vec![
        doc! { "$match": area },
        doc! { "$match": { "location.type": "Point" } },
        doc! {
            "$group": {
                "_id": Bson::Null,
                "lon": { "$avg": { "$arrayElemAt": ["$location.coordinates", 0] } },
                "lat": { "$avg": { "$arrayElemAt": ["$location.coordinates", 1] } },
            }
        },
    ]
}

/// Average price, average points and most frequent variety for one country.
pub fn country_stats_pipeline(country: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "country": country } },
        doc! {
            "$facet": {
                "avgStats": [
                    {
                        "$group": {
                            "_id": Bson::Null,
                            "avgPrice": { "$avg": "$price" },
                            "avgPoints": { "$avg": "$points" },
                        }
                    }
                ],
                "varietyCounts": [
                    { "$match": { "variety": { "$nin": [Bson::Null, ""] } } },
                    { "$group": { "_id": "$variety", "count": { "$sum": 1 } } },
                    { "$sort": { "count": -1 } },
                    { "$limit": 1 },
                ],
            }
        },
        doc! {
            "$project": {
                "avgPrice": { "$ifNull": [{ "$arrayElemAt": ["$avgStats.avgPrice", 0] }, Bson::Null] },
                "avgPoints": { "$ifNull": [{ "$arrayElemAt": ["$avgStats.avgPoints", 0] }, Bson::Null] },
                "topVariety": { "$ifNull": [{ "$arrayElemAt": ["$varietyCounts._id", 0] }, Bson::Null] },
            }
        },
    ]
}

fn number(value: Option<&Bson>) -> Option<f64> {
    match value? {
        Bson::Double(value) if value.is_finite() => Some(*value),
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        _ => None,
    }
}

/// Read the centroid out of the group stage result; `None` when either average is missing.
pub fn decode_centroid(result: Option<&Document>) -> Option<GeoPoint> {
    let result = result?;
    let lon = number(result.get("lon"))?;
    let lat = number(result.get("lat"))?;
    Some(GeoPoint::new(lon, lat))
}

/// Read the projected statistics; a missing document means no matching records.
pub fn decode_stats(result: Option<&Document>) -> StatsResult {
    let Some(result) = result else {
        return StatsResult::default();
    };
    StatsResult {
        avg_price: number(result.get("avgPrice")),
        avg_points: number(result.get("avgPoints")),
        top_variety: match result.get("topVariety") {
            Some(Bson::String(variety)) if !variety.is_empty() => Some(variety.clone()),
            _ => None,
        },
    }
}
