//! Normalization of raw request input into named search decisions.
//!
//! Every permissive fallback lives here: unknown field selectors, malformed radii and malformed
//! coordinates all degrade into an explicit outcome instead of an error.

use mongodb::bson::{DateTime, oid::ObjectId};

use super::types::{
    CatalogError, Comment, CommentForm, FieldScope, FilterState, GeoPoint, GeoSearch, GeoSkip,
    NormalizedForm, SearchForm, SortKey, TextSearch,
};

/// Longest comment body kept, in characters.
pub const MAX_COMMENT_CHARS: usize = 2000;
/// Longest author name kept, in characters.
pub const MAX_AUTHOR_CHARS: usize = 120;
/// Author recorded when none is given.
pub const ANONYMOUS_AUTHOR: &str = "anonymous";

const DEFAULT_FIELD: &str = "all";
const DEFAULT_GEO_MODE: &str = "by_area";
const DEFAULT_RADIUS_KM: &str = "50";
const DEFAULT_SORT: &str = "points_desc";

fn trimmed(value: Option<&String>) -> String {
    value.map(|raw| raw.trim().to_string()).unwrap_or_default()
}

/// Default applies only to a missing or empty parameter; a whitespace value trims to empty.
fn trimmed_or(value: Option<&String>, fallback: &str) -> String {
    match value {
        Some(raw) if !raw.is_empty() => raw.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl SearchForm {
    /// Trim every parameter and apply the form defaults.
    pub fn normalized(&self) -> NormalizedForm {
        NormalizedForm {
            q: trimmed(self.q.as_ref()),
            field: trimmed_or(self.field.as_ref(), DEFAULT_FIELD),
            use_text: self.text.as_deref() == Some("1"),
            country: trimmed(self.country.as_ref()),
            province: trimmed(self.province.as_ref()),
            geo_mode: trimmed_or(self.geo_mode.as_ref(), DEFAULT_GEO_MODE),
            lat: trimmed(self.lat.as_ref()),
            lon: trimmed(self.lon.as_ref()),
            radius: trimmed_or(self.radius.as_ref(), DEFAULT_RADIUS_KM),
            sort_by: trimmed_or(self.sort_by.as_ref(), DEFAULT_SORT),
        }
    }
}

impl NormalizedForm {
    /// Blank form shown on the landing page.
    pub fn blank() -> Self {
        SearchForm::default().normalized()
    }

    /// Derive the search decisions for this form.
    pub fn filter_state(&self) -> FilterState {
        let country = non_empty(&self.country);
        let province = non_empty(&self.province);
        let geo = geo_search(
            &self.geo_mode,
            km_to_meters(&self.radius),
            country.as_deref(),
            province.as_deref(),
            &self.lat,
            &self.lon,
        );
        FilterState {
            text: text_search(&self.q, &self.field, self.use_text),
            country,
            province,
            geo,
            sort: SortKey::parse(&self.sort_by),
        }
    }
}

/// Decide how the free-text query is applied.
pub fn text_search(query: &str, field: &str, use_text_index: bool) -> TextSearch {
    if query.is_empty() {
        return TextSearch::None;
    }
    if use_text_index {
        return TextSearch::FullText(query.to_string());
    }
    match FieldScope::parse(field) {
        Some(scope) => TextSearch::Pattern {
            scope,
            query: query.to_string(),
        },
        None => TextSearch::UnknownField {
            field: field.to_string(),
        },
    }
}

/// Convert a kilometer string into meters; anything unusable becomes `0.0`.
pub fn km_to_meters(km: &str) -> f64 {
    match km.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value * 1000.0,
        _ => 0.0,
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Decide whether and how a radius filter is applied.
pub fn geo_search(
    mode: &str,
    radius_m: f64,
    country: Option<&str>,
    province: Option<&str>,
    lat: &str,
    lon: &str,
) -> GeoSearch {
    match mode {
        "by_area" | "by_coords" if radius_m <= 0.0 => GeoSearch::Off(GeoSkip::NoRadius),
        "by_area" => {
            if country.is_none() && province.is_none() {
                GeoSearch::Off(GeoSkip::NoArea)
            } else {
                GeoSearch::ByArea {
                    country: country.map(str::to_string),
                    province: province.map(str::to_string),
                    radius_m,
                }
            }
        }
        "by_coords" => match (parse_coordinate(lat), parse_coordinate(lon)) {
            (Some(latitude), Some(longitude)) => GeoSearch::ByCoords {
                center: GeoPoint::new(longitude, latitude),
                radius_m,
            },
            _ => GeoSearch::Off(GeoSkip::MalformedCoords),
        },
        _ => GeoSearch::Off(GeoSkip::UnknownMode),
    }
}

/// Parse a record or blob identifier.
pub fn parse_record_id(raw: &str) -> Result<ObjectId, CatalogError> {
    ObjectId::parse_str(raw).map_err(|_| CatalogError::InvalidId)
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Validate a comment form and build the comment to append.
pub fn prepare_comment(form: &CommentForm) -> Result<Comment, CatalogError> {
    let text = truncate_chars(form.text.as_deref().unwrap_or_default().trim(), MAX_COMMENT_CHARS);
    if text.is_empty() {
        return Err(CatalogError::EmptyComment);
    }

    let author = truncate_chars(
        form.author.as_deref().unwrap_or_default().trim(),
        MAX_AUTHOR_CHARS,
    );
    let author = if author.is_empty() {
        ANONYMOUS_AUTHOR.to_string()
    } else {
        author
    };

    Ok(Comment {
        id: ObjectId::new(),
        text,
        author,
        created_at: DateTime::now(),
    })
}
