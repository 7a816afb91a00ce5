//! Askama page templates and the flat view models they render.
//!
//! Records carry optional fields; the views flatten them into display strings so the templates
//! stay free of `Option` plumbing.

use askama::Template;

use crate::catalog::{Comment, FacetLists, NormalizedForm, SearchOutcome, StatsResult, WineRecord};

const MISSING: &str = "n/a";

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn price(value: Option<f64>) -> String {
    value
        .map(|value| format!("${value:.2}"))
        .unwrap_or_else(|| MISSING.to_string())
}

fn points(value: Option<f64>) -> String {
    match value {
        Some(value) if value.fract() == 0.0 => format!("{value:.0}"),
        Some(value) => format!("{value:.1}"),
        None => MISSING.to_string(),
    }
}

/// One row of the result list.
pub struct WineRow {
    /// Hex key used in the detail link.
    pub id: String,
    /// Label title.
    pub title: String,
    /// Country.
    pub country: String,
    /// Province.
    pub province: String,
    /// Grape variety.
    pub variety: String,
    /// Producer.
    pub winery: String,
    /// Formatted score.
    pub points: String,
    /// Formatted price.
    pub price: String,
    /// Flag image id; empty when the record has none.
    pub image_id: String,
}

impl From<&WineRecord> for WineRow {
    fn from(record: &WineRecord) -> Self {
        Self {
            id: record.id.to_hex(),
            title: text(&record.title),
            country: text(&record.country),
            province: text(&record.province),
            variety: text(&record.variety),
            winery: text(&record.winery),
            points: points(record.points),
            price: price(record.price),
            image_id: record.country_image_id().unwrap_or_default(),
        }
    }
}

/// Country statistics box; missing values render as `n/a`.
pub struct StatsView {
    /// Formatted average price.
    pub avg_price: String,
    /// Average score to one decimal.
    pub avg_points: String,
    /// Most frequent variety.
    pub top_variety: String,
}

impl From<&StatsResult> for StatsView {
    fn from(stats: &StatsResult) -> Self {
        Self {
            avg_price: price(stats.avg_price),
            avg_points: stats
                .avg_points
                .map(|value| format!("{value:.1}"))
                .unwrap_or_else(|| MISSING.to_string()),
            top_variety: stats
                .top_variety
                .clone()
                .unwrap_or_else(|| MISSING.to_string()),
        }
    }
}

/// Search form with optional results.
#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchPage {
    /// Submitted form, echoed into the inputs.
    pub form: NormalizedForm,
    /// Full match count.
    pub total: u64,
    /// Rendered page of results.
    pub results: Vec<WineRow>,
    /// Country statistics, when available.
    pub stats: Option<StatsView>,
    /// `lat, lon` of the applied radius center.
    pub center: Option<String>,
    /// Country dropdown values.
    pub countries: Vec<String>,
    /// Province dropdown values.
    pub provinces: Vec<String>,
    /// False on the landing page, where no result section is shown.
    pub searched: bool,
}

impl SearchPage {
    /// Landing page: blank form and facet lists, no results.
    pub fn blank(facets: FacetLists) -> Self {
        Self {
            form: NormalizedForm::blank(),
            total: 0,
            results: Vec::new(),
            stats: None,
            center: None,
            countries: facets.countries,
            provinces: facets.provinces,
            searched: false,
        }
    }

    /// Results page for a completed search.
    pub fn with_results(form: NormalizedForm, outcome: SearchOutcome) -> Self {
        let SearchOutcome {
            total,
            results,
            center,
            stats,
            facets,
        } = outcome;
        Self {
            form,
            total,
            results: results.iter().map(WineRow::from).collect(),
            stats: stats.as_found().map(StatsView::from),
            center: center
                .found()
                .map(|point| format!("{:.4}, {:.4}", point.latitude(), point.longitude())),
            countries: facets.countries,
            provinces: facets.provinces,
            searched: true,
        }
    }
}

/// One comment on the detail page.
pub struct CommentView {
    /// Display name.
    pub author: String,
    /// Comment body.
    pub text: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            author: comment.author.clone(),
            text: comment.text.clone(),
            created_at: comment
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}

/// Wine detail page with comments and the comment form.
#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailPage {
    /// Hex key, used by the comment form action.
    pub id: String,
    /// Label title.
    pub title: String,
    /// Country.
    pub country: String,
    /// Province.
    pub province: String,
    /// Grape variety.
    pub variety: String,
    /// Producer.
    pub winery: String,
    /// Full tasting note.
    pub description: String,
    /// Formatted score.
    pub points: String,
    /// Formatted price.
    pub price: String,
    /// Flag image id; empty when the record has none.
    pub image_id: String,
    /// `lat, lon` when the record is geo-tagged.
    pub location: Option<String>,
    /// Comments, oldest first.
    pub comments: Vec<CommentView>,
}

impl From<&WineRecord> for DetailPage {
    fn from(record: &WineRecord) -> Self {
        Self {
            id: record.id.to_hex(),
            title: text(&record.title),
            country: text(&record.country),
            province: text(&record.province),
            variety: text(&record.variety),
            winery: text(&record.winery),
            description: text(&record.description),
            points: points(record.points),
            price: price(record.price),
            image_id: record.country_image_id().unwrap_or_default(),
            location: record
                .location
                .map(|point| format!("{:.4}, {:.4}", point.latitude(), point.longitude())),
            comments: record.comments.iter().map(CommentView::from).collect(),
        }
    }
}
