//! HTTP surface for the wine catalog.
//!
//! - `GET /` – Empty search form with the current facet lists.
//! - `GET /search` – Filter by text, facets and distance; renders results, country stats and
//!   facet lists.
//! - `GET /wine/:id` – Detail page with comments (400 on malformed id, 404 when missing).
//! - `POST /wine/:id/comment` – Append a comment, then redirect back to the detail page.
//! - `GET /image/:id` – Flag image from GridFS, falling back to the default asset.
//! - `GET /provinces?country=` – JSON province list for the selected country.
//! - `GET /static/*` – Files from the configured static directory.

use crate::catalog::{CatalogApi, CatalogError, CommentForm, SearchForm};
use crate::views::{DetailPage, SearchPage};
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Cache policy for stored flag images.
const ONE_WEEK_CACHE: &str = "public, max-age=604800";

/// Build the HTTP router exposing the catalog pages.
pub fn create_router<S>(service: Arc<S>, static_dir: &FsPath) -> Router
where
    S: CatalogApi + 'static,
{
    Router::new()
        .route("/", get(index::<S>))
        .route("/search", get(search::<S>))
        .route("/wine/:id", get(wine_details::<S>))
        .route("/wine/:id/comment", post(add_comment::<S>))
        .route("/image/:id", get(get_image::<S>))
        .route("/provinces", get(provinces_for_country::<S>))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn render<T: Template>(page: &T) -> Result<Html<String>, AppError> {
    Ok(Html(page.render()?))
}

/// Landing page.
async fn index<S>(State(service): State<Arc<S>>) -> Result<Html<String>, AppError>
where
    S: CatalogApi,
{
    let facets = service.facet_lists().await?;
    render(&SearchPage::blank(facets))
}

/// Run a search and render the results page.
///
/// Stats and centroid failures degrade inside the service; only count, fetch and facet
/// failures reach the client as errors.
async fn search<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<SearchForm>,
) -> Result<Html<String>, AppError>
where
    S: CatalogApi,
{
    let form = params.normalized();
    let state = form.filter_state();
    let outcome = service.search(&state).await?;
    render(&SearchPage::with_results(form, outcome))
}

async fn wine_details<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError>
where
    S: CatalogApi,
{
    let wine = service.wine_detail(&id).await?;
    render(&DetailPage::from(&wine))
}

async fn add_comment<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, AppError>
where
    S: CatalogApi,
{
    service.add_comment(&id, &form).await?;
    Ok(Redirect::to(&format!("/wine/{id}")))
}

async fn get_image<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Response, AppError>
where
    S: CatalogApi,
{
    let asset = service.load_image(&id).await?;
    let mut response = (StatusCode::OK, asset.bytes).into_response();
    let headers = response.headers_mut();
    let content_type = HeaderValue::from_str(&asset.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    if asset.cacheable {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(ONE_WEEK_CACHE));
    }
    Ok(response)
}

/// Query string of `GET /provinces`.
#[derive(Deserialize)]
struct ProvincesQuery {
    #[serde(default)]
    country: Option<String>,
}

/// Response body for `GET /provinces`.
#[derive(Serialize)]
struct ProvincesResponse {
    provinces: Vec<String>,
}

async fn provinces_for_country<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<ProvincesQuery>,
) -> Result<Json<ProvincesResponse>, AppError>
where
    S: CatalogApi,
{
    let country = query.country.unwrap_or_default();
    let provinces = service.provinces_for(country.trim()).await?;
    Ok(Json(ProvincesResponse { provinces }))
}

enum AppError {
    Catalog(CatalogError),
    Render(askama::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Catalog(error) => {
                let status = match &error {
                    CatalogError::InvalidId | CatalogError::EmptyComment => StatusCode::BAD_REQUEST,
                    CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
                    CatalogError::Store(_) | CatalogError::CommentFailed(_) => {
                        tracing::error!(error = %error, "Request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, error.to_string()).into_response()
            }
            AppError::Render(error) => {
                tracing::error!(error = %error, "Template rendering failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(inner: CatalogError) -> Self {
        Self::Catalog(inner)
    }
}

impl From<askama::Error> for AppError {
    fn from(inner: askama::Error) -> Self {
        Self::Render(inner)
    }
}
