//! Catalog service coordinating filter construction, geo resolution, and MongoDB reads/writes.

use crate::{
    catalog::{
        sanitize::{parse_record_id, prepare_comment},
        types::{
            CatalogError, CommentForm, FacetLists, FilterState, GeoPoint, GeoSearch, ImageAsset,
            Lookup, SearchOutcome, StatsResult, WineRecord,
        },
    },
    config::Config,
    mongo::{
        self, CatalogStore, StoreError, WineStore,
        filters::{facet_filter, geo_within_clause},
    },
};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::path::PathBuf;

/// Hard cap on rows returned by a search.
pub const RESULT_LIMIT: i64 = 50;
/// Cap for the country and province dropdowns.
pub const FACET_LIST_CAP: usize = 250;
/// Cap for the country-scoped province list.
pub const PROVINCE_LIST_CAP: usize = 300;

/// Abstraction over the catalog used by the HTTP surface.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Distinct countries and provinces across the whole collection.
    async fn facet_lists(&self) -> Result<FacetLists, CatalogError>;

    /// Provinces observed for `country`, or for every country when blank.
    async fn provinces_for(&self, country: &str) -> Result<Vec<String>, CatalogError>;

    /// Run a search: count, first page, optional stats and fresh facet lists.
    async fn search(&self, state: &FilterState) -> Result<SearchOutcome, CatalogError>;

    /// Full record including comments.
    async fn wine_detail(&self, id: &str) -> Result<WineRecord, CatalogError>;

    /// Validate and append a comment to the record.
    async fn add_comment(&self, id: &str, form: &CommentForm) -> Result<(), CatalogError>;

    /// Flag image by id, falling back to the default asset.
    async fn load_image(&self, id: &str) -> Result<ImageAsset, CatalogError>;
}

/// Catalog backed by a document store, MongoDB by default.
///
/// Build once at startup and share through an `Arc`; the store's client pools connections for
/// all concurrent requests.
pub struct CatalogService<S = WineStore> {
    store: S,
    default_image: PathBuf,
}

impl CatalogService<WineStore> {
    /// Connect to the configured database.
    pub async fn connect(config: &Config) -> Result<Self, CatalogError> {
        let store = WineStore::connect(config).await?;
        Ok(Self::new(store, config.default_image_path()))
    }
}

impl<S: CatalogStore> CatalogService<S> {
    /// Wrap a store; `default_image` is served when a flag image cannot be resolved.
    pub fn new(store: S, default_image: PathBuf) -> Self {
        Self {
            store,
            default_image,
        }
    }

    /// Center of the records in an area, or `Absent` when none carry a point.
    pub async fn centroid(
        &self,
        country: Option<&str>,
        province: Option<&str>,
    ) -> Lookup<GeoPoint> {
        let pipeline = mongo::centroid_pipeline(country, province);
        match self.store.aggregate(pipeline).await {
            Ok(results) => match mongo::decode_centroid(results.first()) {
                Some(center) => Lookup::Found(center),
                None => Lookup::Absent,
            },
            Err(error) => {
                tracing::warn!(
                    country = country.unwrap_or_default(),
                    province = province.unwrap_or_default(),
                    error = %error,
                    "Centroid calculation failed"
                );
                Lookup::Failed
            }
        }
    }

    /// Average price, average points and top variety for a country.
    pub async fn country_stats(&self, country: &str) -> Lookup<StatsResult> {
        if country.is_empty() {
            return Lookup::Absent;
        }
        match self.store.aggregate(mongo::country_stats_pipeline(country)).await {
            Ok(results) => Lookup::Found(mongo::decode_stats(results.first())),
            Err(error) => {
                tracing::warn!(country, error = %error, "Country stats aggregation failed");
                Lookup::Failed
            }
        }
    }

    async fn resolve_center(&self, geo: &GeoSearch) -> Lookup<GeoPoint> {
        match geo {
            GeoSearch::ByArea {
                country, province, ..
            } => self.centroid(country.as_deref(), province.as_deref()).await,
            GeoSearch::ByCoords { center, .. } => Lookup::Found(*center),
            GeoSearch::Off(reason) => {
                tracing::debug!(?reason, "Geo filter disabled");
                Lookup::Absent
            }
        }
    }

    async fn facet_values(
        &self,
        field: &str,
        filter: Document,
        cap: usize,
    ) -> Result<Vec<String>, StoreError> {
        let values = self.store.distinct_values(field, filter).await?;
        Ok(tidy_facet_values(values, cap))
    }

    async fn default_image(&self) -> Result<ImageAsset, CatalogError> {
        match tokio::fs::read(&self.default_image).await {
            Ok(bytes) => Ok(ImageAsset {
                bytes,
                content_type: mime::IMAGE_PNG.to_string(),
                cacheable: false,
            }),
            Err(error) => {
                tracing::warn!(
                    path = %self.default_image.display(),
                    error = %error,
                    "Default image unavailable"
                );
                Err(CatalogError::NotFound("Image"))
            }
        }
    }

    async fn stored_image(&self, id: &str) -> Option<ImageAsset> {
        let id = parse_record_id(id).ok()?;
        match self.store.load_blob(id).await {
            Ok(Some(blob)) => Some(ImageAsset {
                content_type: resolve_content_type(
                    blob.content_type.as_deref(),
                    blob.filename.as_deref(),
                ),
                bytes: blob.bytes,
                cacheable: true,
            }),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(id = %id, error = %error, "Image lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl<S: CatalogStore> CatalogApi for CatalogService<S> {
    async fn facet_lists(&self) -> Result<FacetLists, CatalogError> {
        Ok(FacetLists {
            countries: self
                .facet_values("country", Document::new(), FACET_LIST_CAP)
                .await?,
            provinces: self
                .facet_values("province", Document::new(), FACET_LIST_CAP)
                .await?,
        })
    }

    async fn provinces_for(&self, country: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .facet_values(
                "province",
                facet_filter("country", country),
                PROVINCE_LIST_CAP,
            )
            .await?)
    }

    async fn search(&self, state: &FilterState) -> Result<SearchOutcome, CatalogError> {
        let mut clauses = mongo::build_search_filter(state);
        let center = self.resolve_center(&state.geo).await;
        if let (Some(center), Some(radius_m)) = (center.as_found(), state.geo.radius_meters()) {
            clauses.push(geo_within_clause(center, radius_m));
        }
        let query = mongo::combine(clauses);
        tracing::debug!(filter = %query, sort = ?state.sort, "Executing search");

        let total = self.store.count(query.clone()).await?;
        let results = self
            .store
            .find_page(
                query,
                mongo::list_projection(),
                mongo::sort_document(state.sort),
                RESULT_LIMIT,
            )
            .await?;
        let stats = match state.country.as_deref() {
            Some(country) => self.country_stats(country).await,
            None => Lookup::Absent,
        };
        let facets = self.facet_lists().await?;

        tracing::info!(
            total,
            returned = results.len(),
            country = state.country.as_deref().unwrap_or_default(),
            province = state.province.as_deref().unwrap_or_default(),
            "Search completed"
        );

        Ok(SearchOutcome {
            total,
            results,
            center,
            stats,
            facets,
        })
    }

    async fn wine_detail(&self, id: &str) -> Result<WineRecord, CatalogError> {
        let id = parse_record_id(id)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound("Wine"))
    }

    async fn add_comment(&self, id: &str, form: &CommentForm) -> Result<(), CatalogError> {
        let comment = prepare_comment(form)?;
        let id = parse_record_id(id)?;
        let matched = self.store.push_comment(id, &comment).await.map_err(|error| {
            tracing::error!(id = %id, error = ?error, "Error adding comment");
            CatalogError::CommentFailed(error)
        })?;
        if matched == 0 {
            return Err(CatalogError::NotFound("Wine"));
        }
        tracing::info!(id = %id, comment = %comment.id, author = %comment.author, "Comment added");
        Ok(())
    }

    async fn load_image(&self, id: &str) -> Result<ImageAsset, CatalogError> {
        match self.stored_image(id).await {
            Some(asset) => Ok(asset),
            None => self.default_image().await,
        }
    }
}

/// Keep non-empty string values, sorted and deduplicated, at most `cap` of them.
pub fn tidy_facet_values(values: Vec<Bson>, cap: usize) -> Vec<String> {
    let mut values: Vec<String> = values
        .into_iter()
        .filter_map(|value| match value {
            Bson::String(value) if !value.is_empty() => Some(value),
            _ => None,
        })
        .collect();
    values.sort();
    values.dedup();
    values.truncate(cap);
    values
}

/// Pick the MIME type for a stored blob.
pub fn resolve_content_type(stored: Option<&str>, filename: Option<&str>) -> String {
    if let Some(stored) = stored.map(str::trim).filter(|value| !value.is_empty()) {
        return stored.to_string();
    }
    let extension = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension.to_ascii_lowercase());
    let mime = match extension.as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    mime.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Comment, SearchForm};
    use crate::mongo::StoredBlob;
    use mongodb::bson::{doc, oid::ObjectId};
    use std::{collections::HashMap, io, sync::Mutex};

    #[derive(Default)]
    struct FakeStore {
        wines: Vec<WineRecord>,
        blobs: HashMap<ObjectId, StoredBlob>,
        centroid: Option<Document>,
        stats: Option<Document>,
        fail_aggregate: bool,
        fail_push: bool,
        filters: Mutex<Vec<Document>>,
        limits: Mutex<Vec<i64>>,
        pushed: Mutex<Vec<(ObjectId, Comment)>>,
    }

    fn offline() -> StoreError {
        StoreError::Blob(io::Error::other("store offline"))
    }

    #[async_trait]
    impl CatalogStore for FakeStore {
        async fn count(&self, filter: Document) -> Result<u64, StoreError> {
            self.filters.lock().unwrap().push(filter);
            Ok(self.wines.len() as u64)
        }

        async fn find_page(
            &self,
            _filter: Document,
            _projection: Document,
            _sort: Document,
            limit: i64,
        ) -> Result<Vec<WineRecord>, StoreError> {
            self.limits.lock().unwrap().push(limit);
            Ok(self.wines.iter().take(limit as usize).cloned().collect())
        }

        async fn find_by_id(&self, id: ObjectId) -> Result<Option<WineRecord>, StoreError> {
            Ok(self.wines.iter().find(|wine| wine.id == id).cloned())
        }

        async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError> {
            if self.fail_aggregate {
                return Err(offline());
            }
            let is_stats = pipeline.iter().any(|stage| stage.contains_key("$facet"));
            let output = if is_stats { &self.stats } else { &self.centroid };
            Ok(output.iter().cloned().collect())
        }

        async fn distinct_values(
            &self,
            field: &str,
            _filter: Document,
        ) -> Result<Vec<Bson>, StoreError> {
            Ok(self
                .wines
                .iter()
                .filter_map(|wine| match field {
                    "country" => wine.country.clone(),
                    _ => wine.province.clone(),
                })
                .map(Bson::String)
                .collect())
        }

        async fn push_comment(&self, id: ObjectId, comment: &Comment) -> Result<u64, StoreError> {
            if self.fail_push {
                return Err(offline());
            }
            if !self.wines.iter().any(|wine| wine.id == id) {
                return Ok(0);
            }
            self.pushed.lock().unwrap().push((id, comment.clone()));
            Ok(1)
        }

        async fn load_blob(&self, id: ObjectId) -> Result<Option<StoredBlob>, StoreError> {
            Ok(self.blobs.get(&id).cloned())
        }
    }

    fn catalog(store: FakeStore) -> CatalogService<FakeStore> {
        let default_image = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("static")
            .join("default.png");
        CatalogService::new(store, default_image)
    }

    fn wine(n: usize, country: &str, province: &str) -> WineRecord {
        WineRecord {
            id: ObjectId::new(),
            title: Some(format!("Wine {n}")),
            country: Some(country.into()),
            province: Some(province.into()),
            variety: Some("Nebbiolo".into()),
            winery: None,
            description: None,
            points: Some(90.0),
            price: Some(30.0),
            location: None,
            country_image: None,
            comments: Vec::new(),
        }
    }

    fn state(configure: impl FnOnce(&mut SearchForm)) -> FilterState {
        let mut form = SearchForm::default();
        configure(&mut form);
        form.normalized().filter_state()
    }

    fn has_geo_clause(filter: &Document) -> bool {
        filter.to_string().contains("$geoWithin")
    }

    #[tokio::test]
    async fn search_total_counts_every_match_beyond_the_page() {
        let catalog = catalog(FakeStore {
            wines: (0..60).map(|n| wine(n, "Italy", "Piedmont")).collect(),
            ..Default::default()
        });
        let outcome = catalog.search(&state(|_| {})).await.expect("search");

        assert_eq!(outcome.total, 60);
        assert_eq!(outcome.results.len(), 50);
        assert_eq!(*catalog.store.limits.lock().unwrap(), vec![RESULT_LIMIT]);
        assert_eq!(outcome.stats, Lookup::Absent);
        assert_eq!(outcome.facets.countries, vec!["Italy"]);
        assert_eq!(outcome.facets.provinces, vec!["Piedmont"]);
    }

    #[tokio::test]
    async fn coordinate_search_appends_radius_clause() {
        let catalog = catalog(FakeStore::default());
        let outcome = catalog
            .search(&state(|form| {
                form.geo_mode = Some("by_coords".into());
                form.lat = Some("45.5".into());
                form.lon = Some("9.25".into());
                form.radius = Some("10".into());
            }))
            .await
            .expect("search");

        assert_eq!(outcome.center, Lookup::Found(GeoPoint::new(9.25, 45.5)));
        assert!(has_geo_clause(&catalog.store.filters.lock().unwrap()[0]));
    }

    #[tokio::test]
    async fn area_search_applies_radius_only_when_centroid_found() {
        let by_area = state(|form| {
            form.province = Some("Piedmont".into());
            form.radius = Some("40".into());
        });

        let located = catalog(FakeStore {
            centroid: Some(doc! { "_id": Bson::Null, "lon": 8.0, "lat": 44.7 }),
            ..Default::default()
        });
        let outcome = located.search(&by_area).await.expect("search");
        assert_eq!(outcome.center, Lookup::Found(GeoPoint::new(8.0, 44.7)));
        assert!(has_geo_clause(&located.store.filters.lock().unwrap()[0]));

        let unlocated = catalog(FakeStore::default());
        let outcome = unlocated.search(&by_area).await.expect("search");
        assert_eq!(outcome.center, Lookup::Absent);
        assert!(!has_geo_clause(&unlocated.store.filters.lock().unwrap()[0]));
    }

    #[tokio::test]
    async fn zero_radius_skips_centroid_and_clause() {
        let catalog = catalog(FakeStore {
            centroid: Some(doc! { "_id": Bson::Null, "lon": 8.0, "lat": 44.7 }),
            ..Default::default()
        });
        let outcome = catalog
            .search(&state(|form| {
                form.country = Some("Italy".into());
                form.radius = Some("0".into());
            }))
            .await
            .expect("search");

        assert_eq!(outcome.center, Lookup::Absent);
        assert!(!has_geo_clause(&catalog.store.filters.lock().unwrap()[0]));
    }

    #[tokio::test]
    async fn failed_aggregations_degrade_without_failing_search() {
        let catalog = catalog(FakeStore {
            wines: vec![wine(0, "Italy", "Piedmont")],
            fail_aggregate: true,
            ..Default::default()
        });
        let outcome = catalog
            .search(&state(|form| {
                form.country = Some("Italy".into());
                form.radius = Some("25".into());
            }))
            .await
            .expect("search still succeeds");

        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.center, Lookup::Failed);
        assert_eq!(outcome.stats, Lookup::Failed);
        assert!(!has_geo_clause(&catalog.store.filters.lock().unwrap()[0]));
    }

    #[tokio::test]
    async fn country_stats_decode_and_short_circuit() {
        let with_stats = catalog(FakeStore {
            stats: Some(doc! { "avgPrice": 31.5, "avgPoints": 88.0, "topVariety": "Nebbiolo" }),
            ..Default::default()
        });
        assert_eq!(
            with_stats.country_stats("Italy").await,
            Lookup::Found(StatsResult {
                avg_price: Some(31.5),
                avg_points: Some(88.0),
                top_variety: Some("Nebbiolo".into()),
            })
        );
        assert_eq!(with_stats.country_stats("").await, Lookup::Absent);

        let empty = catalog(FakeStore::default());
        assert_eq!(
            empty.country_stats("Atlantis").await,
            Lookup::Found(StatsResult::default())
        );
    }

    #[tokio::test]
    async fn wine_detail_distinguishes_bad_id_from_missing_record() {
        let existing = wine(0, "Spain", "Rioja");
        let id = existing.id;
        let catalog = catalog(FakeStore {
            wines: vec![existing],
            ..Default::default()
        });

        assert!(matches!(
            catalog.wine_detail("zzz").await,
            Err(CatalogError::InvalidId)
        ));
        assert!(matches!(
            catalog.wine_detail(&ObjectId::new().to_hex()).await,
            Err(CatalogError::NotFound("Wine"))
        ));
        let found = catalog.wine_detail(&id.to_hex()).await.expect("detail");
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn add_comment_reports_unmatched_record_as_not_found() {
        let existing = wine(0, "Italy", "Piedmont");
        let id = existing.id;
        let catalog = catalog(FakeStore {
            wines: vec![existing],
            ..Default::default()
        });
        let form = CommentForm {
            text: Some("  Tar and roses ".into()),
            author: None,
        };

        assert!(matches!(
            catalog.add_comment(&ObjectId::new().to_hex(), &form).await,
            Err(CatalogError::NotFound("Wine"))
        ));
        catalog
            .add_comment(&id.to_hex(), &form)
            .await
            .expect("comment appended");

        let pushed = catalog.store.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, id);
        assert_eq!(pushed[0].1.text, "Tar and roses");
        assert_eq!(pushed[0].1.author, "anonymous");
    }

    #[tokio::test]
    async fn add_comment_validates_before_writing() {
        let existing = wine(0, "Italy", "Piedmont");
        let id = existing.id.to_hex();
        let catalog = catalog(FakeStore {
            wines: vec![existing],
            ..Default::default()
        });
        let blank = CommentForm {
            text: Some("   ".into()),
            author: Some("Ana".into()),
        };
        let valid = CommentForm {
            text: Some("Lovely".into()),
            author: None,
        };

        assert!(matches!(
            catalog.add_comment(&id, &blank).await,
            Err(CatalogError::EmptyComment)
        ));
        assert!(matches!(
            catalog.add_comment("not-an-id", &valid).await,
            Err(CatalogError::InvalidId)
        ));
        assert!(catalog.store.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_comment_store_failure_is_reported() {
        let existing = wine(0, "Italy", "Piedmont");
        let id = existing.id.to_hex();
        let catalog = catalog(FakeStore {
            wines: vec![existing],
            fail_push: true,
            ..Default::default()
        });
        let form = CommentForm {
            text: Some("Lovely".into()),
            author: None,
        };

        assert!(matches!(
            catalog.add_comment(&id, &form).await,
            Err(CatalogError::CommentFailed(_))
        ));
    }

    #[tokio::test]
    async fn load_image_serves_stored_blob_with_cache() {
        let id = ObjectId::new();
        let blob = StoredBlob {
            filename: Some("it.gif".into()),
            content_type: None,
            bytes: b"GIF89a".to_vec(),
        };
        let catalog = catalog(FakeStore {
            blobs: HashMap::from([(id, blob)]),
            ..Default::default()
        });

        assert_eq!(
            catalog.load_image(&id.to_hex()).await.expect("image"),
            ImageAsset {
                bytes: b"GIF89a".to_vec(),
                content_type: "image/gif".into(),
                cacheable: true,
            }
        );
    }

    #[tokio::test]
    async fn load_image_falls_back_to_default_asset() {
        let catalog = catalog(FakeStore::default());
        for id in ["not-an-id".to_string(), ObjectId::new().to_hex()] {
            let asset = catalog.load_image(&id).await.expect("default asset");
            assert_eq!(asset.content_type, "image/png");
            assert!(!asset.cacheable);
            assert!(asset.bytes.starts_with(b"\x89PNG"));
        }
    }

    #[tokio::test]
    async fn missing_default_asset_is_not_found() {
        let catalog = CatalogService::new(
            FakeStore::default(),
            PathBuf::from("missing/default.png"),
        );
        assert!(matches!(
            catalog.load_image("not-an-id").await,
            Err(CatalogError::NotFound("Image"))
        ));
    }

    #[test]
    fn tidy_facet_values_sorts_dedups_and_caps() {
        let values = vec![
            Bson::String("Spain".into()),
            Bson::String("".into()),
            Bson::Null,
            Bson::String("Argentina".into()),
            Bson::String("Spain".into()),
            Bson::Int32(4),
            Bson::String("Chile".into()),
        ];
        assert_eq!(
            tidy_facet_values(values.clone(), 10),
            vec!["Argentina", "Chile", "Spain"]
        );
        assert_eq!(tidy_facet_values(values, 2), vec!["Argentina", "Chile"]);
    }

    #[test]
    fn stored_content_type_wins() {
        assert_eq!(
            resolve_content_type(Some("image/webp"), Some("flag.png")),
            "image/webp"
        );
    }

    #[test]
    fn content_type_inferred_from_extension() {
        assert_eq!(resolve_content_type(None, Some("it.PNG")), "image/png");
        assert_eq!(resolve_content_type(Some(""), Some("fr.jpeg")), "image/jpeg");
        assert_eq!(resolve_content_type(None, Some("es.jpg")), "image/jpeg");
        assert_eq!(resolve_content_type(None, Some("de.gif")), "image/gif");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(
            resolve_content_type(None, Some("flag.svg")),
            "application/octet-stream"
        );
        assert_eq!(
            resolve_content_type(None, Some("flag")),
            "application/octet-stream"
        );
        assert_eq!(resolve_content_type(None, None), "application/octet-stream");
    }
}
