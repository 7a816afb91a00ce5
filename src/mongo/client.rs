//! Driver wrapper for the wine collection and the flag image bucket.

use crate::catalog::{Comment, WineRecord};
use crate::config::Config;
use crate::mongo::types::{StoreError, StoredBlob};
use async_trait::async_trait;
use futures_util::{TryStreamExt, io::AsyncReadExt};
use mongodb::{
    Client, Collection,
    bson::{Bson, Document, doc, oid::ObjectId, to_bson},
    gridfs::GridFsBucket,
    options::GridFsBucketOptions,
};

/// Store operations the catalog service is built on.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Count every record matching `filter`.
    async fn count(&self, filter: Document) -> Result<u64, StoreError>;

    /// Fetch one sorted, projected page of records.
    async fn find_page(
        &self,
        filter: Document,
        projection: Document,
        sort: Document,
        limit: i64,
    ) -> Result<Vec<WineRecord>, StoreError>;

    /// Full record by key.
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<WineRecord>, StoreError>;

    /// Run an aggregation and collect every output document.
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError>;

    /// Distinct values of `field` across records matching `filter`.
    async fn distinct_values(
        &self,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>, StoreError>;

    /// Append a comment with a single `$push`; returns how many records matched the id.
    async fn push_comment(&self, id: ObjectId, comment: &Comment) -> Result<u64, StoreError>;

    /// Load a flag image and the metadata needed to label it.
    async fn load_blob(&self, id: ObjectId) -> Result<Option<StoredBlob>, StoreError>;
}

/// Handle to the catalog database.
///
/// The driver pools connections internally, so one store is built at startup and shared by
/// every request.
pub struct WineStore {
    wines: Collection<Document>,
    files: Collection<Document>,
    bucket: GridFsBucket,
}

impl WineStore {
    /// Connect using the configured URI and resolve the collection and bucket handles.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(&config.mongo_uri).await?;
        let database = client.database(&config.database_name);
        let bucket = database.gridfs_bucket(
            GridFsBucketOptions::builder()
                .bucket_name(config.gridfs_bucket.clone())
                .build(),
        );
        tracing::debug!(
            database = %config.database_name,
            collection = %config.collection_name,
            bucket = %config.gridfs_bucket,
            "Initialized MongoDB client"
        );

        Ok(Self {
            wines: database.collection(&config.collection_name),
            files: database.collection(&format!("{}.files", config.gridfs_bucket)),
            bucket,
        })
    }
}

#[async_trait]
impl CatalogStore for WineStore {
    async fn count(&self, filter: Document) -> Result<u64, StoreError> {
        Ok(self.wines.count_documents(filter).await?)
    }

    async fn find_page(
        &self,
        filter: Document,
        projection: Document,
        sort: Document,
        limit: i64,
    ) -> Result<Vec<WineRecord>, StoreError> {
        let cursor = self
            .wines
            .clone_with_type::<WineRecord>()
            .find(filter)
            .projection(projection)
            .sort(sort)
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<WineRecord>, StoreError> {
        Ok(self
            .wines
            .clone_with_type::<WineRecord>()
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        let cursor = self.wines.aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn distinct_values(
        &self,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>, StoreError> {
        Ok(self.wines.distinct(field, filter).await?)
    }

    async fn push_comment(&self, id: ObjectId, comment: &Comment) -> Result<u64, StoreError> {
        let comment = to_bson(comment)?;
        let result = self
            .wines
            .update_one(doc! { "_id": id }, doc! { "$push": { "comments": comment } })
            .await?;
        tracing::debug!(
            id = %id,
            matched = result.matched_count,
            modified = result.modified_count,
            "Comment push applied"
        );
        Ok(result.matched_count)
    }

    async fn load_blob(&self, id: ObjectId) -> Result<Option<StoredBlob>, StoreError> {
        let Some(file) = self.files.find_one(doc! { "_id": id }).await? else {
            return Ok(None);
        };

        let mut stream = self.bucket.open_download_stream(Bson::ObjectId(id)).await?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await?;

        Ok(Some(StoredBlob {
            filename: file.get_str("filename").ok().map(str::to_string),
            content_type: stored_content_type(&file),
            bytes,
        }))
    }
}

/// Content type recorded at upload time, either top-level or inside `metadata`.
fn stored_content_type(file: &Document) -> Option<String> {
    file.get_str("contentType")
        .ok()
        .or_else(|| {
            file.get_document("metadata")
                .ok()
                .and_then(|metadata| metadata.get_str("contentType").ok())
        })
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
