use super::QuestionStore;
use crate::config::Config;
use crate::constants::{TITLE_PATH, VIEW_COUNT_PATH};
use crate::error::Result;
use crate::query::KeywordPattern;
use crate::types::QuestionDocument;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

const APP_NAME: &str = "posts_pipeline";
const VIEW_COUNT_INDEX: &str = "question_view_count";

/// MongoDB-backed collection. One instance per stage; call [`MongoStore::close`]
/// on every exit path.
pub struct MongoStore {
    client: Client,
    collection: Collection<QuestionDocument>,
    name: String,
}

impl MongoStore {
    /// Connects and pings, so an unreachable server fails here rather than mid-stage.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to MongoDB (database={}, collection={})", config.database, config.collection);
        let mut options = ClientOptions::parse(&config.mongodb_uri).await?;
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }, None).await?;
        info!("Connection established");

        Ok(Self {
            collection: database.collection::<QuestionDocument>(&config.collection),
            name: config.collection.clone(),
            client,
        })
    }

    pub async fn close(self) {
        let MongoStore { client, collection, .. } = self;
        drop(collection);
        client.shutdown().await;
        info!("Disconnected from MongoDB");
    }
}

#[async_trait]
impl QuestionStore for MongoStore {
    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}, None).await?)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = self.collection.delete_many(doc! {}, None).await?;
        debug!("Deleted {} documents from {}", result.deleted_count, self.name);
        Ok(result.deleted_count)
    }

    async fn insert_many(&self, documents: &[QuestionDocument]) -> Result<u64> {
        // The server rejects an empty batch
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.collection.insert_many(documents, None).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn mean_view_count(&self) -> Result<f64> {
        let pipeline = vec![doc! {
            "$group": { "_id": Bson::Null, "mean": { "$avg": format!("${}", VIEW_COUNT_PATH) } }
        }];
        let mut cursor = self.collection.aggregate(pipeline, None).await?;
        let mean = cursor
            .try_next()
            .await?
            .and_then(|group| group.get("mean").and_then(Bson::as_f64))
            .unwrap_or(0.0);
        Ok(mean)
    }

    async fn find_view_count_above(&self, threshold: f64) -> Result<Vec<QuestionDocument>> {
        let mut filter = Document::new();
        filter.insert(VIEW_COUNT_PATH, doc! { "$gt": threshold });
        let cursor = self.collection.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_title_matching(&self, pattern: &KeywordPattern) -> Result<Vec<QuestionDocument>> {
        let mut filter = Document::new();
        filter.insert(TITLE_PATH, doc! { "$regex": pattern.as_str(), "$options": "i" });
        let cursor = self.collection.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ensure_view_count_index(&self) -> Result<()> {
        let mut keys = Document::new();
        keys.insert(VIEW_COUNT_PATH, 1);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().name(VIEW_COUNT_INDEX.to_string()).build())
            .build();
        self.collection.create_index(index, None).await?;
        debug!("Ensured index {} on {}", VIEW_COUNT_INDEX, self.name);
        Ok(())
    }
}
