use crate::error::{PipelineError, Result};
use crate::loader::replace_collection;
use crate::parser::parse_document;
use crate::storage::QuestionStore;
use crate::transform::{extract_questions, TransformStats};
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub collection: String,
    #[serde(flatten)]
    pub stats: TransformStats,
    pub inserted: u64,
}

/// Stage A: parse the posts dump, keep and coerce the popular questions, and
/// replace the collection contents with them.
pub struct LoadUseCase<'a> {
    store: &'a dyn QuestionStore,
}

impl<'a> LoadUseCase<'a> {
    pub fn new(store: &'a dyn QuestionStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input_path), fields(collection = self.store.collection_name(), input = %input_path.display()))]
    pub async fn run(&self, input_path: &Path) -> Result<LoadSummary> {
        info!("Reading markup document");
        let content = tokio::fs::read_to_string(input_path)
            .await
            .map_err(|e| PipelineError::io(input_path, e))?;

        let document = parse_document(&content)?;

        info!("Extracting post data");
        let outcome = extract_questions(&document);
        info!(
            "Kept {} of {} rows ({} below threshold)",
            outcome.stats.rows_kept, outcome.stats.rows_total, outcome.stats.rows_filtered
        );

        let inserted = replace_collection(self.store, &outcome.documents).await?;

        // The index only speeds up stage B; a failure here must not undo a good load
        if let Err(e) = self.store.ensure_view_count_index().await {
            warn!("Could not create view count index: {}", e);
        }

        info!("Load completed successfully");
        Ok(LoadSummary {
            collection: self.store.collection_name().to_string(),
            stats: outcome.stats,
            inserted,
        })
    }
}
