use crate::error::Result;
use crate::storage::QuestionStore;
use crate::types::QuestionDocument;
use tracing::{info, instrument};

/// Replaces the whole collection with `documents` and returns how many were inserted.
///
/// Delete runs first; if it fails nothing is inserted. If the insert fails the
/// collection is left empty until the next successful run.
#[instrument(skip(store, documents), fields(collection = store.collection_name(), batch = documents.len()))]
pub async fn replace_collection(
    store: &dyn QuestionStore,
    documents: &[QuestionDocument],
) -> Result<u64> {
    info!("Deleting previous contents");
    let removed = store.delete_all().await?;
    info!("Removed {} existing documents", removed);

    info!("Inserting new documents");
    let inserted = store.insert_many(documents).await?;
    info!("Documents inserted: {}", inserted);
    Ok(inserted)
}
