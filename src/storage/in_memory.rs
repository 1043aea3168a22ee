use super::QuestionStore;
use crate::error::{PipelineError, Result};
use crate::query::KeywordPattern;
use crate::types::QuestionDocument;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory collection for development/testing. Keeps insertion order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    name: String,
    documents: Arc<Mutex<Vec<QuestionDocument>>>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Result<Vec<QuestionDocument>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<QuestionDocument>>> {
        self.documents
            .lock()
            .map_err(|_| PipelineError::StoreState(format!("collection '{}' lock poisoned", self.name)))
    }

    fn select<F>(&self, predicate: F) -> Result<Vec<QuestionDocument>>
    where
        F: Fn(&QuestionDocument) -> bool,
    {
        let documents = self.lock()?;
        Ok(documents.iter().filter(|d| predicate(d)).cloned().collect())
    }
}

#[async_trait]
impl QuestionStore for InMemoryStore {
    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.lock()?.len() as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut documents = self.lock()?;
        let removed = documents.len() as u64;
        documents.clear();
        debug!("Deleted {} documents from {}", removed, self.name);
        Ok(removed)
    }

    async fn insert_many(&self, batch: &[QuestionDocument]) -> Result<u64> {
        let mut documents = self.lock()?;
        documents.extend_from_slice(batch);
        debug!("Inserted {} documents into {}", batch.len(), self.name);
        Ok(batch.len() as u64)
    }

    async fn mean_view_count(&self) -> Result<f64> {
        let documents = self.lock()?;
        if documents.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = documents.iter().map(|d| d.view_count() as f64).sum();
        Ok(total / documents.len() as f64)
    }

    async fn find_view_count_above(&self, threshold: f64) -> Result<Vec<QuestionDocument>> {
        self.select(|d| d.view_count() as f64 > threshold)
    }

    async fn find_title_matching(&self, pattern: &KeywordPattern) -> Result<Vec<QuestionDocument>> {
        self.select(|d| pattern.is_match(d.title()))
    }

    async fn ensure_view_count_index(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::question_doc;

    #[tokio::test]
    async fn test_delete_all_reports_removed_count() {
        let store = InMemoryStore::new("questions");
        store
            .insert_many(&[question_doc("1", "a", 1), question_doc("2", "b", 2)])
            .await
            .unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_keeps_insertion_order() {
        let store = InMemoryStore::new("questions");
        store
            .insert_many(&[
                question_doc("1", "a", 500),
                question_doc("2", "b", 5),
                question_doc("3", "c", 900),
            ])
            .await
            .unwrap();

        let found = store.find_view_count_above(100.0).await.unwrap();
        let ids: Vec<&str> = found.iter().filter_map(|d| d.question.id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_clones_share_the_collection() {
        let store = InMemoryStore::new("questions");
        let other = store.clone();
        store.insert_many(&[question_doc("1", "a", 1)]).await.unwrap();
        assert_eq!(other.count().await.unwrap(), 1);
    }
}
