use crate::error::Result;
use crate::query::KeywordPattern;
use crate::types::QuestionDocument;
use async_trait::async_trait;

pub mod in_memory;
pub mod mongo;

pub use in_memory::InMemoryStore;
pub use mongo::MongoStore;

/// One collection of question documents.
///
/// Result order of the find operations is whatever the store returns natively;
/// callers must not rely on any sort.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    fn collection_name(&self) -> &str;

    async fn count(&self) -> Result<u64>;

    /// Removes every document, returning how many were removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Inserts the whole batch, returning how many were inserted.
    async fn insert_many(&self, documents: &[QuestionDocument]) -> Result<u64>;

    /// Mean of `question.ViewCount` over the whole collection; `0.0` when empty.
    async fn mean_view_count(&self) -> Result<f64>;

    async fn find_view_count_above(&self, threshold: f64) -> Result<Vec<QuestionDocument>>;

    async fn find_title_matching(&self, pattern: &KeywordPattern) -> Result<Vec<QuestionDocument>>;

    async fn ensure_view_count_index(&self) -> Result<()>;
}
