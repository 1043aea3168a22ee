use crate::error::{PipelineError, Result};
use crate::storage::QuestionStore;
use crate::types::QuestionDocument;
use regex::{Regex, RegexBuilder};
use tracing::{info, instrument};

/// Case-insensitive union of literal keywords, matched anywhere in a title.
///
/// Keywords are escaped before joining, so they can never inject pattern syntax.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    source: String,
    regex: Regex,
}

impl KeywordPattern {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self> {
        let mut alternatives = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword: &str = keyword.as_ref();
            if !keyword.is_empty() {
                alternatives.push(regex::escape(keyword));
            }
        }

        // An empty union would match every title
        if alternatives.is_empty() {
            return Err(PipelineError::Config("keyword set is empty".to_string()));
        }

        let source = alternatives.join("|");
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| PipelineError::Config(format!("invalid keyword pattern: {}", e)))?;
        Ok(Self { source, regex })
    }

    /// Pattern text without flags, for stores that take a regex string.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, title: &str) -> bool {
        self.regex.is_match(title)
    }
}

/// Mean view count over the whole collection; `0.0` for an empty one.
pub async fn mean_view_count(store: &dyn QuestionStore) -> Result<f64> {
    let mean = store.mean_view_count().await?;
    Ok(if mean.is_finite() { mean } else { 0.0 })
}

/// Every document whose view count is strictly above the collection mean.
#[instrument(skip(store), fields(collection = store.collection_name()))]
pub async fn above_mean(store: &dyn QuestionStore) -> Result<(f64, Vec<QuestionDocument>)> {
    let mean = mean_view_count(store).await?;
    let documents = store.find_view_count_above(mean).await?;
    info!("Found {} questions with more views than the mean ({:.2})", documents.len(), mean);
    Ok((mean, documents))
}

#[instrument(skip(store, pattern), fields(collection = store.collection_name(), pattern = pattern.as_str()))]
pub async fn keyword_matches(
    store: &dyn QuestionStore,
    pattern: &KeywordPattern,
) -> Result<Vec<QuestionDocument>> {
    let documents = store.find_title_matching(pattern).await?;
    info!("Found {} questions matching the keyword set", documents.len());
    Ok(documents)
}

pub fn titles(documents: &[QuestionDocument]) -> Vec<String> {
    documents.iter().map(|d| d.title().to_string()).collect()
}
