use crate::constants::{ABOVE_MEAN_REPORT_FILE, KEYWORD_REPORT_FILE, REPORT_KEYWORDS};
use crate::error::{PipelineError, Result};
use crate::query::{above_mean, keyword_matches, titles, KeywordPattern};
use crate::report::render_report;
use crate::storage::QuestionStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub mean_view_count: f64,
    pub above_mean: usize,
    pub keyword_matches: usize,
    pub reports: Vec<PathBuf>,
}

/// Stage B: query the loaded collection and render both reports.
pub struct ReportUseCase<'a> {
    store: &'a dyn QuestionStore,
    pattern: KeywordPattern,
}

impl<'a> ReportUseCase<'a> {
    pub fn new(store: &'a dyn QuestionStore, pattern: KeywordPattern) -> Self {
        Self { store, pattern }
    }

    /// Uses the fixed keyword set.
    pub fn with_default_keywords(store: &'a dyn QuestionStore) -> Result<Self> {
        Ok(Self::new(store, KeywordPattern::new(REPORT_KEYWORDS)?))
    }

    #[instrument(skip(self, output_dir), fields(collection = self.store.collection_name(), output_dir = %output_dir.display()))]
    pub async fn run(&self, output_dir: &Path) -> Result<ReportSummary> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| PipelineError::io(output_dir, e))?;

        let (mean, popular) = above_mean(self.store).await?;
        let above_mean_path = output_dir.join(ABOVE_MEAN_REPORT_FILE);
        render_report(&above_mean_path, &titles(&popular))?;

        let matching = keyword_matches(self.store, &self.pattern).await?;
        let keyword_path = output_dir.join(KEYWORD_REPORT_FILE);
        render_report(&keyword_path, &titles(&matching))?;

        info!("Reports generated");
        Ok(ReportSummary {
            mean_view_count: mean,
            above_mean: popular.len(),
            keyword_matches: matching.len(),
            reports: vec![above_mean_path, keyword_path],
        })
    }
}
