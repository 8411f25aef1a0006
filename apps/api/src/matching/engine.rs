//! Query API over one catalog, one encoder and one index.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::matching::catalog::{Catalog, JobRecord};
use crate::matching::encoder::Encoder;
use crate::matching::error::MatchError;
use crate::matching::index::{IndexManager, IndexStatus};
use crate::matching::location::LocationFilter;
use crate::matching::strategy::{
    KeywordOverlapStrategy, MatchResult, RankingMode, RankingStrategy, SearchRequest,
    SemanticSimilarityStrategy,
};

pub struct MatchEngine {
    catalog: Arc<Catalog>,
    index: Arc<IndexManager>,
    keyword: KeywordOverlapStrategy,
    semantic: SemanticSimilarityStrategy,
}

impl MatchEngine {
    pub fn new(
        catalog: Catalog,
        encoder: Arc<dyn Encoder>,
        cache_dir: Option<PathBuf>,
        threshold: f32,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let index = Arc::new(IndexManager::new(encoder, cache_dir));
        Self {
            keyword: KeywordOverlapStrategy::new(Arc::clone(&catalog)),
            semantic: SemanticSimilarityStrategy::new(
                Arc::clone(&catalog),
                Arc::clone(&index),
                threshold,
            ),
            catalog,
            index,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index_status(&self) -> IndexStatus {
        self.index.status()
    }

    /// Builds (or loads) the index if it is not in memory yet.
    pub async fn warm_up(&self) -> Result<IndexStatus, MatchError> {
        self.semantic.ensure_index().await?;
        Ok(self.index.status())
    }

    /// Forced rebuild: re-encodes the whole catalog and overwrites the disk cache.
    pub async fn rebuild(&self) -> Result<IndexStatus, MatchError> {
        self.index.build_index(self.catalog.jobs(), true).await?;
        Ok(self.index.status())
    }

    pub fn strategy(&self, mode: RankingMode) -> &dyn RankingStrategy {
        match mode {
            RankingMode::Keyword => &self.keyword,
            RankingMode::Semantic => &self.semantic,
        }
    }

    pub async fn rank_by_keyword_overlap(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<MatchResult>, MatchError> {
        self.keyword.rank(request).await
    }

    pub async fn rank_by_semantic_similarity(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<MatchResult>, MatchError> {
        self.semantic.rank(request).await
    }

    /// Ranked, explained matches using the strategy named by `request.mode`.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<MatchResult>, MatchError> {
        let results = self.strategy(request.mode).rank(request).await?;
        info!(
            "Search mode={} top_n={} country={:?} city={:?} -> {} results",
            request.mode.as_str(),
            request.top_n,
            request.filter_country,
            request.filter_city,
            results.len()
        );
        Ok(results)
    }

    /// Jobs at a location, in catalog order, without any skill scoring.
    pub fn browse(&self, country: Option<&str>, city: Option<&str>, limit: usize) -> Vec<JobRecord> {
        let filter = LocationFilter::new(country, city);
        self.catalog
            .jobs()
            .iter()
            .filter(|job| filter.matches(&job.location))
            .take(limit)
            .cloned()
            .collect()
    }
}
