//! Ranking strategies — keyword overlap and semantic similarity behind one trait.
//!
//! `MatchEngine` owns one of each and dispatches on `RankingMode`; callers
//! never get one silently substituted for the other.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matching::catalog::{Catalog, JobRecord};
use crate::matching::error::{IndexBuildError, MatchError};
use crate::matching::explain::{explain, MatchTier};
use crate::matching::index::{l2_normalize, CatalogDigest, EmbeddingIndex, IndexManager};
use crate::matching::location::LocationFilter;
use crate::matching::normalize::{normalize, query_tokens};
use crate::matching::overlap::{score_overlap, SkillOverlap};
use crate::matching::ranker::rank;

pub const DEFAULT_TOP_N: usize = 10;

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

// ────────────────────────────────────────────────────────────────────────────
// Request / result models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    #[default]
    Semantic,
    Keyword,
}

impl RankingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingMode::Semantic => "semantic",
            RankingMode::Keyword => "keyword",
        }
    }
}

/// A free-text skills query with optional location constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_text: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub filter_country: Option<String>,
    #[serde(default)]
    pub filter_city: Option<String>,
    #[serde(default)]
    pub mode: RankingMode,
    /// Overrides the engine's similarity floor (semantic mode only).
    #[serde(default)]
    pub threshold: Option<f32>,
}

impl SearchRequest {
    pub fn new(query_text: impl Into<String>, top_n: usize) -> Self {
        Self {
            query_text: query_text.into(),
            top_n,
            filter_country: None,
            filter_city: None,
            mode: RankingMode::default(),
            threshold: None,
        }
    }

    pub fn in_country(mut self, country: &str) -> Self {
        self.filter_country = Some(country.to_string());
        self
    }

    pub fn in_city(mut self, city: &str) -> Self {
        self.filter_city = Some(city.to_string());
        self
    }

    pub fn with_mode(mut self, mode: RankingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    fn location_filter(&self) -> LocationFilter {
        LocationFilter::new(self.filter_country.as_deref(), self.filter_city.as_deref())
    }
}

/// One ranked, explained match. Built once per query, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub job: JobRecord,
    /// 0 – 100
    pub score: f64,
    pub tier: MatchTier,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub reason_text: String,
}

impl MatchResult {
    fn new(job: JobRecord, score: f64, overlap: SkillOverlap) -> Self {
        let reason_text = explain(score, &overlap.matched, &overlap.missing, &job.title, &job.level);
        Self {
            tier: MatchTier::from_score(score),
            score,
            matched_skills: overlap.matched,
            missing_skills: overlap.missing,
            reason_text,
            job,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// A ranking backend. Results are sorted by descending score, ties in catalog order.
#[async_trait]
pub trait RankingStrategy: Send + Sync {
    fn mode(&self) -> RankingMode;

    async fn rank(&self, request: &SearchRequest) -> Result<Vec<MatchResult>, MatchError>;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordOverlapStrategy
// ────────────────────────────────────────────────────────────────────────────

/// Scores jobs by the share of their skills covered by the query.
///
/// Jobs with no skills or no overlap are excluded, not ranked last.
pub struct KeywordOverlapStrategy {
    catalog: Arc<Catalog>,
}

impl KeywordOverlapStrategy {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

/// Keyword-mode ranking over `jobs`.
pub fn rank_keyword_overlap(jobs: &[JobRecord], request: &SearchRequest) -> Vec<MatchResult> {
    let tokens = query_tokens(&request.query_text);
    let filter = request.location_filter();

    let mut scored: Vec<(usize, f64, SkillOverlap)> = filter
        .filter_candidates(jobs)
        .into_iter()
        .filter_map(|i| {
            let overlap = score_overlap(jobs[i].skills(), &tokens);
            let percent = overlap.match_percent();
            (percent > 0.0).then_some((i, percent, overlap))
        })
        .collect();

    // Stable: equal percentages keep catalog order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(request.top_n);

    scored
        .into_iter()
        .map(|(i, percent, overlap)| MatchResult::new(jobs[i].clone(), percent, overlap))
        .collect()
}

#[async_trait]
impl RankingStrategy for KeywordOverlapStrategy {
    fn mode(&self) -> RankingMode {
        RankingMode::Keyword
    }

    async fn rank(&self, request: &SearchRequest) -> Result<Vec<MatchResult>, MatchError> {
        Ok(rank_keyword_overlap(self.catalog.jobs(), request))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SemanticSimilarityStrategy
// ────────────────────────────────────────────────────────────────────────────

/// Scores jobs by cosine similarity between the query and job embeddings.
/// Skill overlap is attached for explanation only.
pub struct SemanticSimilarityStrategy {
    catalog: Arc<Catalog>,
    index: Arc<IndexManager>,
    digest: CatalogDigest,
    threshold: f32,
}

impl SemanticSimilarityStrategy {
    pub fn new(catalog: Arc<Catalog>, index: Arc<IndexManager>, threshold: f32) -> Self {
        let digest = index.digest(catalog.jobs());
        Self {
            catalog,
            index,
            digest,
            threshold,
        }
    }

    /// The index for this strategy's catalog, built or loaded on first use.
    pub async fn ensure_index(&self) -> Result<Arc<EmbeddingIndex>, IndexBuildError> {
        self.index
            .build_index_with(self.catalog.jobs(), &self.digest, false)
            .await
    }

    /// Unit query vector. Text that normalizes to nothing becomes the zero
    /// vector without an encoder call, so it matches nothing instead of failing.
    async fn encode_query(&self, query_text: &str, dim: usize) -> Result<Vec<f32>, MatchError> {
        let text = normalize(query_text);
        if text.is_empty() {
            debug!("Query has no searchable text; using the zero vector");
            return Ok(vec![0.0; dim]);
        }

        let mut query = self
            .index
            .encoder()
            .encode(&text)
            .await
            .map_err(MatchError::QueryEncoding)?;
        if query.len() != dim {
            return Err(MatchError::QueryDimension {
                expected: dim,
                got: query.len(),
            });
        }
        l2_normalize(&mut query);
        Ok(query)
    }
}

#[async_trait]
impl RankingStrategy for SemanticSimilarityStrategy {
    fn mode(&self) -> RankingMode {
        RankingMode::Semantic
    }

    async fn rank(&self, request: &SearchRequest) -> Result<Vec<MatchResult>, MatchError> {
        let index = self.ensure_index().await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = request.location_filter().filter_candidates(index.metas());
        if candidates.is_empty() {
            debug!("No jobs left after location filter");
            return Ok(Vec::new());
        }

        let query = self.encode_query(&request.query_text, index.dim()).await?;
        let threshold = request.threshold.unwrap_or(self.threshold);
        let tokens = query_tokens(&request.query_text);

        Ok(rank(&index, &query, &candidates, request.top_n, threshold)
            .into_iter()
            .map(|candidate| {
                let job = index.meta(candidate.row);
                let overlap = score_overlap(job.skills(), &tokens);
                MatchResult::new(job.clone(), candidate.score, overlap)
            })
            .collect())
    }
}
