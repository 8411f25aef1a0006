#![allow(dead_code)]

//! Embedding Cache Manager — owns the encoded-job-vector index.
//!
//! Lifecycle: build once per catalog fingerprint, persist to disk, reuse from
//! disk on the next start, rebuild wholesale on `force` or after `invalidate`.
//! Only one build runs at a time; waiting callers receive the shared result.
//! The in-memory index is swapped only after a new one is fully assembled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::matching::catalog::JobRecord;
use crate::matching::encoder::Encoder;
use crate::matching::error::{CacheIoError, IndexBuildError};
use crate::matching::normalize::normalize;

const NORM_EPSILON: f32 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// EmbeddingIndex
// ────────────────────────────────────────────────────────────────────────────

/// Row-major matrix of unit-length job vectors with parallel ids and records.
///
/// Invariant: row `i` belongs to `ids[i]` and `metas[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    fingerprint: String,
    dim: usize,
    vectors: Vec<f32>,
    ids: Vec<String>,
    metas: Vec<JobRecord>,
}

impl EmbeddingIndex {
    /// Zero-row index for a catalog with no encodable jobs.
    pub fn empty(fingerprint: String) -> Self {
        Self {
            fingerprint,
            dim: 0,
            vectors: Vec::new(),
            ids: Vec::new(),
            metas: Vec::new(),
        }
    }

    /// L2-normalizes `rows` and lays them out next to their records.
    pub fn assemble(
        fingerprint: String,
        rows: Vec<Vec<f32>>,
        metas: Vec<JobRecord>,
    ) -> Result<Self, IndexBuildError> {
        if rows.len() != metas.len() {
            return Err(IndexBuildError::RowCountMismatch {
                expected: metas.len(),
                got: rows.len(),
            });
        }
        let Some(dim) = rows.first().map(Vec::len) else {
            return Ok(Self::empty(fingerprint));
        };

        let mut vectors = Vec::with_capacity(rows.len() * dim);
        for mut row in rows {
            if row.len() != dim {
                return Err(IndexBuildError::DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
            l2_normalize(&mut row);
            vectors.extend(row);
        }

        Ok(Self {
            fingerprint,
            dim,
            vectors,
            ids: metas.iter().map(|m| m.id.clone()).collect(),
            metas,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn metas(&self) -> &[JobRecord] {
        &self.metas
    }

    pub fn meta(&self, row: usize) -> &JobRecord {
        &self.metas[row]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.vectors[row * self.dim..(row + 1) * self.dim]
    }

    /// Checks a deserialized blob against the fingerprint it was loaded for.
    fn validate(&self, expected_fingerprint: &str) -> Result<(), CacheIoError> {
        if self.fingerprint != expected_fingerprint {
            return Err(CacheIoError::Corrupt(format!(
                "fingerprint {} does not match {}",
                self.fingerprint, expected_fingerprint
            )));
        }
        if self.metas.len() != self.ids.len() || self.vectors.len() != self.ids.len() * self.dim {
            return Err(CacheIoError::Corrupt(format!(
                "{} ids, {} metas, {} floats at dim {}",
                self.ids.len(),
                self.metas.len(),
                self.vectors.len(),
                self.dim
            )));
        }
        Ok(())
    }
}

/// Scales `v` to unit length; the zero vector stays zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in v.iter_mut() {
        *x /= norm + NORM_EPSILON;
    }
}

/// One descriptive, normalized sentence per job. Empty when the job carries no text.
pub fn job_sentence(job: &JobRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !job.title.trim().is_empty() {
        parts.push(job.title.clone());
    }
    if !job.skills_raw.trim().is_empty() {
        parts.push(format!("Required skills: {}", job.skills_raw));
    }
    if !job.job_type.trim().is_empty() {
        parts.push(format!("Job type: {}", job.job_type));
    }
    if !job.level.trim().is_empty() {
        parts.push(format!("Level: {}", job.level));
    }
    normalize(&parts.join(". "))
}

/// SHA-256 over the encoder model id and every `(id, sentence)` pair in catalog order.
pub fn catalog_fingerprint(model_id: &str, jobs: &[JobRecord], sentences: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    for (job, sentence) in jobs.iter().zip(sentences) {
        hasher.update([0u8]);
        hasher.update(job.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(sentence.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Job sentences and fingerprint of one catalog under one encoder model.
///
/// The catalog is immutable for the process lifetime, so the engine computes this
/// once and the query path only compares fingerprints.
#[derive(Debug, Clone)]
pub struct CatalogDigest {
    sentences: Vec<String>,
    fingerprint: String,
}

impl CatalogDigest {
    pub fn new(model_id: &str, jobs: &[JobRecord]) -> Self {
        let sentences: Vec<String> = jobs.iter().map(job_sentence).collect();
        let fingerprint = catalog_fingerprint(model_id, jobs, &sentences);
        Self {
            sentences,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Disk cache
// ────────────────────────────────────────────────────────────────────────────

pub fn cache_file(dir: &Path, fingerprint: &str) -> PathBuf {
    let key = fingerprint.get(..16).unwrap_or(fingerprint);
    dir.join(format!("jobs-{key}.bin"))
}

/// Writes the blob to a sibling temp file, then renames it into place.
pub async fn save_index(path: &Path, index: &EmbeddingIndex) -> Result<(), CacheIoError> {
    let bytes = bincode::serialize(index)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("bin.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Loads a persisted index. `Ok(None)` when no blob exists for this path.
pub async fn load_index(
    path: &Path,
    expected_fingerprint: &str,
) -> Result<Option<EmbeddingIndex>, CacheIoError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let index: EmbeddingIndex = bincode::deserialize(&bytes)?;
    index.validate(expected_fingerprint)?;
    Ok(Some(index))
}

// ────────────────────────────────────────────────────────────────────────────
// IndexManager
// ────────────────────────────────────────────────────────────────────────────

/// Snapshot of the manager for status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub built: bool,
    pub jobs: usize,
    pub dimension: usize,
    pub fingerprint: Option<String>,
}

/// Exclusive owner of the process-wide `EmbeddingIndex`.
pub struct IndexManager {
    encoder: Arc<dyn Encoder>,
    cache_dir: Option<PathBuf>,
    current: RwLock<Option<Arc<EmbeddingIndex>>>,
    build_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(encoder: Arc<dyn Encoder>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            encoder,
            cache_dir,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    /// The index currently in memory, if any.
    pub fn current(&self) -> Option<Arc<EmbeddingIndex>> {
        self.current.read().clone()
    }

    /// Drops the in-memory index. The next build reloads from disk or re-encodes.
    pub fn invalidate(&self) {
        *self.current.write() = None;
        info!("Embedding index invalidated");
    }

    pub fn status(&self) -> IndexStatus {
        match self.current() {
            Some(index) => IndexStatus {
                built: true,
                jobs: index.len(),
                dimension: index.dim(),
                fingerprint: Some(index.fingerprint().to_string()),
            },
            None => IndexStatus {
                built: false,
                jobs: 0,
                dimension: 0,
                fingerprint: None,
            },
        }
    }

    fn current_matching(&self, fingerprint: &str) -> Option<Arc<EmbeddingIndex>> {
        self.current()
            .filter(|index| index.fingerprint() == fingerprint)
    }

    fn install(&self, index: EmbeddingIndex) -> Arc<EmbeddingIndex> {
        let index = Arc::new(index);
        *self.current.write() = Some(Arc::clone(&index));
        index
    }

    /// Digest of `jobs` under this manager's encoder.
    pub fn digest(&self, jobs: &[JobRecord]) -> CatalogDigest {
        CatalogDigest::new(&self.encoder.model_id(), jobs)
    }

    /// Returns the index for `jobs`, building it if needed.
    ///
    /// Order of preference without `force`: in-memory index with the same
    /// fingerprint, then the disk cache, then a fresh encode.
    pub async fn build_index(
        &self,
        jobs: &[JobRecord],
        force: bool,
    ) -> Result<Arc<EmbeddingIndex>, IndexBuildError> {
        let digest = self.digest(jobs);
        self.build_index_with(jobs, &digest, force).await
    }

    /// Same as `build_index`, reusing a digest computed earlier for `jobs`.
    /// When the in-memory index matches, this is a fingerprint comparison.
    pub async fn build_index_with(
        &self,
        jobs: &[JobRecord],
        digest: &CatalogDigest,
        force: bool,
    ) -> Result<Arc<EmbeddingIndex>, IndexBuildError> {
        let fingerprint = digest.fingerprint();

        if !force {
            if let Some(index) = self.current_matching(fingerprint) {
                return Ok(index);
            }
        }

        let _guard = self.build_lock.lock().await;

        // A build that held the lock may have produced exactly this index.
        if !force {
            if let Some(index) = self.current_matching(fingerprint) {
                debug!("Embedding index built by a concurrent caller");
                return Ok(index);
            }
        }

        let cache_path = self
            .cache_dir
            .as_deref()
            .map(|dir| cache_file(dir, fingerprint));

        if let (false, Some(path)) = (force, cache_path.as_deref()) {
            match load_index(path, fingerprint).await {
                Ok(Some(index)) => {
                    info!(
                        "Embedding index loaded from cache {} ({} jobs)",
                        path.display(),
                        index.len()
                    );
                    return Ok(self.install(index));
                }
                Ok(None) => debug!("No cached embedding index at {}", path.display()),
                Err(e) => warn!("Ignoring unusable index cache {}: {e}", path.display()),
            }
        }

        let (metas, texts): (Vec<JobRecord>, Vec<String>) = jobs
            .iter()
            .zip(&digest.sentences)
            .filter(|(_, sentence)| !sentence.is_empty())
            .map(|(job, sentence)| (job.clone(), sentence.clone()))
            .unzip();

        if texts.is_empty() {
            warn!("Catalog has no encodable jobs; installing an empty index");
            return Ok(self.install(EmbeddingIndex::empty(fingerprint.to_string())));
        }

        let started = Instant::now();
        info!(
            "Encoding {} job sentences with {}",
            texts.len(),
            self.encoder.model_id()
        );
        let rows = self.encoder.encode_batch(&texts).await?;
        let index = EmbeddingIndex::assemble(fingerprint.to_string(), rows, metas)?;
        info!(
            "Built embeddings for {} jobs (dim {}) in {}ms",
            index.len(),
            index.dim(),
            started.elapsed().as_millis()
        );

        if let Some(path) = cache_path.as_deref() {
            if let Err(e) = save_index(path, &index).await {
                warn!("Failed to persist embedding index to {}: {e}", path.display());
            }
        }

        Ok(self.install(index))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::matching::encoder::HashEncoder;
    use crate::matching::error::EncoderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Hash encoder that counts batch and `model_id` calls and can be switched to fail.
    #[derive(Default)]
    pub(crate) struct CountingEncoder {
        inner: HashEncoder,
        pub calls: AtomicUsize,
        pub model_id_calls: AtomicUsize,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl Encoder for CountingEncoder {
        fn model_id(&self) -> String {
            self.model_id_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.model_id()
        }

        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(EncoderError::Api {
                    status: 503,
                    message: "encoder offline".to_string(),
                });
            }
            self.inner.encode_batch(texts).await
        }
    }

    fn jobs() -> Vec<JobRecord> {
        vec![
            JobRecord::fixture("job_0", "Data Engineer", "Python, SQL", "Berlin, Germany"),
            JobRecord::fixture("job_1", "Backend Developer", "Java, Spring", "Austin, USA"),
            JobRecord::fixture("job_2", "Platform Engineer", "Python, Docker", "Munich, Germany"),
        ]
    }

    fn manager(encoder: &Arc<CountingEncoder>, cache_dir: Option<PathBuf>) -> IndexManager {
        IndexManager::new(encoder.clone() as Arc<dyn Encoder>, cache_dir)
    }

    #[test]
    fn test_job_sentence_includes_fields() {
        let job = JobRecord::fixture("j", "Senior C++ Dev", "C++, Node.js", "").with_level("Senior");
        assert_eq!(
            job_sentence(&job),
            "senior c++ dev. required skills c++ node.js. level senior"
        );
    }

    #[test]
    fn test_job_sentence_empty_job_is_empty() {
        assert_eq!(job_sentence(&JobRecord::fixture("j", " ", "", "Berlin")), "");
    }

    #[test]
    fn test_l2_normalize_unit_and_zero() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        let mut z = vec![0.0, 0.0];
        l2_normalize(&mut z);
        assert_eq!(z, vec![0.0, 0.0]);
    }

    #[test]
    fn test_assemble_rejects_ragged_rows() {
        let metas = vec![JobRecord::fixture("a", "A", "", ""), JobRecord::fixture("b", "B", "", "")];
        let err = EmbeddingIndex::assemble("fp".into(), vec![vec![1.0, 0.0], vec![1.0]], metas)
            .unwrap_err();
        assert!(matches!(err, IndexBuildError::DimensionMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn test_fingerprint_changes_with_catalog() {
        let a = jobs();
        let mut b = jobs();
        b[1].skills_raw = "Kotlin".to_string();
        let sa: Vec<String> = a.iter().map(job_sentence).collect();
        let sb: Vec<String> = b.iter().map(job_sentence).collect();
        assert_eq!(catalog_fingerprint("m", &a, &sa), catalog_fingerprint("m", &a, &sa));
        assert_ne!(catalog_fingerprint("m", &a, &sa), catalog_fingerprint("m", &b, &sb));
        assert_ne!(catalog_fingerprint("m", &a, &sa), catalog_fingerprint("n", &a, &sa));
    }

    #[tokio::test]
    async fn test_second_build_does_not_reencode() {
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, None);
        let first = mgr.build_index(&jobs(), false).await.unwrap();
        let second = mgr.build_index(&jobs(), false).await.unwrap();
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_digest_reuse_skips_rehashing() {
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, None);
        let catalog = jobs();
        let digest = mgr.digest(&catalog);
        let first = mgr.build_index_with(&catalog, &digest, false).await.unwrap();
        let model_id_calls = encoder.model_id_calls.load(Ordering::SeqCst);

        for _ in 0..3 {
            let again = mgr.build_index_with(&catalog, &digest, false).await.unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(encoder.model_id_calls.load(Ordering::SeqCst), model_id_calls);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(digest.fingerprint(), first.fingerprint());
    }

    #[tokio::test]
    async fn test_force_rebuilds() {
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, None);
        mgr.build_index(&jobs(), false).await.unwrap();
        mgr.build_index(&jobs(), true).await.unwrap();
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_builds_encode_once() {
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, None);
        let catalog = jobs();
        let (a, b) = tokio::join!(
            mgr.build_index(&catalog, false),
            mgr.build_index(&catalog, false)
        );
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn test_rows_are_unit_length_and_aligned() {
        let encoder = Arc::new(CountingEncoder::default());
        let index = manager(&encoder, None).build_index(&jobs(), false).await.unwrap();
        assert_eq!(index.ids(), ["job_0", "job_1", "job_2"]);
        for i in 0..index.len() {
            let norm: f32 = index.row(i).iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "row {i} norm {norm}");
            assert_eq!(index.meta(i).id, index.ids()[i]);
        }
    }

    #[tokio::test]
    async fn test_empty_sentence_jobs_are_excluded() {
        let mut catalog = jobs();
        catalog.insert(1, JobRecord::fixture("blank", "", "", "Paris, France"));
        let encoder = Arc::new(CountingEncoder::default());
        let index = manager(&encoder, None).build_index(&catalog, false).await.unwrap();
        assert_eq!(index.ids(), ["job_0", "job_1", "job_2"]);
    }

    #[tokio::test]
    async fn test_no_encodable_jobs_gives_empty_index() {
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, None);
        let index = mgr
            .build_index(&[JobRecord::fixture("blank", "", "", "")], false)
            .await
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
        assert!(mgr.status().built);
    }

    #[tokio::test]
    async fn test_encoder_failure_keeps_previous_index() {
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, None);
        let before = mgr.build_index(&jobs(), false).await.unwrap();

        encoder.fail.store(true, Ordering::SeqCst);
        let err = mgr.build_index(&jobs(), true).await.unwrap_err();
        assert!(matches!(err, IndexBuildError::Encoder(_)));

        let current = mgr.current().unwrap();
        assert!(Arc::ptr_eq(&before, &current));
    }

    #[tokio::test]
    async fn test_disk_cache_hit_skips_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let first_encoder = Arc::new(CountingEncoder::default());
        let built = manager(&first_encoder, Some(dir.path().to_path_buf()))
            .build_index(&jobs(), false)
            .await
            .unwrap();

        let second_encoder = Arc::new(CountingEncoder::default());
        let loaded = manager(&second_encoder, Some(dir.path().to_path_buf()))
            .build_index(&jobs(), false)
            .await
            .unwrap();

        assert_eq!(second_encoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loaded.ids(), built.ids());
        for i in 0..built.len() {
            assert_eq!(loaded.row(i), built.row(i));
        }
    }

    #[tokio::test]
    async fn test_invalidate_then_build_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CountingEncoder::default());
        let mgr = manager(&encoder, Some(dir.path().to_path_buf()));
        mgr.build_index(&jobs(), false).await.unwrap();
        mgr.invalidate();
        assert!(!mgr.status().built);
        mgr.build_index(&jobs(), false).await.unwrap();
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_save_load_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CountingEncoder::default());
        let index = manager(&encoder, None).build_index(&jobs(), false).await.unwrap();

        let path = cache_file(dir.path(), index.fingerprint());
        save_index(&path, &index).await.unwrap();
        let loaded = load_index(&path, index.fingerprint()).await.unwrap().unwrap();

        assert_eq!(loaded.ids(), index.ids());
        assert_eq!(loaded.dim(), index.dim());
        for i in 0..index.len() {
            let a: Vec<u32> = index.row(i).iter().map(|x| x.to_bits()).collect();
            let b: Vec<u32> = loaded.row(i).iter().map(|x| x.to_bits()).collect();
            assert_eq!(a, b);
        }
        assert!(!path.with_extension("bin.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CountingEncoder::default());
        let catalog = jobs();
        let sentences: Vec<String> = catalog.iter().map(job_sentence).collect();
        let fp = catalog_fingerprint(&encoder.model_id(), &catalog, &sentences);
        std::fs::write(cache_file(dir.path(), &fp), b"garbage").unwrap();

        let index = manager(&encoder, Some(dir.path().to_path_buf()))
            .build_index(&catalog, false)
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let encoder = Arc::new(CountingEncoder::default());
        let index = manager(&encoder, Some(blocker))
            .build_index(&jobs(), false)
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_load_missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_index(&dir.path().join("jobs-none.bin"), "fp").await.unwrap();
        assert!(loaded.is_none());
    }
}
