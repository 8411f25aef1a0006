//! Text-to-vector encoders.
//!
//! The core depends only on the `Encoder` trait. `main` picks one
//! implementation at startup and shares it as `Arc<dyn Encoder>`:
//! - `HashEncoder`: deterministic FNV-1a feature hashing, no model required.
//! - `HttpEncoder`: OpenAI-compatible `/embeddings` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::matching::error::EncoderError;

const MAX_RETRIES: u32 = 3;

/// Batch and single-text encoding. Vectors need not be normalized; the core does that.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Stable identifier of the model; part of the index cache fingerprint.
    fn model_id(&self) -> String;

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError>;

    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let rows = self.encode_batch(&[text.to_string()]).await?;
        if rows.len() != 1 {
            return Err(EncoderError::CountMismatch {
                expected: 1,
                got: rows.len(),
            });
        }
        Ok(rows.into_iter().next().unwrap_or_default())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HashEncoder
// ────────────────────────────────────────────────────────────────────────────

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Signed feature hashing of word unigrams and bigrams into `dim` buckets.
///
/// Texts sharing words land close together; empty text yields the zero vector.
#[derive(Debug, Clone)]
pub struct HashEncoder {
    dim: usize,
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl HashEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dim];
        let words: Vec<&str> = text.split_whitespace().collect();

        let mut add = |feature: &str| {
            let hash = fnv1a(feature.as_bytes());
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        };

        for word in &words {
            add(word);
        }
        for pair in words.windows(2) {
            add(&format!("{} {}", pair[0], pair[1]));
        }
        vector
    }
}

#[async_trait]
impl Encoder for HashEncoder {
    fn model_id(&self) -> String {
        format!("fnv1a-hash-{}", self.dim)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HttpEncoder
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
/// Retries on 429 and 5xx with exponential backoff.
#[derive(Clone)]
pub struct HttpEncoder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
}

impl HttpEncoder {
    pub fn new(
        base_url: &str,
        model: String,
        api_key: Option<String>,
        batch_size: usize,
    ) -> Result<Self, EncoderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            api_key,
            batch_size: batch_size.max(1),
        })
    }

    /// One chunk with retries: transport errors, 429 and 5xx are retried with
    /// exponential backoff (1s, 2s); anything else fails immediately.
    async fn embed_chunk(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_chunk(inputs).await {
                Err(e) if is_retryable(&e) && attempt + 1 < MAX_RETRIES => {
                    let delay = std::time::Duration::from_millis(1000 * (1 << attempt));
                    attempt += 1;
                    warn!(
                        "Encoder call attempt {} failed ({e}), retrying after {}ms...",
                        attempt,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_chunk(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut request = self.client.post(&self.endpoint).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Encoder API returned {}: {}", status, body);
            return Err(EncoderError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EncoderError::Parse(e.to_string()))?;
        order_rows(parsed.data, inputs.len())
    }
}

fn is_retryable(error: &EncoderError) -> bool {
    match error {
        EncoderError::Http(_) => true,
        EncoderError::Api { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Reorders response rows by their `index` and checks the row count.
fn order_rows(mut rows: Vec<EmbeddingRow>, expected: usize) -> Result<Vec<Vec<f32>>, EncoderError> {
    if rows.len() != expected {
        return Err(EncoderError::CountMismatch {
            expected,
            got: rows.len(),
        });
    }
    rows.sort_by_key(|r| r.index);
    Ok(rows.into_iter().map(|r| r.embedding).collect())
}

#[async_trait]
impl Encoder for HttpEncoder {
    fn model_id(&self) -> String {
        format!("http:{}", self.model)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_chunk(chunk).await?);
        }
        debug!("Encoded {} texts via {}", texts.len(), self.endpoint);
        Ok(vectors)
    }
}
