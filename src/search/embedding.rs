//! Text embedding backends
//!
//! - [`OpenAiEmbedder`]: hosted `/embeddings` endpoint
//! - [`HarmonicEmbedder`]: deterministic harmonic token projection, no network.
//!   Based on "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//!   Deterministic, and Reversible Embedding Methodology"
//!   (https://arxiv.org/html/2511.20665)

use std::f64::consts::PI;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::ServiceError;
use crate::provider::OpenAiClient;

/// Harmonic embedding dimension (two components per modulus)
pub const HARMONIC_DIM: usize = 384;

/// Inputs per `/embeddings` request
const EMBED_BATCH: usize = 64;

/// Code points considered per token
const MAX_TOKEN_CHARS: usize = 64;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the vector space; part of the index fingerprint
    fn model_id(&self) -> &str;

    /// One vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: batch,
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("embedding service", "/embeddings", &request)
            .await?;
        order_embeddings(response.data, batch.len())
    }
}

/// Sort response rows by their `index` and check one row per input.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    data.sort_by_key(|d| d.index);
    let in_order = data.iter().enumerate().all(|(i, d)| d.index == i);
    if data.len() != expected || !in_order {
        return Err(ServiceError::InvalidResponse {
            service: "embedding service",
            reason: format!("expected {} embeddings, got {}", expected, data.len()),
        });
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

/// Deterministic training-free embedder.
///
/// Each token is read as a base-2^16 integer `N` over its code points; for
/// each modulus `m` the residue `N mod m` is projected onto the unit circle.
/// Token vectors are mean-pooled and L2-normalised.
pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: first_primes(HARMONIC_DIM / 2),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut sum = vec![0.0f64; HARMONIC_DIM];
        if tokens.is_empty() {
            return vec![0.0; HARMONIC_DIM];
        }

        for token in &tokens {
            let n = token_to_integer(token);
            for (i, &m) in self.moduli.iter().enumerate() {
                let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
                sum[2 * i] += theta.sin();
                sum[2 * i + 1] += theta.cos();
            }
        }

        let count = tokens.len() as f64;
        let norm = sum.iter().map(|x| (x / count).powi(2)).sum::<f64>().sqrt();
        sum.iter()
            .map(|x| {
                let mean = x / count;
                if norm > 0.0 {
                    (mean / norm) as f32
                } else {
                    mean as f32
                }
            })
            .collect()
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HarmonicEmbedder {
    fn model_id(&self) -> &str {
        "harmonic-384"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|p| *p * *p <= candidate)
            .all(|p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_CHARS)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

/// Lowercased words, split on whitespace and ASCII punctuation
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
