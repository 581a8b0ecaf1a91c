//! Embedding trait, the deterministic placeholder embedder, and vector
//! utilities.
//!
//! Everything that turns text into vectors goes through [`Embedder`], so a
//! real semantic model can replace [`HashEmbedder`] without touching the
//! ranker or the context assembler. The app crate provides an
//! OpenAI-compatible implementation.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Vector dimensionality shared by every embedding in a novel's corpus.
pub const EMBEDDING_DIMS: usize = 1536;

/// Maps text to fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input
/// order, each of length [`dims`](Embedder::dims).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"hash-v1"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts independently. No deduplication or caching.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("empty embedding response"))
    }
}

/// Deterministic character-position embedder.
///
/// This is a placeholder for environments without a semantic embedding
/// provider. Every character adds `code_point / 1000` to dimension
/// `(code_point × position) mod dims`, and the result is scaled to unit
/// length. The same text always yields a bit-identical vector, but
/// similarity between two vectors only reflects crude lexical and
/// positional overlap, not meaning.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIMS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-v1"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embedding(t, self.dims)).collect())
    }
}

/// Compute the placeholder embedding for `text`.
///
/// Returns a unit vector for any text containing a non-NUL character and
/// the zero vector for empty text.
pub fn hash_embedding(text: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);
    let mut acc = vec![0.0f64; dims];

    for (pos, ch) in text.chars().enumerate() {
        let code = ch as u64;
        let slot = (code.wrapping_mul(pos as u64) % dims as u64) as usize;
        acc[slot] += code as f64 / 1000.0;
    }

    let norm = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        acc.iter().map(|v| (v / norm) as f32).collect()
    } else {
        vec![0.0; dims]
    }
}

/// Euclidean length of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` when either vector has zero
/// magnitude. Callers are expected to have checked that the lengths agree;
/// mismatched or empty inputs also yield `0.0`.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Encode a vector as the JSON float array used for storage.
///
/// ```rust
/// use novel_muse_core::embedding::{vector_from_json, vector_to_json};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// assert_eq!(vector_to_json(&v), "[1.0,-2.5,3.125]");
/// assert_eq!(vector_from_json("[1.0,-2.5,3.125]").unwrap(), v);
/// ```
pub fn vector_to_json(vec: &[f32]) -> String {
    serde_json::to_string(vec).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON float array back into a vector.
pub fn vector_from_json(json: &str) -> Result<Vec<f32>> {
    serde_json::from_str(json).map_err(|e| anyhow!("invalid embedding JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedding_unit_norm() {
        for text in ["a", "Hello world", "这是一个测试文本", "混合 text, 标点！"] {
            let v = hash_embedding(text, EMBEDDING_DIMS);
            assert_eq!(v.len(), EMBEDDING_DIMS);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-5, "norm for {:?}", text);
        }
    }

    #[test]
    fn test_hash_embedding_empty_is_zero() {
        let v = hash_embedding("", EMBEDDING_DIMS);
        assert_eq!(v.len(), EMBEDDING_DIMS);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hash_embedding_deterministic() {
        let text = "夜色渐深，城门缓缓合上。".repeat(20);
        let a = hash_embedding(&text, EMBEDDING_DIMS);
        let b = hash_embedding(&text, EMBEDDING_DIMS);
        let bits_a: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
        let bits_b: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_hash_embedding_position_sensitive() {
        let a = hash_embedding("ab", 64);
        let b = hash_embedding("ba", 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = HashEmbedder::default();
        let texts = vec!["first".to_string(), String::new(), "third".to_string()];
        let vecs = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vecs.len(), 3);
        assert_eq!(vecs[0], hash_embedding("first", EMBEDDING_DIMS));
        assert_eq!(l2_norm(&vecs[1]), 0.0);
        assert_eq!(vecs[2], embedder.embed("third").await.unwrap());
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_identical_small_magnitude() {
        for scale in [1e-4f32, 1e-10, 1e-30] {
            let v = vec![scale, 0.0, scale * 0.5];
            let sim = cosine_similarity(&v, &v);
            assert!((sim - 1.0).abs() < 1e-6, "scale {}: {}", scale, sim);
        }
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = hash_embedding("春风又绿江南岸", 128);
        let b = hash_embedding("明月何时照我还", 128);
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_vector_json_roundtrip() {
        let v = hash_embedding("round trip", 32);
        let restored = vector_from_json(&vector_to_json(&v)).unwrap();
        assert_eq!(v, restored);
    }

    #[test]
    fn test_vector_from_json_rejects_garbage() {
        assert!(vector_from_json("not a vector").is_err());
    }
}
