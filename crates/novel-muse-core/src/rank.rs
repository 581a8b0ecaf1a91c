//! Brute-force cosine ranking over a novel's stored chunk vectors.
//!
//! The corpus for one novel is tens to low hundreds of chunks, so every
//! candidate is scored; there is no approximate index.

use std::cmp::Ordering;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{RetrievalResult, StoredEmbedding};

/// Score `candidates` against `query` and return the best `k`, highest first.
///
/// Ties keep the candidates' original relative order. Every candidate
/// vector must have the query's dimension; the first one that does not
/// fails the whole ranking with [`RagError::DimensionMismatch`].
pub fn rank(query: &[f32], candidates: &[StoredEmbedding], k: usize) -> Result<Vec<RetrievalResult>> {
    if let Some(bad) = candidates.iter().find(|c| c.vector.len() != query.len()) {
        return Err(RagError::DimensionMismatch {
            expected: query.len(),
            found: bad.vector.len(),
        });
    }

    let mut scored: Vec<RetrievalResult> = candidates
        .iter()
        .map(|c| RetrievalResult {
            text: c.chunk_text.clone(),
            score: cosine_similarity(query, &c.vector),
        })
        .collect();

    // `sort_by` is stable, which gives the insertion-order tie-break.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}

/// Serialize ranked results into the numbered background block used in prompts.
///
/// Each excerpt is introduced by a 1-based `[相关片段 N]` label; excerpts
/// are separated by a blank line. No results yield an empty string.
pub fn format_excerpts(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[相关片段 {}]\n{}", i + 1, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
