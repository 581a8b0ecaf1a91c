//! Context assembly: chapter reindexing and retrieval for generation.
//!
//! [`ContextAssembler`] ties the chunker, an [`Embedder`], the ranker, and
//! the stores together:
//!
//! - [`reindex`](ContextAssembler::reindex) rebuilds a chapter's chunk
//!   embeddings from scratch (delete, chunk, embed, insert).
//! - [`build_context`](ContextAssembler::build_context) uses a novel's most
//!   recent chapters as the query, ranks every stored chunk of the novel
//!   against it, and bundles the top excerpts with those chapters.
//!
//! Reindexing is always a full rebuild from whatever content the store
//! holds when the chapter is read. The new set is written with
//! [`ContextStore::replace_chapter_embeddings`], so overlapping reindexes of
//! one chapter leave a single chunk set behind rather than several.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::chunk::ChunkParams;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::models::{AiContext, NewEmbedding, RecentChapter};
use crate::rank::{format_excerpts, rank};
use crate::store::{ChapterStore, ContextStore};

/// Number of ranked excerpts kept in the background block.
pub const DEFAULT_TOP_K: usize = 15;

/// Number of recent chapters used as query and recap.
pub const DEFAULT_RECENT_CHAPTERS: usize = 3;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetrievalParams {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_recent_chapters")]
    pub recent_chapters: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_recent_chapters() -> usize {
    DEFAULT_RECENT_CHAPTERS
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            recent_chapters: DEFAULT_RECENT_CHAPTERS,
        }
    }
}

/// Outcome of a successful [`ContextAssembler::reindex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexReport {
    pub chapter_id: i64,
    pub novel_id: i64,
    pub chunks: usize,
}

/// Orchestrates chunking, embedding, storage, and ranking for one store.
pub struct ContextAssembler<S> {
    store: Arc<S>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkParams,
    retrieval: RetrievalParams,
}

impl<S> Clone for ContextAssembler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            chunking: self.chunking,
            retrieval: self.retrieval,
        }
    }
}

impl<S: ChapterStore + ContextStore> ContextAssembler<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            chunking: ChunkParams::default(),
            retrieval: RetrievalParams::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkParams) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalParams) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn retrieval(&self) -> RetrievalParams {
        self.retrieval
    }

    /// Rebuild every stored embedding of a chapter.
    ///
    /// Fails with [`RagError::NotFound`] before touching the store when the
    /// chapter does not exist. Otherwise the chapter's existing embeddings
    /// are deleted, its current content is chunked and embedded as one
    /// batch, and the new pairs replace whatever the chapter holds by then,
    /// tagged with chapter and novel. A failed embedding call leaves the
    /// chapter with no embeddings rather than stale ones. Running it twice
    /// on unchanged content yields identical rows.
    pub async fn reindex(&self, chapter_id: i64) -> Result<ReindexReport> {
        let chapter = self
            .store
            .get_chapter(chapter_id)
            .await?
            .ok_or(RagError::NotFound {
                entity: "chapter",
                id: chapter_id,
            })?;

        self.store.delete_chapter_embeddings(chapter.id).await?;

        let chunks: Vec<String> = self
            .chunking
            .split(&chapter.content)
            .into_iter()
            .map(str::to_string)
            .collect();

        if chunks.is_empty() {
            debug!(chapter_id, "chapter is empty, nothing to embed");
            return Ok(ReindexReport {
                chapter_id: chapter.id,
                novel_id: chapter.novel_id,
                chunks: 0,
            });
        }

        let vectors = self
            .embedder
            .embed_batch(&chunks)
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let dims = self.embedder.dims();
        if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RagError::DimensionMismatch {
                expected: dims,
                found: v.len(),
            });
        }

        let rows: Vec<NewEmbedding> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk_text, vector))| NewEmbedding {
                chapter_id: chapter.id,
                novel_id: chapter.novel_id,
                chunk_index: i as i64,
                chunk_text,
                vector,
            })
            .collect();

        self.store
            .replace_chapter_embeddings(chapter.id, &rows)
            .await?;

        info!(
            chapter_id,
            novel_id = chapter.novel_id,
            chunks = rows.len(),
            model = self.embedder.model_name(),
            "chapter reindexed"
        );

        Ok(ReindexReport {
            chapter_id: chapter.id,
            novel_id: chapter.novel_id,
            chunks: rows.len(),
        })
    }

    /// Assemble the retrieval context for generating in a novel.
    ///
    /// The `recent_limit` chapters with the highest chapter numbers are
    /// fetched (this can include `current_chapter_number` itself when it has
    /// already been saved), their contents joined as the query, and the
    /// novel's stored chunks ranked against it. The top
    /// [`RetrievalParams::top_k`] excerpts are serialized into
    /// [`AiContext::background`]. A novel without stored embeddings yields
    /// an empty background but still returns the recent chapters.
    pub async fn build_context(
        &self,
        novel_id: i64,
        current_chapter_number: i64,
        recent_limit: usize,
    ) -> Result<AiContext> {
        let recent = self.store.recent_chapters(novel_id, recent_limit).await?;
        let query = recent
            .iter()
            .map(|ch| ch.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let candidates = self.store.all_embeddings(novel_id).await?;

        let results = if candidates.is_empty() {
            Vec::new()
        } else {
            let query_vec = self
                .embedder
                .embed(&query)
                .await
                .map_err(|e| RagError::Embedding(e.to_string()))?;
            rank(&query_vec, &candidates, self.retrieval.top_k)?
        };

        debug!(
            novel_id,
            current_chapter_number,
            recent = recent.len(),
            candidates = candidates.len(),
            excerpts = results.len(),
            "context assembled"
        );

        Ok(AiContext {
            background: format_excerpts(&results),
            results,
            recent_chapters: recent.into_iter().map(RecentChapter::from).collect(),
        })
    }
}
