//! Storage abstraction for chapters and their chunk embeddings.
//!
//! The core never talks to a database directly. [`ChapterStore`] supplies
//! chapter text and [`ContextStore`] persists chunk/vector pairs; the app
//! crate implements both over SQLite and [`memory::InMemoryStore`]
//! implements both for tests and embedding hosts.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chapter, NewEmbedding, StoredEmbedding};

/// Read access to chapters.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Retrieve a chapter by ID.
    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>>;

    /// The `limit` chapters of a novel with the highest chapter numbers,
    /// ordered by descending chapter number.
    async fn recent_chapters(&self, novel_id: i64, limit: usize) -> Result<Vec<Chapter>>;

    /// All chapters of a novel, ordered by ascending chapter number.
    async fn list_chapters(&self, novel_id: i64) -> Result<Vec<Chapter>>;
}

/// Persistence for chunk/vector pairs.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`all_embeddings`](ContextStore::all_embeddings) | Every stored pair for a novel, in insertion order |
/// | [`save_embeddings`](ContextStore::save_embeddings) | Append new pairs |
/// | [`delete_chapter_embeddings`](ContextStore::delete_chapter_embeddings) | Drop every pair of a chapter |
/// | [`replace_chapter_embeddings`](ContextStore::replace_chapter_embeddings) | Swap a chapter's pairs for a new set atomically |
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn all_embeddings(&self, novel_id: i64) -> Result<Vec<StoredEmbedding>>;

    async fn save_embeddings(&self, embeddings: &[NewEmbedding]) -> Result<()>;

    async fn delete_chapter_embeddings(&self, chapter_id: i64) -> Result<()>;

    /// Drop every pair of `chapter_id` and insert `embeddings` as one unit.
    ///
    /// Concurrent replacements of the same chapter must leave exactly one
    /// of the supplied sets behind, never a union of several.
    async fn replace_chapter_embeddings(
        &self,
        chapter_id: i64,
        embeddings: &[NewEmbedding],
    ) -> Result<()>;
}
