//! In-memory [`ChapterStore`] + [`ContextStore`] for tests and embedding hosts.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Embeddings are kept
//! in insertion order so ranking ties resolve the same way as in SQLite.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Chapter, NewEmbedding, StoredEmbedding};

use super::{ChapterStore, ContextStore};

/// In-memory store holding chapters and chunk embeddings.
#[derive(Default)]
pub struct InMemoryStore {
    chapters: RwLock<HashMap<i64, Chapter>>,
    embeddings: RwLock<Vec<NewEmbedding>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chapter, keyed by its ID.
    pub fn put_chapter(&self, chapter: Chapter) -> Result<()> {
        write(&self.chapters)?.insert(chapter.id, chapter);
        Ok(())
    }

    /// Remove a chapter and its embeddings.
    pub fn remove_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        let removed = write(&self.chapters)?.remove(&id);
        write(&self.embeddings)?.retain(|e| e.chapter_id != id);
        Ok(removed)
    }

    /// Number of stored embeddings belonging to a chapter.
    pub fn embedding_count(&self, chapter_id: i64) -> Result<usize> {
        Ok(read(&self.embeddings)?
            .iter()
            .filter(|e| e.chapter_id == chapter_id)
            .count())
    }

    /// Stored vectors of a chapter, in chunk order.
    pub fn chapter_vectors(&self, chapter_id: i64) -> Result<Vec<Vec<f32>>> {
        let mut rows: Vec<(i64, Vec<f32>)> = read(&self.embeddings)?
            .iter()
            .filter(|e| e.chapter_id == chapter_id)
            .map(|e| (e.chunk_index, e.vector.clone()))
            .collect();
        rows.sort_by_key(|(idx, _)| *idx);
        Ok(rows.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl ChapterStore for InMemoryStore {
    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        Ok(read(&self.chapters)?.get(&id).cloned())
    }

    async fn recent_chapters(&self, novel_id: i64, limit: usize) -> Result<Vec<Chapter>> {
        let mut chapters = self.list_chapters(novel_id).await?;
        chapters.reverse();
        chapters.truncate(limit);
        Ok(chapters)
    }

    async fn list_chapters(&self, novel_id: i64) -> Result<Vec<Chapter>> {
        let mut chapters: Vec<Chapter> = read(&self.chapters)?
            .values()
            .filter(|c| c.novel_id == novel_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| (c.chapter_number, c.id));
        Ok(chapters)
    }
}

#[async_trait]
impl ContextStore for InMemoryStore {
    async fn all_embeddings(&self, novel_id: i64) -> Result<Vec<StoredEmbedding>> {
        Ok(read(&self.embeddings)?
            .iter()
            .filter(|e| e.novel_id == novel_id)
            .map(|e| StoredEmbedding {
                chapter_id: e.chapter_id,
                chunk_text: e.chunk_text.clone(),
                vector: e.vector.clone(),
            })
            .collect())
    }

    async fn save_embeddings(&self, embeddings: &[NewEmbedding]) -> Result<()> {
        write(&self.embeddings)?.extend_from_slice(embeddings);
        Ok(())
    }

    async fn delete_chapter_embeddings(&self, chapter_id: i64) -> Result<()> {
        write(&self.embeddings)?.retain(|e| e.chapter_id != chapter_id);
        Ok(())
    }

    async fn replace_chapter_embeddings(
        &self,
        chapter_id: i64,
        embeddings: &[NewEmbedding],
    ) -> Result<()> {
        let mut rows = write(&self.embeddings)?;
        rows.retain(|e| e.chapter_id != chapter_id);
        rows.extend(embeddings.iter().filter(|e| e.chapter_id == chapter_id).cloned());
        Ok(())
    }
}
