//! SQLite-backed chapter and embedding storage.
//!
//! Implements the core's [`ChapterStore`] and [`ContextStore`] traits, plus
//! the novel, chapter, note, and settings CRUD used by the service layer.
//! Chapter writes keep `novels.total_words` in step with chapter word
//! counts, and deletes cascade to embeddings by hand. Deleting a novel
//! unlinks its notes instead of deleting them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use novel_muse_core::embedding::{vector_from_json, vector_to_json};
use novel_muse_core::models::{Chapter, NewEmbedding, StoredEmbedding};
use novel_muse_core::store::{ChapterStore, ContextStore};

use crate::models::{
    ChapterUpdate, NewChapter, NewNote, Note, NoteCategory, NoteFilter, NoteUpdate, Novel, Settings,
};

/// SQLite implementation of the core storage traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn chapter_from_row(row: &SqliteRow) -> Result<Chapter> {
    Ok(Chapter {
        id: row.try_get("id")?,
        novel_id: row.try_get("novel_id")?,
        chapter_number: row.try_get("chapter_number")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        word_count: row.try_get("word_count")?,
    })
}

fn novel_from_row(row: &SqliteRow) -> Result<Novel> {
    Ok(Novel {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        total_words: row.try_get("total_words")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn note_from_row(row: &SqliteRow) -> Result<Note> {
    let category: String = row.try_get("category")?;
    Ok(Note {
        id: row.try_get("id")?,
        novel_id: row.try_get("novel_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        category: category
            .parse::<NoteCategory>()
            .map_err(anyhow::Error::msg)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const CHAPTER_COLUMNS: &str = "id, novel_id, chapter_number, title, content, word_count";

const NOTE_COLUMNS: &str = "id, novel_id, title, content, category, created_at, updated_at";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ============ Novels ============

    pub async fn create_novel(&self, title: &str, description: Option<&str>) -> Result<i64> {
        let ts = now();
        let result = sqlx::query(
            "INSERT INTO novels (title, description, total_words, created_at, updated_at) VALUES (?, ?, 0, ?, ?)",
        )
        .bind(title)
        .bind(description)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await
        .context("Failed to create novel")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_novel(&self, id: i64) -> Result<Option<Novel>> {
        let row = sqlx::query(
            "SELECT id, title, description, total_words, created_at, updated_at FROM novels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(novel_from_row).transpose()
    }

    pub async fn list_novels(&self) -> Result<Vec<Novel>> {
        let rows = sqlx::query(
            "SELECT id, title, description, total_words, created_at, updated_at FROM novels ORDER BY updated_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(novel_from_row).collect()
    }

    /// Delete a novel with all of its chapters and embeddings, unlinking
    /// its notes.
    ///
    /// Returns `false` when the novel did not exist.
    pub async fn delete_novel(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chapter_embeddings WHERE novel_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chapters WHERE novel_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE notes SET novel_id = NULL WHERE novel_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM novels WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    // ============ Chapters ============

    /// Insert a chapter and add its word count to the novel's total.
    pub async fn insert_chapter(&self, chapter: &NewChapter) -> Result<i64> {
        let ts = now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO chapters (novel_id, chapter_number, title, content, word_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chapter.novel_id)
        .bind(chapter.chapter_number)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.word_count)
        .bind(ts)
        .bind(ts)
        .execute(&mut *tx)
        .await
        .context("Failed to insert chapter")?
        .last_insert_rowid();

        sqlx::query("UPDATE novels SET total_words = total_words + ?, updated_at = ? WHERE id = ?")
            .bind(chapter.word_count)
            .bind(ts)
            .bind(chapter.novel_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Apply a partial update. A content change adjusts the novel's total
    /// by the word-count difference.
    ///
    /// Returns the chapter as stored after the update, or `None` when it
    /// does not exist.
    pub async fn update_chapter(&self, id: i64, update: &ChapterUpdate) -> Result<Option<Chapter>> {
        let ts = now();
        let mut tx = self.pool.begin().await?;

        let old = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = ?", CHAPTER_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(old) = old.as_ref().map(chapter_from_row).transpose()? else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            sqlx::query("UPDATE chapters SET title = ?, updated_at = ? WHERE id = ?")
                .bind(title)
                .bind(ts)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some((content, word_count)) = &update.content {
            sqlx::query(
                "UPDATE chapters SET content = ?, word_count = ?, updated_at = ? WHERE id = ?",
            )
            .bind(content)
            .bind(word_count)
            .bind(ts)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE novels SET total_words = total_words + ?, updated_at = ? WHERE id = ?",
            )
            .bind(word_count - old.word_count)
            .bind(ts)
            .bind(old.novel_id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = ?", CHAPTER_COLUMNS))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let updated = chapter_from_row(&row)?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Delete a chapter and its embeddings, subtracting its word count
    /// from the novel's total (floored at zero).
    pub async fn delete_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = ?", CHAPTER_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(chapter) = row.as_ref().map(chapter_from_row).transpose()? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM chapter_embeddings WHERE chapter_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chapters WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE novels SET total_words = MAX(0, total_words - ?), updated_at = ? WHERE id = ?",
        )
        .bind(chapter.word_count)
        .bind(now())
        .bind(chapter.novel_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(chapter))
    }

    /// Number of stored embeddings for a chapter.
    pub async fn embedding_count(&self, chapter_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chapter_embeddings WHERE chapter_id = ?")
                .bind(chapter_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // ============ Notes ============

    pub async fn create_note(&self, note: &NewNote) -> Result<i64> {
        let ts = now();
        let result = sqlx::query(
            "INSERT INTO notes (novel_id, title, content, category, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(note.novel_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.category.as_str())
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await
        .context("Failed to create note")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let row = sqlx::query(&format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(note_from_row).transpose()
    }

    /// Notes matching `filter`, most recently updated first.
    pub async fn list_notes(&self, filter: NoteFilter) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM notes
            WHERE (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL OR novel_id = ?2)
            ORDER BY updated_at DESC, id DESC
            "#,
            NOTE_COLUMNS
        ))
        .bind(filter.category.map(NoteCategory::as_str))
        .bind(filter.novel_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(note_from_row).collect()
    }

    /// Apply `update` and return the stored note, or `None` when the note
    /// does not exist.
    pub async fn update_note(&self, id: i64, update: &NoteUpdate) -> Result<Option<Note>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query(&format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let mut note = note_from_row(&row)?;

        if let Some(title) = &update.title {
            note.title = title.clone();
        }
        if let Some(content) = &update.content {
            note.content = content.clone();
        }
        if let Some(category) = update.category {
            note.category = category;
        }
        if let Some(novel_id) = update.novel_id {
            note.novel_id = novel_id;
        }
        note.updated_at = now();

        sqlx::query(
            "UPDATE notes SET novel_id = ?, title = ?, content = ?, category = ?, updated_at = ? WHERE id = ?",
        )
        .bind(note.novel_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.category.as_str())
        .bind(note.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(note))
    }

    /// Returns `false` when the note did not exist.
    pub async fn delete_note(&self, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    // ============ Settings ============

    pub async fn get_settings(&self) -> Result<Settings> {
        let row = sqlx::query(
            "SELECT api_key, api_base_url, model_name, writing_style FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Settings {
                api_key: row.try_get("api_key")?,
                api_base_url: row.try_get("api_base_url")?,
                model_name: row.try_get("model_name")?,
                writing_style: row.try_get("writing_style")?,
            }),
            None => Ok(Settings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (id, api_key, api_base_url, model_name, writing_style, updated_at)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                api_key = excluded.api_key,
                api_base_url = excluded.api_base_url,
                model_name = excluded.model_name,
                writing_style = excluded.writing_style,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&settings.api_key)
        .bind(&settings.api_base_url)
        .bind(&settings.model_name)
        .bind(&settings.writing_style)
        .bind(now())
        .execute(&self.pool)
        .await
        .context("Failed to save settings")?;

        Ok(())
    }
}

#[async_trait]
impl ChapterStore for SqliteStore {
    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        let row = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = ?", CHAPTER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(chapter_from_row).transpose()
    }

    async fn recent_chapters(&self, novel_id: i64, limit: usize) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chapters WHERE novel_id = ? ORDER BY chapter_number DESC, id DESC LIMIT ?",
            CHAPTER_COLUMNS
        ))
        .bind(novel_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chapter_from_row).collect()
    }

    async fn list_chapters(&self, novel_id: i64) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chapters WHERE novel_id = ? ORDER BY chapter_number ASC, id ASC",
            CHAPTER_COLUMNS
        ))
        .bind(novel_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chapter_from_row).collect()
    }
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn all_embeddings(&self, novel_id: i64) -> Result<Vec<StoredEmbedding>> {
        let rows = sqlx::query(
            "SELECT chapter_id, content_chunk, embedding FROM chapter_embeddings WHERE novel_id = ? ORDER BY id ASC",
        )
        .bind(novel_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let json: String = row.try_get("embedding")?;
                Ok(StoredEmbedding {
                    chapter_id: row.try_get("chapter_id")?,
                    chunk_text: row.try_get("content_chunk")?,
                    vector: vector_from_json(&json)?,
                })
            })
            .collect()
    }

    async fn save_embeddings(&self, embeddings: &[NewEmbedding]) -> Result<()> {
        if embeddings.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        insert_embeddings(&mut tx, embeddings, now()).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_chapter_embeddings(&self, chapter_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chapter_embeddings WHERE chapter_id = ?")
            .bind(chapter_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_chapter_embeddings(
        &self,
        chapter_id: i64,
        embeddings: &[NewEmbedding],
    ) -> Result<()> {
        let rows: Vec<NewEmbedding> = embeddings
            .iter()
            .filter(|e| e.chapter_id == chapter_id)
            .cloned()
            .collect();

        // The DELETE takes the write lock first, so concurrent replacements
        // of one chapter run one after another.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chapter_embeddings WHERE chapter_id = ?")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;
        insert_embeddings(&mut tx, &rows, now()).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_embeddings(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    embeddings: &[NewEmbedding],
    ts: i64,
) -> Result<()> {
    for e in embeddings {
        // Rows for a chapter deleted mid-reindex are dropped.
        sqlx::query(
            r#"
            INSERT INTO chapter_embeddings (chapter_id, novel_id, chunk_index, content_chunk, embedding, created_at)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM chapters WHERE id = ?)
            "#,
        )
        .bind(e.chapter_id)
        .bind(e.novel_id)
        .bind(e.chunk_index)
        .bind(&e.chunk_text)
        .bind(vector_to_json(&e.vector))
        .bind(ts)
        .bind(e.chapter_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
