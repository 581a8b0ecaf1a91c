//! Novel, chapter, note, and generation operations.
//!
//! [`NovelService`] is the one entry point the CLI talks to. It owns the
//! SQLite store, the context assembler built over it, the generation
//! gateway, and the background [`ReindexQueue`]. Chapter writes commit the
//! text and word counts first, then schedule re-indexing; a failure to
//! schedule is logged and does not fail the write.

use anyhow::{bail, Result};
use std::sync::Arc;

use novel_muse_core::context::{ContextAssembler, ReindexReport};
use novel_muse_core::embedding::Embedder;
use novel_muse_core::gateway::{GenerationGateway, ModelConfig};
use novel_muse_core::generate::{self, Expansion, ExpansionRequest};
use novel_muse_core::models::{AiContext, Chapter};
use novel_muse_core::prompt::OutlineParse;
use novel_muse_core::store::ChapterStore;
use novel_muse_core::words::count_words;
use novel_muse_core::RagError;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::gateway::OpenAiGateway;
use crate::migrate;
use crate::models::{
    ChapterUpdate, NewChapter, NewNote, Note, NoteCategory, NoteFilter, NoteUpdate, Novel, Settings,
};
use crate::reindex::{ReindexQueue, ReindexStats};
use crate::sqlite_store::SqliteStore;

/// Changes to apply to the stored settings. `Some("")` clears a field.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub model_name: Option<String>,
    pub writing_style: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.api_base_url.is_none()
            && self.model_name.is_none()
            && self.writing_style.is_none()
    }

    fn apply(self, settings: &mut Settings) {
        fn set(field: &mut Option<String>, value: Option<String>) {
            if let Some(v) = value {
                *field = if v.trim().is_empty() { None } else { Some(v) };
            }
        }
        set(&mut settings.api_key, self.api_key);
        set(&mut settings.api_base_url, self.api_base_url);
        set(&mut settings.model_name, self.model_name);
        set(&mut settings.writing_style, self.writing_style);
    }
}

pub struct NovelService {
    config: Config,
    store: Arc<SqliteStore>,
    assembler: ContextAssembler<SqliteStore>,
    gateway: Arc<dyn GenerationGateway>,
    queue: ReindexQueue,
}

impl NovelService {
    /// Open the configured database (creating tables if needed) and wire
    /// up the configured embedder and gateway.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let gateway = Arc::new(OpenAiGateway::new(&config.generation)?);
        Ok(Self::with_parts(
            config.clone(),
            SqliteStore::new(pool),
            embedder,
            gateway,
        ))
    }

    /// Assemble a service from explicit parts. Must run inside a tokio
    /// runtime, since it starts the re-index worker.
    pub fn with_parts(
        config: Config,
        store: SqliteStore,
        embedder: Arc<dyn Embedder>,
        gateway: Arc<dyn GenerationGateway>,
    ) -> Self {
        let store = Arc::new(store);
        let assembler = ContextAssembler::new(store.clone(), embedder)
            .with_chunking(config.chunking)
            .with_retrieval(config.retrieval.params());
        let queue = ReindexQueue::spawn(assembler.clone());

        Self {
            config,
            store,
            assembler,
            gateway,
            queue,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Wait for queued re-index jobs and stop the worker.
    pub async fn shutdown(self) -> Result<ReindexStats> {
        self.queue.shutdown().await
    }

    // ============ Novels ============

    pub async fn create_novel(&self, title: &str, description: Option<&str>) -> Result<Novel> {
        if title.trim().is_empty() {
            bail!("novel title must not be empty");
        }
        let id = self.store.create_novel(title, description).await?;
        tracing::info!(novel_id = id, "novel created");
        self.novel(id).await
    }

    pub async fn list_novels(&self) -> Result<Vec<Novel>> {
        self.store.list_novels().await
    }

    pub async fn novel(&self, id: i64) -> Result<Novel> {
        match self.store.get_novel(id).await? {
            Some(novel) => Ok(novel),
            None => Err(RagError::NotFound { entity: "novel", id }.into()),
        }
    }

    pub async fn delete_novel(&self, id: i64) -> Result<()> {
        if !self.store.delete_novel(id).await? {
            return Err(RagError::NotFound { entity: "novel", id }.into());
        }
        tracing::info!(novel_id = id, "novel deleted");
        Ok(())
    }

    // ============ Chapters ============

    pub async fn create_chapter(
        &self,
        novel_id: i64,
        chapter_number: i64,
        title: &str,
        content: &str,
    ) -> Result<Chapter> {
        self.novel(novel_id).await?;

        let new = NewChapter {
            novel_id,
            chapter_number,
            title: title.to_string(),
            content: content.to_string(),
            word_count: count_words(content) as i64,
        };
        let id = self.store.insert_chapter(&new).await?;
        tracing::info!(novel_id, chapter_id = id, word_count = new.word_count, "chapter created");

        self.schedule_reindex(id).await;
        self.chapter(id).await
    }

    /// Update a chapter's title and/or content. Only a content change
    /// recounts words and schedules re-indexing.
    pub async fn update_chapter(
        &self,
        id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Chapter> {
        let content_changed = content.is_some();
        let update = ChapterUpdate {
            title,
            content: content.map(|c| {
                let words = count_words(&c) as i64;
                (c, words)
            }),
        };

        let Some(chapter) = self.store.update_chapter(id, &update).await? else {
            return Err(RagError::NotFound { entity: "chapter", id }.into());
        };

        if content_changed {
            self.schedule_reindex(id).await;
        }
        Ok(chapter)
    }

    pub async fn delete_chapter(&self, id: i64) -> Result<Chapter> {
        match self.store.delete_chapter(id).await? {
            Some(chapter) => {
                tracing::info!(chapter_id = id, novel_id = chapter.novel_id, "chapter deleted");
                Ok(chapter)
            }
            None => Err(RagError::NotFound { entity: "chapter", id }.into()),
        }
    }

    pub async fn chapter(&self, id: i64) -> Result<Chapter> {
        match self.store.get_chapter(id).await? {
            Some(chapter) => Ok(chapter),
            None => Err(RagError::NotFound { entity: "chapter", id }.into()),
        }
    }

    pub async fn list_chapters(&self, novel_id: i64) -> Result<Vec<Chapter>> {
        self.novel(novel_id).await?;
        self.store.list_chapters(novel_id).await
    }

    async fn schedule_reindex(&self, chapter_id: i64) {
        if let Err(e) = self.queue.enqueue(chapter_id).await {
            tracing::warn!(chapter_id, error = %e, "could not schedule reindex");
        }
    }

    // ============ Retrieval ============

    /// Re-index one chapter now, bypassing the queue.
    pub async fn reindex_chapter(&self, chapter_id: i64) -> Result<ReindexReport> {
        Ok(self.assembler.reindex(chapter_id).await?)
    }

    /// Re-index every chapter of a novel, in chapter order.
    pub async fn reindex_novel(&self, novel_id: i64) -> Result<Vec<ReindexReport>> {
        let chapters = self.list_chapters(novel_id).await?;
        let mut reports = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            reports.push(self.assembler.reindex(chapter.id).await?);
        }
        Ok(reports)
    }

    pub async fn build_context(&self, novel_id: i64, chapter_number: i64) -> Result<AiContext> {
        self.novel(novel_id).await?;
        Ok(self
            .assembler
            .build_context(
                novel_id,
                chapter_number,
                self.config.retrieval.recent_chapters,
            )
            .await?)
    }

    // ============ Notes ============

    /// Create a note, optionally linked to an existing novel.
    pub async fn create_note(
        &self,
        title: &str,
        content: &str,
        category: NoteCategory,
        novel_id: Option<i64>,
    ) -> Result<Note> {
        if title.trim().is_empty() {
            bail!("note title must not be empty");
        }
        if let Some(novel_id) = novel_id {
            self.novel(novel_id).await?;
        }

        let new = NewNote {
            novel_id,
            title: title.to_string(),
            content: content.to_string(),
            category,
        };
        let id = self.store.create_note(&new).await?;
        tracing::info!(note_id = id, category = %category, ?novel_id, "note created");
        self.note(id).await
    }

    pub async fn list_notes(&self, filter: NoteFilter) -> Result<Vec<Note>> {
        self.store.list_notes(filter).await
    }

    pub async fn note(&self, id: i64) -> Result<Note> {
        match self.store.get_note(id).await? {
            Some(note) => Ok(note),
            None => Err(RagError::NotFound { entity: "note", id }.into()),
        }
    }

    pub async fn update_note(&self, id: i64, update: NoteUpdate) -> Result<Note> {
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            bail!("note title must not be empty");
        }
        if let Some(Some(novel_id)) = update.novel_id {
            self.novel(novel_id).await?;
        }

        match self.store.update_note(id, &update).await? {
            Some(note) => Ok(note),
            None => Err(RagError::NotFound { entity: "note", id }.into()),
        }
    }

    pub async fn delete_note(&self, id: i64) -> Result<()> {
        if !self.store.delete_note(id).await? {
            return Err(RagError::NotFound { entity: "note", id }.into());
        }
        tracing::info!(note_id = id, "note deleted");
        Ok(())
    }

    // ============ Settings ============

    pub async fn settings(&self) -> Result<Settings> {
        self.store.get_settings().await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut settings = self.store.get_settings().await?;
        patch.apply(&mut settings);
        self.store.save_settings(&settings).await?;
        Ok(settings)
    }

    async fn model_config(&self) -> Result<(Settings, ModelConfig)> {
        let settings = self.store.get_settings().await?;
        let model = settings.model_config();
        Ok((settings, model))
    }

    // ============ Generation ============

    pub async fn generate_outline(&self, novel_id: i64, chapter_number: i64) -> Result<OutlineParse> {
        self.novel(novel_id).await?;
        let (_, model) = self.model_config().await?;
        Ok(generate::generate_outline(
            &self.assembler,
            self.gateway.as_ref(),
            novel_id,
            chapter_number,
            &model,
        )
        .await?)
    }

    /// Expand an outline into chapter prose using the stored writing style.
    /// `target_words` defaults to `[generation] default_target_words`.
    pub async fn expand_outline(
        &self,
        novel_id: i64,
        outline: &str,
        target_words: Option<usize>,
    ) -> Result<Expansion> {
        self.novel(novel_id).await?;
        let (settings, model) = self.model_config().await?;

        let mut req = ExpansionRequest::new(novel_id, outline);
        req.writing_style = settings.writing_style.as_deref();
        req.target_words = target_words.unwrap_or(self.config.generation.default_target_words);
        req.recent_chapters = self.config.retrieval.expansion_recent;

        Ok(generate::expand_outline(&self.assembler, self.gateway.as_ref(), &req, &model).await?)
    }
}
