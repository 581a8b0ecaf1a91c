//! Outline generation and outline expansion.
//!
//! Both flows assemble context through a [`ContextAssembler`], build a
//! prompt, make one gateway call, and post-process the response. Errors
//! propagate to the caller; the only tolerated degradation is an outline
//! response with missing sections.

use tracing::{info, warn};

use crate::context::ContextAssembler;
use crate::error::{RagError, Result};
use crate::gateway::{GenerationGateway, ModelConfig};
use crate::prompt::{
    build_expansion_prompt, build_outline_prompt, parse_outline_response, OutlineParse,
    DEFAULT_TARGET_WORDS,
};
use crate::store::{ChapterStore, ContextStore};
use crate::words::count_words;

/// Number of recent chapters quoted in the expansion prompt.
pub const DEFAULT_EXPANSION_RECENT: usize = 2;

/// Inputs for [`expand_outline`].
#[derive(Debug, Clone)]
pub struct ExpansionRequest<'a> {
    pub novel_id: i64,
    pub outline: &'a str,
    /// User-configured style; `None` uses the default style.
    pub writing_style: Option<&'a str>,
    pub target_words: usize,
    pub recent_chapters: usize,
}

impl<'a> ExpansionRequest<'a> {
    pub fn new(novel_id: i64, outline: &'a str) -> Self {
        Self {
            novel_id,
            outline,
            writing_style: None,
            target_words: DEFAULT_TARGET_WORDS,
            recent_chapters: DEFAULT_EXPANSION_RECENT,
        }
    }
}

/// Generated chapter prose and its length per [`count_words`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Expansion {
    pub content: String,
    pub word_count: usize,
}

/// Ask the model for a four-section plan of `chapter_number`.
pub async fn generate_outline<S: ChapterStore + ContextStore>(
    assembler: &ContextAssembler<S>,
    gateway: &dyn GenerationGateway,
    novel_id: i64,
    chapter_number: i64,
    model: &ModelConfig,
) -> Result<OutlineParse> {
    let ctx = assembler
        .build_context(
            novel_id,
            chapter_number,
            assembler.retrieval().recent_chapters,
        )
        .await?;
    let prompt = build_outline_prompt(&ctx, chapter_number);

    let response = gateway
        .complete(&prompt, model)
        .await
        .map_err(|e| RagError::Gateway(format!("{:#}", e)))?;

    let parsed = parse_outline_response(&response);
    if parsed.is_partial() {
        warn!(
            novel_id,
            chapter_number,
            missing = ?parsed.defaulted,
            "outline response missing sections, placeholders used"
        );
    }
    Ok(parsed)
}

/// Ask the model to expand an outline into chapter prose.
pub async fn expand_outline<S: ChapterStore + ContextStore>(
    assembler: &ContextAssembler<S>,
    gateway: &dyn GenerationGateway,
    req: &ExpansionRequest<'_>,
    model: &ModelConfig,
) -> Result<Expansion> {
    // Expansion is not tied to a chapter number; selection is by recency.
    let ctx = assembler
        .build_context(
            req.novel_id,
            i64::MAX,
            assembler.retrieval().recent_chapters,
        )
        .await?;

    let recent = &ctx.recent_chapters[..ctx.recent_chapters.len().min(req.recent_chapters)];
    let prompt = build_expansion_prompt(
        req.outline,
        req.writing_style,
        recent,
        &ctx.background,
        req.target_words,
    );

    let content = gateway
        .complete(&prompt, model)
        .await
        .map_err(|e| RagError::Gateway(format!("{:#}", e)))?;
    let word_count = count_words(&content);

    info!(
        novel_id = req.novel_id,
        target_words = req.target_words,
        word_count,
        "outline expanded"
    );

    Ok(Expansion {
        content,
        word_count,
    })
}
