//! Data types shared by the chunking, ranking, and context pipeline.

use serde::{Deserialize, Serialize};

/// A chapter as supplied by a [`ChapterStore`](crate::store::ChapterStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub novel_id: i64,
    pub chapter_number: i64,
    pub title: String,
    pub content: String,
    pub word_count: i64,
}

/// A chunk/vector pair ready to be persisted for a chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbedding {
    pub chapter_id: i64,
    pub novel_id: i64,
    /// Position of the chunk within its chapter, starting at 0.
    pub chunk_index: i64,
    pub chunk_text: String,
    pub vector: Vec<f32>,
}

/// A stored chunk/vector pair as returned by
/// [`ContextStore::all_embeddings`](crate::store::ContextStore::all_embeddings).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub chapter_id: i64,
    pub chunk_text: String,
    pub vector: Vec<f32>,
}

/// A chunk's text paired with its similarity to a query, in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub text: String,
    pub score: f32,
}

/// The parts of a recent chapter used for prompt construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentChapter {
    pub number: i64,
    pub title: String,
    pub content: String,
}

impl From<Chapter> for RecentChapter {
    fn from(ch: Chapter) -> Self {
        Self {
            number: ch.chapter_number,
            title: ch.title,
            content: ch.content,
        }
    }
}

/// Context bundle handed to the prompt builders.
///
/// `background` is the ranked excerpts serialized as one text block (empty
/// when the novel has no stored embeddings). `recent_chapters` is ordered
/// by descending chapter number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AiContext {
    pub background: String,
    pub results: Vec<RetrievalResult>,
    pub recent_chapters: Vec<RecentChapter>,
}
