//! App-level records stored alongside the retrieval core's chapters:
//! novels, inspiration notes and the user's model settings.

use std::fmt;
use std::str::FromStr;

use novel_muse_core::gateway::ModelConfig;
use serde::Serialize;

/// A novel and its running word total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Novel {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub total_words: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for inserting a chapter.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub novel_id: i64,
    pub chapter_number: i64,
    pub title: String,
    pub content: String,
    pub word_count: i64,
}

/// A partial chapter update. `content` carries its recomputed word count.
#[derive(Debug, Clone, Default)]
pub struct ChapterUpdate {
    pub title: Option<String>,
    pub content: Option<(String, i64)>,
}

/// The local user's AI settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub model_name: Option<String>,
    pub writing_style: Option<String>,
}

impl Settings {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            api_key: self.api_key.clone(),
            base_url: self.api_base_url.clone(),
            model: self.model_name.clone(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// What an inspiration note is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteCategory {
    Inspiration,
    Character,
    Worldview,
    Plot,
    Other,
}

impl NoteCategory {
    pub const ALL: [NoteCategory; 5] = [
        NoteCategory::Inspiration,
        NoteCategory::Character,
        NoteCategory::Worldview,
        NoteCategory::Plot,
        NoteCategory::Other,
    ];

    /// Stored and command-line form.
    pub fn as_str(self) -> &'static str {
        match self {
            NoteCategory::Inspiration => "inspiration",
            NoteCategory::Character => "character",
            NoteCategory::Worldview => "worldview",
            NoteCategory::Plot => "plot",
            NoteCategory::Other => "other",
        }
    }

    /// Label shown to the writer.
    pub fn display_name(self) -> &'static str {
        match self {
            NoteCategory::Inspiration => "💡 灵感",
            NoteCategory::Character => "👤 人物",
            NoteCategory::Worldview => "🌏 世界观",
            NoteCategory::Plot => "📖 情节",
            NoteCategory::Other => "📝 其他",
        }
    }
}

impl fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown note category '{}' (expected inspiration, character, worldview, plot or other)",
                    s
                )
            })
    }
}

/// A free-form note, optionally linked to one novel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: i64,
    pub novel_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub category: NoteCategory,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for inserting a note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub novel_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub category: NoteCategory,
}

/// A partial note update. `novel_id: Some(None)` unlinks the note.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<NoteCategory>,
    pub novel_id: Option<Option<i64>>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.novel_id.is_none()
    }
}

/// Narrows [`list_notes`](crate::sqlite_store::SqliteStore::list_notes).
/// Unset fields match every note.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteFilter {
    pub category: Option<NoteCategory>,
    pub novel_id: Option<i64>,
}
