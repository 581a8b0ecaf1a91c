//! # Novel Muse CLI (`muse`)
//!
//! Manage novels and chapters, keep their retrieval index current, and
//! generate chapter outlines and prose with an OpenAI-compatible model.
//!
//! ## Usage
//!
//! ```bash
//! muse --config ./config/muse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `muse init` | Create the SQLite database and run schema migrations |
//! | `muse novel add\|list\|show\|delete` | Manage novels |
//! | `muse chapter add\|update\|delete\|list\|show` | Manage chapters |
//! | `muse note add\|list\|show\|update\|delete` | Manage inspiration notes |
//! | `muse reindex <chapter-id>` | Rebuild one chapter's embeddings |
//! | `muse reindex --novel <id>` | Rebuild every chapter of a novel |
//! | `muse context <novel-id> <chapter>` | Print the assembled retrieval context as JSON |
//! | `muse outline <novel-id> <chapter>` | Generate a four-section chapter outline |
//! | `muse expand <novel-id> --outline-file F` | Expand an outline into chapter prose |
//! | `muse settings show\|set` | Inspect or change model settings |
//! | `muse words <text>` | Count words |
//!
//! ## Examples
//!
//! ```bash
//! muse init
//! muse novel add "长夜将明" --description "江湖与朝堂"
//! muse chapter add 1 1 "初入江湖" --file ./drafts/ch1.txt
//! muse note add "反派动机" --category character --novel 1 --content "他想要的不是权力"
//! muse outline 1 2 > outline.txt
//! muse expand 1 --outline-file outline.txt --target-words 3000
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use novel_muse::models::{NoteCategory, NoteFilter, NoteUpdate};
use novel_muse::novels::{NovelService, SettingsPatch};
use novel_muse::{commands, config, logging, migrate};

/// Novel Muse: retrieval-augmented drafting for long-form fiction.
///
/// All commands except `words` read a TOML configuration file; see
/// `config/muse.example.toml` for every option.
#[derive(Parser)]
#[command(
    name = "muse",
    about = "Novel Muse: retrieval-augmented drafting for long-form fiction",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/muse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Idempotent.
    Init,

    /// Manage novels.
    Novel {
        #[command(subcommand)]
        action: NovelAction,
    },

    /// Manage chapters.
    ///
    /// Content changes are re-indexed in the background before the
    /// command exits.
    Chapter {
        #[command(subcommand)]
        action: ChapterAction,
    },

    /// Manage inspiration notes.
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Rebuild stored embeddings now.
    Reindex {
        /// Chapter to re-index.
        #[arg(required_unless_present = "novel", conflicts_with = "novel")]
        chapter_id: Option<i64>,

        /// Re-index every chapter of this novel instead.
        #[arg(long)]
        novel: Option<i64>,
    },

    /// Print the retrieval context for a chapter as JSON.
    Context {
        novel_id: i64,
        chapter_number: i64,
    },

    /// Generate a chapter outline.
    Outline {
        novel_id: i64,
        chapter_number: i64,
    },

    /// Expand an outline into chapter prose.
    Expand {
        novel_id: i64,

        /// File holding the outline; stdin when omitted.
        #[arg(long)]
        outline_file: Option<PathBuf>,

        /// Target length of the generated chapter.
        #[arg(long)]
        target_words: Option<usize>,
    },

    /// Inspect or change model settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Count words (CJK characters and English words).
    ///
    /// Reads stdin when no text is given.
    Words { text: Option<String> },
}

#[derive(Subcommand)]
enum NovelAction {
    /// Create a novel.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List novels, most recently updated first.
    List,
    /// Show a novel and its chapters.
    Show { id: i64 },
    /// Delete a novel with all its chapters and embeddings.
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ChapterAction {
    /// Create a chapter. Content is read from `--file`, or stdin.
    Add {
        novel_id: i64,
        chapter_number: i64,
        title: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Update a chapter's title and/or content.
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        /// Replace content with this file's text.
        #[arg(long, conflicts_with = "stdin")]
        file: Option<PathBuf>,
        /// Replace content with stdin.
        #[arg(long)]
        stdin: bool,
    },
    /// Delete a chapter and its embeddings.
    Delete { id: i64 },
    /// List a novel's chapters in chapter order.
    List { novel_id: i64 },
    /// Print a chapter.
    Show { id: i64 },
}

#[derive(Subcommand)]
enum NoteAction {
    /// Create a note. Content comes from `--content`, `--file`, or stdin.
    Add {
        title: String,
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// inspiration, character, worldview, plot or other.
        #[arg(long, default_value = "inspiration")]
        category: NoteCategory,
        /// Link the note to this novel.
        #[arg(long)]
        novel: Option<i64>,
    },
    /// List notes, most recently updated first.
    List {
        #[arg(long)]
        category: Option<NoteCategory>,
        /// Only notes linked to this novel.
        #[arg(long)]
        novel: Option<i64>,
    },
    /// Print a note.
    Show { id: i64 },
    /// Change a note's fields.
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Replace content with this file's text.
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        category: Option<NoteCategory>,
        /// Link the note to this novel.
        #[arg(long, conflicts_with = "unlink")]
        novel: Option<i64>,
        /// Remove the note's novel link.
        #[arg(long)]
        unlink: bool,
    },
    /// Delete a note.
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings. The API key is never printed.
    Show,
    /// Change settings. An empty value clears a field.
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        style: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Words { text } = &cli.command {
        return commands::words(text.as_deref());
    }

    let cfg = config::load_config(&cli.config)?;

    if matches!(cli.command, Commands::Init) {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let svc = NovelService::open(&cfg).await?;
    let result = run(&svc, cli.command).await;

    // Queued re-index jobs finish before exit, even when the command failed.
    let stats = svc.shutdown().await?;
    if stats.failed > 0 {
        tracing::warn!(failed = stats.failed, "some chapters could not be re-indexed");
    }

    result
}

async fn run(svc: &NovelService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Novel { action } => match action {
            NovelAction::Add { title, description } => {
                commands::novel_add(svc, &title, description.as_deref()).await
            }
            NovelAction::List => commands::novel_list(svc).await,
            NovelAction::Show { id } => commands::novel_show(svc, id).await,
            NovelAction::Delete { id } => commands::novel_delete(svc, id).await,
        },
        Commands::Chapter { action } => match action {
            ChapterAction::Add {
                novel_id,
                chapter_number,
                title,
                file,
            } => commands::chapter_add(svc, novel_id, chapter_number, &title, file.as_deref()).await,
            ChapterAction::Update {
                id,
                title,
                file,
                stdin,
            } => commands::chapter_update(svc, id, title, file.as_deref(), stdin).await,
            ChapterAction::Delete { id } => commands::chapter_delete(svc, id).await,
            ChapterAction::List { novel_id } => commands::chapter_list(svc, novel_id).await,
            ChapterAction::Show { id } => commands::chapter_show(svc, id).await,
        },
        Commands::Note { action } => match action {
            NoteAction::Add {
                title,
                content,
                file,
                category,
                novel,
            } => commands::note_add(svc, &title, content, file.as_deref(), category, novel).await,
            NoteAction::List { category, novel } => {
                let filter = NoteFilter {
                    category,
                    novel_id: novel,
                };
                commands::note_list(svc, filter).await
            }
            NoteAction::Show { id } => commands::note_show(svc, id).await,
            NoteAction::Update {
                id,
                title,
                content,
                file,
                category,
                novel,
                unlink,
            } => {
                let content = match (content, file) {
                    (Some(c), _) => Some(c),
                    (None, Some(p)) => Some(commands::read_text(Some(p.as_path()))?),
                    (None, None) => None,
                };
                let novel_id = if unlink { Some(None) } else { novel.map(Some) };
                let update = NoteUpdate {
                    title,
                    content,
                    category,
                    novel_id,
                };
                commands::note_update(svc, id, update).await
            }
            NoteAction::Delete { id } => commands::note_delete(svc, id).await,
        },
        Commands::Reindex { chapter_id, novel } => match (chapter_id, novel) {
            (_, Some(novel_id)) => commands::reindex_novel(svc, novel_id).await,
            (Some(id), None) => commands::reindex_chapter(svc, id).await,
            (None, None) => anyhow::bail!("pass a chapter id or --novel <id>"),
        },
        Commands::Context {
            novel_id,
            chapter_number,
        } => commands::context(svc, novel_id, chapter_number).await,
        Commands::Outline {
            novel_id,
            chapter_number,
        } => commands::outline(svc, novel_id, chapter_number).await,
        Commands::Expand {
            novel_id,
            outline_file,
            target_words,
        } => commands::expand(svc, novel_id, outline_file.as_deref(), target_words).await,
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::settings_show(svc).await,
            SettingsAction::Set {
                api_key,
                base_url,
                model,
                style,
            } => {
                let patch = SettingsPatch {
                    api_key,
                    api_base_url: base_url,
                    model_name: model,
                    writing_style: style,
                };
                commands::settings_set(svc, patch).await
            }
        },
        Commands::Init | Commands::Words { .. } => {
            // Handled above (before opening the service)
            unreachable!()
        }
    }
}
