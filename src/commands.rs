//! CLI command handlers.
//!
//! Each handler runs one operation on a [`NovelService`] and prints the
//! result to stdout. Diagnostics go through `tracing` to stderr.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

use novel_muse_core::models::Chapter;
use novel_muse_core::words::count_words;

use crate::models::{Note, NoteCategory, NoteFilter, NoteUpdate, Novel};
use crate::novels::{NovelService, SettingsPatch};

/// Read text from `path`, or from stdin when no path is given.
pub fn read_text(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_novel_row(novel: &Novel) {
    println!(
        "{:>4}  {}  ({} words, updated {})",
        novel.id,
        novel.title,
        novel.total_words,
        format_timestamp(novel.updated_at)
    );
}

fn print_chapter_row(chapter: &Chapter) {
    println!(
        "{:>4}  #{:<3} {}  ({} words)",
        chapter.id, chapter.chapter_number, chapter.title, chapter.word_count
    );
}

fn print_note_row(note: &Note) {
    let link = note
        .novel_id
        .map(|id| format!("novel {}", id))
        .unwrap_or_else(|| "unlinked".to_string());
    println!(
        "{:>4}  {}  {}  ({}, updated {})",
        note.id,
        note.category.display_name(),
        note.title,
        link,
        format_timestamp(note.updated_at)
    );
}

// ============ Novels ============

pub async fn novel_add(svc: &NovelService, title: &str, description: Option<&str>) -> Result<()> {
    let novel = svc.create_novel(title, description).await?;
    println!("Created novel {}: {}", novel.id, novel.title);
    Ok(())
}

pub async fn novel_list(svc: &NovelService) -> Result<()> {
    let novels = svc.list_novels().await?;
    if novels.is_empty() {
        println!("No novels.");
        return Ok(());
    }
    for novel in &novels {
        print_novel_row(novel);
    }
    Ok(())
}

pub async fn novel_show(svc: &NovelService, id: i64) -> Result<()> {
    let novel = svc.novel(id).await?;
    let chapters = svc.list_chapters(id).await?;

    println!("--- Novel ---");
    println!("id:          {}", novel.id);
    println!("title:       {}", novel.title);
    if let Some(desc) = &novel.description {
        println!("description: {}", desc);
    }
    println!("total_words: {}", novel.total_words);
    println!("created:     {}", format_timestamp(novel.created_at));
    println!("updated:     {}", format_timestamp(novel.updated_at));
    println!();
    println!("--- Chapters ({}) ---", chapters.len());
    for chapter in &chapters {
        print_chapter_row(chapter);
    }
    Ok(())
}

pub async fn novel_delete(svc: &NovelService, id: i64) -> Result<()> {
    svc.delete_novel(id).await?;
    println!("Deleted novel {}.", id);
    Ok(())
}

// ============ Chapters ============

pub async fn chapter_add(
    svc: &NovelService,
    novel_id: i64,
    number: i64,
    title: &str,
    file: Option<&Path>,
) -> Result<()> {
    let content = read_text(file)?;
    let chapter = svc.create_chapter(novel_id, number, title, &content).await?;
    println!(
        "Created chapter {} (#{} {}, {} words)",
        chapter.id, chapter.chapter_number, chapter.title, chapter.word_count
    );
    Ok(())
}

pub async fn chapter_update(
    svc: &NovelService,
    id: i64,
    title: Option<String>,
    file: Option<&Path>,
    stdin: bool,
) -> Result<()> {
    let content = match (file, stdin) {
        (Some(p), _) => Some(read_text(Some(p))?),
        (None, true) => Some(read_text(None)?),
        (None, false) => None,
    };
    if title.is_none() && content.is_none() {
        bail!("nothing to update: pass --title, --file or --stdin");
    }

    let chapter = svc.update_chapter(id, title, content).await?;
    println!(
        "Updated chapter {} (#{} {}, {} words)",
        chapter.id, chapter.chapter_number, chapter.title, chapter.word_count
    );
    Ok(())
}

pub async fn chapter_delete(svc: &NovelService, id: i64) -> Result<()> {
    let chapter = svc.delete_chapter(id).await?;
    println!("Deleted chapter {} (#{} {}).", chapter.id, chapter.chapter_number, chapter.title);
    Ok(())
}

pub async fn chapter_list(svc: &NovelService, novel_id: i64) -> Result<()> {
    let chapters = svc.list_chapters(novel_id).await?;
    if chapters.is_empty() {
        println!("No chapters.");
        return Ok(());
    }
    for chapter in &chapters {
        print_chapter_row(chapter);
    }
    Ok(())
}

pub async fn chapter_show(svc: &NovelService, id: i64) -> Result<()> {
    let chapter = svc.chapter(id).await?;
    println!("--- Chapter ---");
    println!("id:         {}", chapter.id);
    println!("novel_id:   {}", chapter.novel_id);
    println!("number:     {}", chapter.chapter_number);
    println!("title:      {}", chapter.title);
    println!("word_count: {}", chapter.word_count);
    println!();
    println!("{}", chapter.content);
    Ok(())
}

// ============ Notes ============

/// Create a note. Content comes from `content`, then `file`, then stdin.
pub async fn note_add(
    svc: &NovelService,
    title: &str,
    content: Option<String>,
    file: Option<&Path>,
    category: NoteCategory,
    novel_id: Option<i64>,
) -> Result<()> {
    let content = match content {
        Some(c) => c,
        None => read_text(file)?,
    };
    let note = svc.create_note(title, &content, category, novel_id).await?;
    println!(
        "Created note {} ({} {})",
        note.id,
        note.category.display_name(),
        note.title
    );
    Ok(())
}

pub async fn note_list(svc: &NovelService, filter: NoteFilter) -> Result<()> {
    let notes = svc.list_notes(filter).await?;
    if notes.is_empty() {
        println!("No notes.");
        return Ok(());
    }
    for note in &notes {
        print_note_row(note);
    }
    Ok(())
}

pub async fn note_show(svc: &NovelService, id: i64) -> Result<()> {
    let note = svc.note(id).await?;
    println!("--- Note ---");
    println!("id:       {}", note.id);
    println!("title:    {}", note.title);
    println!("category: {}", note.category.display_name());
    match note.novel_id {
        Some(novel_id) => println!("novel_id: {}", novel_id),
        None => println!("novel_id: (none)"),
    }
    println!("updated:  {}", format_timestamp(note.updated_at));
    println!();
    println!("{}", note.content);
    Ok(())
}

pub async fn note_update(svc: &NovelService, id: i64, update: NoteUpdate) -> Result<()> {
    if update.is_empty() {
        bail!("nothing to update: pass --title, --content, --file, --category, --novel or --unlink");
    }
    let note = svc.update_note(id, update).await?;
    println!(
        "Updated note {} ({} {})",
        note.id,
        note.category.display_name(),
        note.title
    );
    Ok(())
}

pub async fn note_delete(svc: &NovelService, id: i64) -> Result<()> {
    svc.delete_note(id).await?;
    println!("Deleted note {}.", id);
    Ok(())
}

// ============ Retrieval ============

pub async fn reindex_chapter(svc: &NovelService, chapter_id: i64) -> Result<()> {
    let report = svc.reindex_chapter(chapter_id).await?;
    println!("Reindexed chapter {}: {} chunks", report.chapter_id, report.chunks);
    Ok(())
}

pub async fn reindex_novel(svc: &NovelService, novel_id: i64) -> Result<()> {
    let reports = svc.reindex_novel(novel_id).await?;
    let chunks: usize = reports.iter().map(|r| r.chunks).sum();
    println!(
        "Reindexed {} chapters of novel {}: {} chunks",
        reports.len(),
        novel_id,
        chunks
    );
    Ok(())
}

pub async fn context(svc: &NovelService, novel_id: i64, chapter_number: i64) -> Result<()> {
    let ctx = svc.build_context(novel_id, chapter_number).await?;
    println!("{}", serde_json::to_string_pretty(&ctx)?);
    Ok(())
}

// ============ Generation ============

pub async fn outline(svc: &NovelService, novel_id: i64, chapter_number: i64) -> Result<()> {
    let parsed = svc.generate_outline(novel_id, chapter_number).await?;
    println!("{}", parsed.outline.to_text());
    Ok(())
}

pub async fn expand(
    svc: &NovelService,
    novel_id: i64,
    outline_file: Option<&Path>,
    target_words: Option<usize>,
) -> Result<()> {
    let outline = read_text(outline_file)?;
    if outline.trim().is_empty() {
        bail!("outline is empty");
    }
    let expansion = svc.expand_outline(novel_id, &outline, target_words).await?;
    println!("{}", expansion.content);
    eprintln!("({} words)", expansion.word_count);
    Ok(())
}

// ============ Settings ============

pub async fn settings_show(svc: &NovelService) -> Result<()> {
    let settings = svc.settings().await?;
    let or_unset = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());

    println!(
        "api_key:       {}",
        if settings.has_api_key() { "(set)" } else { "(not set)" }
    );
    println!("api_base_url:  {}", or_unset(&settings.api_base_url));
    println!("model_name:    {}", or_unset(&settings.model_name));
    println!("writing_style: {}", or_unset(&settings.writing_style));
    println!(
        "endpoint:      {}",
        if settings.model_config().uses_user_endpoint() {
            "user"
        } else {
            "built-in"
        }
    );
    Ok(())
}

pub async fn settings_set(svc: &NovelService, patch: SettingsPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("nothing to set: pass at least one of --api-key, --base-url, --model, --style");
    }
    svc.update_settings(patch).await?;
    println!("Settings saved.");
    Ok(())
}

/// Print the word count of `text` (or of stdin when no text is given).
/// Needs no database.
pub fn words(text: Option<&str>) -> Result<()> {
    let text = match text {
        Some(t) => t.to_string(),
        None => read_text(None)?,
    };
    println!("{}", count_words(&text));
    Ok(())
}
