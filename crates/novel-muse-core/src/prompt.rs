//! Prompt construction for outline and expansion requests, and parsing of
//! outline responses.
//!
//! Outline responses are free-form text in which four sections are
//! introduced by bracketed labels (`【章节主题】`, `【情节框架】`,
//! `【关键冲突】`, `【人物互动】`). A section runs from its label to the next
//! `【` or the end of the text. Sections the model leaves out are filled
//! with fixed placeholders so partial output never aborts the flow.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{AiContext, RecentChapter};

/// Characters of each recent chapter quoted in the outline prompt.
pub const OUTLINE_PREVIEW_CHARS: usize = 500;

/// Characters of each recent chapter quoted in the expansion prompt.
pub const EXPANSION_PREVIEW_CHARS: usize = 300;

/// Characters of the background block quoted in the expansion prompt.
pub const EXPANSION_BACKGROUND_CHARS: usize = 1000;

/// Writing style used when the user has not configured one.
pub const DEFAULT_WRITING_STYLE: &str = "简洁明快,注重情节推进";

/// Target length of an expanded chapter when the caller gives none.
pub const DEFAULT_TARGET_WORDS: usize = 4000;

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"【(章节主题|情节框架|关键冲突|人物互动)】\s*([^【]*)").expect("valid section regex")
});

/// One of the four labeled sections of an outline response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineField {
    Theme,
    Framework,
    Conflicts,
    Interactions,
}

impl OutlineField {
    pub const ALL: [OutlineField; 4] = [
        OutlineField::Theme,
        OutlineField::Framework,
        OutlineField::Conflicts,
        OutlineField::Interactions,
    ];

    /// The bracket label text, without brackets.
    pub fn label(self) -> &'static str {
        match self {
            OutlineField::Theme => "章节主题",
            OutlineField::Framework => "情节框架",
            OutlineField::Conflicts => "关键冲突",
            OutlineField::Interactions => "人物互动",
        }
    }

    /// Value used when the response lacks this section.
    pub fn placeholder(self) -> &'static str {
        match self {
            OutlineField::Theme => "暂无主题建议",
            OutlineField::Framework => "暂无框架建议",
            OutlineField::Conflicts => "暂无冲突建议",
            OutlineField::Interactions => "暂无互动建议",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.label() == label)
    }
}

/// A structured chapter outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outline {
    pub theme: String,
    pub framework: String,
    pub conflicts: String,
    pub interactions: String,
}

impl Outline {
    pub fn get(&self, field: OutlineField) -> &str {
        match field {
            OutlineField::Theme => &self.theme,
            OutlineField::Framework => &self.framework,
            OutlineField::Conflicts => &self.conflicts,
            OutlineField::Interactions => &self.interactions,
        }
    }

    fn slot(&mut self, field: OutlineField) -> &mut String {
        match field {
            OutlineField::Theme => &mut self.theme,
            OutlineField::Framework => &mut self.framework,
            OutlineField::Conflicts => &mut self.conflicts,
            OutlineField::Interactions => &mut self.interactions,
        }
    }

    /// Render back into the bracket-labeled text format.
    pub fn to_text(&self) -> String {
        OutlineField::ALL
            .iter()
            .map(|f| format!("【{}】\n{}", f.label(), self.get(*f)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Result of parsing an outline response.
///
/// `defaulted` lists the sections that were missing and received their
/// placeholder. A non-empty list marks a degraded but usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineParse {
    pub outline: Outline,
    pub defaulted: Vec<OutlineField>,
}

impl OutlineParse {
    pub fn is_partial(&self) -> bool {
        !self.defaulted.is_empty()
    }
}

/// Extract the four labeled sections from a model response.
///
/// The first occurrence of each label wins; its text is trimmed. Missing
/// sections get [`OutlineField::placeholder`].
pub fn parse_outline_response(response: &str) -> OutlineParse {
    let mut found: [Option<String>; 4] = Default::default();

    for caps in SECTION_RE.captures_iter(response) {
        let Some(field) = OutlineField::from_label(&caps[1]) else {
            continue;
        };
        let idx = field as usize;
        if found[idx].is_none() {
            found[idx] = Some(caps[2].trim().to_string());
        }
    }

    let mut outline = Outline {
        theme: String::new(),
        framework: String::new(),
        conflicts: String::new(),
        interactions: String::new(),
    };
    let mut defaulted = Vec::new();

    for (field, value) in OutlineField::ALL.into_iter().zip(found) {
        *outline.slot(field) = match value {
            Some(v) => v,
            None => {
                defaulted.push(field);
                field.placeholder().to_string()
            }
        };
    }

    OutlineParse { outline, defaulted }
}

/// The first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build the prompt asking for a four-section plan of `chapter_number`.
pub fn build_outline_prompt(ctx: &AiContext, chapter_number: i64) -> String {
    let recap = ctx
        .recent_chapters
        .iter()
        .map(|ch| {
            format!(
                "【第 {} 章：{}】\n{}...",
                ch.number,
                ch.title,
                truncate_chars(&ch.content, OUTLINE_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let background = non_empty_or(&ctx.background, "暂无背景信息");
    let recap = non_empty_or(&recap, "这是第一章");

    format!(
        "你是一位资深小说编辑,正在帮助作者规划下一章节。

【小说背景】
{background}

【前文回顾】
{recap}

【任务】
请为第 {chapter_number} 章提供详细的章节规划,包括:

1. 章节主题建议
2. 情节发展框架
3. 关键冲突点
4. 人物互动要点

要求:
- 保持与前文的连贯性
- 推动主线剧情发展
- 符合小说整体风格
- 具体且可操作

请按照以下格式输出:

【章节主题】
(在此填写章节主题)

【情节框架】
(在此填写情节发展框架)

【关键冲突】
(在此填写关键冲突点)

【人物互动】
(在此填写人物互动要点)"
    )
}

/// Build the prompt asking for prose expanding `outline` to about
/// `target_words` words.
pub fn build_expansion_prompt(
    outline: &str,
    writing_style: Option<&str>,
    recent: &[RecentChapter],
    background: &str,
    target_words: usize,
) -> String {
    let style = writing_style
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_WRITING_STYLE);

    let recent_text = recent
        .iter()
        .map(|ch| {
            format!(
                "【第 {} 章片段】\n{}...",
                ch.number,
                truncate_chars(&ch.content, EXPANSION_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let recent_text = non_empty_or(&recent_text, "这是第一章");
    let background = non_empty_or(
        truncate_chars(background, EXPANSION_BACKGROUND_CHARS),
        "暂无背景",
    );

    format!(
        "你是一位专业的小说作家,需要根据章节大纲扩写为完整的章节内容。

【写作风格】
{style}

【前文参考】
{recent_text}

【相关背景】
{background}

【章节大纲】
{outline}

【任务要求】
1. 根据大纲扩写为约 {target_words} 字的完整章节
2. 模仿上述写作风格
3. 保持与前文的连贯性
4. 情节生动,对话自然
5. 注重细节描写和心理刻画

请直接输出完整的章节内容,不要包含任何说明文字:"
    )
}

fn non_empty_or<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.is_empty() {
        fallback
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recent(number: i64, content: &str) -> RecentChapter {
        RecentChapter {
            number,
            title: format!("标题{}", number),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_parse_full_response() {
        let response = "【章节主题】\n重逢\n\n【情节框架】\n先抑后扬\n\n【关键冲突】\n师徒反目\n\n【人物互动】\n林与陈的对峙";
        let parsed = parse_outline_response(response);
        assert!(!parsed.is_partial());
        assert_eq!(parsed.outline.theme, "重逢");
        assert_eq!(parsed.outline.framework, "先抑后扬");
        assert_eq!(parsed.outline.conflicts, "师徒反目");
        assert_eq!(parsed.outline.interactions, "林与陈的对峙");
    }

    #[test]
    fn test_parse_only_theme() {
        let parsed = parse_outline_response("【章节主题】A");
        assert_eq!(parsed.outline.theme, "A");
        assert_eq!(parsed.outline.framework, "暂无框架建议");
        assert_eq!(parsed.outline.conflicts, "暂无冲突建议");
        assert_eq!(parsed.outline.interactions, "暂无互动建议");
        assert_eq!(
            parsed.defaulted,
            vec![
                OutlineField::Framework,
                OutlineField::Conflicts,
                OutlineField::Interactions
            ]
        );
    }

    #[test]
    fn test_parse_garbage_defaults_everything() {
        let parsed = parse_outline_response("I cannot help with that.");
        assert_eq!(parsed.defaulted.len(), 4);
        assert_eq!(parsed.outline.theme, "暂无主题建议");
    }

    #[test]
    fn test_parse_out_of_order_and_preamble() {
        let response = "好的,以下是规划:\n【人物互动】 甲乙\n【章节主题】 丙 \n";
        let parsed = parse_outline_response(response);
        assert_eq!(parsed.outline.theme, "丙");
        assert_eq!(parsed.outline.interactions, "甲乙");
        assert_eq!(parsed.defaulted.len(), 2);
    }

    #[test]
    fn test_parse_section_stops_at_unknown_bracket() {
        let parsed = parse_outline_response("【章节主题】主题\n【备注】无关");
        assert_eq!(parsed.outline.theme, "主题");
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let parsed = parse_outline_response("【章节主题】一\n【章节主题】二");
        assert_eq!(parsed.outline.theme, "一");
    }

    #[test]
    fn test_outline_to_text_reparses() {
        let parsed = parse_outline_response("【章节主题】甲\n【情节框架】乙\n【关键冲突】丙\n【人物互动】丁");
        let again = parse_outline_response(&parsed.outline.to_text());
        assert_eq!(again.outline, parsed.outline);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("你好世界", 2), "你好");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_outline_prompt_without_context() {
        let prompt = build_outline_prompt(&AiContext::default(), 1);
        assert!(prompt.contains("【小说背景】\n暂无背景信息"));
        assert!(prompt.contains("【前文回顾】\n这是第一章"));
        assert!(prompt.contains("请为第 1 章提供详细的章节规划"));
        for field in OutlineField::ALL {
            assert!(prompt.contains(&format!("【{}】", field.label())));
        }
    }

    #[test]
    fn test_outline_prompt_truncates_recap() {
        let ctx = AiContext {
            background: "[相关片段 1]\n背景".to_string(),
            results: Vec::new(),
            recent_chapters: vec![recent(3, &"长".repeat(800)), recent(2, "短")],
        };
        let prompt = build_outline_prompt(&ctx, 4);
        assert!(prompt.contains("[相关片段 1]\n背景"));
        assert!(prompt.contains(&format!("【第 3 章：标题3】\n{}...", "长".repeat(500))));
        assert!(!prompt.contains(&"长".repeat(501)));
        assert!(prompt.contains("【第 2 章：标题2】\n短..."));
    }

    #[test]
    fn test_expansion_prompt_defaults() {
        let prompt = build_expansion_prompt("大纲内容", None, &[], "", 4000);
        assert!(prompt.contains(&format!("【写作风格】\n{}", DEFAULT_WRITING_STYLE)));
        assert!(prompt.contains("【前文参考】\n这是第一章"));
        assert!(prompt.contains("【相关背景】\n暂无背景"));
        assert!(prompt.contains("【章节大纲】\n大纲内容"));
        assert!(prompt.contains("约 4000 字"));
    }

    #[test]
    fn test_expansion_prompt_truncation() {
        let background = "景".repeat(1500);
        let prompt = build_expansion_prompt(
            "大纲",
            Some("冷峻克制"),
            &[recent(5, &"文".repeat(400))],
            &background,
            2500,
        );
        assert!(prompt.contains("【写作风格】\n冷峻克制"));
        assert!(prompt.contains(&format!("【第 5 章片段】\n{}...", "文".repeat(300))));
        assert!(!prompt.contains(&"文".repeat(301)));
        assert!(prompt.contains(&"景".repeat(1000)));
        assert!(!prompt.contains(&"景".repeat(1001)));
        assert!(prompt.contains("约 2500 字"));
    }

    #[test]
    fn test_expansion_prompt_blank_style_uses_default() {
        let prompt = build_expansion_prompt("大纲", Some("   "), &[], "", 100);
        assert!(prompt.contains(DEFAULT_WRITING_STYLE));
    }
}
