use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const FULL_DOCUMENT_TITLE: &str = "Full Document";

static RE_CHAPTER_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^#{1,6}\s*Chapter\s+(\d+)(?::\s*(.*))?").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// 1-based position of the chapter's first appearance.
    pub ordinal: usize,
    pub body: String,
}

/// Splits markdown into chapters at `#`..`######` "Chapter N[: subtitle]" headings.
///
/// Text before the first chapter heading is dropped. A repeated title keeps its
/// first position and takes the later body. Without any chapter heading the
/// whole input comes back as a single "Full Document" chapter.
pub fn segment(markdown: &str) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in markdown.split('\n') {
        if let Some(caps) = RE_CHAPTER_HEADING.captures(line) {
            if let Some((title, lines)) = current.take() {
                close_chapter(&mut chapters, title, &lines);
            }
            current = Some((chapter_title(&caps), Vec::new()));
            continue;
        }
        if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((title, lines)) = current.take() {
        close_chapter(&mut chapters, title, &lines);
    }

    if chapters.is_empty() {
        return vec![Chapter {
            title: FULL_DOCUMENT_TITLE.to_owned(),
            ordinal: 1,
            body: markdown.to_owned(),
        }];
    }
    chapters
}

fn chapter_title(caps: &regex::Captures<'_>) -> String {
    let number = &caps[1];
    let subtitle = caps
        .get(2)
        .map(|m| m.as_str().trim_end())
        .unwrap_or_default();
    if subtitle.is_empty() {
        format!("Chapter {number}")
    } else {
        format!("Chapter {number}: {subtitle}")
    }
}

fn close_chapter(chapters: &mut Vec<Chapter>, title: String, lines: &[&str]) {
    let body = lines.join("\n").trim().to_owned();
    if let Some(existing) = chapters.iter_mut().find(|c| c.title == title) {
        existing.body = body;
        return;
    }
    let ordinal = chapters.len() + 1;
    chapters.push(Chapter {
        title,
        ordinal,
        body,
    });
}
