//! Boilerplate section removal for document-derived markdown.
//!
//! Two passes run over the anchored text: a classifier pass that scores each
//! unprotected heading against the language's unwanted labels, then a regex
//! sweep that removes any heading textually naming an unwanted label. Protected
//! headings survive both passes.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::artifacts;
use crate::classify::TextClassifier;
use crate::formats::ClassificationDecision;
use crate::language::{Language, LanguageProfile, detect_language};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.30;

static RE_SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{2,})[ \t]*(.+?)[ \t]*\r?$").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedDocument {
    pub text: String,
    pub language: Language,
    /// Whether a chapter anchor was found and front matter dropped.
    pub anchored: bool,
    /// Headings whose sections were removed, in removal order.
    pub removed: Vec<String>,
    pub decisions: Vec<ClassificationDecision>,
}

pub struct SectionPruner {
    classifier: Arc<dyn TextClassifier>,
    confidence_threshold: f32,
}

impl SectionPruner {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self {
            classifier,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub async fn prune(&self, markdown: &str) -> NormalizedDocument {
        let language = detect_language(markdown);
        let profile = language.profile();
        tracing::info!(language = language.tag(), "detected document language");

        let (anchored_text, anchored) = anchor(markdown, profile);
        let mut removed = Vec::new();

        let (text, decisions) = self
            .classification_pass(anchored_text, profile, &mut removed)
            .await;
        let text = sweep_pass(&text, profile, &mut removed);

        NormalizedDocument {
            text: text.trim().to_owned(),
            language,
            anchored,
            removed,
            decisions,
        }
    }

    /// Prunes the markdown file at `path` and writes `cleaned_{stem}.md` beside it.
    pub async fn prune_file(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let markdown = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read markdown: {}", path.display()))?;
        let document = self.prune(&markdown).await;

        let out_path = artifacts::cleaned_artifact_path(path)?;
        artifacts::write_artifact(&out_path, &document.text).await?;
        tracing::info!(
            input = %path.display(),
            out = %out_path.display(),
            removed = document.removed.len(),
            "cleaned markdown saved"
        );
        Ok(out_path)
    }

    async fn classification_pass(
        &self,
        text: &str,
        profile: &LanguageProfile,
        removed: &mut Vec<String>,
    ) -> (String, Vec<ClassificationDecision>) {
        let labels = profile.candidate_labels();
        let headings: Vec<(String, String)> = RE_SECTION_HEADING
            .captures_iter(text)
            .map(|caps| (caps[1].to_owned(), caps[2].trim().to_owned()))
            .collect();

        let mut text = text.to_owned();
        let mut decisions = Vec::new();

        for (hashes, heading) in headings {
            if heading.is_empty() || profile.is_protected(&heading) {
                continue;
            }

            let ranked = match self.classifier.classify(&heading, &labels).await {
                Ok(ranked) => ranked,
                Err(err) => {
                    tracing::warn!(
                        heading = %heading,
                        error = %format!("{err:#}"),
                        "classification failed; keeping section"
                    );
                    continue;
                }
            };
            let Some((label, score)) = ranked.into_iter().next() else {
                continue;
            };
            tracing::debug!(heading = %heading, label = %label, score, "classified heading");

            let category = profile
                .unwanted_category(&label)
                .filter(|_| score > self.confidence_threshold);
            decisions.push(ClassificationDecision {
                heading: heading.clone(),
                label,
                score,
            });
            let Some(category) = category else {
                continue;
            };

            if let Some(range) = classified_section(&text, &hashes, &heading) {
                text.replace_range(range, "");
                tracing::info!(heading = %heading, category, "removed classified section");
                removed.push(heading);
            }
        }

        (text, decisions)
    }
}

/// Drops everything before the first chapter-start match.
fn anchor<'a>(markdown: &'a str, profile: &LanguageProfile) -> (&'a str, bool) {
    match profile.chapter_start_regex().find(markdown) {
        Some(m) => (&markdown[m.start()..], true),
        None => {
            tracing::warn!(
                language = profile.language.tag(),
                "no chapter anchor found; keeping front matter"
            );
            (markdown, false)
        }
    }
}

/// From the heading line up to the next `## ` heading or end of text.
fn classified_section(text: &str, hashes: &str, heading: &str) -> Option<Range<usize>> {
    let pattern = format!(
        r"(?im)^{}[ \t]*{}[ \t]*\r?$",
        regex::escape(hashes),
        regex::escape(heading)
    );
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(text)?;
    let end = text[m.end()..]
        .find("\n## ")
        .map(|offset| m.end() + offset)
        .unwrap_or(text.len());
    Some(m.start()..end)
}

fn sweep_pattern(profile: &LanguageProfile) -> Option<Regex> {
    let variants = profile
        .unwanted_labels()
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>();
    if variants.is_empty() {
        return None;
    }
    let pattern = format!(r"(?im)^#{{2,}}[ \t]*(?:{})\b[^\n]*", variants.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(error = %err, "invalid sweep pattern; skipping sweep");
            None
        }
    }
}

/// Removes every unprotected section whose heading names an unwanted label,
/// up to the next `##`+ heading or end of text.
fn sweep_pass(text: &str, profile: &LanguageProfile, removed: &mut Vec<String>) -> String {
    let Some(re) = sweep_pattern(profile) else {
        return text.to_owned();
    };

    let mut ranges: Vec<Range<usize>> = Vec::new();
    for m in re.find_iter(text) {
        if ranges.last().is_some_and(|last| m.start() < last.end) {
            continue;
        }
        let heading = m.as_str().trim_start_matches('#').trim();
        if profile.is_protected(heading) {
            continue;
        }
        let end = text[m.end()..]
            .find("\n##")
            .map(|offset| m.end() + offset)
            .unwrap_or(text.len());
        tracing::info!(heading, "removed section by label sweep");
        removed.push(heading.to_owned());
        ranges.push(m.start()..end);
    }

    let mut out = text.to_owned();
    for range in ranges.into_iter().rev() {
        out.replace_range(range, "");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::classify::NoopClassifier;

    /// Scores each heading with a fixed `(label, score)`; unknown headings get nothing.
    struct StubClassifier {
        verdicts: HashMap<&'static str, (&'static str, f32)>,
    }

    impl StubClassifier {
        fn new(verdicts: &[(&'static str, &'static str, f32)]) -> Arc<Self> {
            Arc::new(Self {
                verdicts: verdicts
                    .iter()
                    .map(|(heading, label, score)| (*heading, (*label, *score)))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl TextClassifier for StubClassifier {
        async fn classify(
            &self,
            text: &str,
            _labels: &[String],
        ) -> anyhow::Result<Vec<(String, f32)>> {
            Ok(self
                .verdicts
                .get(text)
                .map(|(label, score)| vec![((*label).to_owned(), *score)])
                .unwrap_or_default())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl TextClassifier for FailingClassifier {
        async fn classify(&self, _: &str, _: &[String]) -> anyhow::Result<Vec<(String, f32)>> {
            anyhow::bail!("classifier offline")
        }
    }

    #[tokio::test]
    async fn front_matter_and_references_are_removed() {
        let input = "## Preface\nboilerplate\n## Abstract\nReal content\n## References\nBib entries";
        let doc = SectionPruner::new(Arc::new(NoopClassifier))
            .prune(input)
            .await;

        assert_eq!(doc.language, Language::English);
        assert!(doc.anchored);
        assert_eq!(doc.text, "## Abstract\nReal content");
        assert_eq!(doc.removed, vec!["References"]);
    }

    #[tokio::test]
    async fn protected_heading_survives_confident_unwanted_label() {
        let input = "## Abstract\nSummary here\n## Introduction\nWhy it matters\n## Results\nNumbers";
        let classifier = StubClassifier::new(&[
            ("Introduction", "Preface", 0.99),
            ("Results", "References", 0.99),
        ]);
        let doc = SectionPruner::new(classifier).prune(input).await;

        assert_eq!(doc.text, input);
        assert!(doc.decisions.is_empty());
    }

    #[tokio::test]
    async fn low_confidence_keeps_section() {
        let input = "## Abstract\nA\n## Project History\nOld story\n## Chapter 1\nBody";
        let classifier = StubClassifier::new(&[("Project History", "Preface", 0.30)]);
        let doc = SectionPruner::new(classifier).prune(input).await;

        assert!(doc.text.contains("## Project History\nOld story"));
        assert_eq!(doc.decisions.len(), 1);
        assert!(doc.removed.is_empty());
    }

    #[tokio::test]
    async fn confident_unwanted_label_removes_section_body() {
        let input = "## Abstract\nA\n## Project History\nOld story\nmore\n## Chapter 1\nBody";
        let classifier = StubClassifier::new(&[("Project History", "Preface", 0.31)]);
        let doc = SectionPruner::new(classifier).prune(input).await;

        assert_eq!(doc.text, "## Abstract\nA\n\n## Chapter 1\nBody");
        assert_eq!(doc.removed, vec!["Project History"]);
    }

    #[tokio::test]
    async fn body_text_label_never_removes() {
        let input = "## Abstract\nA\n## Methods\nHow we did it";
        let classifier = StubClassifier::new(&[("Methods", "Body Text", 0.95)]);
        let doc = SectionPruner::new(classifier).prune(input).await;

        assert_eq!(doc.text, input);
    }

    #[tokio::test]
    async fn classifier_failure_keeps_sections() {
        let input = "## Abstract\nA\n## Project History\nOld story";
        let doc = SectionPruner::new(Arc::new(FailingClassifier))
            .prune(input)
            .await;

        assert_eq!(doc.text, input);
    }

    #[tokio::test]
    async fn missing_anchor_keeps_everything_but_sweeps() {
        let input = "Cover page\n## Overview\nIntro text\n## Glossary\nTerms";
        let doc = SectionPruner::new(Arc::new(NoopClassifier))
            .prune(input)
            .await;

        assert!(!doc.anchored);
        assert_eq!(doc.text, "Cover page\n## Overview\nIntro text");
    }

    #[tokio::test]
    async fn german_protected_terms_beat_unwanted_variants() {
        let input = "## Inhaltsverzeichnis\n1. Kapitel\n## Einleitung\nWorum es geht\n## Kapitel 1\nInhalt\n## Literaturverzeichnis\nQuellen";
        let doc = SectionPruner::new(Arc::new(NoopClassifier))
            .prune(input)
            .await;

        assert_eq!(doc.language, Language::German);
        assert_eq!(
            doc.text,
            "## Einleitung\nWorum es geht\n## Kapitel 1\nInhalt"
        );
    }

    #[tokio::test]
    async fn prune_file_writes_cleaned_sibling() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let input = temp.path().join("paper.md");
        std::fs::write(&input, "## Abstract\nReal content\n## References\nBib entries\n")?;

        let out = SectionPruner::new(Arc::new(NoopClassifier))
            .prune_file(&input)
            .await?;

        assert_eq!(out, temp.path().join("cleaned_paper.md"));
        assert_eq!(std::fs::read_to_string(out)?, "## Abstract\nReal content");
        Ok(())
    }
}
