use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifacts;
use crate::chapters::{self, Chapter};
use crate::llm::TextCompletion;
use crate::splitter::TextSplitter;

pub const MAX_QUESTIONS: usize = 10;
const QUESTION_TEMPERATURE: f32 = 0.1;
const ANSWER_TEMPERATURE: f32 = 0.2;
const CONTEXT_CHUNKS: usize = 2;
const ANSWER_CONCURRENCY: usize = 4;

const QUESTION_INSTRUCTIONS: &str = "You write study questions for a chapter of a document.\n\
- Identify the most important facts or concepts in the chapter text.\n\
- For each, write one concise, self-contained question that the chapter text fully answers.\n\
- Focus on main ideas, not trivia. Skip anything the text does not clearly support.\n\
- Never refer to \"this text\", \"the paragraph\" or \"the chapter\".\n\
- Write at most 10 questions, one per line, numbered `1.`, `2.`, ...\n\
- Do not include answers.";

const ANSWER_INSTRUCTIONS: &str =
    "Answer the question using only the provided text. Be concise and factual.";

static RE_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+\.)?\s*(?:What|Why|How|When|Where|Who)\b").unwrap()
});
static RE_NUMBERING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s*").unwrap());

/// Question lines of a completion reply with their numbering stripped, capped at [`MAX_QUESTIONS`].
pub fn parse_questions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| RE_QUESTION.is_match(line))
        .map(|line| RE_NUMBERING.replace(line, "").trim().to_owned())
        .filter(|q| !q.is_empty())
        .take(MAX_QUESTIONS)
        .collect()
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// The `k` chunks sharing the most distinct terms with `question`, best first.
/// Ties keep document order.
pub fn top_chunks<'a>(chunks: &'a [String], question: &str, k: usize) -> Vec<&'a str> {
    let question_terms = terms(question);
    let mut scored: Vec<(usize, usize)> = chunks
        .iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let chunk_terms = terms(chunk);
            (idx, question_terms.intersection(&chunk_terms).count())
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(k)
        .map(|(idx, _)| chunks[idx].as_str())
        .collect()
}

pub struct QaGenerator {
    completion: Arc<dyn TextCompletion>,
    splitter: TextSplitter,
}

impl QaGenerator {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self {
            completion,
            splitter: TextSplitter::default(),
        }
    }

    /// Renders the Q&A document for `markdown`. Failed calls become inline `[Error]` markers.
    pub async fn generate(&self, markdown: &str) -> anyhow::Result<String> {
        let mut out = String::from("# Q&A Pairs\n\n");

        for chapter in chapters::segment(markdown) {
            let questions = match self.questions(&chapter).await {
                Ok(questions) => questions,
                Err(err) => {
                    tracing::warn!(
                        chapter = %chapter.title,
                        error = %format!("{err:#}"),
                        "question generation failed"
                    );
                    out.push_str(&format!("## {}\n\n[Error] {err:#}\n\n", chapter.title));
                    continue;
                }
            };
            if questions.is_empty() {
                tracing::info!(chapter = %chapter.title, "no questions; skipping chapter");
                continue;
            }
            tracing::info!(chapter = %chapter.title, questions = questions.len(), "answering");

            let answers = self.answers(&chapter, &questions).await?;
            out.push_str(&format!("## {}\n\n", chapter.title));
            for (i, (question, answer)) in questions.iter().zip(answers).enumerate() {
                let n = i + 1;
                out.push_str(&format!("**Q{n}:** {question}\n\n**A{n}:** {answer}\n\n"));
            }
        }

        Ok(out)
    }

    /// Writes `{stem}_qa.md` into `out_dir`.
    pub async fn generate_file(&self, md_path: &Path, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let markdown = tokio::fs::read_to_string(md_path)
            .await
            .with_context(|| format!("read markdown: {}", md_path.display()))?;
        let document = self.generate(&markdown).await?;

        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("create output dir: {}", out_dir.display()))?;
        let out_path = artifacts::qa_artifact_path(out_dir, md_path)?;
        artifacts::write_artifact(&out_path, &document).await?;
        tracing::info!(out = %out_path.display(), "q&a saved");
        Ok(out_path)
    }

    async fn questions(&self, chapter: &Chapter) -> anyhow::Result<Vec<String>> {
        let raw = self
            .completion
            .complete(QUESTION_INSTRUCTIONS, &chapter.body, QUESTION_TEMPERATURE)
            .await
            .with_context(|| format!("generate questions for {}", chapter.title))?;
        Ok(parse_questions(&raw))
    }

    /// One answer per question, in question order.
    async fn answers(&self, chapter: &Chapter, questions: &[String]) -> anyhow::Result<Vec<String>> {
        let chunks = self.splitter.split(&chapter.body);
        let mut join_set = tokio::task::JoinSet::new();
        let mut results: Vec<Option<String>> = vec![None; questions.len()];
        let mut next_idx = 0usize;

        while next_idx < questions.len() || !join_set.is_empty() {
            while next_idx < questions.len() && join_set.len() < ANSWER_CONCURRENCY {
                let index = next_idx;
                let question = questions[index].clone();
                let context = top_chunks(&chunks, &question, CONTEXT_CHUNKS).join("\n");
                let completion = Arc::clone(&self.completion);

                join_set.spawn(async move {
                    let input = format!("Text:\n{context}\n\nQuestion: {question}");
                    let answer = match completion
                        .complete(ANSWER_INSTRUCTIONS, &input, ANSWER_TEMPERATURE)
                        .await
                    {
                        Ok(answer) => answer.trim().to_owned(),
                        Err(err) => {
                            tracing::warn!(
                                question = %question,
                                error = %format!("{err:#}"),
                                "answer generation failed"
                            );
                            format!("[Error] {err:#}")
                        }
                    };
                    (index, answer)
                });
                next_idx += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (index, answer) = joined.context("join answer task")?;
            results[index] = Some(answer);
        }

        Ok(results.into_iter().map(Option::unwrap_or_default).collect())
    }
}
