use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::artifacts;
use crate::chapters;
use crate::llm::TextCompletion;
use crate::splitter::TextSplitter;

const SUMMARY_TEMPERATURE: f32 = 0.1;

const SUMMARIZE_INSTRUCTIONS: &str = "Summarize the text in a clear, concise and formal academic tone.\n\
Cover the most important facts, arguments and conclusions. Stay factual and objective.\n\
Use one to seven paragraphs depending on the input size.";

const REFINE_INSTRUCTIONS: &str = "You are refining an academic summary.\n\
Integrate the new text into the current summary without redundancy, keeping a formal tone.\n\
Reply with the updated summary only.";

const COMBINE_INSTRUCTIONS: &str = "Combine the chunk-level summaries into one coherent summary \
of the whole chapter. Avoid repetition and keep a logical flow.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SummaryMode {
    /// Summarize every chunk, then combine the partial summaries.
    #[default]
    MapReduce,
    /// Summarize the first chunk and fold each following chunk into it.
    Refine,
}

pub struct Summarizer {
    completion: Arc<dyn TextCompletion>,
    splitter: TextSplitter,
    mode: SummaryMode,
}

impl Summarizer {
    pub fn new(completion: Arc<dyn TextCompletion>, mode: SummaryMode) -> Self {
        Self {
            completion,
            splitter: TextSplitter::default(),
            mode,
        }
    }

    pub async fn generate(&self, markdown: &str) -> String {
        let mut out = String::from("# Chapter Summaries\n\n");
        for chapter in chapters::segment(markdown) {
            tracing::info!(chapter = %chapter.title, mode = ?self.mode, "summarizing");
            let summary = match self.summarize(&chapter.body).await {
                Ok(summary) => summary,
                Err(err) => {
                    tracing::warn!(
                        chapter = %chapter.title,
                        error = %format!("{err:#}"),
                        "summary failed"
                    );
                    format!("[Error] {err:#}")
                }
            };
            out.push_str(&format!("## {} Summary\n\n{summary}\n\n", chapter.title));
        }
        out
    }

    /// Writes `{stem}_summary.md` into `out_dir`.
    pub async fn generate_file(&self, md_path: &Path, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let markdown = tokio::fs::read_to_string(md_path)
            .await
            .with_context(|| format!("read markdown: {}", md_path.display()))?;
        let document = self.generate(&markdown).await;

        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("create output dir: {}", out_dir.display()))?;
        let out_path = artifacts::summary_artifact_path(out_dir, md_path)?;
        artifacts::write_artifact(&out_path, &document).await?;
        tracing::info!(out = %out_path.display(), "summary saved");
        Ok(out_path)
    }

    async fn summarize(&self, body: &str) -> anyhow::Result<String> {
        let chunks = self.splitter.split(body);
        let Some((first, rest)) = chunks.split_first() else {
            return Ok(String::new());
        };

        match self.mode {
            SummaryMode::MapReduce => {
                let mut partials = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    partials.push(self.call(SUMMARIZE_INSTRUCTIONS, chunk).await?);
                }
                let combined = partials.join("\n\n");
                self.call(COMBINE_INSTRUCTIONS, &format!("Summaries:\n{combined}"))
                    .await
            }
            SummaryMode::Refine => {
                let mut summary = self.call(SUMMARIZE_INSTRUCTIONS, first).await?;
                for chunk in rest {
                    let input = format!("Current summary:\n{summary}\n\nNew text:\n{chunk}");
                    summary = self.call(REFINE_INSTRUCTIONS, &input).await?;
                }
                Ok(summary)
            }
        }
    }

    async fn call(&self, instructions: &str, input: &str) -> anyhow::Result<String> {
        let reply = self
            .completion
            .complete(instructions, input, SUMMARY_TEMPERATURE)
            .await?;
        Ok(reply.trim().to_owned())
    }
}
