use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::{self, CommandSpec};
use crate::llm::{LlmEngine, TextCompletion};
use crate::openai::{OpenAiClient, OpenAiConfig};

/// Zero-shot classification of a short text against candidate labels.
///
/// Implementations return `(label, score)` pairs ordered by descending score.
/// An empty result means "no opinion".
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str, labels: &[String]) -> anyhow::Result<Vec<(String, f32)>>;
}

#[derive(Debug, Clone, Default)]
pub struct NoopClassifier;

#[async_trait]
impl TextClassifier for NoopClassifier {
    async fn classify(
        &self,
        _text: &str,
        _labels: &[String],
    ) -> anyhow::Result<Vec<(String, f32)>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    labels: &'a [String],
}

/// Wire shape shared by the command protocol and the LLM reply.
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    labels: Vec<String>,
    scores: Vec<f32>,
}

impl ClassifyResponse {
    fn into_ranked(self, candidates: &[String]) -> anyhow::Result<Vec<(String, f32)>> {
        if self.labels.len() != self.scores.len() {
            anyhow::bail!(
                "classifier returned {} labels but {} scores",
                self.labels.len(),
                self.scores.len()
            );
        }
        let mut ranked: Vec<(String, f32)> = self
            .labels
            .into_iter()
            .zip(self.scores)
            .filter(|(label, score)| candidates.contains(label) && score.is_finite())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }
}

/// Runs an external zero-shot classifier.
///
/// The process receives `{"text": ..., "labels": [...]}` on stdin and must
/// print `{"labels": [...], "scores": [...]}` on stdout.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    spec: CommandSpec,
}

impl CommandClassifier {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl TextClassifier for CommandClassifier {
    async fn classify(&self, text: &str, labels: &[String]) -> anyhow::Result<Vec<(String, f32)>> {
        let request = serde_json::to_string(&ClassifyRequest { text, labels })
            .context("serialize classify request")?;
        let spec = self.spec.clone();
        let no_env: [(&str, &str); 0] = [];

        let stdout = tokio::task::spawn_blocking(move || command::run(&spec, &no_env, &request))
            .await
            .context("join classifier command task")??;
        let response: ClassifyResponse =
            serde_json::from_str(stdout.trim()).context("parse classifier output")?;
        response.into_ranked(labels)
    }
}

const CLASSIFY_INSTRUCTIONS: &str = "You label section headings of a document.\n\
Given a heading and a list of candidate labels, score how well each label fits the heading.\n\
Reply with a single JSON object and nothing else: {\"labels\": [...], \"scores\": [...]}.\n\
Use the candidate labels verbatim. Scores are between 0 and 1 and sum to 1.";

/// Asks a completion service to score the labels.
pub struct CompletionClassifier {
    completion: Arc<dyn TextCompletion>,
}

impl CompletionClassifier {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl TextClassifier for CompletionClassifier {
    async fn classify(&self, text: &str, labels: &[String]) -> anyhow::Result<Vec<(String, f32)>> {
        let input = format!(
            "Heading: {text}\nCandidate labels:\n{}",
            labels
                .iter()
                .map(|l| format!("- {l}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let raw = self
            .completion
            .complete(CLASSIFY_INSTRUCTIONS, &input, 0.0)
            .await
            .context("classify via completion")?;
        let json = extract_json_object(&raw).context("extract json object from classifier reply")?;
        let response: ClassifyResponse =
            serde_json::from_str(json).context("parse classifier reply json")?;
        response.into_ranked(labels)
    }
}

fn extract_json_object(text: &str) -> anyhow::Result<&str> {
    let start = text
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("missing `{{`"))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| anyhow::anyhow!("missing `}}`"))?;
    if end <= start {
        anyhow::bail!("invalid json object span");
    }
    Ok(&text[start..=end])
}

pub fn classifier_from_env(engine: LlmEngine) -> anyhow::Result<Arc<dyn TextClassifier>> {
    let classifier: Arc<dyn TextClassifier> = match engine {
        LlmEngine::Noop => Arc::new(NoopClassifier),
        LlmEngine::Command => {
            let spec = CommandSpec::from_env("MDHARVEST_CLASSIFIER").ok_or_else(|| {
                anyhow::anyhow!(
                    "MDHARVEST_CLASSIFIER_BIN is not set (required when --classifier=command)"
                )
            })?;
            Arc::new(CommandClassifier::new(spec))
        }
        LlmEngine::Openai => {
            let config = OpenAiConfig::from_env().context("load openai config")?;
            Arc::new(CompletionClassifier::new(Arc::new(OpenAiClient::new(
                &config,
            )?)))
        }
    };
    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    struct Canned(&'static str);

    #[async_trait]
    impl TextCompletion for Canned {
        async fn complete(&self, _: &str, _: &str, _: f32) -> anyhow::Result<String> {
            Ok(self.0.to_owned())
        }
    }

    #[tokio::test]
    async fn completion_reply_is_ranked_and_filtered() -> anyhow::Result<()> {
        let classifier = CompletionClassifier::new(Arc::new(Canned(
            "Sure:\n```json\n{\"labels\": [\"Body Text\", \"References\", \"Made Up\"], \"scores\": [0.2, 0.7, 0.9]}\n```",
        )));
        let ranked = classifier
            .classify("References", &labels(&["References", "Body Text"]))
            .await?;
        assert_eq!(
            ranked,
            vec![("References".to_owned(), 0.7), ("Body Text".to_owned(), 0.2)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_lengths_are_rejected() {
        let classifier = CompletionClassifier::new(Arc::new(Canned(
            "{\"labels\": [\"References\"], \"scores\": []}",
        )));
        assert!(
            classifier
                .classify("x", &labels(&["References"]))
                .await
                .is_err()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_protocol_round_trips_json() -> anyhow::Result<()> {
        let spec = CommandSpec::new(
            "sh",
            vec![
                "-c".to_owned(),
                r#"cat >/dev/null; echo '{"labels":["Preface","Body Text"],"scores":[0.1,0.9]}'"#
                    .to_owned(),
            ],
        );
        let ranked = CommandClassifier::new(spec)
            .classify("Preface", &labels(&["Preface", "Body Text"]))
            .await?;
        assert_eq!(ranked[0].0, "Body Text");
        Ok(())
    }
}
