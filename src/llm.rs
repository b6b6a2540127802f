use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::command::{self, CommandSpec};
use crate::openai::{OpenAiClient, OpenAiConfig};

/// Backend for LLM-shaped collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LlmEngine {
    Noop,
    Command,
    Openai,
}

/// Request/response text generation service.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(
        &self,
        instructions: &str,
        input: &str,
        temperature: f32,
    ) -> anyhow::Result<String>;
}

/// Echoes the input back. Useful for dry runs.
#[derive(Debug, Clone, Default)]
pub struct NoopCompletion;

#[async_trait]
impl TextCompletion for NoopCompletion {
    async fn complete(
        &self,
        _instructions: &str,
        input: &str,
        _temperature: f32,
    ) -> anyhow::Result<String> {
        Ok(input.to_owned())
    }
}

/// Pipes the input to an external program. Instructions and temperature are
/// passed as `MDHARVEST_COMPLETION_INSTRUCTIONS` / `MDHARVEST_COMPLETION_TEMPERATURE`.
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    spec: CommandSpec,
}

impl CommandCompletion {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl TextCompletion for CommandCompletion {
    async fn complete(
        &self,
        instructions: &str,
        input: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        let spec = self.spec.clone();
        let envs = [
            ("MDHARVEST_COMPLETION_INSTRUCTIONS", instructions.to_owned()),
            ("MDHARVEST_COMPLETION_TEMPERATURE", temperature.to_string()),
        ];
        let input = input.to_owned();
        tracing::debug!(engine = "command", command = %spec.program, "completion");

        let output = tokio::task::spawn_blocking(move || command::run(&spec, &envs, &input))
            .await
            .context("join completion command task")??;
        if output.trim().is_empty() {
            anyhow::bail!("completion command produced no output");
        }
        Ok(output)
    }
}

#[async_trait]
impl TextCompletion for OpenAiClient {
    async fn complete(
        &self,
        instructions: &str,
        input: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        tracing::debug!(engine = "openai", model = self.model(), "completion");
        self.text(instructions, input, temperature).await
    }
}

pub fn completion_from_env(engine: LlmEngine) -> anyhow::Result<Arc<dyn TextCompletion>> {
    let completion: Arc<dyn TextCompletion> = match engine {
        LlmEngine::Noop => Arc::new(NoopCompletion),
        LlmEngine::Command => {
            let spec = CommandSpec::from_env("MDHARVEST_COMPLETION").ok_or_else(|| {
                anyhow::anyhow!(
                    "MDHARVEST_COMPLETION_BIN is not set (required when --engine=command)"
                )
            })?;
            Arc::new(CommandCompletion::new(spec))
        }
        LlmEngine::Openai => {
            let config = OpenAiConfig::from_env().context("load openai config")?;
            Arc::new(OpenAiClient::new(&config)?)
        }
    };
    Ok(completion)
}
