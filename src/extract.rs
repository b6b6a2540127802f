use std::path::Path;

use anyhow::Context as _;

use crate::artifacts;
use crate::command::{self, CommandSpec, split_args};

pub const DEFAULT_EXTRACTOR_BIN: &str = "docling";
pub const DEFAULT_EXTRACTOR_ARGS: &str = "--to md --output {out_dir}";
const OUT_DIR_PLACEHOLDER: &str = "{out_dir}";

/// Converts a document (PDF) into markdown. Blocking.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> anyhow::Result<String>;
}

/// Runs an external converter with the document path as its last argument.
///
/// `{out_dir}` in the arguments is bound to a scratch directory. Markdown is
/// read from stdout, or from `{out_dir}/{stem}.md` when stdout is empty.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    spec: CommandSpec,
}

impl CommandExtractor {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn from_env() -> Self {
        let program = std::env::var("MDHARVEST_EXTRACTOR_BIN")
            .ok()
            .filter(|bin| !bin.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXTRACTOR_BIN.to_owned());
        let args = std::env::var("MDHARVEST_EXTRACTOR_ARGS")
            .unwrap_or_else(|_| DEFAULT_EXTRACTOR_ARGS.to_owned());
        Self::new(CommandSpec::new(program, split_args(&args)))
    }
}

impl DocumentExtractor for CommandExtractor {
    fn extract(&self, path: &Path) -> anyhow::Result<String> {
        if !path.is_file() {
            anyhow::bail!("document not found: {}", path.display());
        }
        let stem = artifacts::file_stem(path)?;
        let scratch = tempfile::TempDir::new().context("create extractor scratch dir")?;
        let out_dir = scratch.path().to_string_lossy().into_owned();

        let mut args: Vec<String> = self
            .spec
            .args
            .iter()
            .map(|arg| arg.replace(OUT_DIR_PLACEHOLDER, &out_dir))
            .collect();
        args.push(path.to_string_lossy().into_owned());
        let spec = CommandSpec::new(self.spec.program.clone(), args);

        tracing::info!(
            command = %spec.program,
            input = %path.display(),
            "extracting document"
        );
        let no_env: [(&str, &str); 0] = [];
        let stdout = command::run(&spec, &no_env, "")
            .with_context(|| format!("run extractor on {}", path.display()))?;

        let markdown = if stdout.trim().is_empty() {
            let produced = scratch.path().join(format!("{stem}.md"));
            if produced.is_file() {
                std::fs::read_to_string(&produced)
                    .with_context(|| format!("read extractor output: {}", produced.display()))?
            } else {
                String::new()
            }
        } else {
            stdout
        };

        if markdown.trim().is_empty() {
            anyhow::bail!("extractor produced no markdown for {}", path.display());
        }
        Ok(markdown)
    }
}
