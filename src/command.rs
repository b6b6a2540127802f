use std::ffi::OsStr;
use std::io::Write as _;
use std::process::{Command, Stdio};

use anyhow::Context as _;

/// Program plus arguments for an external collaborator process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Reads `{prefix}_BIN` and whitespace-separated `{prefix}_ARGS`.
    /// Returns `None` when the program variable is unset or blank.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let program = std::env::var(format!("{prefix}_BIN")).ok()?;
        if program.trim().is_empty() {
            return None;
        }
        let args = std::env::var(format!("{prefix}_ARGS"))
            .map(|raw| split_args(&raw))
            .unwrap_or_default();
        Some(Self::new(program, args))
    }
}

pub fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

/// Runs `spec` to completion, feeding `stdin` and returning stdout as UTF-8.
/// A non-zero exit status is an error. Blocking; call from `spawn_blocking`.
pub fn run<K, V>(spec: &CommandSpec, envs: &[(K, V)], stdin: &str) -> anyhow::Result<String>
where
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let program = spec.program.as_str();
    let mut cmd = Command::new(program);
    cmd.args(&spec.args);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("spawn command: {program}"))?;

    // The child may fill stdout before it has drained stdin.
    let mut child_stdin = child.stdin.take().context("open command stdin")?;
    let input = stdin.to_owned();
    let writer = std::thread::spawn(move || child_stdin.write_all(input.as_bytes()));

    let output = child.wait_with_output().context("wait command process")?;
    let written = writer
        .join()
        .map_err(|_| anyhow::anyhow!("command stdin writer panicked"))?;
    if !output.status.success() {
        anyhow::bail!("command failed: {program} ({})", output.status);
    }
    match written {
        Err(err) if err.kind() != std::io::ErrorKind::BrokenPipe => {
            return Err(err).context("write command stdin");
        }
        _ => {}
    }

    String::from_utf8(output.stdout).context("command stdout is not valid UTF-8")
}
