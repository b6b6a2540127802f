//! Flat artifact directory. Filenames are the only addressing scheme, so each
//! writer derives a name from its own input and concurrent writers never
//! collide.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context as _;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 60);

pub fn raw_artifact_path(out_dir: &Path, slug: &str) -> PathBuf {
    out_dir.join(format!("result_raw_{slug}.md"))
}

pub fn filtered_artifact_path(out_dir: &Path, slug: &str) -> PathBuf {
    out_dir.join(format!("result_filtered_{slug}.md"))
}

/// `cleaned_{stem}.md` next to `markdown_path`.
pub fn cleaned_artifact_path(markdown_path: &Path) -> anyhow::Result<PathBuf> {
    sibling_with_stem(markdown_path, |stem| format!("cleaned_{stem}.md"))
}

pub fn qa_artifact_path(out_dir: &Path, markdown_path: &Path) -> anyhow::Result<PathBuf> {
    let stem = file_stem(markdown_path)?;
    Ok(out_dir.join(format!("{stem}_qa.md")))
}

pub fn summary_artifact_path(out_dir: &Path, markdown_path: &Path) -> anyhow::Result<PathBuf> {
    let stem = file_stem(markdown_path)?;
    Ok(out_dir.join(format!("{stem}_summary.md")))
}

fn sibling_with_stem(path: &Path, name: impl FnOnce(&str) -> String) -> anyhow::Result<PathBuf> {
    let stem = file_stem(path)?;
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(name(stem)))
}

pub fn file_stem(path: &Path) -> anyhow::Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("path has no utf-8 file stem: {}", path.display()))
}

/// Writes (or overwrites) one artifact. Re-running a crawl replaces files in place.
pub async fn write_artifact(path: &Path, contents: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("write artifact: {}", path.display()))
}

/// Deletes regular files in `dir` last modified more than `max_age` ago.
/// Subdirectories are left alone.
pub fn sweep_expired(dir: &Path, max_age: Duration) -> anyhow::Result<Vec<PathBuf>> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read artifact dir: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry
            .metadata()
            .with_context(|| format!("stat artifact: {}", path.display()))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .with_context(|| format!("read mtime: {}", path.display()))?;
        if modified > cutoff {
            continue;
        }

        tracing::info!(path = %path.display(), "deleting expired artifact");
        std::fs::remove_file(&path)
            .with_context(|| format!("delete artifact: {}", path.display()))?;
        removed.push(path);
    }

    removed.sort();
    Ok(removed)
}
