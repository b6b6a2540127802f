//! End-to-end flows: a web site into filtered markdown artifacts, and a PDF
//! into (optionally pruned) markdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;

use crate::artifacts;
use crate::crawl::Crawler;
use crate::discover::Discoverer;
use crate::extract::DocumentExtractor;
use crate::formats::CrawlBatch;
use crate::prune::SectionPruner;

/// Discovers the pages of `seed` and crawls them into `out_dir`.
///
/// Fails only when discovery finds nothing; per-page failures are reported in the batch.
pub async fn harvest_site(
    discoverer: &Discoverer,
    crawler: &Crawler,
    seed: &str,
    out_dir: &Path,
) -> anyhow::Result<CrawlBatch> {
    let urls = discoverer.discover(seed).await;
    if urls.is_empty() {
        anyhow::bail!("no pages discovered for {seed}");
    }
    crawler.crawl(&urls, out_dir).await
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfArtifacts {
    pub markdown_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_path: Option<PathBuf>,
}

/// Extracts `pdf_path` to `{out_dir}/{stem}.md` and, with a pruner, writes `cleaned_{stem}.md` beside it.
pub async fn harvest_pdf(
    extractor: Arc<dyn DocumentExtractor>,
    pruner: Option<&SectionPruner>,
    pdf_path: &Path,
    out_dir: &Path,
) -> anyhow::Result<PdfArtifacts> {
    let stem = artifacts::file_stem(pdf_path)?.to_owned();
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("create output dir: {}", out_dir.display()))?;

    let markdown = tokio::task::spawn_blocking({
        let pdf_path = pdf_path.to_path_buf();
        move || extractor.extract(&pdf_path)
    })
    .await
    .context("join extractor task")?
    .with_context(|| format!("extract document: {}", pdf_path.display()))?;

    let markdown_path = out_dir.join(format!("{stem}.md"));
    artifacts::write_artifact(&markdown_path, &markdown).await?;
    tracing::info!(out = %markdown_path.display(), "extracted markdown saved");

    let cleaned_path = match pruner {
        Some(pruner) => Some(pruner.prune_file(&markdown_path).await?),
        None => None,
    };

    Ok(PdfArtifacts {
        markdown_path,
        cleaned_path,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::classify::NoopClassifier;
    use crate::fetch::{FetchedPage, PageFetcher};

    struct CannedExtractor(&'static str);

    impl DocumentExtractor for CannedExtractor {
        fn extract(&self, _path: &Path) -> anyhow::Result<String> {
            if self.0.is_empty() {
                anyhow::bail!("extractor produced no markdown");
            }
            Ok(self.0.to_owned())
        }
    }

    #[tokio::test]
    async fn pdf_is_extracted_then_pruned() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let pruner = SectionPruner::new(Arc::new(NoopClassifier));
        let artifacts = harvest_pdf(
            Arc::new(CannedExtractor(
                "## Preface\nboilerplate\n## Abstract\nReal content\n## References\nBib entries",
            )),
            Some(&pruner),
            Path::new("in/paper.pdf"),
            temp.path(),
        )
        .await?;

        assert_eq!(artifacts.markdown_path, temp.path().join("paper.md"));
        let cleaned = artifacts
            .cleaned_path
            .ok_or_else(|| anyhow::anyhow!("missing cleaned path"))?;
        assert_eq!(cleaned, temp.path().join("cleaned_paper.md"));
        assert_eq!(std::fs::read_to_string(cleaned)?, "## Abstract\nReal content");
        Ok(())
    }

    #[tokio::test]
    async fn extraction_failure_is_fatal() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let result = harvest_pdf(
            Arc::new(CannedExtractor("")),
            None,
            Path::new("paper.pdf"),
            temp.path(),
        )
        .await;
        assert!(result.is_err());
        assert!(!temp.path().join("paper.md").exists());
        Ok(())
    }

    struct Unreachable;

    #[async_trait]
    impl PageFetcher for Unreachable {
        async fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage> {
            anyhow::bail!("GET {url}: connection refused")
        }
    }

    #[tokio::test]
    async fn empty_discovery_fails_the_site() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(Unreachable);
        let discoverer = Discoverer::new(Arc::clone(&fetcher));
        let crawler = Crawler::new(fetcher);

        let err = harvest_site(&discoverer, &crawler, "https://site", temp.path())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(format!("{err:#}").contains("no pages discovered"));
        Ok(())
    }
}
