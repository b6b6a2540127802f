use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::artifacts;
use crate::content_filter::ContentFilter;
use crate::fetch::PageFetcher;
use crate::formats::{CrawlBatch, CrawlResult};
use crate::slug;

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Maximum fetches in flight at once.
    pub max_session_permit: usize,
    /// New fetches wait while host memory usage is above this percentage.
    pub memory_threshold_percent: f64,
    pub check_interval: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_session_permit: 10,
            memory_threshold_percent: 70.0,
            check_interval: Duration::from_secs(1),
        }
    }
}

/// Host memory usage in percent; `None` when no reading is available.
pub trait MemoryProbe: Send + Sync {
    fn used_percent(&self) -> Option<f64>;
}

pub struct SystemMemoryProbe {
    system: Mutex<sysinfo::System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn used_percent(&self) -> Option<f64> {
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        Some(system.used_memory() as f64 * 100.0 / total as f64)
    }
}

/// Fetches a batch of pages and persists a raw and a filtered markdown artifact per page.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    filter: ContentFilter,
    policy: DispatchPolicy,
    memory: Arc<dyn MemoryProbe>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            filter: ContentFilter::default(),
            policy: DispatchPolicy::default(),
            memory: Arc::new(SystemMemoryProbe::new()),
        }
    }

    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_memory_probe(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }

    /// Crawls `urls` and returns one result per URL in submission order.
    ///
    /// A failed page is recorded in its result and never aborts its siblings;
    /// only setting up `out_dir` can fail the batch.
    pub async fn crawl(&self, urls: &[String], out_dir: &Path) -> anyhow::Result<CrawlBatch> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("create output dir: {}", out_dir.display()))?;

        let permits = self.policy.max_session_permit.max(1);
        tracing::info!(
            urls = urls.len(),
            permits,
            memory_threshold_percent = self.policy.memory_threshold_percent,
            "crawl: dispatching"
        );

        let mut join_set = tokio::task::JoinSet::new();
        let mut results = claim_slugs(urls);
        let mut next_idx = 0usize;

        while next_idx < urls.len() || !join_set.is_empty() {
            let mut throttled = false;
            while next_idx < urls.len() && join_set.len() < permits {
                if results[next_idx].is_some() {
                    next_idx += 1;
                    continue;
                }
                if self.memory_pressure() {
                    throttled = true;
                    break;
                }

                let index = next_idx;
                let url = urls[index].clone();
                let fetcher = Arc::clone(&self.fetcher);
                let filter = self.filter.clone();
                let out_dir = out_dir.to_path_buf();
                join_set.spawn(async move {
                    let result = crawl_one(fetcher.as_ref(), filter, &url, out_dir).await;
                    (index, result)
                });
                next_idx += 1;
            }

            if join_set.is_empty() {
                // Throttled with nothing in flight.
                tokio::time::sleep(self.policy.check_interval).await;
                continue;
            }

            let joined = if throttled {
                match tokio::time::timeout(self.policy.check_interval, join_set.join_next()).await
                {
                    Ok(joined) => joined,
                    Err(_) => continue,
                }
            } else {
                join_set.join_next().await
            };
            let Some(joined) = joined else {
                continue;
            };
            let (index, result) = joined.context("join crawl task")?;
            if !result.succeeded {
                tracing::warn!(
                    url = %result.url,
                    error = result.error.as_deref().unwrap_or_default(),
                    "crawl failed"
                );
            }
            results[index] = Some(result);
        }

        let batch = CrawlBatch {
            results: results.into_iter().flatten().collect(),
        };
        tracing::info!(
            succeeded = batch.successful().count(),
            failed = batch.failed().count(),
            "crawl: complete"
        );
        Ok(batch)
    }

    fn memory_pressure(&self) -> bool {
        match self.memory.used_percent() {
            Some(used) if used > self.policy.memory_threshold_percent => {
                tracing::debug!(
                    used_percent = used,
                    threshold = self.policy.memory_threshold_percent,
                    "memory pressure; holding new fetches"
                );
                true
            }
            _ => false,
        }
    }
}

/// Pre-fills a failure for every URL whose artifact slug was already taken by
/// an earlier URL of the batch, so each file has a single writer.
fn claim_slugs(urls: &[String]) -> Vec<Option<CrawlResult>> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    urls.iter()
        .map(|url| {
            if Url::parse(url).is_err() {
                return None;
            }
            let slug = slug::slug(url, slug::DEFAULT_MAX_LEN);
            match owners.get(slug.as_str()) {
                Some(owner) => {
                    tracing::warn!(url, owner = %owner, slug = %slug, "artifact slug already claimed in batch");
                    Some(CrawlResult::failed(
                        url,
                        format!("artifact slug {slug} already claimed by {owner}"),
                    ))
                }
                None => {
                    owners.insert(slug, url.as_str());
                    None
                }
            }
        })
        .collect()
}

async fn crawl_one(
    fetcher: &dyn PageFetcher,
    filter: ContentFilter,
    url: &str,
    out_dir: PathBuf,
) -> CrawlResult {
    match try_crawl_one(fetcher, filter, url, &out_dir).await {
        Ok(result) => result,
        Err(err) => CrawlResult::failed(url, format!("{err:#}")),
    }
}

async fn try_crawl_one(
    fetcher: &dyn PageFetcher,
    filter: ContentFilter,
    url: &str,
    out_dir: &Path,
) -> anyhow::Result<CrawlResult> {
    let parsed = Url::parse(url).with_context(|| format!("parse url: {url}"))?;
    let page = fetcher.fetch(&parsed).await?;
    let retrieved_at = chrono::Utc::now().to_rfc3339();

    let body = page.body;
    let rendered = tokio::task::spawn_blocking(move || filter.render(&body))
        .await
        .context("join content filter task")?;
    tracing::info!(
        url,
        images = rendered.media.images,
        tables = rendered.media.tables,
        "page rendered"
    );

    let slug = slug::slug(url, slug::DEFAULT_MAX_LEN);
    let raw_path = artifacts::raw_artifact_path(out_dir, &slug);
    let filtered_path = artifacts::filtered_artifact_path(out_dir, &slug);
    artifacts::write_artifact(&raw_path, &rendered.raw_markdown).await?;
    artifacts::write_artifact(&filtered_path, &rendered.filtered_markdown).await?;
    tracing::info!(
        url,
        raw = %raw_path.display(),
        filtered = %filtered_path.display(),
        "artifacts saved"
    );

    Ok(CrawlResult {
        url: url.to_owned(),
        succeeded: true,
        raw_path: Some(raw_path),
        filtered_path: Some(filtered_path),
        error: None,
        media: rendered.media,
        retrieved_at,
    })
}

/// Blocking entry point for callers outside an async runtime.
pub fn crawl_blocking(
    crawler: &Crawler,
    urls: &[String],
    out_dir: &Path,
) -> anyhow::Result<CrawlBatch> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(crawler.crawl(urls, out_dir))
}
