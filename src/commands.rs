use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::artifacts;
use crate::chapters;
use crate::classify;
use crate::cli::{
    ChaptersArgs, ClassifierArgs, CrawlArgs, DiscoverArgs, DispatchArgs, FetchArgs, PdfArgs,
    PruneArgs, QaArgs, SiteArgs, SummarizeArgs, SweepArgs,
};
use crate::crawl::{Crawler, DispatchPolicy};
use crate::discover::Discoverer;
use crate::extract::CommandExtractor;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::formats::CrawlBatch;
use crate::llm;
use crate::pipeline;
use crate::prune::SectionPruner;
use crate::qa::QaGenerator;
use crate::summarize::Summarizer;

pub async fn discover(args: DiscoverArgs) -> anyhow::Result<()> {
    let fetcher = http_fetcher(&args.fetch)?;
    let urls = Discoverer::new(fetcher).discover(&args.url).await;

    let mut stdout = std::io::stdout().lock();
    for url in urls {
        writeln!(stdout, "{url}").context("write stdout")?;
    }
    Ok(())
}

pub async fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let mut urls = args.urls.clone();
    if let Some(path) = args.urls_file.as_deref() {
        urls.extend(read_url_list(Path::new(path))?);
    }
    if urls.is_empty() {
        anyhow::bail!("no urls to crawl");
    }

    let crawler = crawler(&args.dispatch, &args.fetch)?;
    let batch = crawler.crawl(&urls, Path::new(&args.out)).await?;
    print_batch(&batch)
}

pub async fn site(args: SiteArgs) -> anyhow::Result<()> {
    let fetcher = http_fetcher(&args.fetch)?;
    let discoverer = Discoverer::new(Arc::clone(&fetcher));
    let crawler = Crawler::new(fetcher).with_policy(dispatch_policy(&args.dispatch));

    let batch =
        pipeline::harvest_site(&discoverer, &crawler, &args.url, Path::new(&args.out)).await?;
    print_batch(&batch)
}

pub async fn pdf(args: PdfArgs) -> anyhow::Result<()> {
    let extractor = Arc::new(CommandExtractor::from_env());
    let pruner = if args.no_prune {
        None
    } else {
        Some(section_pruner(&args.classifier)?)
    };

    let artifacts = pipeline::harvest_pdf(
        extractor,
        pruner.as_ref(),
        Path::new(&args.input),
        Path::new(&args.out),
    )
    .await?;
    let line = serde_json::to_string(&artifacts).context("serialize pdf artifacts")?;
    println!("{line}");
    Ok(())
}

pub async fn prune(args: PruneArgs) -> anyhow::Result<()> {
    let pruner = section_pruner(&args.classifier)?;
    let out = pruner.prune_file(Path::new(&args.input)).await?;
    println!("{}", out.display());
    Ok(())
}

pub fn chapters(args: ChaptersArgs) -> anyhow::Result<()> {
    let markdown = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read markdown: {}", args.input))?;

    let mut stdout = std::io::stdout().lock();
    for chapter in chapters::segment(&markdown) {
        let line = serde_json::to_string(&chapter).context("serialize chapter")?;
        writeln!(stdout, "{line}").context("write stdout")?;
    }
    Ok(())
}

pub async fn qa(args: QaArgs) -> anyhow::Result<()> {
    let completion = llm::completion_from_env(args.engine)?;
    let out = QaGenerator::new(completion)
        .generate_file(Path::new(&args.input), Path::new(&args.out))
        .await?;
    println!("{}", out.display());
    Ok(())
}

pub async fn summarize(args: SummarizeArgs) -> anyhow::Result<()> {
    let completion = llm::completion_from_env(args.engine)?;
    let out = Summarizer::new(completion, args.mode)
        .generate_file(Path::new(&args.input), Path::new(&args.out))
        .await?;
    println!("{}", out.display());
    Ok(())
}

pub fn sweep(args: SweepArgs) -> anyhow::Result<()> {
    let max_age = Duration::from_secs(args.max_age_mins.saturating_mul(60));
    let removed = artifacts::sweep_expired(Path::new(&args.dir), max_age)?;
    tracing::info!(dir = %args.dir, removed = removed.len(), "sweep complete");

    let mut stdout = std::io::stdout().lock();
    for path in removed {
        writeln!(stdout, "{}", path.display()).context("write stdout")?;
    }
    Ok(())
}

fn http_fetcher(args: &FetchArgs) -> anyhow::Result<Arc<dyn PageFetcher>> {
    let fetcher = HttpFetcher::new(Duration::from_secs(args.timeout_secs.max(1)))?;
    Ok(Arc::new(fetcher))
}

fn dispatch_policy(args: &DispatchArgs) -> DispatchPolicy {
    DispatchPolicy {
        max_session_permit: args.max_sessions.max(1),
        memory_threshold_percent: args.memory_threshold,
        check_interval: Duration::from_millis(args.check_interval_ms.max(1)),
    }
}

fn crawler(dispatch: &DispatchArgs, fetch: &FetchArgs) -> anyhow::Result<Crawler> {
    Ok(Crawler::new(http_fetcher(fetch)?).with_policy(dispatch_policy(dispatch)))
}

fn section_pruner(args: &ClassifierArgs) -> anyhow::Result<SectionPruner> {
    let classifier = classify::classifier_from_env(args.classifier)?;
    Ok(SectionPruner::new(classifier).with_confidence_threshold(args.threshold))
}

fn read_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read url list: {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

/// One JSON line per attempted URL, in submission order.
fn print_batch(batch: &CrawlBatch) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    for result in &batch.results {
        let line = serde_json::to_string(result).context("serialize crawl result")?;
        writeln!(stdout, "{line}").context("write stdout")?;
    }
    Ok(())
}
