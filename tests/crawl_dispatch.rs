mod site_stub;

use std::sync::Arc;
use std::time::Duration;

use mdharvest::crawl::{Crawler, MemoryProbe};
use mdharvest::fetch::HttpFetcher;
use site_stub::{HTML, SiteStub, article};

struct NoReading;

impl MemoryProbe for NoReading {
    fn used_percent(&self) -> Option<f64> {
        None
    }
}

fn crawler() -> anyhow::Result<Crawler> {
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5))?);
    Ok(Crawler::new(fetcher).with_memory_probe(Arc::new(NoReading)))
}

#[tokio::test]
async fn failed_pages_are_reported_without_aborting_the_batch() -> anyhow::Result<()> {
    let guide = article("guide");
    let api = article("api");
    let faq = article("faq");
    let site = SiteStub::spawn(&[
        ("/guide", HTML, guide.as_str()),
        ("/api", HTML, api.as_str()),
        ("/faq", HTML, faq.as_str()),
    ]);
    let temp = tempfile::TempDir::new()?;

    let urls = vec![
        site.url("/guide"),
        site.url("/missing"),
        site.url("/api"),
        site.url("/gone"),
        site.url("/faq"),
    ];
    let batch = crawler()?.crawl(&urls, temp.path()).await?;

    assert_eq!(batch.results.len(), 5);
    assert_eq!(batch.successful().count(), 3);
    assert_eq!(
        batch.failed().map(|r| r.url.clone()).collect::<Vec<_>>(),
        vec![site.url("/missing"), site.url("/gone")]
    );

    let guide_result = &batch.results[0];
    assert!(guide_result.succeeded);
    assert_eq!(guide_result.media.images, 1);
    let filtered_path = guide_result
        .filtered_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing filtered path"))?;
    let filtered = std::fs::read_to_string(filtered_path)?;
    assert!(filtered.contains("explains the guide page"));
    assert!(!filtered.contains("Home"));

    let files = std::fs::read_dir(temp.path())?.count();
    assert_eq!(files, 6);
    Ok(())
}

#[tokio::test]
async fn recrawl_overwrites_deterministic_names() -> anyhow::Result<()> {
    let guide = article("guide");
    let site = SiteStub::spawn(&[("/guide", HTML, guide.as_str())]);
    let temp = tempfile::TempDir::new()?;
    let urls = vec![site.url("/guide")];

    let first = crawler()?.crawl(&urls, temp.path()).await?;
    let second = crawler()?.crawl(&urls, temp.path()).await?;

    assert_eq!(first.results[0].raw_path, second.results[0].raw_path);
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 2);
    Ok(())
}
