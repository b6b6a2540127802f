use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context as _;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use url::Url;

use crate::fetch::PageFetcher;

pub const SITEMAP_NAMESPACE: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// Links whose absolute URL contains any of these are navigation noise.
pub const EXCLUDED_SUBSTRINGS: &[&str] = &[
    "#",
    "signup",
    "login",
    "contact",
    "help",
    "terms",
    "privacy",
    "copyright",
    "contrib",
];

static ANCHOR_SELECTOR: Lazy<scraper::Selector> =
    Lazy::new(|| scraper::Selector::parse("a[href]").unwrap());

/// Resolves candidate pages for a site: sitemap first, landing-page links second.
#[derive(Clone)]
pub struct Discoverer {
    fetcher: Arc<dyn PageFetcher>,
}

impl Discoverer {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Never fails: every fetch or parse problem degrades to fewer (possibly zero) URLs.
    pub async fn discover(&self, seed: &str) -> Vec<String> {
        let sitemap_url = format!("{}/sitemap.xml", seed.trim_end_matches('/'));
        let mut urls = self.sitemap_urls(&sitemap_url).await;

        if urls.is_empty() {
            tracing::info!(seed, "no sitemap found; extracting internal links");
            urls = self.internal_links(seed).await;
        }

        tracing::info!(seed, pages = urls.len(), "discovery complete");
        urls
    }

    async fn sitemap_urls(&self, sitemap_url: &str) -> Vec<String> {
        let url = match Url::parse(sitemap_url) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(sitemap = sitemap_url, error = %err, "invalid sitemap url");
                return Vec::new();
            }
        };

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(err) => {
                tracing::debug!(sitemap = sitemap_url, error = %format!("{err:#}"), "sitemap fetch failed");
                return Vec::new();
            }
        };

        match parse_sitemap(&page.body) {
            Ok(urls) => urls,
            Err(err) => {
                tracing::warn!(sitemap = sitemap_url, error = %format!("{err:#}"), "sitemap is invalid; skipping");
                Vec::new()
            }
        }
    }

    async fn internal_links(&self, seed: &str) -> Vec<String> {
        let seed_url = match Url::parse(seed) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(seed, error = %err, "invalid seed url");
                return Vec::new();
            }
        };

        match self.fetcher.fetch(&seed_url).await {
            Ok(page) => same_domain_links(&seed_url, &page.body),
            Err(err) => {
                tracing::warn!(seed, error = %format!("{err:#}"), "fetch seed page failed");
                Vec::new()
            }
        }
    }
}

/// Every `<loc>` bound to the sitemap namespace, in document order.
pub fn parse_sitemap(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = quick_xml::NsReader::from_str(xml);
    let mut urls = Vec::new();
    let mut in_loc = false;
    let mut current = String::new();
    let mut buf = Vec::new();

    loop {
        match reader
            .read_resolved_event_into(&mut buf)
            .context("read sitemap xml")?
        {
            (ns, Event::Start(e)) if is_sitemap_loc(&ns, e.local_name().as_ref()) => {
                in_loc = true;
                current.clear();
            }
            (_, Event::Text(e)) if in_loc => {
                current.push_str(&e.unescape().context("unescape sitemap text")?);
            }
            (_, Event::CData(e)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&e));
            }
            (_, Event::End(e)) if in_loc && e.local_name().as_ref() == b"loc" => {
                in_loc = false;
                let loc = current.trim();
                if !loc.is_empty() {
                    urls.push(loc.to_owned());
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(urls)
}

fn is_sitemap_loc(ns: &ResolveResult<'_>, local_name: &[u8]) -> bool {
    local_name == b"loc" && matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SITEMAP_NAMESPACE)
}

/// Same-host anchors of `html`, resolved against `seed`, deduplicated in link order.
pub fn same_domain_links(seed: &Url, html: &str) -> Vec<String> {
    let document = scraper::Html::parse_document(html);

    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(absolute) = seed.join(href) else {
            continue;
        };
        if !same_netloc(seed, &absolute) {
            continue;
        }

        let absolute = absolute.to_string();
        if seen.contains(&absolute) || is_excluded(&absolute) {
            continue;
        }
        seen.insert(absolute.clone());
        links.push(absolute);
    }

    links
}

fn same_netloc(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port() == b.port()
}

pub fn is_excluded(url: &str) -> bool {
    EXCLUDED_SUBSTRINGS.iter().any(|needle| url.contains(needle))
}

/// Blocking entry point for callers outside an async runtime.
pub fn discover_blocking(fetcher: Arc<dyn PageFetcher>, seed: &str) -> anyhow::Result<Vec<String>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    Ok(runtime.block_on(Discoverer::new(fetcher).discover(seed)))
}
