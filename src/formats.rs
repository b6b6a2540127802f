use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCounts {
    pub images: usize,
    pub tables: usize,
}

/// Outcome of one attempted URL in a crawl batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub media: MediaCounts,
    pub retrieved_at: String,
}

impl CrawlResult {
    pub fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_owned(),
            succeeded: false,
            raw_path: None,
            filtered_path: None,
            error: Some(error),
            media: MediaCounts::default(),
            retrieved_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Every attempted URL of a crawl, in submission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlBatch {
    pub results: Vec<CrawlResult>,
}

impl CrawlBatch {
    pub fn successful(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results.iter().filter(|r| r.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDecision {
    pub heading: String,
    pub label: String,
    pub score: f32,
}
