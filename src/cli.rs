use clap::{Args, Parser, Subcommand};

use crate::llm::LlmEngine;
use crate::summarize::SummaryMode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the candidate pages of a site, one URL per line.
    Discover(DiscoverArgs),
    /// Fetch the given URLs into raw and filtered markdown artifacts.
    Crawl(CrawlArgs),
    /// Discover a site's pages, then crawl them.
    Site(SiteArgs),
    /// Convert a PDF into markdown and prune boilerplate sections.
    Pdf(PdfArgs),
    /// Remove boilerplate sections from a markdown file (`cleaned_{stem}.md`).
    Prune(PruneArgs),
    /// Print the chapters of a markdown file as JSON lines.
    Chapters(ChaptersArgs),
    /// Generate question/answer pairs per chapter (`{stem}_qa.md`).
    Qa(QaArgs),
    /// Summarize each chapter (`{stem}_summary.md`).
    Summarize(SummarizeArgs),
    /// Delete artifacts older than the retention window.
    Sweep(SweepArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct DispatchArgs {
    /// Maximum concurrent fetches.
    #[arg(long, default_value_t = 10)]
    pub max_sessions: usize,

    /// Hold new fetches while host memory usage exceeds this percentage.
    #[arg(long, default_value_t = 70.0)]
    pub memory_threshold: f64,

    /// Memory check interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub check_interval_ms: u64,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Seed URL (must be http/https).
    #[arg(long)]
    pub url: String,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// URLs to fetch.
    #[arg(required_unless_present = "urls_file")]
    pub urls: Vec<String>,

    /// File with one URL per line (blank lines and `#` comments ignored).
    #[arg(long)]
    pub urls_file: Option<String>,

    /// Output directory for artifacts.
    #[arg(long)]
    pub out: String,

    #[command(flatten)]
    pub dispatch: DispatchArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Args)]
pub struct SiteArgs {
    /// Seed URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Output directory for artifacts.
    #[arg(long)]
    pub out: String,

    #[command(flatten)]
    pub dispatch: DispatchArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Args)]
pub struct ClassifierArgs {
    /// Heading classifier backend.
    #[arg(long, value_enum, default_value_t = LlmEngine::Noop)]
    pub classifier: LlmEngine,

    /// Minimum top-label score (exclusive) for removing a section.
    #[arg(long, default_value_t = crate::prune::DEFAULT_CONFIDENCE_THRESHOLD)]
    pub threshold: f32,
}

#[derive(Debug, Args)]
pub struct PdfArgs {
    /// Input PDF path.
    #[arg(long)]
    pub input: String,

    /// Output directory for `{stem}.md` and `cleaned_{stem}.md`.
    #[arg(long)]
    pub out: String,

    /// Skip section pruning.
    #[arg(long, default_value_t = false)]
    pub no_prune: bool,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Input markdown path.
    #[arg(long)]
    pub input: String,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

#[derive(Debug, Args)]
pub struct ChaptersArgs {
    /// Input markdown path.
    #[arg(long)]
    pub input: String,
}

#[derive(Debug, Args)]
pub struct QaArgs {
    /// Input markdown path.
    #[arg(long)]
    pub input: String,

    /// Output directory for `{stem}_qa.md`.
    #[arg(long)]
    pub out: String,

    /// Completion backend.
    #[arg(long, value_enum, default_value_t = LlmEngine::Openai)]
    pub engine: LlmEngine,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Input markdown path.
    #[arg(long)]
    pub input: String,

    /// Output directory for `{stem}_summary.md`.
    #[arg(long)]
    pub out: String,

    /// Completion backend.
    #[arg(long, value_enum, default_value_t = LlmEngine::Openai)]
    pub engine: LlmEngine,

    #[arg(long, value_enum, default_value_t = SummaryMode::MapReduce)]
    pub mode: SummaryMode,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Artifact directory.
    #[arg(long)]
    pub dir: String,

    /// Retention window in minutes.
    #[arg(long, default_value_t = 30)]
    pub max_age_mins: u64,
}
