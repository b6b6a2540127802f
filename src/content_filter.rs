//! Density-based pruning of fetched HTML into raw and filtered markdown.
//!
//! A page is cut into its outermost block elements, plus any container whose
//! only children are inline elements and text. The raw variant keeps
//! every block above a word-count floor. The filtered variant is a subset of
//! the raw one: blocks inside boilerplate containers are dropped and the rest
//! must reach a density score against a per-block threshold.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::formats::MediaCounts;

const BLOCK_TAGS: &[&str] = &[
    "p",
    "li",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "pre",
    "blockquote",
    "dt",
    "dd",
    "figcaption",
];

const NEVER_EMIT: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Phrasing elements; a container holding only these (and text) is a leaf.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "del", "dfn", "em", "i",
    "img", "ins", "kbd", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup",
    "time", "u", "var", "wbr",
];

const BOILERPLATE_CONTAINERS: &[&str] = &["nav", "header", "footer", "aside", "form"];

const TAG_WEIGHTS: &[(&str, f64)] = &[
    ("p", 1.0),
    ("li", 0.5),
    ("h1", 1.2),
    ("h2", 1.1),
    ("h3", 1.0),
    ("h4", 0.9),
    ("h5", 0.8),
    ("h6", 0.7),
    ("pre", 1.0),
    ("blockquote", 0.9),
    ("dt", 0.6),
    ("dd", 0.6),
    ("figcaption", 0.6),
];

const DEFAULT_TAG_WEIGHT: f64 = 0.7;
const MAX_TAG_WEIGHT: f64 = 1.5;

static RE_NEGATIVE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:nav|navbar|menu|footer|header|sidebar|ads?|advert\w*|promo\w*|comments?|social|share|breadcrumbs?|cookie\w*|banner)\b",
    )
    .unwrap()
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());

#[derive(Debug, Clone)]
pub struct ContentFilter {
    /// Floor for the raw variant.
    pub word_count_threshold: usize,
    /// Floor for the filtered variant.
    pub min_word_threshold: usize,
    /// Base score a block needs to enter the filtered variant.
    pub threshold: f64,
    /// Adjust `threshold` per block from its tag, text ratio and link ratio.
    pub dynamic: bool,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            word_count_threshold: 15,
            min_word_threshold: 5,
            threshold: 0.48,
            dynamic: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub raw_markdown: String,
    pub filtered_markdown: String,
    pub media: MediaCounts,
}

#[derive(Debug)]
struct Block {
    tag: String,
    html: String,
    words: usize,
    text_len: usize,
    link_text_len: usize,
    has_image: bool,
    in_boilerplate: bool,
    negative_hint: bool,
}

impl Block {
    fn is_heading(&self) -> bool {
        matches!(self.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    }

    fn is_image_only(&self) -> bool {
        self.has_image && self.words == 0
    }

    fn text_ratio(&self) -> f64 {
        if self.html.is_empty() {
            return 0.0;
        }
        self.text_len as f64 / self.html.len() as f64
    }

    fn link_ratio(&self) -> f64 {
        if self.text_len == 0 {
            return 0.0;
        }
        (self.link_text_len as f64 / self.text_len as f64).min(1.0)
    }

    fn tag_weight(&self) -> f64 {
        TAG_WEIGHTS
            .iter()
            .find(|(tag, _)| *tag == self.tag)
            .map(|(_, weight)| *weight)
            .unwrap_or(DEFAULT_TAG_WEIGHT)
    }
}

impl ContentFilter {
    pub fn render(&self, html: &str) -> RenderedPage {
        let document = Html::parse_document(html);
        let media = MediaCounts {
            images: document.select(&IMAGE_SELECTOR).count(),
            tables: document.select(&TABLE_SELECTOR).count(),
        };

        let blocks = collect_blocks(&document);
        let raw: Vec<&Block> = blocks.iter().filter(|b| self.keep_raw(b)).collect();
        let filtered: Vec<&Block> = raw
            .iter()
            .copied()
            .filter(|b| self.keep_filtered(b))
            .collect();

        RenderedPage {
            raw_markdown: to_markdown(&raw),
            filtered_markdown: to_markdown(&filtered),
            media,
        }
    }

    fn keep_raw(&self, block: &Block) -> bool {
        block.is_heading()
            || block.tag == "pre"
            || block.has_image
            || block.words >= self.word_count_threshold
    }

    fn keep_filtered(&self, block: &Block) -> bool {
        if block.in_boilerplate {
            return false;
        }
        if block.is_image_only() {
            return true;
        }
        if !block.is_heading() && block.tag != "pre" && block.words < self.min_word_threshold {
            return false;
        }
        score(block) >= self.threshold_for(block)
    }

    fn threshold_for(&self, block: &Block) -> f64 {
        if !self.dynamic {
            return self.threshold;
        }
        let mut threshold = self.threshold;
        if block.tag_weight() > 1.0 {
            threshold *= 0.8;
        }
        if block.text_ratio() > 0.4 {
            threshold *= 0.9;
        }
        if block.link_ratio() > 0.6 {
            threshold *= 1.2;
        }
        threshold
    }
}

/// Weighted mix of text density, link sparsity, tag weight, class/id hints and length, in `[0, 1]`.
fn score(block: &Block) -> f64 {
    let text_density = block.text_ratio().min(1.0);
    let link_sparsity = 1.0 - block.link_ratio();
    let tag = (block.tag_weight() / MAX_TAG_WEIGHT).min(1.0);
    let hint = if block.negative_hint { 0.0 } else { 1.0 };
    let length = ((block.text_len as f64 + 1.0).ln() / 1000_f64.ln()).min(1.0);

    0.4 * text_density + 0.2 * link_sparsity + 0.2 * tag + 0.1 * hint + 0.1 * length
}

fn collect_blocks(document: &Html) -> Vec<Block> {
    let mut blocks = Vec::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let tag = element.value().name();
        if NEVER_EMIT.contains(&tag) || INLINE_TAGS.contains(&tag) {
            continue;
        }

        let ancestors: Vec<ElementRef<'_>> =
            element.ancestors().filter_map(ElementRef::wrap).collect();
        if ancestors.iter().any(|a| {
            let name = a.value().name();
            BLOCK_TAGS.contains(&name) || NEVER_EMIT.contains(&name)
        }) {
            continue;
        }

        let html = if BLOCK_TAGS.contains(&tag) {
            element.html()
        } else if is_leaf_container(element) {
            // Bare text in a div, section, td and the like renders as a paragraph.
            format!("<p>{}</p>", element.inner_html())
        } else {
            continue;
        };

        let text = normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        let has_image = element.select(&IMAGE_SELECTOR).next().is_some();
        if text.is_empty() && !has_image {
            continue;
        }
        let link_text_len = element
            .select(&ANCHOR_SELECTOR)
            .map(|a| normalize_whitespace(&a.text().collect::<String>()).chars().count())
            .sum();

        blocks.push(Block {
            tag: tag.to_owned(),
            html,
            words: text.split_whitespace().count(),
            text_len: text.chars().count(),
            link_text_len,
            has_image,
            in_boilerplate: ancestors
                .iter()
                .any(|a| BOILERPLATE_CONTAINERS.contains(&a.value().name())),
            negative_hint: std::iter::once(element)
                .chain(ancestors.iter().copied())
                .any(has_negative_hint),
        });
    }

    blocks
}

fn is_leaf_container(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .all(|child| INLINE_TAGS.contains(&child.value().name()))
}

fn has_negative_hint(element: ElementRef<'_>) -> bool {
    let value = element.value();
    [value.attr("class"), value.attr("id")]
        .into_iter()
        .flatten()
        .any(|attr| RE_NEGATIVE_HINT.is_match(attr))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_markdown(blocks: &[&Block]) -> String {
    let mut html = String::new();
    for block in blocks {
        match block.tag.as_str() {
            "li" => {
                html.push_str("<ul>");
                html.push_str(&block.html);
                html.push_str("</ul>");
            }
            _ => html.push_str(&block.html),
        }
        html.push('\n');
    }

    let markdown = html2md::parse_html(&html);
    let markdown = markdown.trim();
    if markdown.is_empty() {
        return String::new();
    }
    format!("{markdown}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Guide</title><style>p { color: red }</style></head>
  <body>
    <nav class="navbar">
      <ul>
        <li><a href="/">Home</a></li>
        <li><a href="/docs">Docs</a></li>
      </ul>
    </nav>
    <article>
      <h1>Getting Started</h1>
      <p>This guide walks through installing the toolkit, configuring a workspace and running the first build end to end.</p>
      <p>Short note here.</p>
      <p><img src="/diagram.png" alt="Diagram"></p>
      <table><tr><td>a</td></tr></table>
    </article>
    <footer>
      <p>Copyright notice for this website and all of its pages, including every guide, tutorial and reference document.</p>
    </footer>
    <script>var tracking = "this script body must never appear in any output at all";</script>
  </body>
</html>"#;

    #[test]
    fn raw_keeps_blocks_above_word_floor() {
        let page = ContentFilter::default().render(PAGE);

        assert!(page.raw_markdown.contains("Getting Started"));
        assert!(page.raw_markdown.contains("installing the toolkit"));
        assert!(page.raw_markdown.contains("Copyright notice"));
        assert!(!page.raw_markdown.contains("Short note"));
        assert!(!page.raw_markdown.contains("Home"));
        assert!(!page.raw_markdown.contains("tracking"));
    }

    #[test]
    fn filtered_drops_boilerplate_containers() {
        let page = ContentFilter::default().render(PAGE);

        assert!(page.filtered_markdown.contains("Getting Started"));
        assert!(page.filtered_markdown.contains("installing the toolkit"));
        assert!(page.filtered_markdown.contains("diagram.png"));
        assert!(!page.filtered_markdown.contains("Copyright notice"));
    }

    #[test]
    fn counts_media() {
        let page = ContentFilter::default().render(PAGE);
        assert_eq!(page.media, MediaCounts { images: 1, tables: 1 });
    }

    #[test]
    fn link_heavy_blocks_are_pruned() {
        let html = r#"<html><body><div>
            <p><a href="https://example.com/a/very/long/link/target/for/testing">Read more about this topic in our other amazing article</a></p>
            <p>Plain explanatory text that describes the topic in enough words to count as real content.</p>
        </div></body></html>"#;
        let filter = ContentFilter {
            word_count_threshold: 0,
            ..ContentFilter::default()
        };
        let page = filter.render(html);

        assert!(page.raw_markdown.contains("Read more"));
        assert!(!page.filtered_markdown.contains("Read more"));
        assert!(page.filtered_markdown.contains("Plain explanatory text"));
    }

    #[test]
    fn bare_container_text_becomes_a_block() {
        let words = "container text that sits directly in a generic element without paragraph markup around it";
        let sentence = format!("{words} {words} {words}");
        let html = format!(
            "<html><body><main><div class=content>{sentence} <em>alpha</em></div><section>{sentence} omega</section><table><tr><td>{sentence} cell</td></tr></table></main></body></html>"
        );
        let page = ContentFilter::default().render(&html);

        assert!(page.raw_markdown.contains("alpha"));
        assert!(page.raw_markdown.contains("omega"));
        assert!(page.raw_markdown.contains("cell"));
        assert!(page.filtered_markdown.contains("omega"));
    }

    #[test]
    fn head_text_is_never_a_block() {
        let filter = ContentFilter {
            word_count_threshold: 0,
            ..ContentFilter::default()
        };
        let page = filter.render(PAGE);
        assert!(!page.raw_markdown.contains("Guide"));
        assert!(!page.raw_markdown.contains("color: red"));
    }

    #[test]
    fn empty_page_renders_empty_markdown() {
        let page = ContentFilter::default().render("");
        assert!(page.raw_markdown.is_empty());
        assert!(page.filtered_markdown.is_empty());
    }
}
