//! Language-keyed section tables used by the section pruner.
//!
//! Adding a language means adding a `Language` variant and one
//! `LanguageProfile` entry; the pruner itself has no per-language branches.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    German,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::German];

    pub fn tag(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::German => "de",
        }
    }

    pub fn profile(self) -> &'static LanguageProfile {
        match self {
            Self::English => &ENGLISH,
            Self::German => &GERMAN,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// An unwanted section category and the heading variants that denote it.
#[derive(Debug)]
pub struct UnwantedGroup {
    pub category: &'static str,
    pub variants: &'static [&'static str],
}

#[derive(Debug)]
pub struct LanguageProfile {
    pub language: Language,
    pub unwanted: &'static [UnwantedGroup],
    /// Heading prefixes that are never removed.
    pub protected: &'static [&'static str],
    /// Start of substantive content; everything before the first match is dropped.
    pub chapter_start: &'static str,
    /// Numbered chapter headings, always protected.
    pub chapter_heading: &'static str,
    /// A heading sample starting with one of these is taken to be in this language.
    pub sample_markers: &'static [&'static str],
    /// Words that vote for this language in the detection heuristic.
    pub vocabulary: &'static [&'static str],
    pub body_text_label: &'static str,
}

impl LanguageProfile {
    /// Every unwanted variant, flattened in table order.
    pub fn unwanted_labels(&self) -> Vec<&'static str> {
        self.unwanted
            .iter()
            .flat_map(|group| group.variants.iter().copied())
            .collect()
    }

    /// Candidate labels handed to the classifier: all unwanted variants plus the body label.
    pub fn candidate_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .unwanted_labels()
            .into_iter()
            .map(str::to_owned)
            .collect();
        labels.push(self.body_text_label.to_owned());
        labels
    }

    /// Category of the unwanted group `label` belongs to, if any.
    pub fn unwanted_category(&self, label: &str) -> Option<&'static str> {
        self.unwanted
            .iter()
            .find(|group| group.variants.contains(&label))
            .map(|group| group.category)
    }

    pub fn is_protected(&self, heading: &str) -> bool {
        let heading = heading.trim();
        self.protected.iter().any(|term| heading.starts_with(term))
            || self.chapter_heading_regex().is_match(heading)
    }

    pub fn chapter_start_regex(&self) -> &'static Regex {
        &compiled(self.language).chapter_start
    }

    pub fn chapter_heading_regex(&self) -> &'static Regex {
        &compiled(self.language).chapter_heading
    }
}

static ENGLISH: LanguageProfile = LanguageProfile {
    language: Language::English,
    unwanted: &[
        UnwantedGroup {
            category: "Table of Contents",
            variants: &["Table of Contents", "Contents", "Index"],
        },
        UnwantedGroup {
            category: "Preface",
            variants: &["Preface"],
        },
        UnwantedGroup {
            category: "Acknowledgments",
            variants: &["Acknowledgments", "Acknowledgements", "Credits", "Funding"],
        },
        UnwantedGroup {
            category: "Copyright",
            variants: &["Copyright", "Legal Notice", "Printing History"],
        },
        UnwantedGroup {
            category: "Appendix",
            variants: &["Appendix", "Supplementary Material"],
        },
        UnwantedGroup {
            category: "Glossary",
            variants: &["Definitions", "Glossary", "Terminology"],
        },
        UnwantedGroup {
            category: "List of Tables",
            variants: &["List of Tables"],
        },
        UnwantedGroup {
            category: "List of Figures",
            variants: &["List of Figures"],
        },
        UnwantedGroup {
            category: "Nomenclature",
            variants: &["Nomenclature", "Symbols Used"],
        },
        UnwantedGroup {
            category: "References",
            variants: &[
                "References",
                "Bibliography",
                "Sources",
                "Citations",
                "Works Cited",
                "Further Reading",
            ],
        },
    ],
    protected: &["Abstract", "Introduction", "Discussion", "Results", "Conclusion"],
    chapter_start: r"(?m)^##[ \t]*(?:Abstract|Chapter[ \t]+1\b)",
    chapter_heading: r"^Chapter\s+\d+",
    sample_markers: &["chapter"],
    vocabulary: &[
        "the", "and", "of", "to", "in", "for", "with", "on", "is", "are", "introduction",
        "chapter", "results", "discussion", "conclusion", "references", "contents", "overview",
        "method", "methods", "analysis", "summary",
    ],
    body_text_label: "Body Text",
};

static GERMAN: LanguageProfile = LanguageProfile {
    language: Language::German,
    unwanted: &[
        UnwantedGroup {
            category: "Inhaltsverzeichnis",
            variants: &["Inhaltsverzeichnis", "Index"],
        },
        UnwantedGroup {
            category: "Vorwort",
            variants: &["Vorwort", "Einleitung", "Über dieses Buch"],
        },
        UnwantedGroup {
            category: "Danksagung",
            variants: &["Danksagung", "Credits", "Funding"],
        },
        UnwantedGroup {
            category: "Copyright",
            variants: &["Copyright", "Druckvermerk", "Rechtlicher Hinweis"],
        },
        UnwantedGroup {
            category: "Anhang",
            variants: &["Anhang", "Supplement"],
        },
        UnwantedGroup {
            category: "Glossar",
            variants: &["Begriffe", "Glossar", "Terminologie"],
        },
        UnwantedGroup {
            category: "Tabellenverzeichnis",
            variants: &["Tabellenverzeichnis"],
        },
        UnwantedGroup {
            category: "Abbildungsverzeichnis",
            variants: &["Abbildungsverzeichnis"],
        },
        UnwantedGroup {
            category: "Literaturverzeichnis",
            variants: &["Literaturverzeichnis", "Quellen", "Zitate"],
        },
    ],
    protected: &["Abstract", "Einleitung", "Diskussion", "Ergebnisse", "Fazit", "Kapitel"],
    chapter_start: r"(?m)^##[ \t]*(?:Abstract|Einleitung|Kapitel[ \t]+\d+)",
    chapter_heading: r"^Kapitel\s+\d+",
    sample_markers: &["kapitel", "einleitung"],
    vocabulary: &[
        "der", "die", "das", "und", "von", "zu", "mit", "für", "ist", "ein", "eine", "den",
        "des", "im", "kapitel", "einleitung", "grundlagen", "zusammenfassung", "ergebnisse",
        "diskussion", "fazit", "anhang", "literaturverzeichnis", "inhaltsverzeichnis",
        "abbildungsverzeichnis", "tabellenverzeichnis", "vorwort", "danksagung", "methodik",
        "übersicht",
    ],
    body_text_label: "Body Text",
};

struct CompiledProfile {
    chapter_start: Regex,
    chapter_heading: Regex,
}

fn compile(profile: &LanguageProfile) -> CompiledProfile {
    CompiledProfile {
        chapter_start: Regex::new(profile.chapter_start).expect("valid chapter start pattern"),
        chapter_heading: Regex::new(profile.chapter_heading)
            .expect("valid chapter heading pattern"),
    }
}

static COMPILED_ENGLISH: Lazy<CompiledProfile> = Lazy::new(|| compile(&ENGLISH));
static COMPILED_GERMAN: Lazy<CompiledProfile> = Lazy::new(|| compile(&GERMAN));

fn compiled(language: Language) -> &'static CompiledProfile {
    match language {
        Language::English => &COMPILED_ENGLISH,
        Language::German => &COMPILED_GERMAN,
    }
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{2,}[ \t]+(.+)$").unwrap());

/// Detects the document language from its first five `##`+ headings.
///
/// A sample that opens with a language marker wins outright; otherwise the
/// vocabulary vote decides, and English is the fallback.
pub fn detect_language(markdown: &str) -> Language {
    let sample = RE_HEADING
        .captures_iter(markdown)
        .take(5)
        .map(|caps| caps[1].trim().to_owned())
        .collect::<Vec<_>>()
        .join("\n");
    tracing::debug!(sample = %sample, "heading sample for language detection");

    let lowered = sample.to_lowercase();
    for language in Language::ALL {
        if language
            .profile()
            .sample_markers
            .iter()
            .any(|marker| lowered.starts_with(marker))
        {
            return language;
        }
    }

    guess_language(&sample).unwrap_or(Language::English)
}

/// Vocabulary vote over the sample's words. Umlauts and `ß` count toward German.
pub fn guess_language(sample: &str) -> Option<Language> {
    let lowered = sample.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(Language, usize)> = None;
    for language in Language::ALL {
        let vocabulary = language.profile().vocabulary;
        let mut score = words.iter().filter(|w| vocabulary.contains(w)).count();
        if language == Language::German {
            score += lowered
                .chars()
                .filter(|c| matches!(c, 'ä' | 'ö' | 'ü' | 'ß'))
                .count();
        }
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((language, score)),
        }
    }
    best.map(|(language, _)| language)
}
