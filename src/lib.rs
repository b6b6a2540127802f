#![forbid(unsafe_code)]

pub mod artifacts;
pub mod chapters;
pub mod classify;
pub mod cli;
pub mod command;
pub mod commands;
pub mod content_filter;
pub mod crawl;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod language;
pub mod llm;
pub mod logging;
pub mod openai;
pub mod pipeline;
pub mod prune;
pub mod qa;
pub mod slug;
pub mod splitter;
pub mod summarize;
