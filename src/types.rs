//! Shared content types.
//!
//! Everything the scanner discovers is a [`Page`]. Posts and books are not
//! separate types: they are pages selected from the `posts/` and `books/`
//! trees by the collection selectors.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Which tree a page was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Posts,
    Books,
    Pages,
}

/// A content item discovered from a Markdown file.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Path relative to the input directory; the page's identity.
    pub input_path: PathBuf,
    /// Site-relative URL, always starting and (for directories) ending with `/`.
    pub url: String,
    /// Path relative to the output directory.
    pub output_path: PathBuf,
    pub section: Section,
    pub date: DateTime<Utc>,
    pub draft: bool,
    /// Books only: whether the book has been read.
    pub read: bool,
    pub title: Option<String>,
    /// Explicit front-matter permalink, if any.
    pub permalink: Option<String>,
    pub layout: Option<String>,
    /// Markdown body before rendering, HTML after.
    pub body: String,
    /// Remaining front-matter fields.
    pub data: Map<String, Value>,
}

impl Page {
    /// Display title, falling back to the file stem.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.input_path
                .file_stem()
                .map(|s| s.to_string_lossy().replace('-', " "))
                .unwrap_or_default()
        })
    }

    /// The page as template data: front-matter fields at the top level plus
    /// a `page` object with the computed values.
    pub fn to_value(&self) -> Value {
        let mut map = self.data.clone();
        if let Some(title) = &self.title {
            map.insert("title".into(), Value::String(title.clone()));
        }
        map.insert("date".into(), Value::String(self.date_string()));
        map.insert("draft".into(), Value::Bool(self.draft));
        map.insert(
            "page".into(),
            serde_json::json!({
                "url": self.url,
                "date": self.date_string(),
                "inputPath": self.input_path.to_string_lossy(),
                "outputPath": self.output_path.to_string_lossy(),
                "fileSlug": self.input_path.file_stem().map(|s| s.to_string_lossy().to_string()),
            }),
        );
        Value::Object(map)
    }

    fn date_string(&self) -> String {
        self.date.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// An item paired with its four-digit UTC year (see `collections::add_year`).
#[derive(Debug, Clone, Serialize)]
pub struct WithYear<T> {
    #[serde(flatten)]
    pub item: T,
    pub year: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::page_at;

    #[test]
    fn display_title_falls_back_to_stem() {
        let mut page = page_at("posts/my-first-post.md", "2020-01-01T00:00:00Z");
        page.title = None;
        assert_eq!(page.display_title(), "my first post");
    }

    #[test]
    fn to_value_exposes_page_object() {
        let page = page_at("posts/hello.md", "2020-01-02T03:04:05Z");
        let value = page.to_value();
        assert_eq!(value["page"]["url"], "/posts/hello/");
        assert_eq!(value["date"], "2020-01-02T03:04:05.000Z");
        assert_eq!(value["page"]["fileSlug"], "hello");
    }
}
