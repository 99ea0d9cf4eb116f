//! Content discovery.
//!
//! Stage 1 of the build. Walks the input directory, splits every Markdown
//! file into front matter and body, and produces a [`Snapshot`]: all pages,
//! ordered the way collections expect them (date ascending, ties broken by
//! input path).
//!
//! ## Directory Structure
//!
//! ```text
//! src/
//! ├── _data/                 # site.toml plus extra template data (never rendered)
//! │   ├── site.toml
//! │   └── books.json         # exposed to tags as `books`
//! ├── _includes/             # reserved
//! ├── _layouts/              # reserved
//! ├── index.md               # → /
//! ├── about.md               # → /about/
//! ├── posts/
//! │   └── 2021/
//! │       └── hello.md       # → /posts/2021/hello/
//! └── books/
//!     └── dune.md            # → /books/dune/
//! ```
//!
//! Directories and files starting with `_` or `.` are skipped.
//!
//! ## Front matter
//!
//! `date`, `draft`, `title`, `permalink` and `layout` are lifted into typed
//! [`Page`] fields; `read` is read for books and left in the data map along
//! with every other key. A missing `date` falls back to the file's
//! modification time. A `date` that cannot be parsed fails the scan.

use crate::config::SITE_FILE;
use crate::filters;
use crate::frontmatter::{self, FrontmatterError};
use crate::naming::{self, NamingError};
use crate::types::Page;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{}: {source}", path.display())]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },
    #[error("{}: invalid date {value}", path.display())]
    InvalidDate { path: PathBuf, value: String },
    #[error("{}: invalid data file: {message}", path.display())]
    Data { path: PathBuf, message: String },
    #[error("{}: {source}", path.display())]
    Location {
        path: PathBuf,
        #[source]
        source: NamingError,
    },
}

/// Every page of the site, ordered by `(date, input_path)` ascending.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pages: Vec<Page>,
}

impl Snapshot {
    pub fn new(mut pages: Vec<Page>) -> Self {
        pages.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.input_path.cmp(&b.input_path))
        });
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Scan `root` for Markdown pages.
pub fn scan(root: &Path) -> Result<Snapshot, ScanError> {
    let mut pages = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_reserved(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        pages.push(read_page(entry.path(), rel)?);
    }

    Ok(Snapshot::new(pages))
}

/// Parse a single Markdown file. `rel` is its path relative to the input dir.
pub fn read_page(path: &Path, rel: PathBuf) -> Result<Page, ScanError> {
    let raw = fs::read_to_string(path)?;
    let doc = frontmatter::split(&raw).map_err(|source| ScanError::Frontmatter {
        path: rel.clone(),
        source,
    })?;
    let mut data = doc.data;

    let date = match data.remove("date") {
        Some(value) => filters::date_from_value(&value).map_err(|_| ScanError::InvalidDate {
            path: rel.clone(),
            value: value.to_string(),
        })?,
        None => modified_time(path)?,
    };
    let draft = data.remove("draft").is_some_and(|v| is_truthy(&v));
    let title = take_string(&mut data, "title");
    let permalink = take_string(&mut data, "permalink");
    let layout = take_string(&mut data, "layout");
    let read = data.get("read").is_some_and(is_truthy);

    let location = naming::resolve_location(&rel, permalink.as_deref()).map_err(|source| {
        ScanError::Location {
            path: rel.clone(),
            source,
        }
    })?;

    Ok(Page {
        section: naming::section_of(&rel),
        input_path: rel,
        url: location.url,
        output_path: location.output_path,
        date,
        draft,
        read,
        title,
        permalink,
        layout,
        body: doc.body.to_string(),
        data,
    })
}

/// Load every `*.toml` and `*.json` file in the data directory, keyed by
/// file stem. The site record itself is excluded; tags see it as `site`.
pub fn load_data(data_dir: &Path) -> Result<Map<String, Value>, ScanError> {
    let mut records = Map::new();
    if !data_dir.is_dir() {
        return Ok(records);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(data_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    for path in paths {
        if path.file_name().is_some_and(|n| n == SITE_FILE) {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let value = match ext.as_str() {
            "json" => {
                let content = fs::read_to_string(&path)?;
                serde_json::from_str(&content).map_err(|e| ScanError::Data {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            "toml" => {
                let content = fs::read_to_string(&path)?;
                let table: toml::Value = toml::from_str(&content).map_err(|e| ScanError::Data {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                serde_json::to_value(table).map_err(|e| ScanError::Data {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            _ => continue,
        };
        records.insert(stem, value);
    }

    Ok(records)
}

fn is_reserved(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('_') || name.starts_with('.'))
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>, ScanError> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Front matter flags follow template truthiness: `false`, `0`, `""` and
/// `null` are off, anything else is on.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn take_string(data: &mut Map<String, Value>, key: &str) -> Option<String> {
    match data.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
