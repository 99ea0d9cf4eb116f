//! Site build.
//!
//! Runs the pipeline end to end:
//!
//! ```text
//! 1. Scan       src/**/*.md + src/_data  →  Snapshot + template data
//! 2. Collect    Snapshot                 →  posts, books
//! 3. Render     each page (in parallel)  →  tags → Markdown → layout → transforms
//! 4. Feeds      live posts, written pages →  feed.xml, sitemap.xml
//! 5. Copy       passthrough entries      →  www/
//! ```
//!
//! Every page sees the same template context: its own front matter and
//! `page` object, each `_data` record under its file stem, `site` and
//! `collections`. Collections are computed once, before any page renders,
//! so rendering order never changes what a page sees.
//!
//! ## Output Structure
//!
//! ```text
//! www/
//! ├── index.html
//! ├── about/index.html
//! ├── posts/hello/index.html
//! ├── images/                # resI variants (+ src/images passthrough)
//! ├── assets/                # passthrough
//! ├── feed.xml
//! ├── sitemap.xml
//! └── .cache/manifest.json   # encode cache
//! ```

use crate::cache::CacheStats;
use crate::feed::{self, FeedEntry, FeedError, SitemapEntry};
use crate::layout::{self, LayoutContext};
use crate::markdown::Markdown;
use crate::naming::write_atomic;
use crate::pipeline::{Passthrough, Pipeline};
use crate::scan::{self, ScanError, Snapshot};
use crate::tags::{self, TagError};
use crate::types::{Page, Section};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const SITEMAP_FILE: &str = "sitemap.xml";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("{}: {source}", path.display())]
    Tag {
        path: PathBuf,
        #[source]
        source: TagError,
    },
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{first} and {second} both write {}", output.display())]
    DuplicateOutput {
        output: PathBuf,
        first: String,
        second: String,
    },
}

/// One page written by the build.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenPage {
    pub title: String,
    pub url: String,
    pub input_path: PathBuf,
    /// Relative to the output directory.
    pub output_path: PathBuf,
    pub section: Section,
    pub draft: bool,
}

/// What a build did, for CLI output.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub pages: Vec<WrittenPage>,
    /// `(name, size)` for every registered collection.
    pub collections: Vec<(&'static str, usize)>,
    /// Feed and sitemap paths, relative to the output directory.
    pub feeds: Vec<PathBuf>,
    /// Passthrough sources that existed and were copied.
    pub copied: Vec<String>,
    pub cache: CacheStats,
}

/// Result of `check`: the scan without any writes.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub pages: Vec<WrittenPage>,
    pub data_records: Vec<String>,
    pub collections: Vec<(&'static str, usize)>,
}

struct Rendered {
    page: WrittenPage,
    date: DateTime<Utc>,
    /// Body HTML before the layout; the feed embeds it.
    body: String,
}

fn written(page: &Page) -> WrittenPage {
    WrittenPage {
        title: page.display_title(),
        url: page.url.clone(),
        input_path: page.input_path.clone(),
        output_path: page.output_path.clone(),
        section: page.section,
        draft: page.draft,
    }
}

/// Scan the input tree and load the data records.
fn load(pipeline: &Pipeline) -> Result<(Snapshot, Map<String, Value>), GenerateError> {
    let data = scan::load_data(&pipeline.dirs.data_dir())?;
    let snapshot = scan::scan(&pipeline.dirs.input)?;
    tracing::debug!(
        "scanned {} pages and {} data records",
        snapshot.len(),
        data.len()
    );
    Ok((snapshot, data))
}

/// Fail when two pages, or a page and a feed, would write the same file.
fn claim_outputs(pipeline: &Pipeline, snapshot: &Snapshot) -> Result<(), GenerateError> {
    let build = &pipeline.site.config.build;
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();
    if build.rss {
        let feed = PathBuf::from(build.feed_path.trim_start_matches('/'));
        claimed.insert(feed, "the RSS feed".to_string());
    }
    if build.sitemap {
        claimed.insert(PathBuf::from(SITEMAP_FILE), "the sitemap".to_string());
    }

    for page in snapshot.pages() {
        let source = page.input_path.display().to_string();
        if let Some(first) = claimed.get(&page.output_path) {
            return Err(GenerateError::DuplicateOutput {
                output: page.output_path.clone(),
                first: first.clone(),
                second: source,
            });
        }
        claimed.insert(page.output_path.clone(), source);
    }
    Ok(())
}

fn collection_sizes(collections: &BTreeMap<&'static str, Vec<Page>>) -> Vec<(&'static str, usize)> {
    collections
        .iter()
        .map(|(name, pages)| (*name, pages.len()))
        .collect()
}

/// Validate the content without writing anything.
pub fn check(pipeline: &Pipeline, now: DateTime<Utc>) -> Result<CheckReport, GenerateError> {
    let (snapshot, data) = load(pipeline)?;
    claim_outputs(pipeline, &snapshot)?;
    let collections = pipeline.registry.compute_collections(&snapshot, now);
    Ok(CheckReport {
        pages: snapshot.pages().iter().map(written).collect(),
        data_records: data.keys().cloned().collect(),
        collections: collection_sizes(&collections),
    })
}

/// The context keys every page shares.
fn shared_context(
    pipeline: &Pipeline,
    data: Map<String, Value>,
    collections: &BTreeMap<&'static str, Vec<Page>>,
) -> Map<String, Value> {
    let mut shared = data;
    shared.insert("site".into(), pipeline.site.to_value());
    let collections: Map<String, Value> = collections
        .iter()
        .map(|(name, pages)| {
            (
                name.to_string(),
                Value::Array(pages.iter().map(Page::to_value).collect()),
            )
        })
        .collect();
    shared.insert("collections".into(), Value::Object(collections));
    shared
}

/// Page fields on top of the shared keys; `site` and `collections` win.
fn page_context(page: &Page, shared: &Map<String, Value>) -> Value {
    let own = match page.to_value() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let reserved = ["site", "collections"];
    let mut parts: Vec<(String, Value)> = shared
        .iter()
        .filter(|(key, _)| !own.contains_key(*key) || reserved.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    parts.extend(
        own.into_iter()
            .filter(|(key, _)| !reserved.contains(&key.as_str())),
    );
    tags::context(parts)
}

fn render_one(
    pipeline: &Pipeline,
    page: &Page,
    shared: &Map<String, Value>,
    layout_ctx: &LayoutContext,
) -> Result<Rendered, GenerateError> {
    let context = page_context(page, shared);
    let expanded = tags::expand(&pipeline.registry, &page.body, &context).map_err(|source| {
        GenerateError::Tag {
            path: page.input_path.clone(),
            source,
        }
    })?;
    let body = Markdown::new().render(&expanded);
    let document = layout::render_page(page, &body, layout_ctx).into_string();

    let output_path = page.output_path.to_string_lossy();
    let html = pipeline.registry.apply_transforms(document, &output_path);
    write_atomic(&pipeline.dirs.output.join(&page.output_path), html.as_bytes())?;
    tracing::debug!("rendered {} → {}", page.input_path.display(), output_path);

    Ok(Rendered {
        page: written(page),
        date: page.date,
        body,
    })
}

/// Run a full build into `pipeline.dirs.output`.
///
/// `now` decides which posts are live.
pub fn build(pipeline: &Pipeline, now: DateTime<Utc>) -> Result<BuildReport, GenerateError> {
    let (snapshot, data) = load(pipeline)?;
    claim_outputs(pipeline, &snapshot)?;
    let collections = pipeline.registry.compute_collections(&snapshot, now);
    let shared = shared_context(pipeline, data, &collections);
    let layout_ctx = LayoutContext {
        site: &pipeline.site,
        collections: &collections,
    };

    fs::create_dir_all(&pipeline.dirs.output)?;

    let rendered: Vec<Rendered> = snapshot
        .pages()
        .par_iter()
        .map(|page| render_one(pipeline, page, &shared, &layout_ctx))
        .collect::<Result<_, _>>()?;

    let mut feeds = Vec::new();
    let build = &pipeline.site.config.build;
    if build.rss {
        feeds.push(write_feed(pipeline, &collections, &rendered)?);
    }
    if build.sitemap {
        feeds.push(write_sitemap(pipeline, &rendered)?);
    }

    let copied = copy_passthrough(
        &pipeline.dirs.input,
        &pipeline.dirs.output,
        &pipeline.passthrough,
    )?;

    pipeline.cache().save()?;

    Ok(BuildReport {
        pages: rendered.into_iter().map(|r| r.page).collect(),
        collections: collection_sizes(&collections),
        feeds,
        copied,
        cache: pipeline.cache().stats(),
    })
}

/// Write a non-page output through the transforms.
fn write_output(pipeline: &Pipeline, rel: &str, content: String) -> Result<PathBuf, GenerateError> {
    let rel = PathBuf::from(rel.trim_start_matches('/'));
    let content = pipeline
        .registry
        .apply_transforms(content, &rel.to_string_lossy());
    write_atomic(&pipeline.dirs.output.join(&rel), content.as_bytes())?;
    Ok(rel)
}

fn write_feed(
    pipeline: &Pipeline,
    collections: &BTreeMap<&'static str, Vec<Page>>,
    rendered: &[Rendered],
) -> Result<PathBuf, GenerateError> {
    let bodies: HashMap<&str, &str> = rendered
        .iter()
        .map(|r| (r.page.url.as_str(), r.body.as_str()))
        .collect();
    let posts = collections.get("posts").map(Vec::as_slice).unwrap_or(&[]);
    let entries: Vec<FeedEntry> = posts
        .iter()
        .map(|page| FeedEntry {
            page,
            html: bodies.get(page.url.as_str()).copied().unwrap_or_default(),
        })
        .collect();
    let xml = feed::rss_feed(&pipeline.site, &entries)?;
    write_output(pipeline, &pipeline.site.config.build.feed_path, xml)
}

fn write_sitemap(pipeline: &Pipeline, rendered: &[Rendered]) -> Result<PathBuf, GenerateError> {
    let mut entries: Vec<SitemapEntry> = rendered
        .iter()
        .map(|r| SitemapEntry {
            url: r.page.url.clone(),
            lastmod: Some(r.date),
        })
        .collect();
    entries.sort_by(|a, b| a.url.cmp(&b.url));
    let xml = feed::sitemap(&pipeline.site, &entries);
    write_output(pipeline, SITEMAP_FILE, xml)
}

/// Copy each passthrough entry that exists under `input`.
fn copy_passthrough(
    input: &Path,
    output: &Path,
    passthrough: &[Passthrough],
) -> Result<Vec<String>, GenerateError> {
    let mut copied = Vec::new();
    for entry in passthrough {
        let from = input.join(entry.from);
        let to = output.join(entry.to);
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else if from.is_file() {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &to)?;
        } else {
            tracing::debug!("passthrough {} not present, skipping", entry.from);
            continue;
        }
        copied.push(entry.from.to_string());
    }
    Ok(copied)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), GenerateError> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
