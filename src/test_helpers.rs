//! Shared test utilities for the nib test suite.
//!
//! Provides page builders, a fixture site written into a temp directory, and
//! a synthetic JPEG writer for image tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_site();
//! let snapshot = scan(&tmp.path().join("src")).unwrap();
//! let post = find_page(snapshot.pages(), "/posts/hello/");
//! assert_eq!(post.title.as_deref(), Some("Hello"));
//! ```

use chrono::{DateTime, Utc};
use image::{ImageEncoder, RgbImage};
use serde_json::Map;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::naming;
use crate::types::Page;

// =========================================================================
// Page builders
// =========================================================================

/// Build a page as the scanner would for `rel_path` dated `date` (RFC 3339).
///
/// The title is the file stem, so `posts/hello.md` is titled `hello`.
pub fn page_at(rel_path: &str, date: &str) -> Page {
    let rel = PathBuf::from(rel_path);
    let location = naming::resolve_location(&rel, None).unwrap();
    let title = rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string());
    Page {
        section: naming::section_of(&rel),
        url: location.url,
        output_path: location.output_path,
        input_path: rel,
        date: parse_utc(date),
        draft: false,
        read: false,
        title,
        permalink: None,
        layout: None,
        body: String::new(),
        data: Map::new(),
    }
}

/// A post under `posts/` with the given stem and date.
pub fn post(stem: &str, date: &str) -> Page {
    page_at(&format!("posts/{stem}.md"), date)
}

/// A draft post.
pub fn draft(stem: &str, date: &str) -> Page {
    Page {
        draft: true,
        ..post(stem, date)
    }
}

/// A book under `books/`.
pub fn book(stem: &str, date: &str, read: bool) -> Page {
    Page {
        read,
        ..page_at(&format!("books/{stem}.md"), date)
    }
}

pub fn parse_utc(date: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(date)
        .unwrap_or_else(|e| panic!("bad test date {date:?}: {e}"))
        .with_timezone(&Utc)
}

/// Input paths of pages, in order, with forward slashes.
pub fn input_paths(pages: &[Page]) -> Vec<String> {
    pages
        .iter()
        .map(|p| p.input_path.to_string_lossy().replace('\\', "/"))
        .collect()
}

/// Find a page by URL. Panics if not found.
pub fn find_page<'a>(pages: &'a [Page], url: &str) -> &'a Page {
    pages.iter().find(|p| p.url == url).unwrap_or_else(|| {
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        panic!("page '{url}' not found. Available: {urls:?}")
    })
}

// =========================================================================
// Filesystem fixtures
// =========================================================================

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// A small but complete blog under `<tmp>/src`.
///
/// ```text
/// src/
/// ├── _data/site.toml
/// ├── _data/links.json
/// ├── index.md                 layout: home
/// ├── archive.md               layout: archive
/// ├── about.md
/// ├── posts/hello.md           2021-03-01
/// ├── posts/older.md           2020-06-15
/// ├── posts/wip.md             draft
/// ├── posts/future.md          2999-01-01
/// ├── books/dune.md            read
/// ├── assets/style.css
/// ├── manifest.json
/// └── _redirects
/// ```
pub fn setup_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    write_file(
        &src,
        "_data/site.toml",
        r#"title = "Field Notes"
description = "Build, break and improve."
url = "https://notes.example"
author = "Jane Doe"
email = "jane@notes.example"
preconnects = ["https://fonts.gstatic.com"]

[[nav]]
title = "Archive"
url = "/archive/"

[[nav]]
title = "GitHub"
url = "https://github.com/jane"
external = true

[social]
github = "https://github.com/jane"
"#,
    );
    write_file(&src, "_data/links.json", r#"{"mastodon": "https://social.example/@jane"}"#);
    write_file(
        &src,
        "index.md",
        "---\ntitle: Home\nlayout: home\ndate: 2020-01-01\n---\nWelcome to {{ site.title }}.\n",
    );
    write_file(
        &src,
        "archive.md",
        "---\ntitle: Archive\nlayout: archive\ndate: 2020-01-01\n---\n",
    );
    write_file(
        &src,
        "about.md",
        "---\ntitle: About\ndate: 2020-01-01\n---\n# About me\n\nContact: {{ site.email | mailHref }}\n",
    );
    write_file(
        &src,
        "posts/hello.md",
        "---\ntitle: Hello\ndate: 2021-03-01T00:00:00Z\n---\nHi :smile: see https://example.com\n\n{% Link \"/about/\", false, \"About\" %}\n",
    );
    write_file(
        &src,
        "posts/older.md",
        "---\ntitle: Older\ndate: 2020-06-15\n---\nAn older post.\n",
    );
    write_file(
        &src,
        "posts/wip.md",
        "---\ntitle: WIP\ndate: 2021-01-01\ndraft: true\n---\nNot yet.\n",
    );
    write_file(
        &src,
        "posts/future.md",
        "---\ntitle: Future\ndate: 2999-01-01\n---\nLater.\n",
    );
    write_file(
        &src,
        "books/dune.md",
        "---\ntitle: Dune\ndate: 2019-01-01\nread: true\n---\nSpice.\n",
    );
    write_file(&src, "assets/style.css", "body { color: black; }\n");
    write_file(&src, "manifest.json", "{\"name\": \"Field Notes\"}\n");
    write_file(&src, "_redirects", "/old /new 301\n");
    tmp
}
