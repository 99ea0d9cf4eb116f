//! Input path → URL and output path mapping.
//!
//! Pages get "pretty" directory URLs:
//! - `index.md` → `/` (`index.html`)
//! - `about.md` → `/about/` (`about/index.html`)
//! - `posts/2020/hello.md` → `/posts/2020/hello/` (`posts/2020/hello/index.html`)
//!
//! A front-matter `permalink` overrides the default:
//! - ending in `/` → that directory's `index.html`
//! - with a file extension (`/404.html`, `/feed.xml`) → that exact file
//! - otherwise it is treated as a directory
//!
//! Permalinks may only name paths below the output directory; `..`, `.`
//! and drive prefixes are rejected.

use crate::types::Section;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum NamingError {
    #[error("permalink {0:?} points outside the output directory")]
    OutsideOutput(String),
}

/// Resolved location of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub url: String,
    pub output_path: PathBuf,
}

/// Compute where a page is written and the URL it is served from.
///
/// `input_rel` is the path relative to the input directory.
pub fn resolve_location(input_rel: &Path, permalink: Option<&str>) -> Result<Location, NamingError> {
    if let Some(permalink) = permalink.map(str::trim).filter(|p| !p.is_empty()) {
        return from_permalink(permalink);
    }

    let mut segments = dir_segments(input_rel);
    let stem = input_rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if stem != "index" {
        segments.push(stem);
    }
    Ok(directory_location(&segments))
}

fn from_permalink(permalink: &str) -> Result<Location, NamingError> {
    let trimmed = permalink.trim_matches('/');
    let contained = Path::new(trimmed)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !contained || trimmed.split('/').any(|s| s == "." || s == "..") {
        return Err(NamingError::OutsideOutput(permalink.to_string()));
    }
    let has_extension = !permalink.ends_with('/')
        && Path::new(trimmed)
            .extension()
            .is_some_and(|ext| !ext.is_empty());

    if has_extension {
        Ok(Location {
            url: format!("/{trimmed}"),
            output_path: PathBuf::from(trimmed),
        })
    } else {
        let segments: Vec<String> = trimmed
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(directory_location(&segments))
    }
}

fn directory_location(segments: &[String]) -> Location {
    if segments.is_empty() {
        return Location {
            url: "/".to_string(),
            output_path: PathBuf::from("index.html"),
        };
    }
    let mut output_path: PathBuf = segments.iter().collect();
    output_path.push("index.html");
    Location {
        url: format!("/{}/", segments.join("/")),
        output_path,
    }
}

fn dir_segments(input_rel: &Path) -> Vec<String> {
    input_rel
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Classify a page by the directories it sits in (`**/posts/**`, `**/books/**`).
pub fn section_of(input_rel: &Path) -> Section {
    let dirs = dir_segments(input_rel);
    if dirs.iter().any(|d| d == "posts") {
        Section::Posts
    } else if dirs.iter().any(|d| d == "books") {
        Section::Books
    } else {
        Section::Pages
    }
}

/// Prefix a root-relative URL with the site's base path.
///
/// `with_base("/blog/", "/posts/a/")` → `/blog/posts/a/`.
/// Absolute URLs (with a scheme) are returned unchanged.
pub fn with_base(base_url: &str, url: &str) -> String {
    if url.contains("://") || !url.starts_with('/') {
        return url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    format!("{base}{url}")
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A sibling of `path` that no other writer in this process will pick.
///
/// `www/images/a-320.jpeg` → `www/images/.a-320.jpeg.<pid>.<n>.tmp`
pub fn temp_sibling(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}

/// Write `bytes` to a unique temp file next to `path` and rename it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: &str, permalink: Option<&str>) -> (String, String) {
        let l = resolve_location(Path::new(path), permalink).unwrap();
        (l.url, l.output_path.to_string_lossy().replace('\\', "/"))
    }

    #[test]
    fn root_index() {
        assert_eq!(loc("index.md", None), ("/".into(), "index.html".into()));
    }

    #[test]
    fn top_level_page() {
        assert_eq!(
            loc("about.md", None),
            ("/about/".into(), "about/index.html".into())
        );
    }

    #[test]
    fn nested_post() {
        assert_eq!(
            loc("posts/2020/hello.md", None),
            ("/posts/2020/hello/".into(), "posts/2020/hello/index.html".into())
        );
    }

    #[test]
    fn nested_index() {
        assert_eq!(
            loc("posts/index.md", None),
            ("/posts/".into(), "posts/index.html".into())
        );
    }

    #[test]
    fn permalink_directory() {
        assert_eq!(
            loc("posts/x.md", Some("/blog/x/")),
            ("/blog/x/".into(), "blog/x/index.html".into())
        );
    }

    #[test]
    fn permalink_file() {
        assert_eq!(
            loc("404.md", Some("/404.html")),
            ("/404.html".into(), "404.html".into())
        );
    }

    #[test]
    fn permalink_without_slash_is_directory() {
        assert_eq!(
            loc("a.md", Some("notes")),
            ("/notes/".into(), "notes/index.html".into())
        );
    }

    #[test]
    fn blank_permalink_is_ignored() {
        assert_eq!(
            loc("a.md", Some("  ")),
            ("/a/".into(), "a/index.html".into())
        );
    }

    #[test]
    fn permalink_cannot_leave_output_dir() {
        for permalink in ["../../escaped.html", "/a/../../b/", "./x.html", "a/./b/"] {
            assert_eq!(
                resolve_location(Path::new("a.md"), Some(permalink)),
                Err(NamingError::OutsideOutput(permalink.to_string())),
                "{permalink}"
            );
        }
    }

    #[test]
    fn sections() {
        assert_eq!(section_of(Path::new("posts/a.md")), Section::Posts);
        assert_eq!(section_of(Path::new("blog/posts/2021/a.md")), Section::Posts);
        assert_eq!(section_of(Path::new("books/b.md")), Section::Books);
        assert_eq!(section_of(Path::new("about.md")), Section::Pages);
        // A file named posts.md is not inside a posts directory
        assert_eq!(section_of(Path::new("posts.md")), Section::Pages);
    }

    #[test]
    fn base_prefix() {
        assert_eq!(with_base("/", "/posts/a/"), "/posts/a/");
        assert_eq!(with_base("/blog/", "/posts/a/"), "/blog/posts/a/");
        assert_eq!(with_base("/blog", "https://x.com/"), "https://x.com/");
    }

    #[test]
    fn temp_siblings_are_unique() {
        let target = Path::new("/out/images/a-320.jpeg");
        let a = temp_sibling(target);
        let b = temp_sibling(target);
        assert_ne!(a, b);
        assert_eq!(a.parent(), target.parent());
        assert!(a.to_string_lossy().ends_with(".tmp"));
    }

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("posts/a/index.html");
        write_atomic(&path, b"<p>hi</p>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>hi</p>");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
