//! CLI output formatting for `build` and `check`.
//!
//! Output is information-first: every page leads with its positional index
//! and title, with the source file and output location as indented context
//! lines. Pages are grouped by section in the order posts, books, pages.
//!
//! ## Build
//!
//! ```text
//! Posts
//! 001 Hello → posts/hello/index.html
//!     Source: posts/hello.md
//! 002 WIP (draft) → posts/wip/index.html
//!     Source: posts/wip.md
//!
//! Pages
//! 001 About → about/index.html
//!     Source: about.md
//!
//! Collections
//!     books: 1
//!     posts: 1
//!
//! Feeds
//!     feed.xml
//!     sitemap.xml
//!
//! Copied
//!     assets
//!
//! Images: 2 cached, 2 encoded (4 total)
//! Built 3 pages
//! ```
//!
//! Format functions are pure and return lines; `print_*` wrappers write them
//! to stdout.

use crate::generate::{BuildReport, CheckReport, WrittenPage};
use crate::types::Section;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn section_heading(section: Section) -> &'static str {
    match section {
        Section::Posts => "Posts",
        Section::Books => "Books",
        Section::Pages => "Pages",
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// ```text
/// 001 Hello → posts/hello/index.html
/// 002 WIP (draft)
/// ```
fn page_header(index: usize, page: &WrittenPage, with_output: bool) -> String {
    let draft = if page.draft { " (draft)" } else { "" };
    if with_output {
        format!(
            "{} {}{} → {}",
            format_index(index),
            page.title,
            draft,
            display_path(&page.output_path)
        )
    } else {
        format!("{} {}{} ({})", format_index(index), page.title, draft, page.url)
    }
}

fn format_pages(pages: &[WrittenPage], with_output: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for section in [Section::Posts, Section::Books, Section::Pages] {
        let mut in_section: Vec<&WrittenPage> =
            pages.iter().filter(|p| p.section == section).collect();
        if in_section.is_empty() {
            continue;
        }
        in_section.sort_by(|a, b| a.input_path.cmp(&b.input_path));

        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(section_heading(section).to_string());
        for (i, page) in in_section.iter().enumerate() {
            lines.push(page_header(i + 1, page, with_output));
            lines.push(format!(
                "{}Source: {}",
                indent(1),
                display_path(&page.input_path)
            ));
        }
    }
    lines
}

fn format_list<S: AsRef<str>>(lines: &mut Vec<String>, heading: &str, items: &[S]) {
    if items.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(heading.to_string());
    for item in items {
        lines.push(format!("{}{}", indent(1), item.as_ref()));
    }
}

fn collection_lines(collections: &[(&'static str, usize)]) -> Vec<String> {
    collections
        .iter()
        .map(|(name, size)| format!("{name}: {size}"))
        .collect()
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Format the result of a full build.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = format_pages(&report.pages, true);

    format_list(&mut lines, "Collections", &collection_lines(&report.collections));
    let feeds: Vec<String> = report.feeds.iter().map(|p| display_path(p)).collect();
    format_list(&mut lines, "Feeds", &feeds);
    format_list(&mut lines, "Copied", &report.copied);

    lines.push(String::new());
    if report.cache.total() > 0 {
        lines.push(format!("Images: {}", report.cache));
    }
    lines.push(format!("Built {}", plural(report.pages.len(), "page")));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

/// Format the result of `check`.
pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = format_pages(&report.pages, false);
    format_list(&mut lines, "Data", &report.data_records);
    format_list(&mut lines, "Collections", &collection_lines(&report.collections));
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}
