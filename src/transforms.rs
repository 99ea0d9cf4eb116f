//! Post-render transforms.
//!
//! Each transform takes `(content, output_path)` and returns the new
//! content. The pipeline registers them in a fixed order: `emoji` first, so
//! the minifier never sees a grapheme cluster it could split, then `htmlmin`
//! in production.

use crate::emoji::label_emoji;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Comments, raw-text elements (copied through, only their opening tag is
/// touched) and start tags.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)(?P<comment><!--.*?-->)"#,
        r#"|(?P<raw_open><(?:script|style|textarea)\b[^>]*>)(?P<raw_body>.*?)(?P<raw_close></(?:script|style|textarea)\s*>)"#,
        r#"|(?P<tag><[a-z][^\s/>]*(?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*\s*/?>)"#,
    ))
    .expect("markup regex")
});
static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([^\s/>]+)").expect("tag name regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'=<>`]+))?"#)
        .expect("attribute regex")
});

fn is_html(output_path: &str) -> bool {
    output_path.ends_with(".html")
}

/// Wrap every known emoji in an `.html` output with a labelled span.
/// Any other output passes through untouched.
pub fn emoji_a11y(content: &str, output_path: &str) -> String {
    if !is_html(output_path) {
        return content.to_string();
    }
    label_emoji(content)
}

/// Reorder the attributes of every start tag by name and sort the tokens of
/// each `class` value. Text, comments and `<script>`/`<style>` bodies are
/// left alone.
pub fn sort_attributes(html: &str) -> String {
    MARKUP
        .replace_all(html, |caps: &Captures| {
            if let Some(tag) = caps.name("tag") {
                sort_tag(tag.as_str())
            } else if let Some(open) = caps.name("raw_open") {
                let body = caps.name("raw_body").map_or("", |m| m.as_str());
                let close = caps.name("raw_close").map_or("", |m| m.as_str());
                format!("{}{body}{close}", sort_tag(open.as_str()))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn sort_tag(tag: &str) -> String {
    let Some(name) = TAG_NAME.captures(tag).map(|c| c.get(1).map_or("", |m| m.as_str())) else {
        return tag.to_string();
    };
    let inner = tag[1 + name.len()..].trim_end_matches('>').trim_end();

    let mut last_end = 0;
    let mut attributes: Vec<(&str, Option<String>)> = ATTRIBUTE
        .captures_iter(inner)
        .map(|caps| {
            last_end = caps.get(0).map_or(last_end, |m| m.end());
            let key = caps.get(1).map_or("", |m| m.as_str());
            let value = caps.get(2).map(|m| m.as_str().to_string());
            match value {
                Some(value) if key.eq_ignore_ascii_case("class") => (key, Some(sort_classes(&value))),
                other => (key, other),
            }
        })
        .collect();
    if attributes.is_empty() {
        return tag.to_string();
    }
    // a trailing `/` the last attribute did not swallow (`href=/a/` keeps it)
    let self_closing = inner.ends_with('/') && last_end < inner.len();
    attributes.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = format!("<{name}");
    for (key, value) in attributes {
        out.push(' ');
        out.push_str(key);
        if let Some(value) = value {
            out.push('=');
            out.push_str(&value);
        }
    }
    if self_closing {
        out.push_str(" /");
    }
    out.push('>');
    out
}

/// `"b a"` → `"a b"`, keeping the original quote character.
fn sort_classes(value: &str) -> String {
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'');
    let bare = match quote {
        Some(q) => value.trim_matches(q),
        None => value,
    };
    let mut classes: Vec<&str> = bare.split_whitespace().collect();
    classes.sort_unstable();
    let q = quote.map(String::from).unwrap_or_default();
    format!("{q}{}{q}", classes.join(" "))
}

fn minify_cfg() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    cfg
}

/// Minify an `.html` output: attributes and class names sorted, whitespace
/// collapsed, comments dropped, inline CSS and JS minified, closing tags kept.
///
/// If the minifier output is not valid UTF-8 the original is returned and a
/// warning is logged.
pub fn minify_html(content: &str, output_path: &str) -> String {
    if !is_html(output_path) {
        return content.to_string();
    }
    let sorted = sort_attributes(content);
    let minified = minify_html::minify(sorted.as_bytes(), &minify_cfg());
    match String::from_utf8(minified) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("{output_path}: minifier produced invalid output ({e}), keeping original");
            content.to_string()
        }
    }
}
