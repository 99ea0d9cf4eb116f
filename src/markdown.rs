//! Markdown rendering.
//!
//! One renderer with a fixed extension set, built on `pulldown-cmark`:
//!
//! | Feature | Syntax | Output |
//! |---|---|---|
//! | Raw HTML | `<div>…</div>` | passed through |
//! | Autolinks | `https://…`, `www.…` | `<a href>` (not inside links or code) |
//! | Header anchors | `## Title` | `<h2 id="title"><a class="header-anchor" …></a> Title</h2>` |
//! | Emoji | `:smile:` | 😄 |
//! | Containers | `::: info` … `:::` | `<div class="info">` |
//! | Footnotes | `[^1]` | footnote list |
//! | Abbreviations | `*[HTML]: Hyper Text Markup Language` | `<abbr title>` |
//! | Attributes | `# Title {#id .cls}`, `Para {.lead}` | attributes on the element |
//! | Spans | `[text]{.cls}` | `<span class="cls">` |
//! | Figures | paragraph with a single image | `<figure>` with title as caption |
//! | Images | `![alt](src)` | `<img … loading="lazy">` |
//! | Highlighting | ```` ```rust ```` | `<pre class="language-rust">` with `tok-*` spans |
//!
//! Containers and abbreviation definitions are line syntax and are picked up
//! before parsing, outside fenced and indented code. Everything else is done
//! over the event stream, where code spans and code blocks are never
//! decorated. Rendering never fails.

use crate::emoji;
use maud::html;
use pulldown_cmark::{
    CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream,
};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Names accepted after `:::`.
pub const CONTAINERS: &[&str] = &["info", "lead", "success", "warning", "error"];

static ABBR_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\[([^\]]+)\]:\s*(.*)$").expect("abbr regex"));
static SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]\n]+)\]\{([^{}\n]+)\}").expect("span regex"));
static TRAILING_ATTRS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\{([^{}]+)\}\s*$").expect("attrs regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:https?://|www\.)[^\s<>"'`]+"#).expect("link regex")
});
static HTML_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)a(?:\s[^>]*)?>").expect("anchor regex"));
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

/// Prefix of every highlighting class: `tok-keyword tok-rust`.
pub const TOKEN_CLASS_PREFIX: &str = "tok-";

/// The site's Markdown renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl Markdown {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        Options::ENABLE_FOOTNOTES
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
    }

    /// Render a block of Markdown to an HTML fragment.
    pub fn render(&self, source: &str) -> String {
        let prepared = preprocess(source);
        let abbreviations = Abbreviations::new(&prepared.abbreviations);

        let parser = Parser::new_ext(&prepared.source, Self::options());
        let events: Vec<Event<'_>> = TextMergeStream::new(parser).collect();
        let events = images(events);
        let events = paragraph_attributes(events);
        let events = heading_anchors(events);
        let events = decorate_text(events, &abbreviations);
        let events = highlight_code(events);

        let mut out = String::with_capacity(source.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut out, events.into_iter());
        out
    }

    /// Render short Markdown (titles, one-liners) without the wrapping paragraph.
    ///
    /// Strips exactly one leading `<p>` and one trailing `</p>`, and only
    /// when both are there; `<p class="x">…</p>` is kept whole.
    pub fn render_inline(&self, source: &str) -> String {
        let html = self.render(source);
        let trimmed = html.strip_suffix('\n').unwrap_or(&html);
        trimmed
            .strip_prefix("<p>")
            .and_then(|inner| inner.strip_suffix("</p>"))
            .unwrap_or(trimmed)
            .to_string()
    }
}

/// Heading slug: lowercase, whitespace and dashes collapse to one `-`,
/// other punctuation dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    slug
}

fn escape(text: &str) -> String {
    html! { (text) }.into_string()
}

// =============================================================================
// Source pre-pass
// =============================================================================

struct Prepared {
    source: String,
    abbreviations: Vec<(String, String)>,
}

fn preprocess(source: &str) -> Prepared {
    let mut out = String::with_capacity(source.len());
    let mut abbreviations = Vec::new();
    let mut fence: Option<&str> = None;
    let mut open_containers = 0usize;

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            out.push_str(line);
            continue;
        }
        // indented code, or a continuation nested deep enough to be one
        if indent_width(line) >= 4 {
            out.push_str(line);
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            out.push_str(line);
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            out.push_str(line);
            continue;
        }

        let content = line.trim();
        if let Some(caps) = ABBR_DEF.captures(content) {
            abbreviations.push((caps[1].to_string(), caps[2].trim().to_string()));
            continue;
        }
        if let Some(name) = container_name(content) {
            out.push_str(&format!("<div class=\"{name}\">\n\n"));
            open_containers += 1;
            continue;
        }
        if content == ":::" && open_containers > 0 {
            out.push_str("\n</div>\n\n");
            open_containers -= 1;
            continue;
        }
        out.push_str(line);
    }

    // Unclosed containers are closed at the end of the document.
    for _ in 0..open_containers {
        out.push_str("\n</div>\n");
    }

    Prepared {
        source: out,
        abbreviations,
    }
}

/// Leading indentation in columns; a tab counts as four.
fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn container_name(line: &str) -> Option<&'static str> {
    let rest = line.strip_prefix(":::")?.trim();
    let name = rest.split_whitespace().next()?;
    CONTAINERS.iter().copied().find(|c| *c == name)
}

// =============================================================================
// Attributes
// =============================================================================

#[derive(Debug, Default, PartialEq)]
struct Attrs {
    id: Option<String>,
    classes: Vec<String>,
    pairs: Vec<(String, String)>,
}

impl Attrs {
    fn render(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str(&format!(" id=\"{}\"", escape(id)));
        }
        if !self.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape(&self.classes.join(" "))));
        }
        for (key, value) in &self.pairs {
            out.push_str(&format!(" {key}=\"{}\"", escape(value)));
        }
        out
    }
}

/// Parse `#id .class key=value` tokens. Anything else means "not attributes".
fn parse_attrs(spec: &str) -> Option<Attrs> {
    let mut attrs = Attrs::default();
    let mut any = false;
    for token in spec.split_whitespace() {
        any = true;
        if let Some(id) = token.strip_prefix('#') {
            if id.is_empty() {
                return None;
            }
            attrs.id = Some(id.to_string());
        } else if let Some(class) = token.strip_prefix('.') {
            if class.is_empty() {
                return None;
            }
            attrs.classes.push(class.to_string());
        } else if let Some((key, value)) = token.split_once('=') {
            let valid_key = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid_key {
                return None;
            }
            attrs
                .pairs
                .push((key.to_string(), value.trim_matches('"').to_string()));
        } else {
            return None;
        }
    }
    any.then_some(attrs)
}

// =============================================================================
// Event passes
// =============================================================================

/// A paragraph holding nothing but one image becomes a `<figure>`; every
/// other image is written inline. Both are lazy-loaded.
fn images(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;
    while i < events.len() {
        if let Some((figure, consumed)) = figure_at(&events[i..]) {
            out.push(Event::Html(CowStr::from(figure)));
            i += consumed;
        } else if let Some((img, consumed)) = image_at(&events[i..]) {
            out.push(Event::InlineHtml(CowStr::from(img)));
            i += consumed;
        } else {
            out.push(events[i].clone());
            i += 1;
        }
    }
    out
}

/// Text of the events between an image's start and end.
fn alt_text(events: &[Event<'_>]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Text(t) | Event::Code(t) => Some(&**t),
            _ => None,
        })
        .collect()
}

fn image_at(events: &[Event<'_>]) -> Option<(String, usize)> {
    let [
        Event::Start(Tag::Image {
            dest_url, title, ..
        }),
        rest @ ..,
    ] = events
    else {
        return None;
    };
    let end = rest
        .iter()
        .position(|e| matches!(e, Event::End(TagEnd::Image)))?;
    let title = (!title.is_empty()).then_some(&**title);

    let markup = html! {
        img src=(&**dest_url) alt=(alt_text(&rest[..end])) title=[title] loading="lazy";
    };
    // image start + alt events + image end
    Some((markup.into_string(), end + 2))
}

fn figure_at(events: &[Event<'_>]) -> Option<(String, usize)> {
    let [
        Event::Start(Tag::Paragraph),
        Event::Start(Tag::Image {
            dest_url, title, ..
        }),
        rest @ ..,
    ] = events
    else {
        return None;
    };

    let end = rest
        .iter()
        .position(|e| matches!(e, Event::End(TagEnd::Image)))?;
    if !matches!(rest.get(end + 1), Some(Event::End(TagEnd::Paragraph))) {
        return None;
    }
    let alt = alt_text(&rest[..end]);

    let markup = html! {
        figure {
            img src=(&**dest_url) alt=(alt) loading="lazy";
            @if !title.is_empty() {
                figcaption { (&**title) }
            }
        }
    };
    // paragraph start + image start + alt events + image end + paragraph end
    Some((format!("{}\n", markup.into_string()), end + 4))
}

/// `Some text {.lead}` puts the attributes on the enclosing `<p>`.
fn paragraph_attributes(mut events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut i = 0;
    while i < events.len() {
        if !matches!(events[i], Event::Start(Tag::Paragraph)) {
            i += 1;
            continue;
        }
        let Some(offset) = events[i..]
            .iter()
            .position(|e| matches!(e, Event::End(TagEnd::Paragraph)))
        else {
            break;
        };
        let end = i + offset;

        let found = match &events[end - 1] {
            Event::Text(text) if end - 1 > i => TRAILING_ATTRS
                .captures(text)
                .and_then(|caps| {
                    let start = caps.get(0).map(|m| m.start())?;
                    // `[text]{.cls}` closing a paragraph is a span
                    if text[..start].ends_with(']') {
                        return None;
                    }
                    parse_attrs(&caps[1]).map(|attrs| (text[..start].to_string(), attrs))
                }),
            _ => None,
        };

        if let Some((remaining, attrs)) = found {
            events[end - 1] = Event::Text(CowStr::from(remaining));
            events[i] = Event::Html(CowStr::from(format!("<p{}>", attrs.render())));
            events[end] = Event::Html(CowStr::from("</p>\n"));
        }
        i = end + 1;
    }
    events
}

#[derive(Default)]
struct Slugs {
    used: HashSet<String>,
}

impl Slugs {
    fn unique(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Give every heading an id and prepend an empty permalink anchor.
fn heading_anchors(mut events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut slugs = Slugs::default();
    let mut i = 0;
    while i < events.len() {
        let (level, explicit_id, classes, attrs) = match &events[i] {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => (
                *level,
                id.as_ref().map(|s| s.to_string()),
                classes.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                attrs
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.to_string(),
                            v.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                        )
                    })
                    .collect::<Vec<_>>(),
            ),
            _ => {
                i += 1;
                continue;
            }
        };

        let end = events[i..]
            .iter()
            .position(|e| matches!(e, Event::End(TagEnd::Heading(_))))
            .map(|offset| i + offset)
            .unwrap_or(events.len() - 1);
        let text: String = events[i + 1..end]
            .iter()
            .filter_map(|e| match e {
                Event::Text(t) | Event::Code(t) => Some(&**t),
                _ => None,
            })
            .collect();

        let id = slugs.unique(explicit_id.unwrap_or_else(|| slugify(&text)));
        let rendered = Attrs {
            id: Some(id.clone()),
            classes,
            pairs: attrs,
        }
        .render();
        let href = escape(&id);
        events[i] = Event::Html(CowStr::from(format!(
            "<{level}{rendered}><a class=\"header-anchor\" href=\"#{href}\" aria-hidden=\"true\"></a> "
        )));
        if matches!(events[end], Event::End(TagEnd::Heading(_))) {
            events[end] = Event::Html(CowStr::from(format!("</{level}>\n")));
        }
        i = end + 1;
    }
    events
}

/// Emoji, spans, autolinks and abbreviations over text outside code.
///
/// Text inside a Markdown link or a raw `<a>…</a>` only gets emoji.
fn decorate_text<'a>(events: Vec<Event<'a>>, abbreviations: &Abbreviations) -> Vec<Event<'a>> {
    let mut out = Vec::with_capacity(events.len());
    let mut in_code = false;
    let mut in_link = 0usize;
    let mut in_raw_anchor = 0usize;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(_)) => {
                in_code = true;
                out.push(event);
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code = false;
                out.push(event);
            }
            Event::Start(Tag::Link { .. }) => {
                in_link += 1;
                out.push(event);
            }
            Event::End(TagEnd::Link) => {
                in_link = in_link.saturating_sub(1);
                out.push(event);
            }
            Event::Html(ref html) | Event::InlineHtml(ref html) => {
                in_raw_anchor = anchor_depth(in_raw_anchor, html);
                out.push(event);
            }
            Event::Text(text) if !in_code => {
                let plain_only = in_link > 0 || in_raw_anchor > 0;
                out.push(decorate(text, plain_only, abbreviations));
            }
            other => out.push(other),
        }
    }
    out
}

/// Track `<a …>` / `</a>` nesting across raw HTML chunks.
fn anchor_depth(depth: usize, html: &str) -> usize {
    HTML_ANCHOR
        .captures_iter(html)
        .fold(depth, |depth, caps| match &caps[1] {
            "/" => depth.saturating_sub(1),
            _ => depth + 1,
        })
}

fn decorate<'a>(text: CowStr<'a>, plain_only: bool, abbreviations: &Abbreviations) -> Event<'a> {
    let expanded = match emoji::expand_shortcodes(&text) {
        std::borrow::Cow::Owned(s) => Some(s),
        std::borrow::Cow::Borrowed(_) => None,
    };
    let current = expanded.as_deref().unwrap_or(&text);

    let needs_markup =
        SPAN.is_match(current) || LINK.is_match(current) || abbreviations.matches(current);
    if !plain_only && needs_markup {
        return Event::InlineHtml(CowStr::from(inline_markup(current, abbreviations)));
    }
    match expanded {
        Some(s) => Event::Text(CowStr::from(s)),
        None => Event::Text(text),
    }
}

/// Escape `text`, turning `[text]{.cls}` into spans and decorating the rest.
fn inline_markup(text: &str, abbreviations: &Abbreviations) -> String {
    let mut html = String::with_capacity(text.len() * 2);
    let mut last = 0;
    for caps in SPAN.captures_iter(text) {
        let (Some(whole), Some(attrs)) = (caps.get(0), parse_attrs(&caps[2])) else {
            continue;
        };
        html.push_str(&link_and_abbreviate(&text[last..whole.start()], abbreviations));
        html.push_str(&format!(
            "<span{}>{}</span>",
            attrs.render(),
            link_and_abbreviate(&caps[1], abbreviations)
        ));
        last = whole.end();
    }
    html.push_str(&link_and_abbreviate(&text[last..], abbreviations));
    html
}

fn link_and_abbreviate(text: &str, abbreviations: &Abbreviations) -> String {
    let mut html = String::with_capacity(text.len() * 2);
    let mut last = 0;
    for m in LINK.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\'']);
        if url.ends_with("://") || url == "www." {
            continue;
        }
        html.push_str(&abbreviations.apply(&text[last..m.start()]));
        let href = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>",
            escape(&href),
            escape(url)
        ));
        last = m.start() + url.len();
    }
    html.push_str(&abbreviations.apply(&text[last..]));
    html
}

// =============================================================================
// Highlighting
// =============================================================================

/// Replace every fenced block that names a language with highlighted HTML.
fn highlight_code(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut fence: Option<(String, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                if !language(info).is_empty() =>
            {
                fence = Some((language(info).to_string(), String::new()));
            }
            Event::Text(ref text) if fence.is_some() => {
                if let Some((_, code)) = fence.as_mut() {
                    code.push_str(text);
                }
            }
            Event::End(TagEnd::CodeBlock) if fence.is_some() => {
                if let Some((lang, code)) = fence.take() {
                    out.push(Event::Html(CowStr::from(highlight(&lang, &code))));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// The language tag of a fence info string: ```` ```rust title="x" ```` → `rust`.
fn language(info: &str) -> &str {
    info.split_whitespace().next().unwrap_or("")
}

/// Prism-shaped markup. An unknown language keeps the wrapper classes with
/// plain escaped text.
pub fn highlight(lang: &str, code: &str) -> String {
    let class = escape(&format!("language-{lang}"));
    let body = SYNTAX_SET
        .find_syntax_by_token(lang)
        .and_then(|syntax| {
            let mut generator = ClassedHTMLGenerator::new_with_class_style(
                syntax,
                &SYNTAX_SET,
                ClassStyle::SpacedPrefixed {
                    prefix: TOKEN_CLASS_PREFIX,
                },
            );
            for line in LinesWithEndings::from(code) {
                generator
                    .parse_html_for_line_which_includes_newline(line)
                    .ok()?;
            }
            Some(generator.finalize())
        })
        .unwrap_or_else(|| escape(code));
    format!("<pre class=\"{class}\"><code class=\"{class}\">{body}</code></pre>\n")
}

#[derive(Default)]
struct Abbreviations {
    pattern: Option<Regex>,
    titles: HashMap<String, String>,
}

impl Abbreviations {
    fn new(definitions: &[(String, String)]) -> Self {
        if definitions.is_empty() {
            return Self::default();
        }
        let mut keys: Vec<&str> = definitions.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
        let alternatives: Vec<String> = keys
            .iter()
            .map(|key| {
                let starts_word = key.chars().next().is_some_and(is_word_char);
                let ends_word = key.chars().last().is_some_and(is_word_char);
                format!(
                    "{}{}{}",
                    if starts_word { r"\b" } else { "" },
                    regex::escape(key),
                    if ends_word { r"\b" } else { "" }
                )
            })
            .collect();
        let pattern = Regex::new(&format!("(?:{})", alternatives.join("|"))).ok();
        Self {
            pattern,
            titles: definitions.iter().cloned().collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }

    /// Escape `text` and wrap every abbreviation in `<abbr>`.
    fn apply(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return escape(text);
        };
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in pattern.find_iter(text) {
            out.push_str(&escape(&text[last..m.start()]));
            let title = self.titles.get(m.as_str()).map(String::as_str).unwrap_or("");
            out.push_str(&format!(
                "<abbr title=\"{}\">{}</abbr>",
                escape(title),
                escape(m.as_str())
            ));
            last = m.end();
        }
        out.push_str(&escape(&text[last..]));
        out
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> String {
        Markdown::new().render(md)
    }

    #[test]
    fn renders_paragraph() {
        assert_eq!(render("Hello *world*"), "<p>Hello <em>world</em></p>\n");
    }

    #[test]
    fn raw_html_passes_through() {
        let html = render("<div class=\"x\">raw</div>\n");
        assert!(html.contains("<div class=\"x\">raw</div>"));
    }

    #[test]
    fn headings_get_anchor_and_id() {
        assert_eq!(
            render("## Hello World"),
            "<h2 id=\"hello-world\"><a class=\"header-anchor\" href=\"#hello-world\" aria-hidden=\"true\"></a> Hello World</h2>\n"
        );
    }

    #[test]
    fn duplicate_headings_are_numbered() {
        let html = render("# Intro\n\n# Intro\n\n# Intro\n");
        assert!(html.contains("id=\"intro\""));
        assert!(html.contains("id=\"intro-1\""));
        assert!(html.contains("id=\"intro-2\""));
    }

    #[test]
    fn heading_attributes_override_slug() {
        let html = render("# Title {#custom .big}");
        assert!(html.contains("<h1 id=\"custom\" class=\"big\">"));
        assert!(html.contains("href=\"#custom\""));
    }

    #[test]
    fn emoji_shortcodes_expand() {
        assert_eq!(render(":smile: hello"), "<p>😄 hello</p>\n");
    }

    #[test]
    fn emoji_not_expanded_in_code() {
        let html = render("`:smile:`\n\n```\n:smile:\n```\n");
        assert!(!html.contains('😄'));
    }

    #[test]
    fn bare_urls_are_linked() {
        let html = render("See https://example.com/a. Or www.example.org");
        assert!(html.contains("<a href=\"https://example.com/a\">https://example.com/a</a>."));
        assert!(html.contains("<a href=\"http://www.example.org\">www.example.org</a>"));
    }

    #[test]
    fn links_are_not_double_linked() {
        let html = render("[https://example.com](https://example.com)");
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn text_is_escaped_when_linkified() {
        let html = render("a &lt; b https://x.io");
        assert!(html.contains("a &lt; b <a href"));
    }

    #[test]
    fn containers_wrap_content() {
        let html = render("::: warning\nCareful **now**\n:::\n");
        assert!(html.contains("<div class=\"warning\">"));
        assert!(html.contains("<p>Careful <strong>now</strong></p>"));
        assert!(html.trim_end().ends_with("</div>"));
    }

    #[test]
    fn unknown_container_is_plain_text() {
        let html = render("::: bogus\ntext\n:::\n");
        assert!(!html.contains("<div"));
    }

    #[test]
    fn footnotes_render() {
        let html = render("Claim[^1].\n\n[^1]: Source.\n");
        assert!(html.contains("footnote-reference"));
        assert!(html.contains("footnote-definition"));
    }

    #[test]
    fn abbreviations_wrap_occurrences() {
        let html = render("*[HTML]: Hyper Text Markup Language\n\nHTML is fun. XHTML is not.\n");
        assert!(html.contains("<abbr title=\"Hyper Text Markup Language\">HTML</abbr> is fun."));
        assert!(html.contains("XHTML is not"));
        assert!(!html.contains("*[HTML]"));
    }

    #[test]
    fn paragraph_trailing_attributes() {
        let html = render("Big intro {.lead #top}");
        assert_eq!(html, "<p id=\"top\" class=\"lead\">Big intro</p>\n");
    }

    #[test]
    fn non_attribute_braces_are_kept() {
        let html = render("Set {a, b}");
        assert_eq!(html, "<p>Set {a, b}</p>\n");
    }

    #[test]
    fn inline_spans() {
        let html = render("Some [red text]{.red} here");
        assert_eq!(html, "<p>Some <span class=\"red\">red text</span> here</p>\n");
    }

    #[test]
    fn image_only_paragraph_becomes_figure() {
        let html = render("![A cat](/cat.jpg \"My cat\")");
        assert_eq!(
            html,
            "<figure><img src=\"/cat.jpg\" alt=\"A cat\" loading=\"lazy\"><figcaption>My cat</figcaption></figure>\n"
        );
    }

    #[test]
    fn figure_without_title_has_no_caption() {
        let html = render("![A cat](/cat.jpg)");
        assert!(html.contains("<figure>"));
        assert!(!html.contains("figcaption"));
    }

    #[test]
    fn inline_image_stays_inline() {
        let html = render("Look ![x](/x.png) here");
        assert!(!html.contains("<figure>"));
        assert!(html.contains("<img src=\"/x.png\" alt=\"x\" loading=\"lazy\">"));
    }

    #[test]
    fn inline_image_keeps_its_title() {
        let html = render("Look ![x](/x.png \"Ex\") here");
        assert!(html.contains("<img src=\"/x.png\" alt=\"x\" title=\"Ex\" loading=\"lazy\">"));
    }

    #[test]
    fn spans_and_abbreviations_skip_code() {
        let html = render("`[x]{.y}` and [x]{.y}\n\n    [a]{.b}\n    *[HTML]: kept\n");
        assert!(html.contains("<code>[x]{.y}</code>"));
        assert!(html.contains("and <span class=\"y\">x</span>"));
        assert!(html.contains("<pre><code>[a]{.b}\n*[HTML]: kept\n</code></pre>"));
    }

    #[test]
    fn span_closing_a_paragraph_is_not_paragraph_attrs() {
        assert_eq!(
            render("Some [red]{.red}"),
            "<p>Some <span class=\"red\">red</span></p>\n"
        );
    }

    #[test]
    fn urls_inside_raw_anchors_are_not_linked() {
        let html = render("<a href=\"/x\">see https://example.com</a> then https://b.io");
        assert_eq!(html.matches("<a ").count(), 2);
        assert!(html.contains("<a href=\"/x\">see https://example.com</a>"));
        assert!(html.contains("<a href=\"https://b.io\">https://b.io</a>"));
    }

    #[test]
    fn fenced_code_with_language_is_highlighted() {
        let html = render("```rust\nfn main() {}\n```\n");
        assert!(html.starts_with("<pre class=\"language-rust\"><code class=\"language-rust\">"));
        assert!(html.contains("tok-rust"));
        assert!(html.contains(">fn</span>"));
        assert!(html.trim_end().ends_with("</code></pre>"));
    }

    #[test]
    fn unknown_language_is_escaped_not_highlighted() {
        let html = render("```nosuchlang\na < b\n```\n");
        assert_eq!(
            html,
            "<pre class=\"language-nosuchlang\"><code class=\"language-nosuchlang\">a &lt; b\n</code></pre>\n"
        );
    }

    #[test]
    fn highlighted_code_keeps_shortcodes_literal() {
        let html = render("```rust\n// :smile: [a]{.b}\n```\n");
        assert!(!html.contains('😄'));
        assert!(!html.contains("<span class=\"b\">"));
    }

    #[test]
    fn fenced_code_is_not_preprocessed() {
        let html = render("```\n::: info\n*[X]: y\n[a]{.b}\n```\n");
        assert!(html.contains("::: info"));
        assert!(html.contains("*[X]: y"));
        assert!(html.contains("[a]{.b}"));
    }

    #[test]
    fn inline_render_strips_one_paragraph() {
        let md = Markdown::new();
        assert_eq!(md.render_inline("Hello *there*"), "Hello <em>there</em>");
        assert_eq!(md.render_inline("a\n\nb"), "a</p>\n<p>b");
    }

    #[test]
    fn inline_render_keeps_paragraph_with_attributes() {
        let md = Markdown::new();
        assert_eq!(md.render_inline("Title {.x}"), "<p class=\"x\">Title</p>");
    }

    #[test]
    fn malformed_input_is_best_effort() {
        let html = render("**unclosed [link](");
        assert!(html.contains("**unclosed"));
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust -- 2024 "), "rust-2024");
        assert_eq!(slugify("Ünïcode"), "ünïcode");
    }

    #[test]
    fn parse_attrs_rejects_plain_text() {
        assert!(parse_attrs("a, b").is_none());
        assert!(parse_attrs("").is_none());
        assert_eq!(
            parse_attrs(".a #b data-x=1").unwrap(),
            Attrs {
                id: Some("b".into()),
                classes: vec!["a".into()],
                pairs: vec![("data-x".into(), "1".into())],
            }
        );
    }
}
