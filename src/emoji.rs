//! Emoji dictionary.
//!
//! Both directions of the lookup go through the `emojis` crate's GitHub
//! short-code table: `:smile:` expands to 😄 while rendering Markdown, and 😄
//! is labelled `smile` by the accessibility transform.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-z0-9_+\-]+):").expect("shortcode regex"));

/// Replace every known `:shortcode:` with its emoji. Unknown codes stay as typed.
pub fn expand_shortcodes(text: &str) -> Cow<'_, str> {
    if !text.contains(':') {
        return Cow::Borrowed(text);
    }
    SHORTCODE.replace_all(text, |caps: &Captures| match emojis::get_by_shortcode(&caps[1]) {
        Some(emoji) => emoji.as_str().to_string(),
        None => caps[0].to_string(),
    })
}

/// Short name of a single emoji grapheme, e.g. `"😄"` → `"smile"`.
pub fn short_name(grapheme: &str) -> Option<&'static str> {
    if grapheme.is_ascii() {
        return None;
    }
    emojis::get(grapheme).and_then(|e| e.shortcode())
}

/// Wrap each known emoji in `text` with a labelled span.
///
/// Markup inside `<...>` is copied untouched so attribute values never
/// receive nested elements.
pub fn label_emoji(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for grapheme in html.graphemes(true) {
        match grapheme {
            "<" => in_tag = true,
            ">" => in_tag = false,
            _ => {}
        }
        match (in_tag, short_name(grapheme)) {
            (false, Some(label)) => {
                out.push_str("<span role=\"img\" aria-label=\"");
                out.push_str(label);
                out.push_str("\" title=\"");
                out.push_str(label);
                out.push_str("\">");
                out.push_str(grapheme);
                out.push_str("</span>");
            }
            _ => out.push_str(grapheme),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_shortcodes() {
        assert_eq!(expand_shortcodes(":smile: hello"), "😄 hello");
        assert_eq!(expand_shortcodes("a :+1: b"), "a 👍 b");
    }

    #[test]
    fn unknown_shortcodes_are_kept() {
        assert_eq!(expand_shortcodes(":not_an_emoji_code:"), ":not_an_emoji_code:");
        assert_eq!(expand_shortcodes("12:30:45"), "12:30:45");
    }

    #[test]
    fn short_name_lookup() {
        assert_eq!(short_name("😄"), Some("smile"));
        assert_eq!(short_name("a"), None);
        assert_eq!(short_name("é"), None);
    }

    #[test]
    fn labels_known_emoji() {
        assert_eq!(
            label_emoji("<p>😄</p>"),
            "<p><span role=\"img\" aria-label=\"smile\" title=\"smile\">😄</span></p>"
        );
    }

    #[test]
    fn zwj_sequence_is_one_unit() {
        // family: man, woman, girl, boy
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}\u{200D}\u{1F466}";
        let out = label_emoji(family);
        assert_eq!(out.matches("<span").count(), 1);
        assert!(out.contains(family));
    }

    #[test]
    fn attributes_are_left_alone() {
        let html = "<img alt=\"😄\">";
        assert_eq!(label_emoji(html), html);
    }

    #[test]
    fn plain_text_is_unchanged() {
        let html = "<p>Grüße, naïve café</p>";
        assert_eq!(label_emoji(html), html);
    }
}
