//! Tag expansion over page bodies.
//!
//! Content may use exactly two tag forms before it is rendered as Markdown:
//!
//! - `{% name arg, arg %}` calls a shortcode. Paired shortcodes wrap a body,
//!   `{% markdown %}…{% endmarkdown %}`. `{% raw %}…{% endraw %}` copies its
//!   body untouched.
//! - `{{ value | filter: arg, arg | filter }}` evaluates a value and pipes it
//!   through filters. `filter(arg)` is accepted as well.
//!
//! Arguments are string, number, boolean or `null` literals, or dotted
//! variable paths (`site.title`, `collections.posts.0.url`) resolved against
//! the page context. Unknown variables are `null`; unknown filters and
//! shortcodes are errors.

use crate::filters::FilterError;
use crate::registry::Registry;
use crate::shortcodes::ShortcodeError;
use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("line {line}: unterminated `{open}`")]
    Unterminated { open: &'static str, line: usize },
    #[error("line {line}: `{{% {name} %}}` has no matching `{{% end{name} %}}`")]
    Unclosed { name: String, line: usize },
    #[error("line {line}: cannot parse `{text}`")]
    Syntax { text: String, line: usize },
    #[error("line {line}: unknown shortcode `{name}`")]
    UnknownShortcode { name: String, line: usize },
    #[error("line {line}: unknown filter `{name}`")]
    UnknownFilter { name: String, line: usize },
    #[error("line {line}: {source}")]
    Filter {
        line: usize,
        #[source]
        source: FilterError,
    },
    #[error("line {line}: {source}")]
    Shortcode {
        line: usize,
        #[source]
        source: ShortcodeError,
    },
}

/// Expand every tag in `source` against `context` (a JSON object).
pub fn expand(registry: &Registry, source: &str, context: &Value) -> Result<String, TagError> {
    Expander {
        registry,
        context,
        source,
    }
    .expand_range(0, source.len())
}

struct Expander<'a> {
    registry: &'a Registry,
    context: &'a Value,
    source: &'a str,
}

impl Expander<'_> {
    fn line_at(&self, pos: usize) -> usize {
        self.source[..pos].matches('\n').count() + 1
    }

    fn expand_range(&self, start: usize, end: usize) -> Result<String, TagError> {
        let text = &self.source[..end];
        let mut out = String::with_capacity(end - start);
        let mut pos = start;

        while let Some(offset) = text[pos..].find('{') {
            let open = pos + offset;
            let rest = &text[open..];
            if rest.starts_with("{{") {
                out.push_str(&text[pos..open]);
                let close = rest.find("}}").ok_or(TagError::Unterminated {
                    open: "{{",
                    line: self.line_at(open),
                })?;
                let inner = &rest[2..close];
                out.push_str(&self.output(inner, open)?);
                pos = open + close + 2;
            } else if rest.starts_with("{%") {
                out.push_str(&text[pos..open]);
                let close = rest.find("%}").ok_or(TagError::Unterminated {
                    open: "{%",
                    line: self.line_at(open),
                })?;
                let inner = &rest[2..close];
                let after = open + close + 2;
                pos = self.tag(inner, open, after, end, &mut out)?;
            } else {
                out.push_str(&text[pos..=open]);
                pos = open + 1;
            }
        }
        out.push_str(&text[pos..]);
        Ok(out)
    }

    /// Handle one `{% … %}` tag; returns the position to resume from.
    fn tag(
        &self,
        inner: &str,
        open: usize,
        after: usize,
        end: usize,
        out: &mut String,
    ) -> Result<usize, TagError> {
        let line = self.line_at(open);
        let inner = inner.trim_matches('-').trim();
        let (name, rest) = split_name(inner);
        if name.is_empty() {
            return Err(TagError::Syntax {
                text: inner.to_string(),
                line,
            });
        }

        if name == "raw" {
            let (body_end, resume) = self.find_closing("raw", after, end, line)?;
            out.push_str(&self.source[after..body_end]);
            return Ok(resume);
        }

        let Some(entry) = self.registry.shortcode(name) else {
            return Err(TagError::UnknownShortcode {
                name: name.to_string(),
                line,
            });
        };
        let args = self.parse_args(rest, line)?;

        let (body, resume) = if entry.paired {
            let (body_end, resume) = self.find_closing(name, after, end, line)?;
            (Some(self.expand_range(after, body_end)?), resume)
        } else {
            (None, after)
        };

        let rendered = (entry.handler)(&args, body.as_deref())
            .map_err(|source| TagError::Shortcode { line, source })?;
        out.push_str(&rendered);
        Ok(resume)
    }

    /// Find the `{% endNAME %}` matching a block opened just before `from`,
    /// skipping nested blocks of the same name. Returns (body end, resume).
    fn find_closing(
        &self,
        name: &str,
        from: usize,
        end: usize,
        line: usize,
    ) -> Result<(usize, usize), TagError> {
        let pattern = format!(r"\{{%-?\s*(end)?{}\b(?s:.*?)%\}}", regex::escape(name));
        let re = Regex::new(&pattern).map_err(|_| TagError::Syntax {
            text: name.to_string(),
            line,
        })?;

        let mut depth = 0usize;
        for m in re.captures_iter(&self.source[from..end]) {
            let whole = m.get(0).map(|g| (g.start(), g.end())).unwrap_or_default();
            if m.get(1).is_some() {
                if depth == 0 || name == "raw" {
                    return Ok((from + whole.0, from + whole.1));
                }
                depth -= 1;
            } else if name != "raw" {
                depth += 1;
            }
        }
        Err(TagError::Unclosed {
            name: name.to_string(),
            line,
        })
    }

    /// Evaluate `{{ … }}` and render the result as text.
    fn output(&self, inner: &str, open: usize) -> Result<String, TagError> {
        let line = self.line_at(open);
        let inner = inner.trim_matches('-').trim();
        let mut stages = split_top_level(inner, '|').into_iter();

        let head = stages.next().unwrap_or_default();
        let mut value = self.parse_value(head.trim(), line)?;

        for stage in stages {
            let (name, args) = split_filter(stage.trim());
            let filter = self
                .registry
                .filter(name)
                .ok_or_else(|| TagError::UnknownFilter {
                    name: name.to_string(),
                    line,
                })?;
            let args = self.parse_args(args, line)?;
            value = filter(&value, &args).map_err(|source| TagError::Filter { line, source })?;
        }
        Ok(display(&value))
    }

    fn parse_args(&self, text: &str, line: usize) -> Result<Vec<Value>, TagError> {
        tokenize(text)
            .map_err(|_| TagError::Syntax {
                text: text.to_string(),
                line,
            })?
            .into_iter()
            .map(|token| self.resolve(token, line))
            .collect()
    }

    fn parse_value(&self, text: &str, line: usize) -> Result<Value, TagError> {
        let tokens = tokenize(text).map_err(|_| TagError::Syntax {
            text: text.to_string(),
            line,
        })?;
        match <[Token; 1]>::try_from(tokens) {
            Ok([token]) => self.resolve(token, line),
            Err(_) => Err(TagError::Syntax {
                text: text.to_string(),
                line,
            }),
        }
    }

    fn resolve(&self, token: Token, line: usize) -> Result<Value, TagError> {
        match token {
            Token::Literal(value) => Ok(value),
            Token::Word(word) => {
                if let Some(value) = keyword(&word) {
                    return Ok(value);
                }
                if let Some(number) = number(&word) {
                    return Ok(number);
                }
                if !is_path(&word) {
                    return Err(TagError::Syntax { text: word, line });
                }
                Ok(lookup(self.context, &word))
            }
        }
    }
}

fn split_name(inner: &str) -> (&str, &str) {
    let end = inner
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(inner.len());
    (&inner[..end], &inner[end..])
}

/// `name: a, b` / `name(a, b)` / `name`
fn split_filter(stage: &str) -> (&str, &str) {
    let (name, rest) = split_name(stage);
    let rest = rest.trim();
    if let Some(args) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        (name, args)
    } else if let Some(args) = rest.strip_prefix(':') {
        (name, args)
    } else {
        (name, rest)
    }
}

/// Split on `sep` outside of quoted strings.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == sep => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(Value),
    Word(String),
}

/// Split an argument list on commas and whitespace, honouring quotes.
fn tokenize(text: &str) -> Result<Vec<Token>, ()> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == ',' {
            chars.next();
            continue;
        }
        if c == '"' || c == '\'' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some(ch) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(other) => s.push(other),
                        None => return Err(()),
                    },
                    _ if ch == c => {
                        closed = true;
                        break;
                    }
                    _ => s.push(ch),
                }
            }
            if !closed {
                return Err(());
            }
            tokens.push(Token::Literal(Value::String(s)));
            continue;
        }
        let mut word = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() || ch == ',' || ch == '"' || ch == '\'' {
                break;
            }
            word.push(ch);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }
    Ok(tokens)
}

fn keyword(word: &str) -> Option<Value> {
    match word {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" | "none" | "nil" | "undefined" => Some(Value::Null),
        _ => None,
    }
}

fn number(word: &str) -> Option<Value> {
    if !word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
        return None;
    }
    if let Ok(i) = word.parse::<i64>() {
        return Some(Value::from(i));
    }
    word.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn is_path(word: &str) -> bool {
    word.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && word
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'))
}

/// Resolve `a.b.0.c` against the context. Missing segments yield `null`.
fn lookup(context: &Value, path: &str) -> Value {
    path.split('.')
        .try_fold(context, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .cloned()
        .unwrap_or(Value::Null)
}

/// Text form of a value as it appears in output.
fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Build a context object from named parts.
pub fn context<I>(parts: I) -> Value
where
    I: IntoIterator<Item = (String, Value)>,
{
    Value::Object(parts.into_iter().collect::<Map<String, Value>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .add_filter("upcase", |v, _| {
                Ok(Value::String(v.as_str().unwrap_or_default().to_uppercase()))
            })
            .add_filter("append", |v, args| {
                let suffix = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(Value::String(format!(
                    "{}{}",
                    v.as_str().unwrap_or_default(),
                    suffix
                )))
            })
            .add_filter("fail", |_, _| {
                Err(FilterError::InvalidDate("nope".to_string()))
            })
            .add_shortcode("Echo", |args| {
                Ok(args.iter().map(display).collect::<Vec<_>>().join("|"))
            })
            .add_paired_shortcode("wrap", |args, body| {
                let tag = args.first().and_then(Value::as_str).unwrap_or("div");
                Ok(format!("<{tag}>{body}</{tag}>"))
            });
        registry
    }

    fn ctx() -> Value {
        json!({
            "title": "Hello",
            "site": {"title": "Field Notes", "nav": [{"url": "/a/"}]},
            "count": 3
        })
    }

    fn run(source: &str) -> Result<String, TagError> {
        expand(&registry(), source, &ctx())
    }

    #[test]
    fn plain_text_is_untouched() {
        let text = "No tags here. {#id .cls} and {.lead} stay.";
        assert_eq!(run(text).unwrap(), text);
    }

    #[test]
    fn outputs_variables() {
        assert_eq!(run("{{ title }} / {{site.title}}").unwrap(), "Hello / Field Notes");
        assert_eq!(run("{{ site.nav.0.url }}").unwrap(), "/a/");
        assert_eq!(run("{{ count }}").unwrap(), "3");
    }

    #[test]
    fn unknown_variable_is_empty() {
        assert_eq!(run("[{{ missing.thing }}]").unwrap(), "[]");
    }

    #[test]
    fn filters_chain_with_arguments() {
        assert_eq!(
            run(r#"{{ title | append: "!" | upcase }}"#).unwrap(),
            "HELLO!"
        );
        assert_eq!(run(r#"{{ "a|b" | append("c") }}"#).unwrap(), "a|bc");
    }

    #[test]
    fn shortcode_arguments_are_evaluated() {
        assert_eq!(
            run(r#"{% Echo "/about/", false, 'x, y', 2, site.title %}"#).unwrap(),
            "/about/|false|x, y|2|Field Notes"
        );
    }

    #[test]
    fn paired_shortcode_gets_expanded_body() {
        assert_eq!(
            run(r#"{% wrap "p" %}{{ title }}{% endwrap %}"#).unwrap(),
            "<p>Hello</p>"
        );
    }

    #[test]
    fn nested_paired_shortcodes() {
        assert_eq!(
            run(r#"{% wrap "a" %}1{% wrap "b" %}2{% endwrap %}3{% endwrap %}"#).unwrap(),
            "<a>1<b>2</b>3</a>"
        );
    }

    #[test]
    fn raw_blocks_are_verbatim() {
        assert_eq!(
            run("{% raw %}{{ title }} {% Echo 1 %}{% endraw %}!").unwrap(),
            "{{ title }} {% Echo 1 %}!"
        );
    }

    #[test]
    fn whitespace_control_dashes_are_ignored() {
        assert_eq!(run("{{- title -}}").unwrap(), "Hello");
    }

    #[test]
    fn unknown_filter_is_an_error() {
        let err = run("line one\n{{ title | nope }}").unwrap_err();
        assert!(matches!(err, TagError::UnknownFilter { ref name, line: 2 } if name == "nope"));
    }

    #[test]
    fn unknown_shortcode_is_an_error() {
        assert!(matches!(
            run("{% Nope %}"),
            Err(TagError::UnknownShortcode { .. })
        ));
    }

    #[test]
    fn filter_errors_carry_the_line() {
        let err = run("a\nb\n{{ title | fail }}").unwrap_err();
        assert!(matches!(err, TagError::Filter { line: 3, .. }));
        assert!(err.to_string().starts_with("line 3:"));
    }

    #[test]
    fn unterminated_tags_are_errors() {
        assert!(matches!(run("{{ title"), Err(TagError::Unterminated { .. })));
        assert!(matches!(run("{% Echo"), Err(TagError::Unterminated { .. })));
        assert!(matches!(
            run("{% wrap %}body"),
            Err(TagError::Unclosed { .. })
        ));
    }

    #[test]
    fn unbalanced_quotes_are_syntax_errors() {
        assert!(matches!(run(r#"{% Echo "open %}"#), Err(TagError::Syntax { .. })));
    }

    #[test]
    fn display_of_values() {
        assert_eq!(display(&json!(null)), "");
        assert_eq!(display(&json!([1, "a"])), "1,a");
        assert_eq!(display(&json!(true)), "true");
    }

    #[test]
    fn context_builder() {
        let value = context([("site".to_string(), json!({"title": "T"}))]);
        assert_eq!(lookup(&value, "site.title"), json!("T"));
    }
}
