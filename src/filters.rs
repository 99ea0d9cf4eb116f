//! Template filters.
//!
//! Every filter is a plain typed function; [`register`] wraps each one in a
//! `serde_json::Value` adapter so content can call it by name as
//! `{{ value | name: args }}`. Adapters check input types and fail with
//! [`FilterError::Type`] instead of coercing.
//!
//! | Name | Input | Output |
//! |---|---|---|
//! | `date_to_rfc3339` | date | `2020-01-02T03:04:05Z` |
//! | `dateToXmlSchema` | date | `2020-01-02T03:04:05.678Z` |
//! | `date_formatted` | date | `March 1st, 2021` |
//! | `time` | date | `<time datetime="…">March 1st, 2021</time>` |
//! | `mailHref` | string | `mailto:` prefixed when it looks like an address |
//! | `strip_html` | string | text without tags, scripts, styles, comments |
//! | `markdownify_inline`, `markdown` | string | inline Markdown HTML |
//! | `permalink` | string | every `.html` removed |
//! | `take` | array, n=1 | first n elements |
//! | `linkName`, `linkUrl` | `"Name \| url"` | first / last part |
//! | `hostname` | URL | host without leading `www.` |
//! | `isAbsolutePath` | string | bool |
//! | `groupByYear` | array of dated objects | `[[year, [items]], …]` |
//! | `addYear` | array of dated objects | same objects plus `year` |
//! | `reading_time` | string | `N min read` |
//!
//! Dates are RFC 3339 strings, `YYYY-MM-DD`, naive date-times (read as UTC),
//! or epoch milliseconds.

use crate::collections::{self, Dated};
use crate::config::Site;
use crate::markdown::Markdown;
use crate::registry::Registry;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("{filter}: expected {expected}, got {got}")]
    Type {
        filter: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{filter}: {message}")]
    Argument {
        filter: &'static str,
        message: String,
    },
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email regex"));
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<!--.*?-->|<style\b.*?</style>|<[^>]*>")
        .expect("markup regex")
});
static WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]:\\").expect("windows path regex"));
static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z\d+\-.]*:").expect("scheme regex"));

// =============================================================================
// Dates
// =============================================================================

/// Parse the date forms front matter and templates use.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A date from a template value: a date string or epoch milliseconds.
pub fn date_from_value(value: &Value) -> Result<DateTime<Utc>, FilterError> {
    date_arg("date", value)
}

fn date_arg(filter: &'static str, value: &Value) -> Result<DateTime<Utc>, FilterError> {
    match value {
        Value::String(s) => parse_date(s).ok_or_else(|| FilterError::InvalidDate(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| FilterError::InvalidDate(n.to_string())),
        other => Err(type_error(filter, "a date", other)),
    }
}

/// `2020-01-02T03:04:05Z`: ISO 8601 with the fraction dropped.
pub fn date_to_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `2020-01-02T03:04:05.678Z`: ISO 8601 with milliseconds.
pub fn date_to_xml_schema(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// English ordinal suffix: 1st 2nd 3rd 4th … 11th 12th 13th … 21st 22nd 23rd.
pub fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// `March 1st, 2021`, in UTC.
pub fn date_formatted(date: DateTime<Utc>) -> String {
    format!(
        "{} {}{}, {}",
        date.format("%B"),
        date.day(),
        ordinal_suffix(date.day()),
        date.year()
    )
}

/// `<time datetime="2021-03-01T00:00:00.000Z">March 1st, 2021</time>`
pub fn time_element(date: DateTime<Utc>) -> String {
    format!(
        "<time datetime=\"{}\">{}</time>",
        date_to_xml_schema(date),
        date_formatted(date)
    )
}

// =============================================================================
// Strings
// =============================================================================

pub fn mail_href(s: &str) -> String {
    if EMAIL.is_match(s) {
        format!("mailto:{s}")
    } else {
        s.to_string()
    }
}

pub fn strip_html(s: &str) -> String {
    MARKUP.replace_all(s, "").into_owned()
}

/// Remove every `.html` occurrence.
pub fn permalink(s: &str) -> String {
    s.replace(".html", "")
}

fn link_parts(s: &str) -> impl DoubleEndedIterator<Item = &str> {
    s.split('|').map(str::trim)
}

/// `"Foo | https://x"` → `"Foo"`
pub fn link_name(s: &str) -> String {
    link_parts(s).next().unwrap_or_default().to_string()
}

/// `"Foo | https://x"` → `"https://x"`
pub fn link_url(s: &str) -> String {
    link_parts(s).next_back().unwrap_or_default().to_string()
}

/// Host of an absolute URL, without a leading `www.`.
pub fn hostname(href: &str) -> Result<String, FilterError> {
    let parsed = url::Url::parse(href).map_err(|e| FilterError::InvalidUrl {
        url: href.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| FilterError::InvalidUrl {
        url: href.to_string(),
        reason: "no host".to_string(),
    })?;
    Ok(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// True for scheme-qualified paths (`https:`, `data:`), false for Windows
/// drive paths (`C:\`) and relative or root paths.
pub fn is_absolute_path(src: &str) -> bool {
    if WINDOWS_PATH.is_match(src) {
        return false;
    }
    URL_SCHEME.is_match(src)
}

/// Estimated reading time of an HTML or Markdown fragment, at least one minute.
pub fn reading_time(content: &str, words_per_minute: usize) -> String {
    let words = strip_html(content).split_whitespace().count();
    let minutes = words.div_ceil(words_per_minute.max(1)).max(1);
    format!("{minutes} min read")
}

// =============================================================================
// Value adapters
// =============================================================================

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(filter: &'static str, expected: &'static str, got: &Value) -> FilterError {
    FilterError::Type {
        filter,
        expected,
        got: type_name(got),
    }
}

fn str_arg<'a>(filter: &'static str, value: &'a Value) -> Result<&'a str, FilterError> {
    value
        .as_str()
        .ok_or_else(|| type_error(filter, "a string", value))
}

fn array_arg<'a>(filter: &'static str, value: &'a Value) -> Result<&'a Vec<Value>, FilterError> {
    value
        .as_array()
        .ok_or_else(|| type_error(filter, "an array", value))
}

/// A template object with a `date` field, so the collection helpers apply.
#[derive(Debug, Clone)]
struct DatedValue {
    date: DateTime<Utc>,
    value: Value,
}

impl Dated for DatedValue {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

fn dated_items(filter: &'static str, value: &Value) -> Result<Vec<DatedValue>, FilterError> {
    array_arg(filter, value)?
        .iter()
        .map(|item| {
            let date = item.get("date").ok_or_else(|| FilterError::Argument {
                filter,
                message: "every item needs a date".to_string(),
            })?;
            Ok(DatedValue {
                date: date_arg(filter, date)?,
                value: item.clone(),
            })
        })
        .collect()
}

pub fn take_value(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let items = array_arg("take", value)?;
    let n = match args.first() {
        None => 1,
        Some(arg) => arg.as_u64().ok_or_else(|| FilterError::Argument {
            filter: "take",
            message: format!("count must be a non-negative integer, got {arg}"),
        })? as usize,
    };
    Ok(Value::Array(items.iter().take(n).cloned().collect()))
}

pub fn group_by_year_value(value: &Value) -> Result<Value, FilterError> {
    let items = dated_items("groupByYear", value)?;
    let groups = collections::group_by_year(&items)
        .into_iter()
        .map(|(year, bucket)| {
            let values: Vec<Value> = bucket.into_iter().map(|d| d.value).collect();
            Value::Array(vec![Value::String(year), Value::Array(values)])
        })
        .collect();
    Ok(Value::Array(groups))
}

pub fn add_year_value(value: &Value) -> Result<Value, FilterError> {
    let items = dated_items("addYear", value)?;
    collections::add_year(&items)
        .into_iter()
        .map(|with_year| match with_year.item.value {
            Value::Object(mut map) => {
                map.insert("year".into(), Value::String(with_year.year));
                Ok(Value::Object(map))
            }
            other => Err(type_error("addYear", "an object", &other)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Register every filter by name.
pub fn register(registry: &mut Registry, site: &Site) {
    let markdown = Markdown::new();
    let words_per_minute = site.config.build.words_per_minute;

    registry
        .add_filter("date_to_rfc3339", |v, _| {
            Ok(date_to_rfc3339(date_arg("date_to_rfc3339", v)?).into())
        })
        .add_filter("dateToXmlSchema", |v, _| {
            Ok(date_to_xml_schema(date_arg("dateToXmlSchema", v)?).into())
        })
        .add_filter("date_formatted", |v, _| {
            Ok(date_formatted(date_arg("date_formatted", v)?).into())
        })
        .add_filter("time", |v, _| Ok(time_element(date_arg("time", v)?).into()))
        .add_filter("mailHref", |v, _| Ok(mail_href(str_arg("mailHref", v)?).into()))
        .add_filter("strip_html", |v, _| {
            Ok(strip_html(str_arg("strip_html", v)?).into())
        })
        .add_filter("markdownify_inline", move |v, _| {
            Ok(markdown
                .render_inline(str_arg("markdownify_inline", v)?)
                .into())
        })
        .add_filter("markdown", move |v, _| {
            Ok(markdown.render_inline(str_arg("markdown", v)?).into())
        })
        .add_filter("permalink", |v, _| {
            Ok(permalink(str_arg("permalink", v)?).into())
        })
        .add_filter("take", take_value)
        .add_filter("linkName", |v, _| Ok(link_name(str_arg("linkName", v)?).into()))
        .add_filter("linkUrl", |v, _| Ok(link_url(str_arg("linkUrl", v)?).into()))
        .add_filter("hostname", |v, _| Ok(hostname(str_arg("hostname", v)?)?.into()))
        .add_filter("isAbsolutePath", |v, _| {
            Ok(is_absolute_path(str_arg("isAbsolutePath", v)?).into())
        })
        .add_filter("groupByYear", |v, _| group_by_year_value(v))
        .add_filter("addYear", |v, _| add_year_value(v))
        .add_filter("reading_time", move |v, _| {
            Ok(reading_time(str_arg("reading_time", v)?, words_per_minute).into())
        });
}
