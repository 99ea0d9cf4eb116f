//! Shortcodes: `Link`, `Header`, `resI` and the paired `markdown`.
//!
//! Arguments arrive as positional [`Value`]s in call order, already
//! evaluated by the tag expander. Missing trailing arguments take their
//! defaults.

use crate::cache::EncodeCache;
use crate::config::Site;
use crate::imaging::{
    BackendError, GeneratedVariant, ImageBackend, OutputFormat, Quality, ResponsiveConfig,
    SUPPORTED_INPUT_EXTENSIONS, create_responsive_images, get_dimensions, parse_widths,
};
use crate::markdown::Markdown;
use crate::naming::with_base;
use crate::registry::Registry;
use maud::{PreEscaped, html};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Directory (under the output directory) and URL path of generated images.
pub const IMAGES_SUBDIR: &str = "images";

#[derive(Error, Debug)]
pub enum ShortcodeError {
    #[error("{shortcode}: missing required argument `{argument}`")]
    MissingArgument {
        shortcode: &'static str,
        argument: &'static str,
    },
    #[error("{shortcode}: {message}")]
    Argument {
        shortcode: &'static str,
        message: String,
    },
    #[error("resI: image not found: {0}")]
    ImageNotFound(String),
    #[error("resI: unsupported image type: {0}")]
    UnsupportedImage(String),
    #[error("resI: {0}")]
    Backend(#[from] BackendError),
}

fn arg<'a>(args: &'a [Value], index: usize) -> Option<&'a Value> {
    args.get(index).filter(|v| !v.is_null())
}

/// Text form of an argument; numbers and booleans are stringified.
fn text_arg(args: &[Value], index: usize) -> String {
    match arg(args, index) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// JavaScript-style truthiness.
fn flag_arg(args: &[Value], index: usize) -> bool {
    match arg(args, index) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}

/// `Link(href, isExternal, content, classes, noopener)`
pub fn link(args: &[Value]) -> String {
    let href = text_arg(args, 0);
    let external = flag_arg(args, 1);
    let content = text_arg(args, 2);
    let classes = text_arg(args, 3);
    let noopener = flag_arg(args, 4);

    html! {
        a href=(href)
          target=[external.then_some("_blank")]
          class=(classes)
          rel=[noopener.then_some("noopener")] { (PreEscaped(content)) }
    }
    .into_string()
}

/// `Header(level, title)`. `level` is `1`..=`6`, also accepted as `"h2"`.
pub fn header(args: &[Value]) -> Result<String, ShortcodeError> {
    let level = match arg(args, 0) {
        None => 1,
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .trim_start_matches(['h', 'H'])
            .parse::<u64>()
            .unwrap_or(0),
        Some(_) => 0,
    };
    if !(1..=6).contains(&level) {
        return Err(ShortcodeError::Argument {
            shortcode: "Header",
            message: format!("heading level must be 1-6, got {}", text_arg(args, 0)),
        });
    }
    let title = text_arg(args, 1);
    Ok(format!("<h{level} class=\"\">{title}</h{level}>"))
}

/// The `resI` responsive image shortcode.
///
/// Sources are looked up relative to each search root in turn (the project
/// directory, then the input directory). Variants are written under
/// `<output>/images` through the shared encode cache.
pub struct ResponsiveImages<B> {
    backend: B,
    cache: Arc<EncodeCache>,
    search_roots: Vec<PathBuf>,
    base_url: String,
    quality: Quality,
}

impl<B: ImageBackend> ResponsiveImages<B> {
    pub fn new(
        backend: B,
        cache: Arc<EncodeCache>,
        search_roots: Vec<PathBuf>,
        site: &Site,
    ) -> Self {
        Self {
            backend,
            cache,
            search_roots,
            base_url: site.config.base_url.clone(),
            quality: Quality::new(site.config.images.quality),
        }
    }

    pub fn cache(&self) -> &EncodeCache {
        &self.cache
    }

    fn resolve_source(&self, src: &str) -> Result<PathBuf, ShortcodeError> {
        let direct = Path::new(src);
        if direct.is_absolute() && direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        let relative = src.trim_start_matches('/');
        self.search_roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ShortcodeError::ImageNotFound(src.to_string()))
    }

    /// `resI(src, alt, widths)`
    pub fn render(&self, args: &[Value]) -> Result<String, ShortcodeError> {
        let src = match arg(args, 0) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => {
                return Err(ShortcodeError::MissingArgument {
                    shortcode: "resI",
                    argument: "src",
                });
            }
        };
        let alt = match arg(args, 1) {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(ShortcodeError::MissingArgument {
                    shortcode: "resI",
                    argument: "alt",
                });
            }
        };
        let widths = widths_arg(arg(args, 2))?;

        let source = self.resolve_source(&src)?;
        let decodable = source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_INPUT_EXTENSIONS
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(ext))
            });
        if !decodable {
            return Err(ShortcodeError::UnsupportedImage(src));
        }
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        let dims = get_dimensions(&self.backend, &source)?;
        let variants = create_responsive_images(
            &self.backend,
            &self.cache,
            &source,
            &stem,
            dims,
            &ResponsiveConfig {
                subdir: IMAGES_SUBDIR.to_string(),
                widths,
                quality: self.quality,
            },
        )?;
        tracing::debug!("resI {} → {} variants", src, variants.len());

        Ok(picture(&variants, &alt, &self.base_url))
    }
}

fn widths_arg(value: Option<&Value>) -> Result<Vec<u32>, ShortcodeError> {
    let invalid = |message: String| ShortcodeError::Argument {
        shortcode: "resI",
        message,
    };
    let widths = match value {
        Some(Value::String(csv)) => parse_widths(csv).map_err(invalid)?,
        Some(Value::Number(n)) => vec![n.as_u64().unwrap_or(0) as u32],
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_u64().unwrap_or(0) as u32)
            .collect(),
        _ => {
            return Err(ShortcodeError::MissingArgument {
                shortcode: "resI",
                argument: "widths",
            });
        }
    };
    if widths.is_empty() || widths.contains(&0) {
        return Err(invalid(format!("invalid widths {}", text_of(value))));
    }
    Ok(widths)
}

fn text_of(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}

/// `<picture>` markup for a set of variants, one line per element so the
/// fragment stands as an HTML block inside Markdown.
fn picture(variants: &[GeneratedVariant], alt: &str, base_url: &str) -> String {
    let url = |v: &GeneratedVariant| with_base(base_url, &format!("/{}", v.path));

    let mut lines = vec!["<picture>".to_string()];
    for format in OutputFormat::ALL {
        let srcset = variants
            .iter()
            .filter(|v| v.format == format)
            .map(|v| format!("{} {}w", url(v), v.width))
            .collect::<Vec<_>>()
            .join(", ");
        if srcset.is_empty() {
            continue;
        }
        lines.push(
            html! { source type=(format.mime_type()) srcset=(srcset) sizes="100vw"; }
                .into_string(),
        );
    }

    let jpegs: Vec<&GeneratedVariant> = variants
        .iter()
        .filter(|v| v.format == OutputFormat::Jpeg)
        .collect();
    if let (Some(low), Some(high)) = (jpegs.first(), jpegs.last()) {
        lines.push(
            html! {
                img src=(url(low)) width=(high.width) height=(high.height) alt=(alt)
                    loading="lazy" decoding="async";
            }
            .into_string(),
        );
    }
    lines.push("</picture>".to_string());
    lines.join("\n")
}

/// Register `Link`, `Header`, `resI` and `markdown`.
pub fn register<B>(registry: &mut Registry, images: Arc<ResponsiveImages<B>>)
where
    B: ImageBackend + Send + 'static,
{
    let markdown = Markdown::new();
    registry
        .add_shortcode("Link", |args| Ok(link(args)))
        .add_shortcode("Header", header)
        .add_shortcode("resI", move |args| images.render(args))
        .add_paired_shortcode("markdown", move |_, body| {
            Ok(markdown.render(&dedent(body)))
        });
}

/// Strip the common leading indentation so an indented body is not read as
/// a code block.
fn dedent(body: &str) -> String {
    let indent = body
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    body.lines()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
