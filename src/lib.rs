//! # nib
//!
//! The content pipeline of a personal Markdown blog: posts, books and plain
//! pages with YAML front matter become a static HTML site.
//!
//! # Architecture
//!
//! One build runs these stages in order:
//!
//! ```text
//! 1. Scan       src/**/*.md, src/_data  →  Snapshot (pages, date ascending)
//! 2. Collect    Snapshot                →  posts (live, newest first), books
//! 3. Render     per page, in parallel   →  tags → Markdown → layout → transforms
//! 4. Feeds      posts, written pages    →  feed.xml, sitemap.xml
//! 5. Copy       assets, images, …       →  www/
//! ```
//!
//! Collections are computed once, before any page renders, so every page
//! sees the same snapshot.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `site.toml` loading, merging over stock defaults, validation |
//! | [`pipeline`] | The registry, directories, passthrough copies and server options |
//! | [`registry`] | Name → filter, shortcode, collection and transform handlers |
//! | [`scan`] | Walks the input directory into a [`scan::Snapshot`] |
//! | [`frontmatter`] | YAML front matter splitting |
//! | [`naming`] | Input path → URL and output path; atomic writes |
//! | [`collections`] | `posts` and `books` selectors, year grouping |
//! | [`tags`] | `{{ value \| filter }}` and `{% shortcode %}` expansion |
//! | [`filters`] | The filter set |
//! | [`shortcodes`] | `Link`, `Header`, `resI` and paired `markdown` |
//! | [`markdown`] | The Markdown renderer and its extensions |
//! | [`emoji`] | Short-code expansion and emoji labelling |
//! | [`transforms`] | Post-render emoji labelling and HTML minification |
//! | [`imaging`] | Responsive image variants (WebP + JPEG) |
//! | [`cache`] | Content-addressed encode cache for image variants |
//! | [`layout`] | Built-in page layouts rendered with Maud |
//! | [`feed`] | RSS feed and sitemap |
//! | [`generate`] | The build itself |
//! | [`serve`] | Development server with live reload |
//! | [`output`] | CLI output formatting |
//! | [`types`] | [`types::Page`] and friends |

pub mod cache;
pub mod collections;
pub mod config;
pub mod emoji;
pub mod feed;
pub mod filters;
pub mod frontmatter;
pub mod generate;
pub mod imaging;
pub mod layout;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod scan;
pub mod serve;
pub mod shortcodes;
pub mod tags;
pub mod transforms;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
