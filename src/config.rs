//! Site configuration module.
//!
//! Handles loading, validating, and merging the site record. The record lives
//! at `src/_data/site.toml` and is layered over stock defaults, so a blog only
//! needs to spell out the values it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! title = "My Blog"
//! description = "Build, break and improve."
//! url = "https://example.com"        # absolute, used for feeds and canonical links
//! base_url = "/"                     # must start with "/"
//! author = "Jane Doe"
//! email = "jane@example.com"
//! language = "en"
//! max_posts_in_home_page = 10
//! preconnects = ["https://fonts.gstatic.com"]
//! stylesheets = ["/assets/style.css"]
//!
//! [[nav]]
//! title = "Blog"
//! url = "/posts/"
//!
//! [[nav]]
//! title = "GitHub"
//! url = "https://github.com/jane"
//! external = true
//!
//! [social]
//! github = "https://github.com/jane"
//!
//! [build]
//! rss = true
//! sitemap = true
//! reading_time = true
//! feed_path = "feed.xml"
//! hide_read_books = false
//! words_per_minute = 200
//!
//! [images]
//! quality = 80
//!
//! [server]
//! port = 8080
//! live_reload = true
//! dom_diff = true
//! encoding = "utf-8"
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! The environment name and the current year are not read from the file. They
//! are derived at startup and carried next to the record in [`Site`].

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the site record inside the data directory.
pub const SITE_FILE: &str = "site.toml";

/// Environment variable that selects the build environment.
pub const ENV_VAR: &str = "NODE_ENV";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// The site record loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    /// Absolute site URL without trailing slash.
    pub url: String,
    /// Path prefix the site is served under.
    pub base_url: String,
    pub author: String,
    pub email: String,
    pub language: String,
    /// How many posts the `home` layout lists.
    pub max_posts_in_home_page: usize,
    /// Origins emitted as `<link rel="preconnect">`.
    pub preconnects: Vec<String>,
    /// Stylesheets linked from every page, site-relative.
    pub stylesheets: Vec<String>,
    pub nav: Vec<NavLink>,
    pub social: BTreeMap<String, String>,
    pub build: BuildConfig,
    pub images: ImagesConfig,
    pub server: ServerConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            url: "http://localhost:8080".to_string(),
            base_url: "/".to_string(),
            author: String::new(),
            email: String::new(),
            language: "en".to_string(),
            max_posts_in_home_page: 10,
            preconnects: Vec::new(),
            stylesheets: vec!["/assets/style.css".to_string()],
            nav: Vec::new(),
            social: BTreeMap::new(),
            build: BuildConfig::default(),
            images: ImagesConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.url) {
            Ok(parsed) if parsed.has_host() => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "url must be an absolute URL, got {:?}",
                    self.url
                )));
            }
        }
        if !self.base_url.starts_with('/') {
            return Err(ConfigError::Validation(
                "base_url must start with '/'".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".into(),
            ));
        }
        if self.build.words_per_minute == 0 {
            return Err(ConfigError::Validation(
                "build.words_per_minute must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Join a site-relative path onto the absolute site URL.
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// One entry of the header navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavLink {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub external: bool,
}

/// Optional build features. Each one maps to a plugin some revision of the
/// blog enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Write an RSS feed of the newest posts.
    pub rss: bool,
    /// Write `sitemap.xml` listing every rendered page.
    pub sitemap: bool,
    /// Show an estimated reading time on post pages.
    pub reading_time: bool,
    /// Feed location relative to the output directory.
    pub feed_path: String,
    /// Drop books marked `read: true` from the `books` collection.
    pub hide_read_books: bool,
    pub words_per_minute: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            rss: true,
            sitemap: true,
            reading_time: true,
            feed_path: "feed.xml".to_string(),
            hide_read_books: false,
            words_per_minute: 200,
        }
    }
}

/// Responsive image settings for the `resI` shortcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG encoding quality (1 = worst, 100 = best). WebP output is lossless.
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

/// Dev server options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    pub live_reload: bool,
    /// Accepted for compatibility. Pages are always fully reloaded.
    pub dom_diff: bool,
    pub encoding: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            live_reload: true,
            dom_diff: true,
            encoding: "utf-8".to_string(),
        }
    }
}

/// Build environment. Only `production` changes behaviour (HTML minification).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Other(String),
}

impl Environment {
    pub fn parse(name: &str) -> Self {
        match name {
            "production" => Self::Production,
            "" | "development" => Self::Development,
            other => Self::Other(other.to_string()),
        }
    }

    /// Read `NODE_ENV`; unset means development.
    pub fn from_env() -> Self {
        Self::parse(&std::env::var(ENV_VAR).unwrap_or_default())
    }

    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The site record plus the values derived at startup.
///
/// This is the single configuration value handed to the pipeline driver;
/// filters and shortcodes that need it capture a clone.
#[derive(Debug, Clone)]
pub struct Site {
    pub config: SiteConfig,
    pub environment: Environment,
    pub current_year: i32,
}

impl Site {
    pub fn new(config: SiteConfig, environment: Environment) -> Self {
        Self {
            config,
            environment,
            current_year: Utc::now().year(),
        }
    }

    /// The record as template data, including `environment` and `current_year`.
    pub fn to_value(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "environment".into(),
                serde_json::Value::String(self.environment.name().to_string()),
            );
            map.insert("current_year".into(), self.current_year.into());
        }
        value
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from the data directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(data_dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = data_dir.join(SITE_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site record from the data directory, over stock defaults.
pub fn load_config(data_dir: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(data_dir)?)
}

/// Returns a fully-commented stock `site.toml`. Used by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# nib site record
# ===============
# Lives at src/_data/site.toml. Every key is optional; values below are
# the defaults. Unknown keys are rejected.

title = "My Blog"
description = ""
# Absolute URL of the deployed site (feeds and canonical links use it).
url = "http://localhost:8080"
# Path prefix the site is served under. Must start with "/".
base_url = "/"
author = ""
email = ""
language = "en"
# Number of posts listed by the `home` layout and the RSS feed.
max_posts_in_home_page = 10
# Origins to open connections to early, e.g. font CDNs.
preconnects = []
# Stylesheets linked from every page (passthrough-copied from src/assets).
stylesheets = ["/assets/style.css"]

# Header navigation, in order. External links open in a new tab.
# [[nav]]
# title = "Blog"
# url = "/posts/"
#
# [[nav]]
# title = "GitHub"
# url = "https://github.com/you"
# external = true

# Named profile links rendered in the footer.
[social]

# ---------------------------------------------------------------------------
# Optional features
# ---------------------------------------------------------------------------
[build]
rss = true
sitemap = true
reading_time = true
feed_path = "feed.xml"
# Hide books marked `read: true` from the books collection.
hide_read_books = false
words_per_minute = 200

# ---------------------------------------------------------------------------
# Responsive images ({% resI %})
# ---------------------------------------------------------------------------
[images]
# JPEG quality (1-100). WebP variants are lossless.
quality = 80

# ---------------------------------------------------------------------------
# Dev server (`nib serve`)
# ---------------------------------------------------------------------------
[server]
port = 8080
live_reload = true
dom_diff = true
encoding = "utf-8"
"##
}
