//! Pipeline driver.
//!
//! [`Pipeline`] is the declarative record the build runs from: the filled
//! [`Registry`], the directory layout, the passthrough copies and the dev
//! server options. Building it has no side effects beyond loading the encode
//! cache manifest.

use crate::cache::EncodeCache;
use crate::collections;
use crate::config::Site;
use crate::filters;
use crate::imaging::{ImageBackend, RustBackend};
use crate::registry::Registry;
use crate::shortcodes::{self, ResponsiveImages};
use crate::transforms;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Subdirectories of `input`.
    pub includes: &'static str,
    pub layouts: &'static str,
    pub data: &'static str,
}

impl Directories {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            includes: "_includes",
            layouts: "_layouts",
            data: "_data",
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.input.join(self.data)
    }

    /// The directory containing `input`; image sources are resolved from here
    /// first.
    pub fn project_root(&self) -> PathBuf {
        self.input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

impl Default for Directories {
    fn default() -> Self {
        Self::new("src", "www")
    }
}

/// A file or directory copied verbatim from the input to the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passthrough {
    pub from: &'static str,
    pub to: &'static str,
}

pub const PASSTHROUGH: &[Passthrough] = &[
    Passthrough {
        from: "assets",
        to: "assets",
    },
    Passthrough {
        from: "manifest.json",
        to: "manifest.json",
    },
    Passthrough {
        from: "_redirects",
        to: "_redirects",
    },
    Passthrough {
        from: "images",
        to: "images",
    },
    Passthrough {
        from: ".well-known",
        to: ".well-known",
    },
];

/// Dev server settings, taken from `[server]` in the site record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub live_reload: bool,
    /// Recorded only; reloads always replace the whole page.
    pub dom_diff: bool,
    pub port: u16,
    pub encoding: String,
}

pub struct Pipeline {
    pub site: Site,
    pub registry: Registry,
    pub dirs: Directories,
    pub passthrough: Vec<Passthrough>,
    pub server: ServerOptions,
    cache: Arc<EncodeCache>,
}

impl Pipeline {
    /// Pipeline over `src/` → `www/` with the default image backend.
    pub fn new(site: Site) -> Self {
        Self::with_dirs(site, Directories::default(), true)
    }

    pub fn with_dirs(site: Site, dirs: Directories, use_cache: bool) -> Self {
        Self::with_backend(site, dirs, use_cache, RustBackend::new())
    }

    pub fn with_backend<B>(site: Site, dirs: Directories, use_cache: bool, backend: B) -> Self
    where
        B: ImageBackend + Send + 'static,
    {
        let cache = Arc::new(EncodeCache::open(&dirs.output, use_cache));
        let images = Arc::new(ResponsiveImages::new(
            backend,
            Arc::clone(&cache),
            vec![dirs.project_root(), dirs.input.clone()],
            &site,
        ));

        let mut registry = Registry::new();
        filters::register(&mut registry, &site);
        shortcodes::register(&mut registry, images);

        let hide_read = site.config.build.hide_read_books;
        registry
            .add_collection("posts", |snapshot, now| {
                collections::live_posts(snapshot, now)
            })
            .add_collection("books", move |snapshot, _| {
                collections::books(snapshot, hide_read)
            });

        registry.add_transform("emoji", transforms::emoji_a11y);
        if site.environment.is_production() {
            registry.add_transform("htmlmin", transforms::minify_html);
        }

        let server = ServerOptions {
            live_reload: site.config.server.live_reload,
            dom_diff: site.config.server.dom_diff,
            port: site.config.server.port,
            encoding: site.config.server.encoding.clone(),
        };

        Self {
            site,
            registry,
            dirs,
            passthrough: PASSTHROUGH.to_vec(),
            server,
            cache,
        }
    }

    pub fn cache(&self) -> &EncodeCache {
        &self.cache
    }

    /// Top-level input entries that are never rendered as pages.
    pub fn reserved_dirs(&self) -> [&'static str; 3] {
        [self.dirs.includes, self.dirs.layouts, self.dirs.data]
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("dirs", &self.dirs)
            .field("passthrough", &self.passthrough)
            .field("server", &self.server)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, SiteConfig};
    use crate::imaging::backend::tests::MockBackend;
    use crate::scan::Snapshot;
    use crate::test_helpers::{book, draft, parse_utc, post};
    use tempfile::TempDir;

    fn pipeline(env: Environment, config: SiteConfig) -> (TempDir, Pipeline) {
        let tmp = TempDir::new().unwrap();
        let dirs = Directories::new(tmp.path().join("src"), tmp.path().join("www"));
        let pipeline =
            Pipeline::with_backend(Site::new(config, env), dirs, true, MockBackend::new());
        (tmp, pipeline)
    }

    #[test]
    fn registers_every_filter() {
        let (_tmp, p) = pipeline(Environment::Development, SiteConfig::default());
        for name in [
            "date_to_rfc3339",
            "dateToXmlSchema",
            "date_formatted",
            "time",
            "mailHref",
            "strip_html",
            "markdownify_inline",
            "markdown",
            "permalink",
            "take",
            "linkName",
            "linkUrl",
            "hostname",
            "isAbsolutePath",
            "groupByYear",
            "addYear",
            "reading_time",
        ] {
            assert!(p.registry.filter(name).is_some(), "missing filter {name}");
        }
    }

    #[test]
    fn registers_shortcodes_and_collections() {
        let (_tmp, p) = pipeline(Environment::Development, SiteConfig::default());
        assert_eq!(
            p.registry.shortcode_names(),
            vec!["Header", "Link", "markdown", "resI"]
        );
        assert!(p.registry.is_paired("markdown"));
        assert_eq!(p.registry.collection_names(), vec!["books", "posts"]);
    }

    #[test]
    fn minify_only_in_production() {
        let (_tmp, dev) = pipeline(Environment::Development, SiteConfig::default());
        assert_eq!(dev.registry.transform_names(), vec!["emoji"]);

        let (_tmp, prod) = pipeline(Environment::Production, SiteConfig::default());
        assert_eq!(prod.registry.transform_names(), vec!["emoji", "htmlmin"]);
    }

    #[test]
    fn production_transforms_run_emoji_then_minify() {
        let (_tmp, prod) = pipeline(Environment::Production, SiteConfig::default());
        let out = prod
            .registry
            .apply_transforms("<p>  😄  </p>".to_string(), "index.html");
        assert!(out.contains("aria-label"));
        assert!(!out.contains("  "));
    }

    #[test]
    fn declares_directories_passthrough_and_server() {
        let p = Pipeline::new(Site::new(SiteConfig::default(), Environment::Development));
        assert_eq!(p.dirs, Directories::new("src", "www"));
        assert_eq!(p.reserved_dirs(), ["_includes", "_layouts", "_data"]);
        let sources: Vec<&str> = p.passthrough.iter().map(|c| c.from).collect();
        assert_eq!(
            sources,
            vec!["assets", "manifest.json", "_redirects", "images", ".well-known"]
        );
        assert_eq!(
            p.server,
            ServerOptions {
                live_reload: true,
                dom_diff: true,
                port: 8080,
                encoding: "utf-8".to_string(),
            }
        );
    }

    #[test]
    fn collections_use_the_snapshot() {
        let mut config = SiteConfig::default();
        config.build.hide_read_books = true;
        let (_tmp, p) = pipeline(Environment::Development, config);
        let snapshot = Snapshot::new(vec![
            post("a", "2020-01-01T00:00:00Z"),
            draft("b", "2020-01-02T00:00:00Z"),
            book("read", "2020-01-01T00:00:00Z", true),
            book("unread", "2020-01-01T00:00:00Z", false),
        ]);
        let computed = p
            .registry
            .compute_collections(&snapshot, parse_utc("2024-01-01T00:00:00Z"));
        assert_eq!(computed["posts"].len(), 1);
        assert_eq!(computed["books"].len(), 1);
        assert_eq!(computed["books"][0].url, "/books/unread/");
    }

    #[test]
    fn project_root_is_parent_of_input() {
        let dirs = Directories::new("/site/src", "/site/www");
        assert_eq!(dirs.project_root(), PathBuf::from("/site"));
        assert_eq!(dirs.data_dir(), PathBuf::from("/site/src/_data"));
        assert_eq!(Directories::default().project_root(), PathBuf::from(""));
    }
}
