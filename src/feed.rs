//! RSS feed and sitemap generation.
//!
//! The feed lists the newest live posts (`max_posts_in_home_page` of them)
//! with their rendered bodies as `content:encoded`. The sitemap lists every
//! page the build wrote.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/</loc>
//!     <lastmod>2025-01-01</lastmod>
//!   </url>
//! </urlset>
//! ```

use crate::config::Site;
use crate::naming::with_base;
use crate::types::Page;
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use rss::validation::Validate;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use std::collections::BTreeMap;
use thiserror::Error;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("RSS validation failed: {0}")]
    Validation(String),
}

/// A post and its rendered body.
pub struct FeedEntry<'a> {
    pub page: &'a Page,
    pub html: &'a str,
}

fn absolute(site: &Site, url: &str) -> String {
    site.config
        .absolute_url(&with_base(&site.config.base_url, url))
}

/// `email (Name)` as RSS expects, when the site has an email.
fn rss_author(site: &Site) -> Option<String> {
    let config = &site.config;
    if config.email.is_empty() {
        return None;
    }
    if config.author.is_empty() {
        Some(config.email.clone())
    } else {
        Some(format!("{} ({})", config.email, config.author))
    }
}

/// Build the RSS document. `entries` are expected newest first; only the
/// first `max_posts_in_home_page` are included.
pub fn rss_feed(site: &Site, entries: &[FeedEntry]) -> Result<String, FeedError> {
    let config = &site.config;
    let author = rss_author(site);

    let items: Vec<rss::Item> = entries
        .iter()
        .take(config.max_posts_in_home_page)
        .map(|entry| {
            let link = absolute(site, &entry.page.url);
            let description = entry
                .page
                .data
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            ItemBuilder::default()
                .title(Some(entry.page.display_title()))
                .link(Some(link.clone()))
                .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
                .description(description)
                .content(Some(entry.html.to_string()))
                .pub_date(Some(entry.page.date.to_rfc2822()))
                .author(author.clone())
                .build()
        })
        .collect();

    let last_build = entries
        .first()
        .map(|e| e.page.date)
        .unwrap_or_else(Utc::now);

    let channel = ChannelBuilder::default()
        .namespaces(BTreeMap::from([(
            "content".to_string(),
            CONTENT_NS.to_string(),
        )]))
        .title(config.title.clone())
        .link(absolute(site, "/"))
        .description(config.description.clone())
        .language(Some(config.language.clone()))
        .last_build_date(Some(last_build.to_rfc2822()))
        .generator(Some(concat!("nib ", env!("CARGO_PKG_VERSION")).to_string()))
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| FeedError::Validation(e.to_string()))?;
    Ok(channel.to_string())
}

/// One sitemap entry.
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// Build `sitemap.xml` for the given site-relative URLs.
pub fn sitemap(site: &Site, entries: &[SitemapEntry]) -> String {
    let mut xml = String::with_capacity(128 + entries.len() * 96);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
    xml.push('\n');
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}</loc>\n",
            escape(absolute(site, &entry.url).as_str())
        ));
        if let Some(lastmod) = entry.lastmod {
            xml.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                lastmod.format("%Y-%m-%d")
            ));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}
