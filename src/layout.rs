//! Built-in page layouts.
//!
//! Pages pick a layout with the `layout` front-matter key; otherwise posts
//! use `post`, books use `book` and everything else uses `page`. Every
//! layout is wrapped in the same base document (head metadata, navigation,
//! footer).
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.

use crate::collections::{group_by_year, year_of};
use crate::config::{NavLink, Site};
use crate::filters::{date_formatted, date_to_rfc3339, reading_time, time_element};
use crate::naming::with_base;
use crate::types::{Page, Section};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Post,
    Book,
    Page,
    /// Body followed by the newest posts.
    Home,
    /// Body followed by every post, grouped by year.
    Archive,
    /// Body followed by the book list.
    Books,
}

impl Layout {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().trim_end_matches(".html") {
            "post" => Some(Self::Post),
            "book" => Some(Self::Book),
            "page" | "base" | "default" => Some(Self::Page),
            "home" | "index" => Some(Self::Home),
            "archive" => Some(Self::Archive),
            "books" => Some(Self::Books),
            _ => None,
        }
    }

    fn for_section(section: Section) -> Self {
        match section {
            Section::Posts => Self::Post,
            Section::Books => Self::Book,
            Section::Pages => Self::Page,
        }
    }

    /// The layout a page renders with. Unknown names fall back to the
    /// section default with a warning.
    pub fn for_page(page: &Page) -> Self {
        match page.layout.as_deref() {
            None => Self::for_section(page.section),
            Some(name) => Self::parse(name).unwrap_or_else(|| {
                tracing::warn!(
                    "{}: unknown layout {:?}, using the default",
                    page.input_path.display(),
                    name
                );
                Self::for_section(page.section)
            }),
        }
    }
}

/// Everything a layout can read besides the page itself.
pub struct LayoutContext<'a> {
    pub site: &'a Site,
    pub collections: &'a BTreeMap<&'static str, Vec<Page>>,
}

impl LayoutContext<'_> {
    fn collection(&self, name: &str) -> &[Page] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn url(&self, path: &str) -> String {
        with_base(&self.site.config.base_url, path)
    }
}

/// Render a page with its rendered body HTML into a full document.
pub fn render_page(page: &Page, body: &str, ctx: &LayoutContext) -> Markup {
    let layout = Layout::for_page(page);
    let content = match layout {
        Layout::Post => render_post(page, body, ctx),
        Layout::Book => render_book(page, body),
        Layout::Page => html! { article.page { (PreEscaped(body)) } },
        Layout::Home => render_home(body, ctx),
        Layout::Archive => render_archive(body, ctx),
        Layout::Books => render_books(body, ctx),
    };
    let title = match layout {
        Layout::Home => ctx.site.config.title.clone(),
        _ => format!("{} | {}", page.display_title(), ctx.site.config.title),
    };
    base_document(page, &title, content, ctx)
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(page: &Page, title: &str, content: Markup, ctx: &LayoutContext) -> Markup {
    let config = &ctx.site.config;
    let description = page
        .data
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or(config.description.as_str());
    let canonical = config.absolute_url(&ctx.url(&page.url));
    let feed_href = ctx.url(&format!("/{}", config.build.feed_path.trim_start_matches('/')));

    html! {
        (DOCTYPE)
        html lang=(config.language) {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                meta name="description" content=(description);
                @if !config.author.is_empty() {
                    meta name="author" content=(config.author);
                }
                link rel="canonical" href=(canonical);
                @for origin in &config.preconnects {
                    link rel="preconnect" href=(origin) crossorigin;
                }
                @for sheet in &config.stylesheets {
                    link rel="stylesheet" href=(ctx.url(sheet));
                }
                @if config.build.rss {
                    link rel="alternate" type="application/rss+xml" title=(config.title) href=(feed_href);
                }
            }
            body class={ "layout-" (body_class(page)) } {
                (site_header(&page.url, ctx))
                main { (content) }
                (site_footer(ctx))
            }
        }
    }
}

fn body_class(page: &Page) -> &'static str {
    match Layout::for_page(page) {
        Layout::Post => "post",
        Layout::Book => "book",
        Layout::Page => "page",
        Layout::Home => "home",
        Layout::Archive => "archive",
        Layout::Books => "books",
    }
}

fn site_header(current_url: &str, ctx: &LayoutContext) -> Markup {
    html! {
        header.site-header {
            a.site-title href=(ctx.url("/")) { (ctx.site.config.title) }
            @if !ctx.site.config.nav.is_empty() {
                nav.site-nav {
                    ul {
                        @for item in &ctx.site.config.nav {
                            (nav_item(item, current_url, ctx))
                        }
                    }
                }
            }
        }
    }
}

fn nav_item(item: &NavLink, current_url: &str, ctx: &LayoutContext) -> Markup {
    let is_current = !item.external && item.url == current_url;
    let href = if item.external {
        item.url.clone()
    } else {
        ctx.url(&item.url)
    };
    html! {
        li class=[is_current.then_some("current")] {
            @if item.external {
                a href=(href) target="_blank" rel="noopener" { (item.title) }
            } @else {
                a href=(href) { (item.title) }
            }
        }
    }
}

fn site_footer(ctx: &LayoutContext) -> Markup {
    let config = &ctx.site.config;
    html! {
        footer.site-footer {
            @if !config.social.is_empty() {
                ul.social {
                    @for (name, url) in &config.social {
                        li { a href=(url) rel="me noopener" target="_blank" { (name) } }
                    }
                }
            }
            p.copyright {
                "© " (ctx.site.current_year)
                @if !config.author.is_empty() { " " (config.author) }
            }
        }
    }
}

fn post_list(posts: &[Page], ctx: &LayoutContext) -> Markup {
    html! {
        ul.post-list {
            @for post in posts {
                li {
                    a href=(ctx.url(&post.url)) { (post.display_title()) }
                    " "
                    time datetime=(date_to_rfc3339(post.date)) { (date_formatted(post.date)) }
                }
            }
        }
    }
}

// ============================================================================
// Layouts
// ============================================================================

fn render_post(page: &Page, body: &str, ctx: &LayoutContext) -> Markup {
    let build = &ctx.site.config.build;
    html! {
        article.post {
            header {
                h1 { (page.display_title()) }
                p.post-meta {
                    (PreEscaped(time_element(page.date)))
                    @if build.reading_time {
                        " · "
                        span.reading-time { (reading_time(body, build.words_per_minute)) }
                    }
                }
            }
            (PreEscaped(body))
        }
    }
}

fn render_book(page: &Page, body: &str) -> Markup {
    html! {
        article.book {
            h1 { (page.display_title()) }
            p.book-status { @if page.read { "Read" } @else { "Reading" } }
            (PreEscaped(body))
        }
    }
}

fn render_home(body: &str, ctx: &LayoutContext) -> Markup {
    let posts = ctx.collection("posts");
    let newest = &posts[..posts.len().min(ctx.site.config.max_posts_in_home_page)];
    html! {
        section.intro { (PreEscaped(body)) }
        @if !newest.is_empty() {
            section.recent {
                h2 { "Recent posts" }
                (post_list(newest, ctx))
            }
        }
    }
}

fn render_archive(body: &str, ctx: &LayoutContext) -> Markup {
    let groups = group_by_year(ctx.collection("posts"));
    html! {
        (PreEscaped(body))
        @for (year, posts) in &groups {
            section.year id={ "year-" (year) } {
                h2 { (year) }
                (post_list(posts, ctx))
            }
        }
    }
}

fn render_books(body: &str, ctx: &LayoutContext) -> Markup {
    html! {
        (PreEscaped(body))
        ul.book-list {
            @for book in ctx.collection("books") {
                li class=[book.read.then_some("read")] {
                    a href=(ctx.url(&book.url)) { (book.display_title()) }
                    " (" (year_of(book.date)) ")"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, SiteConfig};
    use crate::test_helpers::{book, page_at, post};

    fn site() -> Site {
        let mut config = SiteConfig::default();
        config.title = "Field Notes".to_string();
        config.url = "https://notes.example".to_string();
        config.author = "Jane".to_string();
        config.preconnects = vec!["https://fonts.gstatic.com".to_string()];
        config.nav = vec![
            NavLink {
                title: "Archive".into(),
                url: "/archive/".into(),
                external: false,
            },
            NavLink {
                title: "GitHub".into(),
                url: "https://github.com/jane".into(),
                external: true,
            },
        ];
        config
            .social
            .insert("github".into(), "https://github.com/jane".into());
        Site::new(config, Environment::Development)
    }

    fn render(page: &Page, body: &str, collections: BTreeMap<&'static str, Vec<Page>>) -> String {
        let site = site();
        let ctx = LayoutContext {
            site: &site,
            collections: &collections,
        };
        render_page(page, body, &ctx).into_string()
    }

    #[test]
    fn layout_defaults_by_section() {
        assert_eq!(Layout::for_page(&post("a", "2020-01-01T00:00:00Z")), Layout::Post);
        assert_eq!(
            Layout::for_page(&book("b", "2020-01-01T00:00:00Z", false)),
            Layout::Book
        );
        assert_eq!(
            Layout::for_page(&page_at("about.md", "2020-01-01T00:00:00Z")),
            Layout::Page
        );
    }

    #[test]
    fn layout_from_front_matter() {
        let mut page = page_at("index.md", "2020-01-01T00:00:00Z");
        page.layout = Some("home".into());
        assert_eq!(Layout::for_page(&page), Layout::Home);
        page.layout = Some("no-such-layout".into());
        assert_eq!(Layout::for_page(&page), Layout::Page);
        assert_eq!(Layout::parse("archive.html"), Some(Layout::Archive));
    }

    #[test]
    fn base_document_head() {
        let page = page_at("about.md", "2020-01-01T00:00:00Z");
        let html = render(&page, "<p>x</p>", BTreeMap::new());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>about | Field Notes</title>"));
        assert!(html.contains(r#"<link rel="canonical" href="https://notes.example/about/">"#));
        assert!(html.contains(r#"<link rel="preconnect" href="https://fonts.gstatic.com" crossorigin>"#));
        assert!(html.contains(r#"type="application/rss+xml""#));
        assert!(html.contains(r#"href="/feed.xml""#));
        assert!(html.contains(r#"<link rel="stylesheet" href="/assets/style.css">"#));
    }

    #[test]
    fn description_prefers_front_matter() {
        let mut page = page_at("about.md", "2020-01-01T00:00:00Z");
        page.data
            .insert("description".into(), serde_json::json!("About the author"));
        let html = render(&page, "", BTreeMap::new());
        assert!(html.contains(r#"<meta name="description" content="About the author">"#));
    }

    #[test]
    fn nav_marks_external_and_current() {
        let mut page = page_at("archive.md", "2020-01-01T00:00:00Z");
        page.layout = Some("archive".into());
        let html = render(&page, "", BTreeMap::new());
        assert!(html.contains(r#"<li class="current"><a href="/archive/">Archive</a></li>"#));
        assert!(html.contains(
            r#"<a href="https://github.com/jane" target="_blank" rel="noopener">GitHub</a>"#
        ));
    }

    #[test]
    fn footer_has_social_and_year() {
        let page = page_at("about.md", "2020-01-01T00:00:00Z");
        let html = render(&page, "", BTreeMap::new());
        assert!(html.contains(r#"href="https://github.com/jane" rel="me noopener""#));
        assert!(html.contains(&format!("© {} Jane", site().current_year)));
    }

    #[test]
    fn post_layout_shows_date_and_reading_time() {
        let page = post("hello", "2021-03-01T00:00:00Z");
        let html = render(&page, "<p>short</p>", BTreeMap::new());
        assert!(html.contains("<h1>hello</h1>"));
        assert!(html.contains("March 1st, 2021"));
        assert!(html.contains("1 min read"));
        assert!(html.contains(r#"<body class="layout-post">"#));
    }

    #[test]
    fn home_lists_newest_posts() {
        let mut page = page_at("index.md", "2020-01-01T00:00:00Z");
        page.layout = Some("home".into());
        let posts = vec![
            post("new", "2022-01-01T00:00:00Z"),
            post("old", "2021-01-01T00:00:00Z"),
        ];
        let html = render(&page, "<p>Welcome</p>", BTreeMap::from([("posts", posts)]));
        assert!(html.contains("<title>Field Notes</title>"));
        let new_at = html.find("/posts/new/").unwrap();
        let old_at = html.find("/posts/old/").unwrap();
        assert!(new_at < old_at);
    }

    #[test]
    fn archive_groups_by_year() {
        let mut page = page_at("archive.md", "2020-01-01T00:00:00Z");
        page.layout = Some("archive".into());
        let posts = vec![
            post("b", "2023-06-01T00:00:00Z"),
            post("a", "2022-06-01T00:00:00Z"),
        ];
        let html = render(&page, "", BTreeMap::from([("posts", posts)]));
        let y2023 = html.find("<h2>2023</h2>").unwrap();
        let y2022 = html.find("<h2>2022</h2>").unwrap();
        assert!(y2023 < y2022);
    }

    #[test]
    fn books_layout_marks_read() {
        let mut page = page_at("reading.md", "2020-01-01T00:00:00Z");
        page.layout = Some("books".into());
        let books = vec![
            book("dune", "2019-01-01T00:00:00Z", true),
            book("emma", "2020-01-01T00:00:00Z", false),
        ];
        let html = render(&page, "", BTreeMap::from([("books", books)]));
        assert!(html.contains(r#"<li class="read"><a href="/books/dune/">dune</a> (2019)</li>"#));
        assert!(html.contains(r#"<li><a href="/books/emma/">emma</a> (2020)</li>"#));
    }

    #[test]
    fn titles_are_escaped() {
        let mut page = post("x", "2020-01-01T00:00:00Z");
        page.title = Some("<script>alert(1)</script>".into());
        let html = render(&page, "", BTreeMap::new());
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
