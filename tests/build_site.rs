//! End-to-end builds against a throwaway site with the real image backend.

use chrono::{DateTime, Utc};
use image::{ImageEncoder, RgbImage};
use nib::config::{Environment, Site, load_config};
use nib::generate::{self, BuildReport};
use nib::pipeline::{Directories, Pipeline};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn jpeg(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    let file = fs::File::create(path).unwrap();
    image::codecs::jpeg::JpegEncoder::new(std::io::BufWriter::new(file))
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    write(
        &src,
        "_data/site.toml",
        "title = \"Notebook\"\nurl = \"https://notebook.example\"\n",
    );
    write(
        &src,
        "archive.md",
        "---\ntitle: Archive\nlayout: archive\ndate: 2020-01-01\n---\n",
    );
    write(
        &src,
        "posts/first.md",
        "---\ntitle: First Light\ndate: 2022-06-01\n---\nOne.\n",
    );
    write(
        &src,
        "posts/second.md",
        "---\ntitle: Second Wind\ndate: 2023-06-01\n---\n:smile: hello\n",
    );
    write(
        &src,
        "posts/tomorrow.md",
        "---\ntitle: Not Yet Published\ndate: 2099-01-01\ndraft: false\n---\nSoon.\n",
    );
    write(
        &src,
        "posts/hidden.md",
        "---\ntitle: Hidden Draft\ndate: 2020-01-01\ndraft: true\n---\nShh.\n",
    );
    write(
        &src,
        "gallery.md",
        "---\ntitle: Gallery\ndate: 2020-01-01\n---\n{% resI \"src/photos/a.jpg\", \"alt\", \"320,640\" %}\n",
    );
    jpeg(&src.join("photos/a.jpg"), 800, 600);
    write(&src, "assets/site.css", "body { margin: 0; }\n");
    tmp
}

fn build(tmp: &TempDir, env: Environment) -> BuildReport {
    let dirs = Directories::new(tmp.path().join("src"), tmp.path().join("www"));
    let config = load_config(&dirs.data_dir()).unwrap();
    let pipeline = Pipeline::with_dirs(Site::new(config, env), dirs, true);
    generate::build(&pipeline, now()).unwrap()
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn read(tmp: &TempDir, rel: &str) -> String {
    fs::read_to_string(tmp.path().join("www").join(rel)).unwrap()
}

#[test]
fn future_and_draft_posts_stay_out_of_the_archive() {
    let tmp = site();
    let report = build(&tmp, Environment::Development);
    assert!(report.collections.contains(&("posts", 2)));

    let archive = read(&tmp, "archive/index.html");
    assert!(archive.contains("First Light"));
    assert!(archive.contains("Second Wind"));
    assert!(!archive.contains("Not Yet Published"));
    assert!(!archive.contains("Hidden Draft"));
}

#[test]
fn archive_groups_newest_year_first() {
    let tmp = site();
    build(&tmp, Environment::Development);
    let archive = read(&tmp, "archive/index.html");
    let y2023 = archive.find("year-2023").unwrap();
    let y2022 = archive.find("year-2022").unwrap();
    assert!(y2023 < y2022);
    assert!(archive.find("Second Wind").unwrap() < y2022);
}

#[test]
fn emoji_shortcodes_end_up_labelled() {
    let tmp = site();
    build(&tmp, Environment::Development);
    let post = read(&tmp, "posts/second/index.html");
    assert!(post.contains(r#"<span role="img" aria-label="smile" title="smile">😄</span> hello"#));
}

#[test]
fn responsive_images_are_encoded_and_cached() {
    let tmp = site();
    let report = build(&tmp, Environment::Development);
    assert_eq!(report.cache.misses, 4);

    for name in ["a-320.webp", "a-640.webp", "a-320.jpeg", "a-640.jpeg"] {
        assert!(tmp.path().join("www/images").join(name).is_file(), "missing {name}");
    }

    let gallery = read(&tmp, "gallery/index.html");
    assert_eq!(gallery.matches("<source ").count(), 2);
    assert!(gallery.contains(r#"srcset="/images/a-320.webp 320w, /images/a-640.webp 640w""#));
    assert!(gallery.contains(r#"src="/images/a-320.jpeg" width="640" height="480" alt="alt""#));

    let again = build(&tmp, Environment::Development);
    assert_eq!(again.cache.misses, 0);
    assert_eq!(again.cache.hits, 4);
}

#[test]
fn production_output_is_minified() {
    let tmp = site();
    write(
        &tmp.path().join("src"),
        "plain.md",
        "---\ntitle: Plain\ndate: 2020-01-01\n---\n  <p>   hi   </p>  \n",
    );
    build(&tmp, Environment::Production);
    let html = read(&tmp, "plain/index.html");
    assert!(html.contains("<p>hi</p>"));
    assert!(!html.contains("\n\n"));
}

#[test]
fn feed_sitemap_and_assets_are_written() {
    let tmp = site();
    let report = build(&tmp, Environment::Development);
    assert_eq!(report.copied, vec!["assets"]);
    assert!(tmp.path().join("www/assets/site.css").is_file());

    let feed = read(&tmp, "feed.xml");
    assert!(feed.contains("https://notebook.example/posts/second/"));
    assert!(!feed.contains("tomorrow"));

    let sitemap = read(&tmp, "sitemap.xml");
    assert!(sitemap.contains("<loc>https://notebook.example/gallery/</loc>"));
}
