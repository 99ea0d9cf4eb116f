//! Development server with live reload.
//!
//! Serves the output directory over `tiny_http`, watches the input directory
//! with `notify` and reruns the build when it settles.
//!
//! ```text
//! ┌─────────────────┐          ┌──────────────────┐
//! │   Main Thread   │          │  Watcher Thread  │
//! │  (HTTP Server)  │          │  (notify, 300ms) │
//! └────────┬────────┘          └────────┬─────────┘
//!          │                            │
//!    serve www/                  rebuild on change
//!    GET /__nib/livereload  ◀──  generation += 1
//! ```
//!
//! With live reload on, every HTML response carries a small script that
//! polls `/__nib/livereload` and reloads the page when the generation
//! counter moves. Reloads always replace the whole page.

use crate::pipeline::{Directories, ServerOptions};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};

pub const LIVERELOAD_PATH: &str = "/__nib/livereload";

const LIVERELOAD_JS: &str = include_str!("../static/livereload.js");

const DEBOUNCE_MS: u64 = 300;

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to bind after {attempts} attempts (ports {first}-{last}): {message}")]
    Bind {
        attempts: u16,
        first: u16,
        last: u16,
        message: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file watcher: {0}")]
    Watch(#[from] notify::Error),
    #[error("Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// A rebuild triggered by the watcher. Errors are logged, never fatal.
pub type RebuildResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Counter bumped after every successful rebuild.
#[derive(Debug, Default)]
pub struct LiveReload {
    generation: AtomicU64,
}

impl LiveReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Serve `dirs.output` until Ctrl+C, rebuilding with `rebuild` whenever
/// something under `dirs.input` changes. The caller runs the first build.
pub fn serve<F>(dirs: &Directories, options: &ServerOptions, rebuild: F) -> Result<(), ServeError>
where
    F: FnMut() -> RebuildResult + Send + 'static,
{
    let interface = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let (server, addr) = try_bind_port(interface, options.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        tracing::info!("shutting down...");
        server_for_signal.unblock();
    })?;

    let reload = Arc::new(LiveReload::new());
    let watcher = spawn_watcher(dirs.input.clone(), Arc::clone(&reload), rebuild)?;

    tracing::info!("serving {} at http://{}", dirs.output.display(), addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &dirs.output, options, &reload) {
            tracing::warn!("request error: {e}");
        }
    }

    drop(watcher);
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr), ServeError> {
    let mut last_error = String::new();
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    tracing::warn!("port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(ServeError::Bind {
        attempts: max_retries,
        first: base_port,
        last: base_port.saturating_add(max_retries.saturating_sub(1)),
        message: last_error,
    })
}

// ============================================================================
// Watcher
// ============================================================================

/// Editor artifacts and hidden files never trigger a rebuild.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Batches rapid file events until they settle.
#[derive(Debug, Default)]
struct Debouncer {
    pending: HashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        if !self.pending.is_empty() {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<PathBuf> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

/// Start watching `root`. The returned watcher must be kept alive.
fn spawn_watcher<F>(
    root: PathBuf,
    reload: Arc<LiveReload>,
    mut rebuild: F,
) -> Result<notify::RecommendedWatcher, ServeError>
where
    F: FnMut() -> RebuildResult + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!("watching {}", root.display());

    std::thread::spawn(move || {
        let mut debouncer = Debouncer::default();
        loop {
            match rx.recv_timeout(debouncer.timeout()) {
                Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
                Ok(Err(e)) => tracing::warn!("watch error: {e}"),
                Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                    let changed = debouncer.take();
                    let first = changed
                        .first()
                        .map(|p| p.strip_prefix(&root).unwrap_or(p).display().to_string())
                        .unwrap_or_default();
                    tracing::info!("{} changed ({} files), rebuilding...", first, changed.len());
                    match rebuild() {
                        Ok(()) => {
                            let generation = reload.bump();
                            tracing::debug!("rebuild complete, generation {generation}");
                        }
                        Err(e) => tracing::error!("rebuild failed: {e}"),
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
                _ => {}
            }
        }
    });

    Ok(watcher)
}

// ============================================================================
// Request handling
// ============================================================================

/// Map a request URL onto a file under `root`.
///
/// The query string is dropped and percent escapes decoded. Directories
/// resolve to their `index.html`. Paths that climb out of `root` resolve to
/// nothing.
pub fn resolve_request(root: &Path, raw_url: &str) -> Option<PathBuf> {
    let without_query = raw_url.split(['?', '#']).next().unwrap_or(raw_url);
    let decoded = urlencoding::decode(without_query).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

/// Insert the live reload script before `</body>`, or append it.
pub fn inject_live_reload(html: &str) -> String {
    let script = format!("<script>{}</script>", LIVERELOAD_JS.trim());
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], script, &html[pos..]),
        None => format!("{html}{script}"),
    }
}

/// MIME type from the file extension; text types carry `charset`.
pub fn content_type(path: &Path, charset: &str) -> String {
    let text = |mime: &str| format!("{mime}; charset={charset}");
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => text("text/html"),
        Some("css") => text("text/css"),
        Some("js" | "mjs") => text("application/javascript"),
        Some("json" | "webmanifest") => text("application/json"),
        Some("xml") => text("application/xml"),
        Some("txt") => text("text/plain"),
        Some("svg") => "image/svg+xml".to_string(),
        Some("png") => "image/png".to_string(),
        Some("jpg" | "jpeg") => "image/jpeg".to_string(),
        Some("gif") => "image/gif".to_string(),
        Some("webp") => "image/webp".to_string(),
        Some("avif") => "image/avif".to_string(),
        Some("ico") => "image/x-icon".to_string(),
        Some("woff") => "font/woff".to_string(),
        Some("woff2") => "font/woff2".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

fn respond(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> std::io::Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for (name, value) in [("Content-Type", content_type), ("Cache-Control", "no-cache")] {
        if let Ok(header) = Header::from_bytes(name, value) {
            response.add_header(header);
        }
    }
    request.respond(response)
}

fn handle_request(
    request: Request,
    root: &Path,
    options: &ServerOptions,
    reload: &LiveReload,
) -> std::io::Result<()> {
    let charset = options.encoding.as_str();
    if request.url().split('?').next() == Some(LIVERELOAD_PATH) {
        let body = reload.generation().to_string().into_bytes();
        return respond(request, 200, &format!("text/plain; charset={charset}"), body);
    }

    let (status, path) = match resolve_request(root, request.url()) {
        Some(path) => (200, path),
        None => {
            let not_found = root.join("404.html");
            if !not_found.is_file() {
                let body = b"404 Not Found".to_vec();
                return respond(request, 404, &format!("text/plain; charset={charset}"), body);
            }
            (404, not_found)
        }
    };

    let mime = content_type(&path, charset);
    let mut body = fs::read(&path)?;
    if options.live_reload && mime.starts_with("text/html") {
        body = inject_live_reload(&String::from_utf8_lossy(&body)).into_bytes();
    }
    respond(request, status, &mime, body)
}
