//! Encode cache for responsive image variants.
//!
//! Encoding every `{% resI %}` variant on every build (and on every rebuild
//! in `serve`) is the slowest part of the pipeline. The cache lets a build
//! skip the backend when the source image and the variant parameters are
//! unchanged since the last run.
//!
//! ## Keys
//!
//! Lookups are **content-addressed** by `source_hash` + `params_hash`:
//!
//! - `source_hash`: SHA-256 of the source file bytes. Survives `git checkout`,
//!   which resets mtimes. Computed once per `resI` call and shared by all
//!   variants of that source.
//! - `params_hash`: SHA-256 of (format, width, quality).
//!
//! A hit also requires the recorded output file to still exist. If the same
//! content was previously written under another name (the image was renamed
//! in `src/`), the old file is copied instead of re-encoded.
//!
//! ## Storage
//!
//! `<output_dir>/.cache/manifest.json`, keyed by output path relative to the
//! output directory. An unreadable or outdated manifest is treated as empty.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::imaging::{OutputFormat, Quality};

/// Cache directory inside the output directory.
pub const CACHE_DIR: &str = ".cache";

const MANIFEST_FILENAME: &str = "manifest.json";

/// Bump to invalidate every existing manifest.
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk manifest: output path → the content that produced it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` → output path. Rebuilt on load.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

/// Outcome of a cache lookup for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The expected output already holds this content.
    Fresh,
    /// The content exists under another output path; copy it over.
    Relocated(String),
    Miss,
}

fn content_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    pub fn load(output_dir: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(manifest_path(output_dir)) else {
            return Self::empty();
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!("ignoring unreadable encode cache: {e}");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = manifest
            .entries
            .iter()
            .map(|(path, e)| (content_key(&e.source_hash, &e.params_hash), path.clone()))
            .collect();
        manifest
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = manifest_path(output_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(tmp, path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `output_path` (relative to `output_dir`) can be served
    /// from an earlier encode.
    pub fn lookup(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_path: &str,
        output_dir: &Path,
    ) -> Lookup {
        let Some(stored) = self.content_index.get(&content_key(source_hash, params_hash)) else {
            return Lookup::Miss;
        };
        if !output_dir.join(stored).exists() {
            return Lookup::Miss;
        }
        if stored == output_path {
            Lookup::Fresh
        } else {
            Lookup::Relocated(stored.clone())
        }
    }

    /// Record that `output_path` now holds the given content. An older entry
    /// for the same content under a different path is dropped.
    pub fn insert(&mut self, output_path: String, source_hash: String, params_hash: String) {
        let key = content_key(&source_hash, &params_hash);
        if let Some(old_path) = self.content_index.get(&key)
            && *old_path != output_path
        {
            self.entries.remove(old_path.as_str());
        }
        self.content_index.insert(key, output_path.clone());
        self.entries.insert(
            output_path,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }
}

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_DIR).join(MANIFEST_FILENAME)
}

/// SHA-256 of a file's bytes, hex encoded.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// SHA-256 of the parameters that shape one encoded variant.
pub fn hash_variant_params(format: OutputFormat, width: u32, quality: Quality) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"variant\0");
    hasher.update(format.extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(width.to_le_bytes());
    hasher.update(quality.value().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-build counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn record(&mut self, lookup: &Lookup) {
        match lookup {
            Lookup::Fresh => self.hits += 1,
            Lookup::Relocated(_) => self.copies += 1,
            Lookup::Miss => self.misses += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits == 0 && self.copies == 0 {
            return write!(f, "{} encoded", self.misses);
        }
        write!(f, "{} cached", self.hits)?;
        if self.copies > 0 {
            write!(f, ", {} copied", self.copies)?;
        }
        write!(f, ", {} encoded ({} total)", self.misses, self.total())
    }
}

/// Manifest and counters shared by every page rendering in one build.
#[derive(Debug)]
pub struct EncodeCache {
    output_dir: PathBuf,
    manifest: Mutex<CacheManifest>,
    stats: Mutex<CacheStats>,
}

impl EncodeCache {
    /// Load the manifest under `output_dir`, or start empty when `enabled`
    /// is false so every variant is re-encoded.
    pub fn open(output_dir: &Path, enabled: bool) -> Self {
        let manifest = if enabled {
            CacheManifest::load(output_dir)
        } else {
            CacheManifest::empty()
        };
        Self {
            output_dir: output_dir.to_path_buf(),
            manifest: Mutex::new(manifest),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Look up one variant and count the outcome.
    pub fn lookup(&self, source_hash: &str, params_hash: &str, output_path: &str) -> Lookup {
        let lookup = lock(&self.manifest).lookup(
            source_hash,
            params_hash,
            output_path,
            &self.output_dir,
        );
        lock(&self.stats).record(&lookup);
        lookup
    }

    pub fn insert(&self, output_path: &str, source_hash: &str, params_hash: &str) {
        lock(&self.manifest).insert(
            output_path.to_string(),
            source_hash.to_string(),
            params_hash.to_string(),
        );
    }

    pub fn stats(&self) -> CacheStats {
        *lock(&self.stats)
    }

    pub fn save(&self) -> io::Result<()> {
        lock(&self.manifest).save(&self.output_dir)
    }
}

/// A poisoned lock only means another render panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
