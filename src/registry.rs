//! Name → handler registration record.
//!
//! The pipeline driver fills one [`Registry`] at startup; tag expansion looks
//! filters and shortcodes up by name, the build computes the named
//! collections, and every output goes through the transforms in the order
//! they were added.

use crate::filters::FilterError;
use crate::scan::Snapshot;
use crate::shortcodes::ShortcodeError;
use crate::types::Page;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// `value | name: args`
pub type Filter = Box<dyn Fn(&Value, &[Value]) -> Result<Value, FilterError> + Send + Sync>;

/// `{% name args %}`; paired shortcodes also receive their body.
pub type Shortcode =
    Box<dyn Fn(&[Value], Option<&str>) -> Result<String, ShortcodeError> + Send + Sync>;

/// Selector over the scan snapshot at a given instant.
pub type Collection = Box<dyn Fn(&Snapshot, DateTime<Utc>) -> Vec<Page> + Send + Sync>;

/// `(content, output_path) → content`
pub type Transform = Box<dyn Fn(&str, &str) -> String + Send + Sync>;

pub struct ShortcodeEntry {
    pub handler: Shortcode,
    /// Paired shortcodes wrap a body: `{% name %}…{% endname %}`.
    pub paired: bool,
}

#[derive(Default)]
pub struct Registry {
    filters: BTreeMap<&'static str, Filter>,
    shortcodes: BTreeMap<&'static str, ShortcodeEntry>,
    collections: BTreeMap<&'static str, Collection>,
    transforms: Vec<(&'static str, Transform)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter<F>(&mut self, name: &'static str, filter: F) -> &mut Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.filters.insert(name, Box::new(filter));
        self
    }

    pub fn add_shortcode<F>(&mut self, name: &'static str, shortcode: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<String, ShortcodeError> + Send + Sync + 'static,
    {
        self.shortcodes.insert(
            name,
            ShortcodeEntry {
                handler: Box::new(move |args, _| shortcode(args)),
                paired: false,
            },
        );
        self
    }

    pub fn add_paired_shortcode<F>(&mut self, name: &'static str, shortcode: F) -> &mut Self
    where
        F: Fn(&[Value], &str) -> Result<String, ShortcodeError> + Send + Sync + 'static,
    {
        self.shortcodes.insert(
            name,
            ShortcodeEntry {
                handler: Box::new(move |args, body| shortcode(args, body.unwrap_or(""))),
                paired: true,
            },
        );
        self
    }

    pub fn add_collection<F>(&mut self, name: &'static str, selector: F) -> &mut Self
    where
        F: Fn(&Snapshot, DateTime<Utc>) -> Vec<Page> + Send + Sync + 'static,
    {
        self.collections.insert(name, Box::new(selector));
        self
    }

    /// Append a transform. Transforms run in the order they were added.
    pub fn add_transform<F>(&mut self, name: &'static str, transform: F) -> &mut Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.transforms.push((name, Box::new(transform)));
        self
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    pub fn shortcode(&self, name: &str) -> Option<&ShortcodeEntry> {
        self.shortcodes.get(name)
    }

    pub fn is_paired(&self, name: &str) -> bool {
        self.shortcodes.get(name).is_some_and(|s| s.paired)
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.keys().copied().collect()
    }

    pub fn shortcode_names(&self) -> Vec<&'static str> {
        self.shortcodes.keys().copied().collect()
    }

    pub fn collection_names(&self) -> Vec<&'static str> {
        self.collections.keys().copied().collect()
    }

    pub fn transform_names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|(name, _)| *name).collect()
    }

    /// Compute every registered collection against one snapshot.
    pub fn compute_collections(
        &self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> BTreeMap<&'static str, Vec<Page>> {
        self.collections
            .iter()
            .map(|(name, selector)| (*name, selector(snapshot, now)))
            .collect()
    }

    /// Run every transform over one output, in registration order.
    pub fn apply_transforms(&self, content: String, output_path: &str) -> String {
        self.transforms
            .iter()
            .fold(content, |acc, (_, transform)| transform(&acc, output_path))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("filters", &self.filter_names())
            .field("shortcodes", &self.shortcode_names())
            .field("collections", &self.collection_names())
            .field("transforms", &self.transform_names())
            .finish()
    }
}
