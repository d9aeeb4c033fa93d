use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::handlers::FileHandler;
use crate::preparer::FilePreparer;
use crate::scripts::{self, Script};

/// Registry key: a feed and a revision of its layout
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedKey {
    pub feed_identifier: String,
    pub feed_version: u32,
}

impl FeedKey {
    pub fn new(feed_identifier: impl Into<String>, feed_version: u32) -> Self {
        Self {
            feed_identifier: feed_identifier.into(),
            feed_version,
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.feed_identifier, self.feed_version)
    }
}

/// What a feed resolves to: the routine and the strategy for opening its files
#[derive(Clone)]
pub struct RegistryEntry {
    pub script: Arc<dyn Script>,
    pub handler: FileHandler,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown feed: {feed} v{version}")]
    UnknownFeed { feed: String, version: u32 },
}

/// Registry mapping feeds to transformation routines
///
/// Populated once at startup; lookups afterwards go through a shared
/// reference.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    entries: BTreeMap<FeedKey, RegistryEntry>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the entry for `(feed_identifier, feed_version)`
    pub fn register(
        &mut self,
        feed_identifier: impl Into<String>,
        feed_version: u32,
        script: Arc<dyn Script>,
        handler: FileHandler,
    ) {
        let key = FeedKey::new(feed_identifier, feed_version);
        tracing::debug!(feed = %key, handler = handler.kind(), "Registered feed");
        self.entries.insert(key, RegistryEntry { script, handler });
    }

    pub fn resolve(
        &self,
        feed_identifier: &str,
        feed_version: u32,
    ) -> Result<(Arc<dyn Script>, FileHandler), RegistryError> {
        self.entries
            .get(&FeedKey::new(feed_identifier, feed_version))
            .map(|entry| (entry.script.clone(), entry.handler.clone()))
            .ok_or_else(|| RegistryError::UnknownFeed {
                feed: feed_identifier.to_string(),
                version: feed_version,
            })
    }

    /// Resolve a feed and bind it to one preparation run
    pub fn create(
        &self,
        feed_identifier: &str,
        feed_version: u32,
        data_supplier: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        source_creation_timestamp: DateTime<FixedOffset>,
    ) -> Result<FilePreparer, RegistryError> {
        let (script, handler) = self.resolve(feed_identifier, feed_version)?;

        Ok(FilePreparer::new(
            script,
            handler,
            feed_identifier,
            feed_version,
            data_supplier,
            start_date,
            end_date,
            source_creation_timestamp,
        ))
    }

    pub fn contains(&self, feed_identifier: &str, feed_version: u32) -> bool {
        self.entries
            .contains_key(&FeedKey::new(feed_identifier, feed_version))
    }

    /// Registered feeds with the kind of handler each uses, in key order
    pub fn feeds(&self) -> Vec<(FeedKey, &'static str)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.handler.kind()))
            .collect()
    }

    /// Registry with every built-in supplier feed
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        scripts::register_builtin(&mut registry);
        registry
    }
}
