//! Tag identifier → media reference lookup.
//!
//! The registry is loaded once at startup from the `rfid.json` file written
//! by the installation tooling and is read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::media::MediaRef;

/// Identifier reported by the tag reader.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the numeric identifier used by the tag-writing tool: the four
    /// UID bytes followed by their XOR check byte, folded big-endian and
    /// rendered in decimal.
    pub fn from_uid_bytes(uid: &[u8]) -> Self {
        let uid = &uid[..uid.len().min(4)];
        let check = uid.iter().fold(0u8, |acc, b| acc ^ b);
        let number = uid
            .iter()
            .chain(std::iter::once(&check))
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        Self(number.to_string())
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(value: &str) -> Self {
        TagId::new(value)
    }
}

/// Immutable lookup from [`TagId`] to [`MediaRef`].
#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    mappings: HashMap<TagId, MediaRef>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (TagId, MediaRef)>,
    {
        Self {
            mappings: entries.into_iter().collect(),
        }
    }

    /// Loads the mapping file.
    ///
    /// A missing or unparsable file yields an empty registry: the turntable
    /// still spins, it just cannot start anything.
    pub fn load(path: &Path) -> Self {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read tag mapping file, using empty mapping");
                return Self::new();
            }
        };

        let registry = Self::from_json_str(&data);
        info!(path = %path.display(), tags = registry.len(), "Tag mapping loaded");
        registry
    }

    /// Parses the JSON object `{"<tag id>": "<provider>:<kind>:<id>"}`.
    ///
    /// Entries that are not valid references are skipped.
    pub fn from_json_str(data: &str) -> Self {
        let root: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Tag mapping is not valid JSON, using empty mapping");
                return Self::new();
            }
        };

        let Value::Object(entries) = root else {
            warn!("Tag mapping is not a JSON object, using empty mapping");
            return Self::new();
        };

        let mut mappings = HashMap::with_capacity(entries.len());
        for (tag, reference) in entries {
            let Some(raw) = reference.as_str() else {
                warn!(tag = %tag, "Ignoring non-string media reference");
                continue;
            };
            match raw.parse::<MediaRef>() {
                Ok(media) => {
                    mappings.insert(TagId::new(tag), media);
                }
                Err(e) => warn!(tag = %tag, error = %e, "Ignoring invalid media reference"),
            }
        }

        Self { mappings }
    }

    pub fn lookup(&self, tag: &TagId) -> Option<&MediaRef> {
        self.mappings.get(tag)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
