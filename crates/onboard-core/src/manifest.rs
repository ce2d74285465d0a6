//! Manifest entries and the sequencer that walks them
//!
//! Entries are processed last-to-first: the most recently appended entry is
//! handled first. Callers depend on this order.

use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use tracing::debug;

use crate::error::{OnboardError, Result};
use crate::jws::CompactSignature;

/// Unprotected header of a manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Secure element serial, used to name the device
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
}

/// One signed secure-element record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub header: EntryHeader,

    #[serde(flatten)]
    pub signature: CompactSignature,
}

impl ManifestEntry {
    /// Decode an entry from its JSON form
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let entry: ManifestEntry = serde_json::from_value(value)
            .map_err(|e| OnboardError::ManifestDecode(format!("invalid manifest entry: {}", e)))?;
        if entry.header.unique_id.is_empty() {
            return Err(OnboardError::ManifestDecode(
                "header.uniqueId is empty".into(),
            ));
        }
        Ok(entry)
    }

    /// The secure element's unique id
    pub fn unique_id(&self) -> &str {
        &self.header.unique_id
    }
}

/// A batch of manifest entries in array order
///
/// Entries stay as raw JSON until they are pulled, so one malformed entry
/// does not reject the whole batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: Vec<serde_json::Value>,
}

impl Manifest {
    /// Parse a manifest; the document must be a JSON array
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| OnboardError::ManifestDecode(format!("manifest is not JSON: {}", e)))?;
        match value {
            serde_json::Value::Array(entries) => Ok(Self { entries }),
            _ => Err(OnboardError::ManifestDecode(
                "manifest must be a JSON array".into(),
            )),
        }
    }

    pub fn from_entries(entries: Vec<serde_json::Value>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the manifest into a last-to-first sequencer
    pub fn sequence(self) -> ManifestSequencer {
        debug!(length = self.entries.len(), "Sequencing manifest");
        ManifestSequencer {
            entries: self.entries,
        }
    }
}

impl IntoIterator for Manifest {
    type Item = SequencedEntry;
    type IntoIter = ManifestSequencer;

    fn into_iter(self) -> Self::IntoIter {
        self.sequence()
    }
}

/// An entry pulled from the sequencer, tagged with its array position
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedEntry {
    /// Index of the entry in the original array
    pub position: usize,

    /// The entry as submitted
    pub raw: serde_json::Value,
}

impl SequencedEntry {
    /// Decode into a typed entry
    pub fn decode(&self) -> Result<ManifestEntry> {
        ManifestEntry::from_value(self.raw.clone())
    }

    /// `header.uniqueId` as submitted, for reporting on entries that fail
    /// to decode. Not verified.
    pub fn declared_unique_id(&self) -> Option<&str> {
        self.raw
            .get("header")
            .and_then(|h| h.get("uniqueId"))
            .and_then(|id| id.as_str())
    }
}

/// Single-pass, last-to-first sequence over manifest entries
///
/// `next()` returns `None` once every entry has been handed out and keeps
/// returning `None` after that.
#[derive(Debug)]
pub struct ManifestSequencer {
    entries: Vec<serde_json::Value>,
}

impl ManifestSequencer {
    /// Entries not yet pulled
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for ManifestSequencer {
    type Item = SequencedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.entries.pop()?;
        let position = self.entries.len();
        debug!(position, "Reading manifest entry");
        Some(SequencedEntry { position, raw })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.entries.len(), Some(self.entries.len()))
    }
}

impl ExactSizeIterator for ManifestSequencer {}

impl FusedIterator for ManifestSequencer {}
