//! Document identity and artifact filenames
//!
//! A [`DocumentKey`] names a document across runs; the filename helpers turn a
//! [`DocumentReference`] into a sanitized name that stays the same on every run.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Maximum number of description characters carried into a filename
const MAX_DESCRIPTION_CHARS: usize = 50;

/// Globally unique document identity: `<source_id>:<local_id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn new(source_id: &str, local_id: &str) -> Self {
        Self(format!("{}:{}", source_id, local_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One addressable document within a source, ready to be retrieved
///
/// Produced by the enumerator and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReference {
    /// Id of the source this document was listed by
    pub source_id: String,

    /// Human readable source name (e.g. the case name)
    pub source_label: String,

    /// Identifier of the document within its source
    pub local_id: String,

    /// Docket entry number, or position in the listing
    pub entry_number: String,

    pub description: String,

    pub retrieval_location: Url,
}

impl DocumentReference {
    /// The ledger key of this document
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.source_id, &self.local_id)
    }

    /// Filesystem-safe, run-stable artifact filename
    ///
    /// Format: `<source>_<entry>_<description>.pdf`, keeping only alphanumeric
    /// characters, spaces, hyphens and underscores, with the description
    /// capped at 50 characters.
    pub fn output_filename(&self) -> String {
        format!("{}.pdf", self.filename_stem())
    }

    /// Filename used when [`output_filename`](Self::output_filename) is
    /// already taken by a different document
    pub fn disambiguated_filename(&self) -> String {
        format!(
            "{}_{}.pdf",
            self.filename_stem(),
            or_placeholder(sanitize(&self.local_id), "id")
        )
    }

    /// Numbered variant of [`disambiguated_filename`](Self::disambiguated_filename)
    /// for when that is taken too
    pub fn numbered_filename(&self, counter: u32) -> String {
        format!(
            "{}_{}_{}.pdf",
            self.filename_stem(),
            or_placeholder(sanitize(&self.local_id), "id"),
            counter
        )
    }

    fn filename_stem(&self) -> String {
        let description: String = sanitize(&self.description)
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();

        format!(
            "{}_{}_{}",
            or_placeholder(sanitize(&self.source_id), "source"),
            or_placeholder(sanitize(&self.entry_number), "unknown"),
            or_placeholder(description.trim().to_string(), "document"),
        )
    }
}

/// Strips every character that is not alphanumeric, space, hyphen or underscore
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .to_string()
}

fn or_placeholder(value: String, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}
