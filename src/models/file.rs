//! Represents a file record as reported by the object store.

use serde::{Deserialize, Serialize};

/// Store-side metadata of a single file.
///
/// The permission lists are opaque access-control entries. They are kept
/// verbatim and in their original order so a recreated object carries
/// exactly the same grants.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Declared content type (e.g. `image/jpeg`).
    #[serde(rename = "mimeType")]
    pub mime_type: String,

    /// Original file name.
    pub name: String,

    /// Read permission entries.
    #[serde(rename = "$read", default)]
    pub read_permissions: Vec<String>,

    /// Write permission entries.
    #[serde(rename = "$write", default)]
    pub write_permissions: Vec<String>,
}
