//! Package identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A canonical package identifier.
///
/// Registries spell the same package many ways (`Foo_Bar`, `foo.bar`,
/// `foo-bar`). [`PackageId::new`] folds them into one identity: lower-cased,
/// with every run of `-`, `_` and `.` collapsed into a single `-`.
///
/// Deserialization keeps the stored string as-is, so logs round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Canonicalize a raw registry spelling.
    pub fn new(raw: &str) -> Self {
        let mut id = String::with_capacity(raw.len());
        let mut in_separator = false;
        for c in raw.chars() {
            if matches!(c, '-' | '_' | '.') {
                if !in_separator {
                    id.push('-');
                }
                in_separator = true;
            } else {
                id.extend(c.to_lowercase());
                in_separator = false;
            }
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A package (or package file) as it appears in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub id: PackageId,

    /// Size in bytes, when the source knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl PackageRef {
    pub fn new(id: PackageId, length: Option<u64>) -> Self {
        Self { id, length }
    }
}
