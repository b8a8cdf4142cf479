//! Actions: what happened in a registry.

use serde::{Deserialize, Serialize};

use super::{PackageRef, UserId};

/// A single kind of registry activity.
///
/// Externally tagged, so each serialized action names its variant:
/// `{"Download": {"user": "...", "package": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// A package (or package file) became available.
    Publish { package: PackageRef },

    /// A user fetched a package.
    Download { user: UserId, package: PackageRef },

    /// A user polled registry metadata without downloading.
    RefreshMetadata { user: UserId },

    /// Synthetic: `user` performs no further actions in this log.
    ///
    /// Derived by the goodbye pass, never present in raw input.
    Goodbye { user: UserId },
}

impl Action {
    /// The acting user, if the action has one.
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::Publish { .. } => None,
            Self::Download { user, .. }
            | Self::RefreshMetadata { user }
            | Self::Goodbye { user } => Some(user),
        }
    }

    /// The package involved, if any.
    pub fn package(&self) -> Option<&PackageRef> {
        match self {
            Self::Publish { package } | Self::Download { package, .. } => Some(package),
            Self::RefreshMetadata { .. } | Self::Goodbye { .. } => None,
        }
    }

    /// Variant name as it appears on disk.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "Publish",
            Self::Download { .. } => "Download",
            Self::RefreshMetadata { .. } => "RefreshMetadata",
            Self::Goodbye { .. } => "Goodbye",
        }
    }
}
