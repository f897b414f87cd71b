use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPermission {
    Read,
}

/// Result of a temporary-access request
///
/// `Unscoped` is returned when the backing store cannot mint scoped
/// credentials. Its URL carries no expiry and needs separate authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TemporaryAccess {
    Scoped {
        url: String,
        /// Backdated from issuance to tolerate clock skew
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        permission: AccessPermission,
    },
    Unscoped {
        url: String,
    },
}

impl TemporaryAccess {
    pub fn url(&self) -> &str {
        match self {
            TemporaryAccess::Scoped { url, .. } | TemporaryAccess::Unscoped { url } => url,
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, TemporaryAccess::Scoped { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TemporaryAccess::Scoped { expires_at, .. } => Some(*expires_at),
            TemporaryAccess::Unscoped { .. } => None,
        }
    }
}
