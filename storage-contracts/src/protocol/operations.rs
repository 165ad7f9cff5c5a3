// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

#[cfg(test)]
use super::{OperationId, StorageErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Mount,
    Unmount,
    Format,
    Encrypt,
    Unlock,
    Permissions,
    Sync,
    AutoSync,
    KeyCreate,
    KeyUpdate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 10] = [
        Self::Mount,
        Self::Unmount,
        Self::Format,
        Self::Encrypt,
        Self::Unlock,
        Self::Permissions,
        Self::Sync,
        Self::AutoSync,
        Self::KeyCreate,
        Self::KeyUpdate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::Unmount => "unmount",
            Self::Format => "format",
            Self::Encrypt => "encrypt",
            Self::Unlock => "unlock",
            Self::Permissions => "apply permissions",
            Self::Sync => "sync",
            Self::AutoSync => "auto-sync",
            Self::KeyCreate => "key creation",
            Self::KeyUpdate => "key rotation",
        }
    }

    /// Success of these operations changes what the next snapshot shows
    pub fn changes_lifecycle(self) -> bool {
        matches!(
            self,
            Self::Mount | Self::Unmount | Self::Format | Self::Encrypt | Self::Unlock
        )
    }

    /// Destroys data and needs the typed challenge on top of the yes/no prompt
    pub fn is_destructive(self) -> bool {
        matches!(self, Self::Format | Self::Encrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_id_roundtrips_as_uuid_string() {
        let id = OperationId::new();
        let json = serde_json::to_string(&id).expect("serialize operation id");
        let parsed: OperationId = serde_json::from_str(&json).expect("deserialize operation id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn permissions_and_sync_do_not_touch_lifecycle() {
        assert!(!OperationKind::Permissions.changes_lifecycle());
        assert!(!OperationKind::Sync.changes_lifecycle());
        assert!(OperationKind::Unlock.changes_lifecycle());
    }

    #[test]
    fn only_format_and_encrypt_are_destructive() {
        let destructive: Vec<_> = OperationKind::ALL
            .into_iter()
            .filter(|kind| kind.is_destructive())
            .collect();
        assert_eq!(destructive, vec![OperationKind::Format, OperationKind::Encrypt]);
    }

    #[test]
    fn storage_error_kind_http_family_codes_are_stable() {
        assert_eq!(StorageErrorKind::InvalidInput.code(), 400);
        assert_eq!(StorageErrorKind::NotFound.code(), 404);
        assert_eq!(StorageErrorKind::PermissionDenied.code(), 403);
        assert_eq!(StorageErrorKind::Conflict.code(), 409);
        assert_eq!(StorageErrorKind::Unsupported.code(), 501);
        assert_eq!(StorageErrorKind::Rejected.code(), 422);
        assert_eq!(StorageErrorKind::Internal.code(), 500);
    }
}
