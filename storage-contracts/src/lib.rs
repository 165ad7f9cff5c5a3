// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{
    DependentService, DeviceKeyResult, FormatError, KeyOperationReport, OperationId,
    OperationKind, ResponseEnvelope, ResponseStatus, ServiceActionReport, ServiceFailure,
    StorageError, StorageErrorKind, UnlockOutcome,
};
pub use traits::{
    ConfirmRequest, ConfirmResult, ConfirmTone, DeviceOpsAdapter, InputChallenge, KeyOpsAdapter,
    Notification, NotificationLevel, Notifier, OperatorPrompt, SecureTransport, ServiceOpsAdapter,
};
