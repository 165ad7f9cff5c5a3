// SPDX-License-Identifier: GPL-3.0-only

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod operations;
pub mod outcomes;

pub use envelope::{ResponseEnvelope, ResponseStatus};
pub use errors::{StorageError, StorageErrorKind};
pub use ids::OperationId;
pub use operations::OperationKind;
pub use outcomes::{
    DependentService, DeviceKeyResult, FormatError, KeyOperationReport, ServiceActionReport,
    ServiceFailure, UnlockOutcome,
};
