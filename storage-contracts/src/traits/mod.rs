// SPDX-License-Identifier: GPL-3.0-only

pub mod devices;
pub mod keys;
pub mod prompt;
pub mod secure;
pub mod services;

pub use devices::DeviceOpsAdapter;
pub use keys::KeyOpsAdapter;
pub use prompt::{
    ConfirmRequest, ConfirmResult, ConfirmTone, InputChallenge, Notification, NotificationLevel,
    Notifier, OperatorPrompt,
};
pub use secure::SecureTransport;
pub use services::ServiceOpsAdapter;
