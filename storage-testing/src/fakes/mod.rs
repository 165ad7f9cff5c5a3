//! Recording fakes with scriptable answers
//!
//! Every fake records the calls it received so tests can assert on what
//! reached the "backend". Answers default to success.

mod devices;
mod keys;
mod operator;
mod secure;
mod services;

use std::sync::{Mutex, MutexGuard};

pub use devices::{DeviceCall, FakeDevices};
pub use keys::{FakeKeys, KeyCall, slots};
pub use operator::{RecordingNotifier, ScriptedPrompt};
pub use secure::FakeSecureTransport;
pub use services::{FakeServices, ServiceCall};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
