use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use storage_contracts::SecureTransport;

use super::lock;

/// Reversible stand-in: `secret` becomes `enc(secret)`
#[derive(Default)]
pub struct FakeSecureTransport {
    calls: AtomicUsize,
    fail_all: AtomicBool,
    fail_on: Mutex<HashSet<String>>,
}

impl FakeSecureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(plaintext: &str) -> String {
        format!("enc({plaintext})")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Fail only for this plaintext
    pub fn fail_on(&self, plaintext: &str) {
        lock(&self.fail_on).insert(plaintext.to_string());
    }
}

#[async_trait]
impl SecureTransport for FakeSecureTransport {
    async fn encrypt(&self, plaintext: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || lock(&self.fail_on).contains(plaintext) {
            return None;
        }
        Some(Self::wrap(plaintext))
    }
}
