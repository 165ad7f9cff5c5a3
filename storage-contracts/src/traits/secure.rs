// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

/// Obscures secrets before they leave the process
#[async_trait]
pub trait SecureTransport: Send + Sync {
    /// `None` means the secret could not be encrypted and must not be sent
    async fn encrypt(&self, plaintext: &str) -> Option<String>;
}
