// SPDX-License-Identifier: GPL-3.0-only

//! Teardown signalling for in-flight work

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Shared "owner still alive" flag.
///
/// Completions that arrive after [`Lifecycle::teardown`] must not touch state
/// or emit notifications; pending prompts resolve as cancelled.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn teardown(&self) {
        if self.is_active() {
            tracing::debug!("lifecycle torn down");
        }
        self.token.cancel();
    }

    /// Resolves once torn down
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Torn down with this one, but can also be torn down on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}
