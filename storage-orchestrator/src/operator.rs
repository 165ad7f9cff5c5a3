// SPDX-License-Identifier: GPL-3.0-only

//! Prompt and notification access for the orchestrators

use std::sync::Arc;

use storage_contracts::{
    ConfirmRequest, ConfirmResult, Notification, NotificationLevel, Notifier, OperatorPrompt,
};

use crate::config::NotificationDurations;
use crate::error::OrchestratorError;
use crate::lifecycle::Lifecycle;
use crate::selection::SelectionNotice;

/// Talks to the operator; silent once its lifecycle is torn down
#[derive(Clone)]
pub struct Operator {
    prompt: Arc<dyn OperatorPrompt>,
    notifier: Arc<dyn Notifier>,
    durations: NotificationDurations,
    lifecycle: Lifecycle,
}

impl Operator {
    pub fn new(
        prompt: Arc<dyn OperatorPrompt>,
        notifier: Arc<dyn Notifier>,
        durations: NotificationDurations,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            prompt,
            notifier,
            durations,
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Suspends until answered; teardown resolves it as cancelled
    pub async fn confirm(&self, request: ConfirmRequest) -> ConfirmResult {
        if !self.lifecycle.is_active() {
            return ConfirmResult::cancelled();
        }
        tokio::select! {
            result = self.prompt.confirm(request) => {
                if self.lifecycle.is_active() { result } else { ConfirmResult::cancelled() }
            }
            _ = self.lifecycle.cancelled() => {
                tracing::debug!("prompt abandoned on teardown");
                ConfirmResult::cancelled()
            }
        }
    }

    /// Confirmed, with any typed challenge matched
    pub async fn approve(&self, request: ConfirmRequest) -> bool {
        let result = self.confirm(request.clone()).await;
        result.satisfies(&request)
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        if !self.lifecycle.is_active() {
            return;
        }
        self.notifier.notify(Notification {
            level,
            message: message.into(),
            duration: self.durations.for_level(level),
        });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }

    pub fn report(&self, err: &OrchestratorError) {
        self.error(err.to_string());
    }

    pub fn selection_notice(&self, notice: &SelectionNotice) {
        self.notify(notice.level(), notice.message());
    }
}
