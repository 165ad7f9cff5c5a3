// SPDX-License-Identifier: GPL-3.0-only

//! Confirmation prompts and fire-and-forget notifications

use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfirmTone {
    #[default]
    Standard,
    /// Irreversible data loss
    Destructive,
    /// Could lock the operator out of a container
    HighRisk,
}

/// Free-text field shown inside a confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputChallenge {
    pub label: String,
    /// Text the operator must type for the confirmation to count
    pub expected: Option<String>,
    /// Mask the input (passwords, PINs)
    pub secret: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    pub tone: ConfirmTone,
    pub input: Option<InputChallenge>,
}

impl ConfirmRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            tone: ConfirmTone::Standard,
            input: None,
        }
    }

    pub fn tone(mut self, tone: ConfirmTone) -> Self {
        self.tone = tone;
        self
    }

    /// Operator must type `expected` exactly
    pub fn challenge(mut self, label: impl Into<String>, expected: impl Into<String>) -> Self {
        self.input = Some(InputChallenge {
            label: label.into(),
            expected: Some(expected.into()),
            secret: false,
        });
        self
    }

    /// Masked free-text entry with no expected value
    pub fn secret_input(mut self, label: impl Into<String>) -> Self {
        self.input = Some(InputChallenge {
            label: label.into(),
            expected: None,
            secret: true,
        });
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmResult {
    pub confirmed: bool,
    pub input: Option<Zeroizing<String>>,
}

impl ConfirmResult {
    pub fn yes() -> Self {
        Self {
            confirmed: true,
            input: None,
        }
    }

    pub fn with_input(input: impl Into<String>) -> Self {
        Self {
            confirmed: true,
            input: Some(Zeroizing::new(input.into())),
        }
    }

    /// Declined, dismissed, or torn down before an answer
    pub fn cancelled() -> Self {
        Self::default()
    }

    /// Confirmed, and the typed text matches the challenge when there is one
    pub fn satisfies(&self, request: &ConfirmRequest) -> bool {
        if !self.confirmed {
            return false;
        }
        match request.input.as_ref().and_then(|input| input.expected.as_deref()) {
            Some(expected) => self.input.as_deref().map(String::as_str) == Some(expected),
            None => true,
        }
    }
}

#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    /// Suspends until the operator answers; dismissal resolves to `cancelled()`
    async fn confirm(&self, request: ConfirmRequest) -> ConfirmResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub duration: Duration,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
