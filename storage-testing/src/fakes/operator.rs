use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use storage_contracts::{
    ConfirmRequest, ConfirmResult, Notification, NotificationLevel, Notifier, OperatorPrompt,
};

use super::lock;

/// Answers prompts from a queue; an empty queue dismisses the prompt
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<ConfirmResult>>,
    requests: Mutex<Vec<ConfirmRequest>>,
    hang: AtomicBool,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(answers: impl IntoIterator<Item = ConfirmResult>) -> Self {
        let prompt = Self::default();
        lock(&prompt.answers).extend(answers);
        prompt
    }

    pub fn push(&self, answer: ConfirmResult) {
        lock(&self.answers).push_back(answer);
    }

    pub fn push_yes(&self, count: usize) {
        for _ in 0..count {
            self.push(ConfirmResult::yes());
        }
    }

    /// Never answer; only teardown can resolve the prompt
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ConfirmRequest> {
        lock(&self.requests).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.title).collect()
    }
}

#[async_trait]
impl OperatorPrompt for ScriptedPrompt {
    async fn confirm(&self, request: ConfirmRequest) -> ConfirmResult {
        lock(&self.requests).push(request);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        lock(&self.answers)
            .pop_front()
            .unwrap_or_else(ConfirmResult::cancelled)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }

    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(NotificationLevel::Error)
    }

    pub fn successes(&self) -> Vec<String> {
        self.messages(NotificationLevel::Success)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(NotificationLevel::Warning)
    }

    pub fn clear(&self) {
        lock(&self.notifications).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }
}
