//! Mock chat-completion adapter for testing without API calls.
//!
//! Replies with a scripted text or a scripted error and records every request.

use crate::domain::{CompletionRequest, DomainError};
use crate::ports::ChatCompletionPort;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

type ErrorFactory = Box<dyn Fn() -> DomainError + Send + Sync>;

enum Script {
    Reply(String),
    Fail(ErrorFactory),
}

/// Mock adapter for testing.
///
/// Returns predetermined responses without making API calls.
/// Optionally simulates network latency.
pub struct MockChatAdapter {
    script: Script,
    delay_ms: u64,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockChatAdapter {
    /// Adapter that answers every call with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(text.into()))
    }

    /// Adapter that fails every call with the error produced by `make_err`.
    pub fn failing<F>(make_err: F) -> Self
    where
        F: Fn() -> DomainError + Send + Sync + 'static,
    {
        Self::with_script(Script::Fail(Box::new(make_err)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay_ms: 0,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Simulated network delay before answering.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

#[async_trait::async_trait]
impl ChatCompletionPort for MockChatAdapter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError> {
        info!(
            messages = request.messages.len(),
            "[MOCK] Simulating chat completion"
        );

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(make_err) => Err(make_err()),
        }
    }
}
