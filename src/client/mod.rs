//! Model service boundary: one operation, system + user prompt in, raw text out.

pub mod openai;
pub mod retry;

use crate::error::ServiceError;

pub use self::openai::OpenAiChatClient;
pub use self::retry::{RetryPolicy, RetryingClient, Sleeper, ThreadSleeper};

#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub temperature: f32,
    /// Ask the service for a single JSON object (structured-output mode).
    pub json_response: bool,
    pub max_tokens: Option<u32>,
}

pub trait ModelClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError>;
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::{CompletionRequest, ModelClient, Sleeper};
    use crate::error::ServiceError;

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub system_prompt: String,
        pub user_prompt: String,
        pub json_response: bool,
    }

    /// Replays queued responses in order and records every request.
    #[derive(Default)]
    pub struct ScriptedClient {
        responses: RefCell<VecDeque<Result<String, ServiceError>>>,
        calls: RefCell<Vec<RecordedCall>>,
    }

    impl ScriptedClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, text: impl Into<String>) -> &Self {
            self.responses.borrow_mut().push_back(Ok(text.into()));
            self
        }

        pub fn push_err(&self, err: ServiceError) -> &Self {
            self.responses.borrow_mut().push_back(Err(err));
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.borrow().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl ModelClient for ScriptedClient {
        fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
            self.calls.borrow_mut().push(RecordedCall {
                system_prompt: request.system_prompt.to_string(),
                user_prompt: request.user_prompt.to_string(),
                json_response: request.json_response,
            });
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::permanent("no scripted response left")))
        }
    }

    /// Records requested delays instead of sleeping.
    #[derive(Default)]
    pub struct RecordingSleeper {
        delays: RefCell<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn delays(&self) -> Vec<Duration> {
            self.delays.borrow().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.borrow_mut().push(duration);
        }
    }

    pub fn rate_limited() -> ServiceError {
        ServiceError::Transient {
            status: 429,
            message: "rate limit reached".to_string(),
            retry_after: None,
        }
    }
}
