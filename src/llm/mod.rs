use crate::error::AppResult;

pub mod cached;
pub mod gemini;

pub use cached::{recall, RedisReplyCache, ReplyCache};
pub use gemini::GeminiClient;

/// Trait for text generation backends
///
/// Both model-backed stages (query synthesis and ranking) talk to the model
/// through this trait, so the HTTP client and test doubles are interchangeable.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends a single prompt and returns the model's text reply
    async fn generate(&self, prompt: &str) -> AppResult<String>;

    /// Backend name for logging and debugging
    fn name(&self) -> &'static str;
}
