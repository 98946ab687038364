//! Text completion providers for market-pulse
//!
//! The analysis pipeline only needs one thing from a language model: turn a
//! prompt describing the computed indicators into a written briefing. This
//! crate defines that seam ([`LLMProvider`]) and the Gemini implementation
//! behind it.

pub mod completion;
pub mod error;
pub mod provider;
pub mod providers;

pub use completion::{CompletionRequest, CompletionRequestBuilder, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use provider::LLMProvider;
