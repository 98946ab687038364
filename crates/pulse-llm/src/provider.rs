//! Provider seam

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A service that turns a prompt into text
///
/// Shared behind `Arc<dyn LLMProvider>` so one provider can serve many
/// concurrent analyses.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short identifier used in logs, e.g. `"gemini"`
    fn name(&self) -> &str;
}
