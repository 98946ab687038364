//! The staged analysis pipeline

pub mod runner;
pub mod stage;

pub use runner::PipelineRunner;
pub use stage::Stage;

use pulse_llm::LLMProvider;
use pulse_llm::providers::GeminiProvider;
use std::sync::Arc;

/// Builds an insight provider from a per-run credential
pub trait InsightProviderFactory: Send + Sync {
    fn create(&self, api_key: &str) -> pulse_llm::Result<Arc<dyn LLMProvider>>;
}

/// Creates Gemini providers
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiProviderFactory;

impl InsightProviderFactory for GeminiProviderFactory {
    fn create(&self, api_key: &str) -> pulse_llm::Result<Arc<dyn LLMProvider>> {
        let provider = GeminiProvider::new(api_key)?;
        Ok(Arc::new(provider))
    }
}
