//! AI-written market briefings

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::indicators::IndicatorSet;
use crate::market::DateRange;
use crate::patterns::PatternAnalysis;
use crate::signals::TradingSignals;
use pulse_llm::{CompletionRequest, LLMProvider, StopReason};
use serde::Serialize;
use std::sync::Arc;

const SYSTEM_INSTRUCTION: &str = "You are a senior technical analyst. Write in markdown.";

const BRIEFING_REQUEST: &str = "Include:

1. Overall market sentiment and trend analysis
2. Key support and resistance levels
3. Risk assessment and potential scenarios
4. Entry and exit recommendations
5. Time horizon considerations
6. Notable divergences or chart patterns
7. Risk management suggestions

Conclude with a Key Takeaway summarizing the most critical market insight in no more than 3 sentences.
Use a direct, confident tone and avoid introductions or self-references.";

/// Everything the briefing is written from
#[derive(Debug, Clone, Copy)]
pub struct InsightContext<'a> {
    pub symbol: &'a str,
    pub range: &'a DateRange,
    pub indicators: &'a IndicatorSet,
    pub patterns: &'a PatternAnalysis,
    pub signals: &'a TradingSignals,
}

impl InsightContext<'_> {
    /// Plain-text summary of every analysis section
    pub fn summary(&self) -> Result<String> {
        let mut summary = format!("Symbol: {}\nPeriod: {}\n", self.symbol, self.range);

        section(&mut summary, "TREND", &self.indicators.trend)?;
        section(&mut summary, "MOMENTUM", &self.indicators.momentum)?;
        section(&mut summary, "VOLATILITY", &self.indicators.volatility)?;
        section(&mut summary, "VOLUME", &self.indicators.volume)?;
        section(&mut summary, "FIBONACCI", &self.patterns.fibonacci)?;
        section(&mut summary, "SUPPORT_RESISTANCE", &self.patterns.support_resistance)?;
        section(&mut summary, "PREDICTIONS", &self.patterns.forecast)?;
        section(&mut summary, "RISK_METRICS", &self.patterns.risk)?;
        section(&mut summary, "TRADING_SIGNALS", self.signals)?;

        Ok(summary)
    }

    /// The full prompt sent to the provider
    pub fn prompt(&self) -> Result<String> {
        Ok(format!(
            "Analyze the following technical data and deliver a concise, actionable market briefing:\n\n{}\n{}",
            self.summary()?,
            BRIEFING_REQUEST
        ))
    }
}

fn section<T: Serialize>(out: &mut String, title: &str, value: &T) -> Result<()> {
    out.push_str(&format!("\n{title}:\n{}\n", serde_json::to_string_pretty(value)?));
    Ok(())
}

/// Writes briefings through an LLM provider
#[derive(Clone)]
pub struct InsightGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

impl std::fmt::Debug for InsightGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightGenerator")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl InsightGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            model: config.insight_model.clone(),
            max_tokens: config.insight_max_tokens,
            temperature: config.insight_temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a markdown briefing for the analysis
    #[tracing::instrument(skip_all, fields(symbol = context.symbol, provider = self.provider.name(), model = %self.model))]
    pub async fn generate(&self, context: &InsightContext<'_>) -> Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .system(SYSTEM_INSTRUCTION)
            .prompt(context.prompt()?)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        let response = self.provider.complete(request).await?;
        tracing::debug!(
            tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "Briefing received"
        );

        if response.stop_reason == StopReason::MaxTokens {
            tracing::warn!("Briefing truncated at the token budget");
        }

        let text = response.text.trim();
        if text.is_empty() {
            return Err(AnalysisError::Other("insight provider returned an empty briefing".to_string()));
        }
        Ok(text.to_string())
    }
}
