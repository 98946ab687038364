//! Shared fixtures for service tests

use crate::broadcaster::ProgressBroadcaster;
use crate::config::ServerConfig;
use crate::pipeline::{InsightProviderFactory, PipelineRunner};
use crate::registry::SessionRegistry;
use crate::service::{AnalysisService, AnalyzeRequest};
use crate::session::{Session, SessionId, SubjectParameters};
use crate::store::ReportStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use pulse_analysis::{
    AnalysisError, DateRange, InMemoryMarketData, MarketDataSource, Quote, SeriesChartRenderer,
};
use pulse_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, StopReason, TokenUsage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BRIEFING: &str = "## Outlook\n\nMomentum is constructive.\n\n**Key Takeaway:** trend intact.";

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// Provider that answers every prompt with [`BRIEFING`] or an error
struct FakeProvider {
    fail: bool,
    delay: Option<Duration>,
}

#[async_trait]
impl LLMProvider for FakeProvider {
    async fn complete(&self, _request: CompletionRequest) -> pulse_llm::Result<CompletionResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(LLMError::AuthenticationFailed);
        }
        Ok(CompletionResponse {
            text: BRIEFING.to_string(),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 900,
                output_tokens: 120,
            },
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Records the credentials it was asked to build providers for
#[derive(Default)]
pub struct FakeInsightFactory {
    fail: bool,
    delay: Option<Duration>,
    keys: Mutex<Vec<String>>,
}

impl FakeInsightFactory {
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

impl InsightProviderFactory for FakeInsightFactory {
    fn create(&self, api_key: &str) -> pulse_llm::Result<Arc<dyn LLMProvider>> {
        self.keys.lock().unwrap().push(api_key.to_string());
        Ok(Arc::new(FakeProvider {
            fail: self.fail,
            delay: self.delay,
        }))
    }
}

/// Wraps a source and delays every daily history call
struct SlowMarket {
    inner: InMemoryMarketData,
    delay: Duration,
}

#[async_trait]
impl MarketDataSource for SlowMarket {
    async fn daily_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<Quote>, AnalysisError> {
        tokio::time::sleep(self.delay).await;
        self.inner.daily_history(symbol, range).await
    }

    async fn intraday(&self, symbol: &str) -> Result<Vec<Quote>, AnalysisError> {
        self.inner.intraday(symbol).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureOptions {
    pub failing_insights: bool,
    pub insight_delay: Option<Duration>,
    pub market_delay: Option<Duration>,
    pub stage_timeout: Option<Duration>,
    pub configured_key: Option<String>,
    pub max_concurrent_sessions: Option<usize>,
}

/// A service over in-memory data writing into a temporary directory
///
/// AAPL and MSFT have a full year of 2024 bars; anything else is unknown.
pub struct Fixture {
    pub service: AnalysisService,
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<ReportStore>,
    pub broadcaster: ProgressBroadcaster,
    pub runner: PipelineRunner,
    pub factory: Arc<FakeInsightFactory>,
    _dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new(options: FixtureOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut builder = ServerConfig::builder()
            .reports_dir(dir.path().join("reports"))
            .charts_dir(dir.path().join("charts"));
        if let Some(timeout) = options.stage_timeout {
            builder = builder.stage_timeout(timeout);
        }
        if let Some(key) = options.configured_key {
            builder = builder.gemini_api_key(key);
        }
        if let Some(max) = options.max_concurrent_sessions {
            builder = builder.max_concurrent_sessions(max);
        }
        let config = builder.build().unwrap();

        let days = (end() - start()).num_days();
        let data = InMemoryMarketData::new()
            .with_synthetic("AAPL", end(), days, 150.0)
            .with_synthetic("MSFT", end(), days, 310.0);
        let market: Arc<dyn MarketDataSource> = match options.market_delay {
            Some(delay) => Arc::new(SlowMarket { inner: data, delay }),
            None => Arc::new(data),
        };

        let factory = Arc::new(FakeInsightFactory {
            fail: options.failing_insights,
            delay: options.insight_delay,
            keys: Mutex::default(),
        });

        let service = AnalysisService::with_components(
            config.clone(),
            market,
            Arc::new(SeriesChartRenderer::new()),
            Arc::clone(&factory) as Arc<dyn InsightProviderFactory>,
        )
        .unwrap();

        Self {
            registry: Arc::clone(&service.registry),
            store: Arc::clone(&service.store),
            broadcaster: service.broadcaster.clone(),
            runner: service.runner.clone(),
            service,
            config,
            factory,
            _dir: dir,
        }
    }

    pub fn service(&self) -> AnalysisService {
        self.service.clone()
    }

    pub fn subject(&self, symbol: &str) -> SubjectParameters {
        SubjectParameters {
            symbol: symbol.to_string(),
            range: DateRange::new(start(), end()).unwrap(),
        }
    }

    pub fn request(&self, symbol: &str) -> AnalyzeRequest {
        AnalyzeRequest::new(symbol).with_dates(Some(start().to_string()), Some(end().to_string()))
    }
}

/// Poll until the session reaches a terminal status
pub async fn wait_for_terminal(service: &AnalysisService, id: SessionId) -> Session {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let session = service.status(id).unwrap();
            if session.status.is_terminal() {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap()
}
