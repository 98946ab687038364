//! Submission facade over the registry, runner, broadcaster and store

use crate::broadcaster::{EventSubscription, ProgressBroadcaster};
use crate::config::ServerConfig;
use crate::error::{Result, ServiceError};
use crate::pipeline::{GeminiProviderFactory, InsightProviderFactory, PipelineRunner};
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionId, SubjectParameters};
use crate::store::{ReportStore, StoredReport};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use pulse_analysis::symbols::{self, SEARCH_LIMIT};
use pulse_analysis::{
    ChartRenderer, DateRange, MarketDataSource, SeriesChartRenderer, SymbolMatch,
    YahooFinanceClient,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const MAX_SYMBOL_LEN: usize = 20;

static SYMBOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.=^-]+$").expect("valid symbol pattern"));

/// A request to analyse one symbol
#[derive(Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub symbol: String,
    /// `YYYY-MM-DD`, defaults to one lookback period before the end
    #[serde(default)]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, defaults to today
    #[serde(default)]
    pub end_date: Option<String>,
    /// Credential for AI insights, used for this run only
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_dates(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl std::fmt::Debug for AnalyzeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzeRequest")
            .field("symbol", &self.symbol)
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ServiceError::Validation(format!("{field} must be a YYYY-MM-DD date, got {raw:?}")))
}

/// Check a request and turn it into session parameters
pub fn validate_request(
    request: &AnalyzeRequest,
    today: NaiveDate,
    lookback_days: i64,
) -> Result<SubjectParameters> {
    let symbol = request.symbol.trim();
    if symbol.is_empty() {
        return Err(ServiceError::Validation("Symbol is required".to_string()));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(ServiceError::Validation(format!(
            "Symbol must be at most {MAX_SYMBOL_LEN} characters"
        )));
    }
    if !SYMBOL_PATTERN.is_match(symbol) {
        return Err(ServiceError::Validation(format!(
            "Symbol {symbol:?} contains unsupported characters"
        )));
    }

    let end = parse_date("end_date", request.end_date.as_deref())?.unwrap_or(today);
    let start = parse_date("start_date", request.start_date.as_deref())?
        .unwrap_or(end - ChronoDuration::days(lookback_days));
    let range = DateRange::new(start, end).map_err(|e| ServiceError::Validation(e.to_string()))?;

    Ok(SubjectParameters {
        symbol: symbol.to_uppercase(),
        range,
    })
}

/// Entry point for starting and observing analyses
#[derive(Debug, Clone)]
pub struct AnalysisService {
    config: Arc<ServerConfig>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) store: Arc<ReportStore>,
    pub(crate) broadcaster: ProgressBroadcaster,
    pub(crate) runner: PipelineRunner,
}

impl AnalysisService {
    /// Service backed by Yahoo Finance, SVG charts and Gemini insights
    pub fn new(config: ServerConfig) -> Result<Self> {
        let market = Arc::new(YahooFinanceClient::new(&config.analysis));
        Self::with_components(
            config,
            market,
            Arc::new(SeriesChartRenderer::new()),
            Arc::new(GeminiProviderFactory),
        )
    }

    /// Service over explicit collaborators
    pub fn with_components(
        config: ServerConfig,
        market: Arc<dyn MarketDataSource>,
        charts: Arc<dyn ChartRenderer>,
        insights: Arc<dyn InsightProviderFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let registry = Arc::new(SessionRegistry::new());
        let store = Arc::new(ReportStore::new(config.reports_dir.clone(), Arc::clone(&registry)));
        let broadcaster = ProgressBroadcaster::new(config.event_buffer);
        let runner = PipelineRunner::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            Arc::clone(&store),
            broadcaster.clone(),
            market,
            charts,
            insights,
        );

        Ok(Self {
            config,
            registry,
            store,
            broadcaster,
            runner,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Validate `request`, create its session and start the run
    ///
    /// Returns as soon as the session exists; the run continues on the
    /// runtime. Invalid requests create nothing.
    pub fn submit(&self, request: AnalyzeRequest) -> Result<SessionId> {
        let today = Utc::now().date_naive();
        let subject = validate_request(&request, today, self.config.analysis.default_lookback_days)?;

        let credential = request
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.config.gemini_api_key.clone());

        let symbol = subject.symbol.clone();
        let range = subject.range;
        let id = self.registry.create(subject)?;
        tracing::info!(
            session_id = %id,
            %symbol,
            %range,
            insights = credential.is_some(),
            "Analysis submitted"
        );

        tokio::spawn(self.runner.clone().run(id, credential));
        Ok(id)
    }

    /// Current snapshot of a session
    pub fn status(&self, id: SessionId) -> Result<Session> {
        self.registry.get(id)
    }

    /// The finished report of a session
    pub async fn report(&self, id: SessionId) -> Result<StoredReport> {
        self.store.get(id).await
    }

    /// Live progress events of an existing session
    pub fn subscribe(&self, id: SessionId) -> Result<EventSubscription> {
        let subscription = self.broadcaster.subscribe(id);
        self.registry.get(id)?;
        Ok(subscription)
    }

    /// Catalog symbols matching `query`
    pub fn search(&self, query: &str) -> Vec<SymbolMatch> {
        symbols::search(query, SEARCH_LIMIT)
    }

    /// Forget a finished session and delete its report
    pub async fn evict(&self, id: SessionId) -> Result<bool> {
        let session = match self.registry.get(id) {
            Ok(session) => session,
            Err(ServiceError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !session.status.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                id,
                reason: format!("cannot evict a {} session", session.status),
            });
        }

        self.store.remove(id).await?;
        let chart_dir = self.config.charts_dir.join(id.to_string());
        match tokio::fs::remove_dir_all(&chart_dir).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => tracing::warn!(session_id = %id, error = %e, "Could not remove chart directory"),
        }
        Ok(self.registry.remove(id)?.is_some())
    }

    /// Evict every session that finished more than `max_age` ago
    pub async fn sweep(&self, max_age: Duration) -> Result<usize> {
        let mut evicted = 0;
        for id in self.registry.terminal_older_than(max_age)? {
            if self.evict(id).await? {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, "Retention sweep removed finished sessions");
        }
        Ok(evicted)
    }

    /// Periodically sweep finished sessions when retention is configured
    pub fn spawn_retention(&self) -> Option<JoinHandle<()>> {
        let retention = self.config.retention?;
        let period = retention.min(Duration::from_secs(60));
        let service = self.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = service.sweep(retention).await {
                    tracing::warn!(error = %e, "Retention sweep failed");
                }
            }
        }))
    }
}
