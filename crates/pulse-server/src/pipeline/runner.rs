//! Drives one session through every stage

use super::{InsightProviderFactory, Stage};
use crate::broadcaster::{ProgressBroadcaster, ProgressEnvelope, ProgressEvent};
use crate::config::ServerConfig;
use crate::error::{Result, ServiceError};
use crate::registry::SessionRegistry;
use crate::session::{ReportHandle, Session, SessionId};
use crate::store::ReportStore;
use chrono::Utc;
use pulse_analysis::insights::InsightContext;
use pulse_analysis::market::fetch_series;
use pulse_analysis::{
    ChartRenderer, ChartRequest, InsightGenerator, MarketDataSource, ReportInput, indicators,
    patterns, report, signals,
};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, warn};

/// Executes analysis sessions
///
/// Cheap to clone; every clone shares the same registry, store, broadcaster
/// and concurrency permits.
#[derive(Clone)]
pub struct PipelineRunner {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    store: Arc<ReportStore>,
    broadcaster: ProgressBroadcaster,
    market: Arc<dyn MarketDataSource>,
    charts: Arc<dyn ChartRenderer>,
    insights: Arc<dyn InsightProviderFactory>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("market", &self.market.name())
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

/// Per-run bookkeeping
struct Run {
    id: SessionId,
    seq: u64,
    stage: Stage,
}

impl PipelineRunner {
    pub fn new(
        config: Arc<ServerConfig>,
        registry: Arc<SessionRegistry>,
        store: Arc<ReportStore>,
        broadcaster: ProgressBroadcaster,
        market: Arc<dyn MarketDataSource>,
        charts: Arc<dyn ChartRenderer>,
        insights: Arc<dyn InsightProviderFactory>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_sessions));
        Self {
            config,
            registry,
            store,
            broadcaster,
            market,
            charts,
            insights,
            permits,
        }
    }

    /// Run session `id` to a terminal status
    ///
    /// Waits for a concurrency permit first; the session stays `PENDING`
    /// meanwhile. `credential` enables AI insights for this run only.
    pub async fn run(self, id: SessionId, credential: Option<String>) {
        let span = tracing::info_span!("analysis", session_id = %id);
        self.run_to_end(id, credential).instrument(span).await;
    }

    async fn run_to_end(&self, id: SessionId, credential: Option<String>) {
        let mut run = Run {
            id,
            seq: 0,
            stage: Stage::Init,
        };

        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            self.fail(&mut run, ServiceError::StageFailure {
                stage: Stage::Init,
                detail: "analysis service is shutting down".to_string(),
            });
            return;
        };

        let session = match self.registry.claim(id) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session could not be claimed, skipping run");
                return;
            },
        };

        let symbol = session.subject.symbol.clone();
        info!(%symbol, range = %session.subject.range, "Analysis started");
        let started = Instant::now();

        match self.execute(&mut run, &session, credential).await {
            Ok(handle) => info!(
                %symbol,
                report = %handle.path.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Analysis complete"
            ),
            Err(e) => self.fail(&mut run, e),
        }
    }

    async fn execute(
        &self,
        run: &mut Run,
        session: &Session,
        credential: Option<String>,
    ) -> Result<ReportHandle> {
        let subject = &session.subject;
        let symbol = subject.symbol.as_str();

        self.step(run, Stage::Init.floor(), Stage::Init.label())?;
        let generator = self.insight_generator(credential.as_deref());
        self.finish_stage(run, Stage::Init)?;

        let today = Utc::now().date_naive();
        let include_intraday = self.config.analysis.include_intraday;
        let series = self
            .stage(
                run,
                Stage::Fetch,
                fetch_series(self.market.as_ref(), symbol, &subject.range, include_intraday, today),
            )
            .await?;
        debug!(bars = series.len(), intraday = series.includes_intraday, "Series loaded");
        self.finish_stage(run, Stage::Fetch)?;

        let indicators = self
            .stage(run, Stage::Indicators, async { indicators::compute(&series) })
            .await?;
        self.finish_stage(run, Stage::Indicators)?;

        let patterns = self
            .stage(run, Stage::PatternAnalysis, async {
                patterns::analyze(&series, &indicators)
            })
            .await?;
        self.finish_stage(run, Stage::PatternAnalysis)?;

        let signals = signals::generate(&indicators);
        debug!(overall = ?signals.overall, confidence = signals.confidence, "Signals generated");
        run.stage = Stage::Signals;
        self.finish_stage(run, Stage::Signals)?;

        let insights = match generator {
            Some(generator) => {
                let context = InsightContext {
                    symbol,
                    range: &subject.range,
                    indicators: &indicators,
                    patterns: &patterns,
                    signals: &signals,
                };
                match self.stage(run, Stage::AiInsights, generator.generate(&context)).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(stage = %Stage::AiInsights, error = %e, "Optional stage failed, continuing without AI insights");
                        None
                    },
                }
            },
            None => {
                info!("No insight credential, skipping AI insights");
                None
            },
        };
        self.finish_stage(run, Stage::AiInsights)?;

        let id = run.id;
        let handle = self
            .stage(run, Stage::Report, async {
                let chart_dir = self.config.charts_dir.join(id.to_string());
                let charts = self
                    .charts
                    .render(&ChartRequest {
                        series: &series,
                        indicators: &indicators,
                        patterns: &patterns,
                        output_dir: &chart_dir,
                    })
                    .await?;

                let artifact = report::render(&ReportInput {
                    symbol,
                    range: &subject.range,
                    indicators: &indicators,
                    patterns: &patterns,
                    signals: &signals,
                    insights: insights.as_deref(),
                    charts: &charts,
                    generated_at: Utc::now(),
                })?;

                self.store.put(id, &artifact).await
            })
            .await?;

        if let Err(e) = self.registry.update(id, |s| s.complete(handle.clone())) {
            // Keep a report from outliving a session that never completed.
            if let Err(cleanup) = self.store.remove(id).await {
                warn!(error = %cleanup, "Could not remove orphaned report");
            }
            return Err(e);
        }
        self.publish(run, ProgressEvent::Complete {
            report_handle: handle.clone(),
        });

        Ok(handle)
    }

    fn insight_generator(&self, credential: Option<&str>) -> Option<InsightGenerator> {
        let key = credential.map(str::trim).filter(|k| !k.is_empty())?;
        match self.insights.create(key) {
            Ok(provider) => Some(InsightGenerator::new(provider, &self.config.analysis)),
            Err(e) => {
                warn!(
                    error = %e,
                    credential_error = e.is_credential_error(),
                    "Insight provider unavailable, AI insights will be skipped"
                );
                None
            },
        }
    }

    /// Run one stage's work, applying the configured time limit
    async fn stage<T, E, F>(&self, run: &mut Run, stage: Stage, work: F) -> Result<T>
    where
        E: Display,
        F: Future<Output = std::result::Result<T, E>>,
    {
        run.stage = stage;
        let started = Instant::now();

        let outcome = match self.config.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome.map_err(|e| e.to_string()),
                Err(_) => Err(format!("timed out after {limit:?}")),
            },
            None => work.await.map_err(|e| e.to_string()),
        };

        debug!(
            %stage,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Stage finished"
        );
        outcome.map_err(|detail| ServiceError::StageFailure { stage, detail })
    }

    /// Record a finished stage and announce the next one
    fn finish_stage(&self, run: &mut Run, stage: Stage) -> Result<()> {
        let next = stage.next().unwrap_or(Stage::Report);
        self.step(run, stage.floor(), next.label())
    }

    fn step(&self, run: &mut Run, progress: u8, label: &str) -> Result<()> {
        let ((), session) = self.registry.update(run.id, |s| s.advance(progress, label))?;
        self.publish(run, ProgressEvent::Progress {
            progress: session.progress,
            step: session.current_step,
        });
        Ok(())
    }

    fn fail(&self, run: &mut Run, err: ServiceError) {
        let (stage, detail) = match err {
            ServiceError::StageFailure { stage, detail } => (stage, detail),
            other => (run.stage, other.to_string()),
        };
        error!(%stage, error = %detail, "Analysis failed");

        // Only the transition that actually ended the session may announce it.
        if let Err(e) = self.registry.update(run.id, |s| s.fail(stage, detail.clone())) {
            error!(error = %e, "Could not record session failure");
            return;
        }
        self.publish(run, ProgressEvent::Error {
            stage: stage.to_string(),
            detail,
        });
    }

    fn publish(&self, run: &mut Run, event: ProgressEvent) {
        run.seq += 1;
        self.broadcaster.publish(ProgressEnvelope {
            session_id: run.id,
            seq: run.seq,
            event,
        });
    }
}
