//! Command-line interface for market-pulse

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use pulse_analysis::{InMemoryMarketData, SeriesChartRenderer, Signal};
use pulse_server::pipeline::GeminiProviderFactory;
use pulse_server::service::validate_request;
use pulse_server::{
    AnalysisService, AnalyzeRequest, ReportHandle, ServerConfig, View, ViewController,
    WatchOptions, watch_session,
};
use pulse_utils::config::process_env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "market-pulse")]
#[command(about = "Technical analysis reports for stocks, crypto and commodities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind, overrides PULSE_BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },
    /// Analyse one symbol in-process and write its report
    Analyze {
        /// Ticker symbol, e.g. AAPL, BTC-USD or GC=F
        symbol: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
        /// Gemini API key for AI insights, overrides GEMINI_API_KEY
        #[arg(long)]
        api_key: Option<String>,
        /// Where to copy the HTML report
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Use a synthetic price series instead of Yahoo Finance
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = pulse_utils::Config::from_env(&process_env)?
        .with_default_filter("info,pulse_server=info,pulse_analysis=info");
    pulse_utils::init_tracing_with(&log_config);

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env(&process_env).context("invalid server configuration")?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            serve(config).await
        },
        Command::Analyze {
            symbol,
            start,
            end,
            api_key,
            output,
            offline,
        } => {
            let mut request = AnalyzeRequest::new(symbol).with_dates(start, end);
            if let Some(key) = api_key {
                request = request.with_api_key(key);
            }
            analyze(config, request, output, offline).await
        },
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let service = AnalysisService::new(config)?;
    let retention = service.spawn_retention();

    info!(
        bind_addr = %service.config().bind_addr,
        reports_dir = %service.config().reports_dir.display(),
        max_concurrent_sessions = service.config().max_concurrent_sessions,
        "Starting market-pulse"
    );

    pulse_server::api::serve(service, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Could not listen for shutdown signal");
        }
    })
    .await?;

    if let Some(task) = retention {
        task.abort();
    }
    Ok(())
}

fn offline_service(config: ServerConfig, request: &AnalyzeRequest) -> anyhow::Result<AnalysisService> {
    let today = Utc::now().date_naive();
    let subject = validate_request(request, today, config.analysis.default_lookback_days)?;
    let market = InMemoryMarketData::new().with_synthetic(
        subject.symbol,
        subject.range.end,
        subject.range.days(),
        100.0,
    );

    Ok(AnalysisService::with_components(
        config,
        Arc::new(market),
        Arc::new(SeriesChartRenderer::new()),
        Arc::new(GeminiProviderFactory),
    )?)
}

async fn analyze(
    config: ServerConfig,
    request: AnalyzeRequest,
    output: Option<PathBuf>,
    offline: bool,
) -> anyhow::Result<()> {
    let service = if offline {
        offline_service(config, &request)?
    } else {
        AnalysisService::new(config)?
    };

    let mut controller = ViewController::new();
    let id = match service.submit(request) {
        Ok(id) => id,
        Err(e) => {
            controller.submission_rejected(e.to_string());
            anyhow::bail!(e);
        },
    };
    controller.submission_accepted(id);
    println!("Session {id}");

    let options = WatchOptions {
        poll_interval: Duration::from_secs(1),
        completion_delay: Duration::ZERO,
    };
    let view = watch_session(&service, &mut controller, &options, |view| {
        if let View::Progress {
            progress,
            step,
            error: None,
            ..
        } = view
        {
            println!("[{progress:>3}%] {step}");
        }
    })
    .await?;

    match view {
        View::Report { handle, .. } => {
            print_summary(&handle);
            let report = service.report(id).await?;
            if let Some(path) = output {
                tokio::fs::write(&path, &report.html)
                    .await
                    .with_context(|| format!("could not write {}", path.display()))?;
                println!("Report written to {}", path.display());
            } else {
                println!("Report written to {}", handle.path.display());
            }
            Ok(())
        },
        View::Progress {
            error: Some(error), ..
        } => {
            controller.acknowledge_error();
            anyhow::bail!(error)
        },
        other => anyhow::bail!("analysis ended in an unexpected state: {other:?}"),
    }
}

fn print_summary(handle: &ReportHandle) {
    let Some(summary) = &handle.summary else {
        return;
    };

    let (signal, color) = match summary.overall {
        Some(Signal::Buy) => ("BUY".to_string(), Color::Green),
        Some(Signal::Sell) => ("SELL".to_string(), Color::Red),
        Some(Signal::Hold) => ("HOLD".to_string(), Color::DarkYellow),
        None => ("n/a".to_string(), Color::Grey),
    };

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Last Close").fg(Color::Green),
        Cell::new("Signal").fg(Color::Green),
        Cell::new("Confidence").fg(Color::Green),
        Cell::new("Bullish").fg(Color::Green),
        Cell::new("Bearish").fg(Color::Green),
        Cell::new("AI Insights").fg(Color::Green),
    ]);
    table.add_row(vec![
        Cell::new(format!("{:.2}", summary.last_close)),
        Cell::new(signal).fg(color),
        Cell::new(format!("{:.0}%", summary.confidence)),
        Cell::new(summary.bullish),
        Cell::new(summary.bearish),
        Cell::new(if summary.has_insights { "yes" } else { "no" }),
    ]);

    println!("{table}");
}
