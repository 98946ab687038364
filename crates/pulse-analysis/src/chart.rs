//! Chart assets for reports
//!
//! Charts are plain SVG documents drawn from the indicator lines, paired with
//! the JSON data they were drawn from. Both are written to the run's chart
//! directory; the SVG markup is also embedded into the HTML report.

use crate::error::{AnalysisError, Result};
use crate::indicators::{IndicatorSet, Line};
use crate::market::PriceSeries;
use crate::patterns::PatternAnalysis;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 320.0;
const MARGIN: f64 = 40.0;

/// Inputs for one rendering pass
#[derive(Debug, Clone, Copy)]
pub struct ChartRequest<'a> {
    pub series: &'a PriceSeries,
    pub indicators: &'a IndicatorSet,
    pub patterns: &'a PatternAnalysis,
    pub output_dir: &'a Path,
}

/// A rendered chart
#[derive(Debug, Clone, Serialize)]
pub struct ChartAsset {
    pub name: String,
    pub title: String,
    pub svg_path: PathBuf,
    pub data_path: PathBuf,
    #[serde(skip)]
    pub svg: String,
}

/// Produces chart assets for an analysis
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, request: &ChartRequest<'_>) -> Result<Vec<ChartAsset>>;
}

/// Renders the standard chart set as SVG plus JSON data
#[derive(Debug, Clone, Default)]
pub struct SeriesChartRenderer;

struct Plot<'a> {
    name: &'static str,
    title: String,
    lines: Vec<(&'static str, &'static str, &'a [Option<f64>])>,
    levels: Vec<(String, &'static str, f64)>,
}

impl SeriesChartRenderer {
    pub fn new() -> Self {
        Self
    }

    fn plots<'a>(request: &'a ChartRequest<'a>, closes: &'a [Option<f64>], volume: &'a [Option<f64>]) -> Vec<Plot<'a>> {
        let symbol = &request.series.symbol;
        let ind = &request.indicators.series;
        let patterns = request.patterns;

        let mut levels: Vec<(String, &'static str, f64)> = patterns
            .fibonacci
            .levels
            .iter()
            .map(|l| (format!("Fib {}", l.label), "#f59e0b", l.price))
            .collect();
        let sr = &patterns.support_resistance;
        levels.extend([
            ("Pivot".to_string(), "#8b5cf6", sr.pivot),
            ("R1".to_string(), "#ef4444", sr.resistance_1),
            ("S1".to_string(), "#10b981", sr.support_1),
        ]);

        vec![
            Plot {
                name: "price",
                title: format!("{symbol} - Price with Moving Averages and Bollinger Bands"),
                lines: vec![
                    ("Close", "#1f2937", closes),
                    ("SMA 20", "#3b82f6", ind.trend.sma_20.as_slice()),
                    ("SMA 50", "#f97316", ind.trend.sma_50.as_slice()),
                    ("SMA 200", "#dc2626", ind.trend.sma_200.as_slice()),
                    ("BB Upper", "#9ca3af", ind.volatility.bb_upper.as_slice()),
                    ("BB Lower", "#9ca3af", ind.volatility.bb_lower.as_slice()),
                ],
                levels: Vec::new(),
            },
            Plot {
                name: "macd",
                title: format!("{symbol} - MACD"),
                lines: vec![
                    ("MACD", "#2563eb", ind.trend.macd.as_slice()),
                    ("Signal", "#dc2626", ind.trend.macd_signal.as_slice()),
                    ("Histogram", "#9ca3af", ind.trend.macd_histogram.as_slice()),
                ],
                levels: vec![("Zero".to_string(), "#d1d5db", 0.0)],
            },
            Plot {
                name: "momentum",
                title: format!("{symbol} - RSI and Stochastic"),
                lines: vec![
                    ("RSI", "#7c3aed", ind.momentum.rsi.as_slice()),
                    ("%K", "#0ea5e9", ind.momentum.stoch_k.as_slice()),
                    ("%D", "#f97316", ind.momentum.stoch_d.as_slice()),
                ],
                levels: vec![
                    ("70".to_string(), "#ef4444", 70.0),
                    ("30".to_string(), "#10b981", 30.0),
                ],
            },
            Plot {
                name: "levels",
                title: format!("{symbol} - Fibonacci Retracement and Support/Resistance"),
                lines: vec![("Close", "#1f2937", closes)],
                levels,
            },
            Plot {
                name: "volume",
                title: format!("{symbol} - Volume"),
                lines: vec![("Volume", "#6366f1", volume)],
                levels: Vec::new(),
            },
        ]
    }
}

#[async_trait]
impl ChartRenderer for SeriesChartRenderer {
    async fn render(&self, request: &ChartRequest<'_>) -> Result<Vec<ChartAsset>> {
        tokio::fs::create_dir_all(request.output_dir).await?;

        let closes: Line = request.series.bars.iter().map(|q| Some(q.close)).collect();
        let volume: Line = request
            .indicators
            .series
            .volume
            .volume
            .iter()
            .map(|v| Some(*v))
            .collect();
        let dates = request.series.dates();
        let symbol = request.series.symbol.to_lowercase();

        let mut assets = Vec::new();
        for plot in Self::plots(request, &closes, &volume) {
            let svg = render_svg(&plot)?;
            let data = plot_data(&plot, &dates);

            let svg_path = request.output_dir.join(format!("{symbol}_{}.svg", plot.name));
            let data_path = request.output_dir.join(format!("{symbol}_{}.json", plot.name));
            tokio::fs::write(&svg_path, &svg).await?;
            tokio::fs::write(&data_path, serde_json::to_vec_pretty(&data)?).await?;

            assets.push(ChartAsset {
                name: plot.name.to_string(),
                title: plot.title,
                svg_path,
                data_path,
                svg,
            });
        }

        tracing::debug!(
            symbol = %request.series.symbol,
            charts = assets.len(),
            dir = %request.output_dir.display(),
            "Charts rendered"
        );
        Ok(assets)
    }
}

fn plot_data(plot: &Plot<'_>, dates: &[String]) -> Value {
    let lines: serde_json::Map<String, Value> = plot
        .lines
        .iter()
        .map(|(label, _, values)| ((*label).to_string(), json!(values)))
        .collect();
    let levels: serde_json::Map<String, Value> = plot
        .levels
        .iter()
        .map(|(label, _, value)| (label.clone(), json!(value)))
        .collect();

    json!({
        "name": plot.name,
        "title": plot.title,
        "dates": dates,
        "lines": lines,
        "levels": levels,
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Draw a multi-line chart with horizontal reference levels
fn render_svg(plot: &Plot<'_>) -> Result<String> {
    let values = plot
        .lines
        .iter()
        .flat_map(|(_, _, line)| line.iter().flatten().copied())
        .chain(plot.levels.iter().map(|(_, _, v)| *v))
        .filter(|v| v.is_finite());
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        return Err(AnalysisError::ChartError(format!("no data to plot for {}", plot.name)));
    }
    let span = if (max - min).abs() < f64::EPSILON { 1.0 } else { max - min };
    let len = plot.lines.iter().map(|(_, _, l)| l.len()).max().unwrap_or(0);
    let step = (WIDTH - 2.0 * MARGIN) / (len.saturating_sub(1).max(1)) as f64;
    let y = |v: f64| HEIGHT - MARGIN - (v - min) / span * (HEIGHT - 2.0 * MARGIN);

    let mut svg = String::new();
    let fmt_err = |e: std::fmt::Error| AnalysisError::ChartError(e.to_string());

    write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" class="chart" role="img" aria-label="{title}">"#,
        title = escape(&plot.title)
    )
    .map_err(fmt_err)?;
    write!(
        svg,
        r##"<rect width="100%" height="100%" fill="#ffffff"/><text x="{MARGIN}" y="24" font-size="14" font-weight="600">{}</text>"##,
        escape(&plot.title)
    )
    .map_err(fmt_err)?;

    for (label, color, level) in &plot.levels {
        let ly = y(*level);
        write!(
            svg,
            r#"<line x1="{MARGIN}" x2="{x2}" y1="{ly:.1}" y2="{ly:.1}" stroke="{color}" stroke-dasharray="4 3"/><text x="{tx}" y="{ty:.1}" font-size="10" fill="{color}">{label}</text>"#,
            x2 = WIDTH - MARGIN,
            tx = WIDTH - MARGIN + 2.0,
            ty = ly + 3.0,
            label = escape(label)
        )
        .map_err(fmt_err)?;
    }

    for (index, (label, color, line)) in plot.lines.iter().enumerate() {
        // Break the polyline wherever the indicator has no value.
        let mut segment = String::new();
        for (i, value) in line.iter().enumerate() {
            match value {
                Some(v) if v.is_finite() => {
                    write!(segment, "{:.1},{:.1} ", MARGIN + i as f64 * step, y(*v)).map_err(fmt_err)?;
                },
                _ if !segment.is_empty() => {
                    write!(svg, r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" points="{}"/>"#, segment.trim_end())
                        .map_err(fmt_err)?;
                    segment.clear();
                },
                _ => {},
            }
        }
        if !segment.is_empty() {
            write!(svg, r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" points="{}"/>"#, segment.trim_end())
                .map_err(fmt_err)?;
        }

        write!(
            svg,
            r#"<text x="{x:.1}" y="{ly}" font-size="11" fill="{color}">{label}</text>"#,
            x = MARGIN + index as f64 * 90.0,
            ly = HEIGHT - 12.0
        )
        .map_err(fmt_err)?;
    }

    svg.push_str("</svg>");
    Ok(svg)
}
