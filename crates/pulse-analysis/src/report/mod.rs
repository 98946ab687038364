//! HTML report rendering

pub mod markdown;

use crate::chart::ChartAsset;
use crate::error::Result;
use crate::indicators::IndicatorSet;
use crate::market::DateRange;
use crate::patterns::PatternAnalysis;
use crate::signals::TradingSignals;
use chrono::{DateTime, Utc};
use minijinja::{Environment, Value, context};
use serde::Serialize;

const TEMPLATE_NAME: &str = "report.html";
const TEMPLATE: &str = include_str!("template.html");

/// Everything a report is rendered from
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub symbol: &'a str,
    pub range: &'a DateRange,
    pub indicators: &'a IndicatorSet,
    pub patterns: &'a PatternAnalysis,
    pub signals: &'a TradingSignals,
    /// Markdown briefing; the section is omitted when absent
    pub insights: Option<&'a str>,
    pub charts: &'a [ChartAsset],
    pub generated_at: DateTime<Utc>,
}

/// A rendered, self-contained HTML report
#[derive(Debug, Clone, Serialize)]
pub struct ReportArtifact {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub has_insights: bool,
    /// Latest close the report was computed at
    pub last_close: f64,
    pub signals: TradingSignals,
    #[serde(skip)]
    pub html: String,
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_filter("money", money);
    env.add_filter("num", num);
    env.add_filter("pct", pct);
    env.add_template(TEMPLATE_NAME, TEMPLATE)?;
    Ok(env)
}

/// Render the report
pub fn render(input: &ReportInput<'_>) -> Result<ReportArtifact> {
    let env = environment()?;
    let template = env.get_template(TEMPLATE_NAME)?;

    let insights = input.insights.map(str::trim).filter(|text| !text.is_empty());
    let insights_html = insights.map_or(Value::from(()), |text| {
        Value::from_safe_string(markdown::to_html(text))
    });

    let charts: Vec<Value> = input
        .charts
        .iter()
        .map(|chart| {
            context! {
                name => chart.name.clone(),
                title => chart.title.clone(),
                svg => Value::from_safe_string(chart.svg.clone()),
            }
        })
        .collect();

    let html = template.render(context! {
        symbol => input.symbol,
        start => input.range.start.to_string(),
        end => input.range.end.to_string(),
        generated_at => input.generated_at.format("%B %d, %Y at %I:%M %p UTC").to_string(),
        indicators => Value::from_serialize(input.indicators),
        patterns => Value::from_serialize(input.patterns),
        signals => Value::from_serialize(input.signals),
        insights_html => insights_html,
        charts => charts,
    })?;

    Ok(ReportArtifact {
        symbol: input.symbol.to_string(),
        generated_at: input.generated_at,
        has_insights: insights.is_some(),
        last_close: input.indicators.current_price,
        signals: input.signals.clone(),
        html,
    })
}

/// `1234.5` -> `1,234.50`
fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, ""));

    let mut grouped = String::new();
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

fn money(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let text = group_thousands(v, 2);
            match text.strip_prefix('-') {
                Some(rest) => format!("-${rest}"),
                None => format!("${text}"),
            }
        },
        _ => "N/A".to_string(),
    }
}

fn num(value: Option<f64>, decimals: Option<usize>) -> String {
    match value {
        Some(v) if v.is_finite() => group_thousands(v, decimals.unwrap_or(2)),
        _ => "N/A".to_string(),
    }
}

fn pct(value: Option<f64>, decimals: Option<usize>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}%", decimals.unwrap_or(2), v),
        _ => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{self, test_support::year_series};
    use crate::{patterns, signals};
    use chrono::{NaiveDate, TimeZone};

    fn render_with(insights: Option<&str>, charts: &[ChartAsset]) -> ReportArtifact {
        let series = year_series();
        let set = indicators::compute(&series).unwrap();
        let analysis = patterns::analyze(&series, &set).unwrap();
        let trading = signals::generate(&set);
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap();

        render(&ReportInput {
            symbol: "TEST",
            range: &range,
            indicators: &set,
            patterns: &analysis,
            signals: &trading,
            insights,
            charts,
            generated_at: Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 0).unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn test_report_sections() {
        let artifact = render_with(None, &[]);
        let html = &artifact.html;

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("TEST"));
        assert!(html.contains("Period: 2023-01-01 to 2024-01-01"));
        assert!(html.contains("January 02, 2024 at 03:04 PM UTC"));
        assert!(html.contains("Key Metrics"));
        assert!(html.contains("Fib 0.618"));
        assert!(html.contains("Pivot Point"));
        assert!(!html.contains("AI-Powered Insights"));
        assert!(!html.contains("class=\"chart-container\""));
        assert!(!artifact.has_insights);
    }

    #[test]
    fn test_report_with_insights_and_charts() {
        let chart = ChartAsset {
            name: "price".to_string(),
            title: "Price".to_string(),
            svg_path: "price.svg".into(),
            data_path: "price.json".into(),
            svg: "<svg><polyline points=\"0,0 1,1\"/></svg>".to_string(),
        };
        let artifact = render_with(Some("## Outlook\n\n**Strong** <b>trend</b>"), &[chart]);
        let html = &artifact.html;

        assert!(artifact.has_insights);
        assert!(html.contains("AI-Powered Insights"));
        assert!(html.contains("<h2>Outlook</h2>"));
        assert!(html.contains("<strong>Strong</strong> &lt;b&gt;trend&lt;/b&gt;"));
        assert!(html.contains("<svg><polyline points=\"0,0 1,1\"/></svg>"));
    }

    #[test]
    fn test_blank_insights_omitted() {
        let artifact = render_with(Some("   "), &[]);
        assert!(!artifact.has_insights);
        assert!(!artifact.html.contains("AI-Powered Insights"));
    }

    #[test]
    fn test_number_filters() {
        assert_eq!(money(Some(1234.5)), "$1,234.50");
        assert_eq!(money(Some(-0.5)), "-$0.50");
        assert_eq!(money(None), "N/A");
        assert_eq!(num(Some(1_234_567.891), Some(1)), "1,234,567.9");
        assert_eq!(num(Some(f64::NAN), None), "N/A");
        assert_eq!(pct(Some(12.345), None), "12.35%");
        assert_eq!(group_thousands(999.0, 0), "999");
    }
}
