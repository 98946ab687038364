//! Pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of an analysis run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Fetch,
    Indicators,
    PatternAnalysis,
    Signals,
    AiInsights,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Init,
        Stage::Fetch,
        Stage::Indicators,
        Stage::PatternAnalysis,
        Stage::Signals,
        Stage::AiInsights,
        Stage::Report,
    ];

    /// Progress reached once this stage succeeds
    pub fn floor(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Fetch => 15,
            Self::Indicators => 40,
            Self::PatternAnalysis => 70,
            Self::Signals => 90,
            Self::AiInsights => 95,
            Self::Report => 100,
        }
    }

    /// Step text shown while this stage runs
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "Initializing analyzer",
            Self::Fetch => "Fetching market data",
            Self::Indicators => "Calculating technical indicators",
            Self::PatternAnalysis => "Analyzing price patterns",
            Self::Signals => "Generating trading signals",
            Self::AiInsights => "Generating AI insights",
            Self::Report => "Generating report",
        }
    }

    /// Whether a failure here may be skipped
    pub fn is_optional(self) -> bool {
        self == Self::AiInsights
    }

    pub fn next(self) -> Option<Stage> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Fetch => "FETCH",
            Self::Indicators => "INDICATORS",
            Self::PatternAnalysis => "PATTERN_ANALYSIS",
            Self::Signals => "SIGNALS",
            Self::AiInsights => "AI_INSIGHTS",
            Self::Report => "REPORT",
        };
        f.write_str(name)
    }
}
