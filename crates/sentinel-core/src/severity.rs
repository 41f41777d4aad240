//! Severity formatting for aggregate risk and bias scores.
//!
//! Bands are fixed percentages of the maximum:
//! `<= 30` tier 1, `<= 60` tier 2, `<= 80` tier 3, above that tier 4.
//! The fill used for gauges is clamped to `0..=100`, the label never is.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::RiskTier;

/// Maximum of the aggregate severity scale.
pub const SEVERITY_MAX: f64 = 10.0;

/// How a value is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    /// `"{value}/{max}"`
    #[default]
    Score,
    /// `"{round(value * 100)}%"`, assumes a 0..1 value
    Percentage,
}

/// Display band of a formatted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "t1")]
    Tier1,
    #[serde(rename = "t2")]
    Tier2,
    #[serde(rename = "t3")]
    Tier3,
    #[serde(rename = "t4")]
    Tier4,
}

impl Tier {
    /// Band a percentage of the maximum.
    pub fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p <= 30.0 => Tier::Tier1,
            p if p <= 60.0 => Tier::Tier2,
            p if p <= 80.0 => Tier::Tier3,
            _ => Tier::Tier4,
        }
    }

    /// Gauge color used by the original dashboard.
    pub fn color_hex(self) -> &'static str {
        match self {
            Tier::Tier1 => "#059669",
            Tier::Tier2 => "#d97706",
            Tier::Tier3 => "#ea580c",
            Tier::Tier4 => "#dc2626",
        }
    }
}

impl From<RiskTier> for Tier {
    fn from(risk: RiskTier) -> Self {
        match risk {
            RiskTier::Low => Tier::Tier1,
            RiskTier::Medium => Tier::Tier2,
            RiskTier::High => Tier::Tier3,
            RiskTier::Critical => Tier::Tier4,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Tier1 => "t1",
            Tier::Tier2 => "t2",
            Tier::Tier3 => "t3",
            Tier::Tier4 => "t4",
        };
        f.write_str(name)
    }
}

/// A value ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Severity {
    pub label: String,
    pub tier: Tier,

    /// Gauge fill in percent, clamped to `0..=100`
    pub fill: f64,
}

/// Format `value` against `max`.
pub fn format(value: f64, max: f64, mode: FormatMode) -> Severity {
    let percentage = percentage_of(value, max);
    let label = match mode {
        FormatMode::Score => format!("{}/{}", value, max),
        FormatMode::Percentage => format!("{}%", (value * 100.0).round()),
    };

    Severity {
        label,
        tier: Tier::from_percentage(percentage),
        fill: percentage.clamp(0.0, 100.0),
    }
}

/// Format an aggregate 0..10 severity score.
pub fn format_score(value: f64) -> Severity {
    format(value, SEVERITY_MAX, FormatMode::Score)
}

/// Format a 0..1 ratio as a percentage.
pub fn format_ratio(value: f64) -> Severity {
    format(value, 1.0, FormatMode::Percentage)
}

fn percentage_of(value: f64, max: f64) -> f64 {
    let ratio = value * 100.0 / max;
    if max > 0.0 && ratio.is_finite() {
        ratio
    } else if value > 0.0 {
        100.0
    } else {
        0.0
    }
}
