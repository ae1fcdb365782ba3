//! Derived quality reports.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coarse rating derived from a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QualityRating {
    /// No usable connectivity.
    #[default]
    Offline,
    /// Reachable but degraded.
    Poor,
    /// Healthy.
    Good,
    /// Healthy, fast and steady.
    Excellent,
}

impl QualityRating {
    /// Lowest score rated [`QualityRating::Excellent`].
    pub const EXCELLENT_MIN: u8 = 85;
    /// Lowest score rated [`QualityRating::Good`].
    pub const GOOD_MIN: u8 = 60;
    /// Lowest score rated [`QualityRating::Poor`].
    pub const POOR_MIN: u8 = 1;

    /// Maps a 0..=100 score onto a rating.
    pub fn from_score(score: u8) -> Self {
        if score >= Self::EXCELLENT_MIN {
            QualityRating::Excellent
        } else if score >= Self::GOOD_MIN {
            QualityRating::Good
        } else if score >= Self::POOR_MIN {
            QualityRating::Poor
        } else {
            QualityRating::Offline
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            QualityRating::Offline => "offline",
            QualityRating::Poor => "poor",
            QualityRating::Good => "good",
            QualityRating::Excellent => "excellent",
        }
    }
}

impl std::fmt::Display for QualityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three inputs to the score, each in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualityFactors {
    /// 1.0 for fast successful probes, 0.0 at or above the latency ceiling.
    pub latency: f64,
    /// Fraction of successful probes in the window.
    pub success_rate: f64,
    /// 1.0 for steady latency and no outcome flips.
    pub stability: f64,
}

/// Point-in-time assessment of the sample window. Never stored; recompute
/// from the window instead.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualityReport {
    /// Weighted score, 0..=100.
    pub score: u8,
    /// Rating derived from `score`.
    pub rating: QualityRating,
    /// Inputs that produced the score.
    pub factors: QualityFactors,
}

impl QualityReport {
    /// Weight of the success rate in the score.
    pub const SUCCESS_WEIGHT: f64 = 0.5;
    /// Weight of the latency factor in the score.
    pub const LATENCY_WEIGHT: f64 = 0.3;
    /// Weight of the stability factor in the score.
    pub const STABILITY_WEIGHT: f64 = 0.2;

    /// The report for an empty or fully failed window.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Combines factors into a report.
    pub fn from_factors(factors: QualityFactors) -> Self {
        let raw = Self::SUCCESS_WEIGHT * factors.success_rate
            + Self::LATENCY_WEIGHT * factors.latency
            + Self::STABILITY_WEIGHT * factors.stability;
        let score = (raw * 100.0).round().clamp(0.0, 100.0) as u8;
        Self {
            score,
            rating: QualityRating::from_score(score),
            factors,
        }
    }
}
