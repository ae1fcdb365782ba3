//! Connection quality scoring.
//!
//! A [`QualityAssessor`] keeps a bounded window of probe outcomes (by default
//! the last 10 samples, none older than 60 seconds) and turns it into a
//! [`QualityReport`]: a 0 to 100 score plus a [`QualityRating`].
//!
//! # Scoring
//!
//! ```text
//! score = 100 * (0.5 * success_rate + 0.3 * latency + 0.2 * stability)
//! ```
//!
//! - `success_rate`: successful samples over all samples in the window
//! - `latency`: 1.0 at or below the latency floor, 0.0 at or above the
//!   ceiling, linear in between; computed from successful samples only
//! - `stability`: outcome flips and latency spread, measured over the newer
//!   half of the window once it holds four or more samples
//!
//! A window with no successful sample always scores 0.
//!
//! | Score | Rating |
//! |-------|--------|
//! | 85..=100 | `Excellent` |
//! | 60..=84 | `Good` |
//! | 1..=59 | `Poor` |
//! | 0 | `Offline` |

mod assessor;
mod report;
mod sample;
mod status;

pub use assessor::{QualityAssessor, QualityConfig, QualityConfigBuilder};
pub use report::{QualityFactors, QualityRating, QualityReport};
pub use sample::QualitySample;
pub use status::ConnectionStatus;
