//! Canonical progress and status derivation
//!
//! The single place where the measurement formula and the status thresholds
//! live. Every component (KPI check-ins, objective rollups, listings) derives
//! through these three functions; there is no per-component badge logic.

use crate::enums::ProgressStatus;
use crate::error::{NorthstarResult, ValidationError};

/// Progress at or above this is on-track.
pub const ON_TRACK_THRESHOLD: i32 = 90;

/// Progress at or above this (and below [`ON_TRACK_THRESHOLD`]) is at-risk.
pub const AT_RISK_THRESHOLD: i32 = 60;

/// Progress of a measured KPI: `clamp(round(value / target * 100), 0, 100)`.
///
/// A zero target makes the ratio meaningless and is rejected rather than
/// producing an infinity.
pub fn measurement_progress(value: f64, target: f64) -> NorthstarResult<i32> {
    if target == 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "target".to_string(),
            reason: "target must be non-zero".to_string(),
        }
        .into());
    }
    let ratio = value / target * 100.0;
    Ok((ratio.round() as i32).clamp(0, 100))
}

/// Progress of an objective: arithmetic mean of its inputs (linked KPI
/// progress values and direct active-child progress values, each counted
/// once with equal weight), rounded to the nearest integer. An objective
/// with no inputs has progress `0`.
pub fn rollup_progress(inputs: &[i32]) -> i32 {
    if inputs.is_empty() {
        return 0;
    }
    let sum: i64 = inputs.iter().map(|&p| i64::from(p)).sum();
    let mean = sum as f64 / inputs.len() as f64;
    mean.round() as i32
}

/// Derive status from progress. Never returns `Archived`; archival is an
/// explicit override applied by the archival manager, not a derivation.
pub fn status_for_progress(progress: i32) -> ProgressStatus {
    if progress >= ON_TRACK_THRESHOLD {
        ProgressStatus::OnTrack
    } else if progress >= AT_RISK_THRESHOLD {
        ProgressStatus::AtRisk
    } else {
        ProgressStatus::Behind
    }
}

// =============================================================================
// TESTS
// =============================================================================
