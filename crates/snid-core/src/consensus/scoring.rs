//! Group scores, combined redshifts and the categorical verdicts.

use crate::common::config::ConsensusConfig;
use crate::domain::{ConfidenceLevel, MatchRecord, QualityLevel, RedshiftSpanQuality};
use crate::numerics::{stable_sum, stable_weighted_mean, stable_weighted_sum};

/// Floor applied to redshift errors before they become weights.
pub const MIN_REDSHIFT_ERROR: f64 = 1.0e-6;

/// Mean of the `top_n` highest qualities, damped by `penalty` for each
/// missing member when fewer than `top_n` are available.
pub fn group_score(qualities: &[f64], top_n: usize, penalty: f64) -> f64 {
    if qualities.is_empty() || top_n == 0 {
        return 0.0;
    }

    let mut sorted = qualities.to_vec();
    sorted.sort_by(|lhs, rhs| rhs.total_cmp(lhs));
    sorted.truncate(top_n);

    let mean = stable_sum(&sorted) / sorted.len() as f64;
    let missing = top_n - sorted.len();
    mean * penalty.powi(missing as i32)
}

/// Inverse-variance weighted redshift and its uncertainty.
///
/// The uncertainty adds the formal error of the weighted mean and the
/// weighted scatter of the members in quadrature.
pub fn combine_redshifts(members: &[&MatchRecord]) -> Option<(f64, f64)> {
    let redshifts: Vec<f64> = members.iter().map(|record| record.redshift).collect();
    let weights: Vec<f64> = members
        .iter()
        .map(|record| record.redshift_error.max(MIN_REDSHIFT_ERROR).powi(-2))
        .collect();

    let mean = stable_weighted_mean(&redshifts, &weights)?;
    let total_weight = stable_sum(&weights);
    let squared_offsets: Vec<f64> = redshifts.iter().map(|z| (z - mean).powi(2)).collect();
    let scatter = stable_weighted_sum(&squared_offsets, &weights)? / total_weight;

    Some((mean, (1.0 / total_weight + scatter).sqrt()))
}

/// Winner's lead measured as a fraction of the runner-up score.
pub fn confidence_level(winner: f64, runner_up: Option<f64>) -> ConfidenceLevel {
    let Some(runner_up) = runner_up else {
        return ConfidenceLevel::High;
    };
    if winner <= 0.0 {
        return ConfidenceLevel::VeryLow;
    }
    if runner_up <= 0.0 {
        return ConfidenceLevel::High;
    }

    let margin = (winner - runner_up) / runner_up;
    if margin >= 0.30 {
        ConfidenceLevel::High
    } else if margin >= 0.15 {
        ConfidenceLevel::Medium
    } else if margin >= 0.05 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::VeryLow
    }
}

pub fn quality_level(score: f64, config: &ConsensusConfig) -> QualityLevel {
    if score >= config.high_quality_score {
        QualityLevel::High
    } else if score >= config.medium_quality_score {
        QualityLevel::Medium
    } else {
        QualityLevel::Low
    }
}

pub fn span_quality(span: f64, tolerance: f64) -> RedshiftSpanQuality {
    if span <= tolerance {
        RedshiftSpanQuality::Tight
    } else if span <= 2.0 * tolerance {
        RedshiftSpanQuality::Moderate
    } else if span <= 4.0 * tolerance {
        RedshiftSpanQuality::Loose
    } else {
        RedshiftSpanQuality::VeryLoose
    }
}
