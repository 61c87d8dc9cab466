//! Continuum estimation and flattening on the log grid.

use crate::domain::ValidRange;
use crate::numerics::{NaturalCubicSpline, gaussian_filter_mirror, interpolate_linear, median};

const MIN_SPLINE_KNOTS: usize = 3;
const AUTO_SIGMA_DIVISOR: f64 = 25.0;
const AUTO_SIGMA_MIN: f64 = 10.0;
const AUTO_SIGMA_MAX: f64 = 100.0;

/// Spline continuum through block-averaged `log10` flux of the valid bins.
///
/// Blocks are `min(N / knots, usable / 3)` bins wide across the valid range;
/// each block with at least one positive valid sample becomes a knot at its
/// mean bin position. Returns `None` with fewer than three knots.
pub fn spline_continuum(flux: &[f64], valid: &[bool], knots: usize) -> Option<Vec<f64>> {
    let range = ValidRange::of(valid)?;
    let block = (flux.len() / knots.max(1))
        .min(range.len() / MIN_SPLINE_KNOTS)
        .max(1);

    let mut knots_x = Vec::new();
    let mut knots_y = Vec::new();
    let mut start = range.start;
    while start < range.end {
        let end = (start + block).min(range.end);
        let (mut position_sum, mut log_sum, mut count) = (0.0, 0.0, 0usize);
        for bin in start..end {
            if valid[bin] && flux[bin] > 0.0 {
                position_sum += bin as f64;
                log_sum += flux[bin].log10();
                count += 1;
            }
        }
        if count > 0 {
            knots_x.push(position_sum / count as f64);
            knots_y.push(log_sum / count as f64);
        }
        start = end;
    }

    if knots_x.len() < MIN_SPLINE_KNOTS {
        return None;
    }

    tracing::debug!(knots = knots_x.len(), block, "fitted spline continuum");
    let spline = NaturalCubicSpline::fit(&knots_x, &knots_y)?;
    Some(
        (0..flux.len())
            .map(|bin| 10f64.powf(spline.evaluate(bin as f64)))
            .collect(),
    )
}

/// Automatic Gaussian width: `N / 25` scaled by how noisy the valid flux
/// looks, clamped to `[10, 100]` bins.
pub fn auto_gaussian_sigma(flux: &[f64], valid: &[bool]) -> f64 {
    let values: Vec<f64> = flux
        .iter()
        .zip(valid)
        .filter_map(|(value, flag)| flag.then_some(*value))
        .collect();

    let noise_factor = match median(&values) {
        Some(center) if center > 0.0 && values.len() > 1 => {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance = values
                .iter()
                .map(|value| (value - mean).powi(2))
                .sum::<f64>()
                / values.len() as f64;
            (1.0 + 0.2 * (variance.sqrt() / center - 0.1)).clamp(0.7, 1.5)
        }
        _ => 1.0,
    };

    (flux.len() as f64 / AUTO_SIGMA_DIVISOR * noise_factor).clamp(AUTO_SIGMA_MIN, AUTO_SIGMA_MAX)
}

/// Gaussian low-pass continuum over the valid range. Interior invalid bins
/// are bridged linearly before filtering; bins outside the range copy the
/// nearest edge value.
pub fn gaussian_continuum(flux: &[f64], valid: &[bool], sigma: f64) -> Option<Vec<f64>> {
    let range = ValidRange::of(valid)?;
    let positions: Vec<f64> = (range.start..range.end)
        .filter(|bin| valid[*bin])
        .map(|bin| bin as f64)
        .collect();
    let values: Vec<f64> = positions.iter().map(|bin| flux[*bin as usize]).collect();

    let core: Vec<f64> = if positions.len() == 1 {
        vec![values[0]; range.len()]
    } else {
        (range.start..range.end)
            .map(|bin| {
                if valid[bin] {
                    Some(flux[bin])
                } else {
                    interpolate_linear(bin as f64, &positions, &values)
                }
            })
            .collect::<Option<Vec<f64>>>()?
    };

    let smoothed = gaussian_filter_mirror(&core, sigma);
    let first = smoothed[0];
    let last = smoothed[smoothed.len() - 1];
    Some(
        (0..flux.len())
            .map(|bin| {
                if bin < range.start {
                    first
                } else if bin >= range.end {
                    last
                } else {
                    smoothed[bin - range.start]
                }
            })
            .collect(),
    )
}

/// `flux / continuum - 1` on valid bins, shifted to zero mean over them.
/// Bins whose continuum is not positive are dropped from `valid`; invalid
/// bins are zero.
pub fn flatten(flux: &[f64], continuum: &[f64], valid: &mut [bool]) -> Vec<f64> {
    let mut flat = vec![0.0; flux.len()];
    let mut sum = 0.0;
    let mut count = 0usize;
    for bin in 0..flux.len() {
        if !valid[bin] {
            continue;
        }
        if !(continuum[bin] > 0.0) || !continuum[bin].is_finite() {
            valid[bin] = false;
            continue;
        }
        flat[bin] = flux[bin] / continuum[bin] - 1.0;
        sum += flat[bin];
        count += 1;
    }

    if count > 0 {
        let mean = sum / count as f64;
        for (value, flag) in flat.iter_mut().zip(valid.iter()) {
            if *flag {
                *value -= mean;
            }
        }
    }
    flat
}
