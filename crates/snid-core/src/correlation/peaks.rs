//! Peak search and peak shape on a circular correlation function.
//!
//! Correlations are indexed by lag with negative lags wrapping to the end of
//! the buffer, as produced by an inverse FFT.

/// Smallest antisymmetric noise level used in `r`.
pub const MIN_ANTISYMMETRIC_SIGMA: f64 = 1.0e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakCandidate {
    pub lag: isize,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedPeak {
    /// Sub-bin lag of the peak.
    pub lag: f64,
    pub height: f64,
    /// Full width at half height, in bins.
    pub width: f64,
}

pub fn at_lag(correlation: &[f64], lag: isize) -> f64 {
    correlation[lag.rem_euclid(correlation.len() as isize) as usize]
}

/// Local maxima inside `[lag_min, lag_max]`, strongest first.
///
/// A lag qualifies when its value is positive, strictly greater than the
/// `window` values to its left and not smaller than the `window` values to
/// its right, so a flat top yields its leftmost lag. Ties in height are
/// broken by the smaller lag.
pub fn find_peaks(
    correlation: &[f64],
    lag_min: isize,
    lag_max: isize,
    window: usize,
    max_peaks: usize,
) -> Vec<PeakCandidate> {
    let window = window as isize;
    let mut peaks: Vec<PeakCandidate> = (lag_min..=lag_max)
        .filter_map(|lag| {
            let height = at_lag(correlation, lag);
            if height <= 0.0 {
                return None;
            }
            let is_peak = (1..=window).all(|offset| {
                at_lag(correlation, lag - offset) < height
                    && at_lag(correlation, lag + offset) <= height
            });
            is_peak.then_some(PeakCandidate { lag, height })
        })
        .collect();

    peaks.sort_by(|lhs, rhs| {
        rhs.height
            .total_cmp(&lhs.height)
            .then_with(|| lhs.lag.cmp(&rhs.lag))
    });
    peaks.truncate(max_peaks);
    peaks
}

/// Three-point parabola through the peak and its neighbours. Falls back to a
/// half-height walk when the curvature is not negative.
pub fn refine_peak(correlation: &[f64], lag: isize) -> RefinedPeak {
    let below = at_lag(correlation, lag - 1);
    let center = at_lag(correlation, lag);
    let above = at_lag(correlation, lag + 1);

    let curvature = 0.5 * (below + above) - center;
    let slope = 0.5 * (above - below);
    if curvature >= 0.0 {
        return RefinedPeak {
            lag: lag as f64,
            height: center,
            width: half_height_width(correlation, lag, center),
        };
    }

    let offset = (-slope / (2.0 * curvature)).clamp(-0.5, 0.5);
    let height = center - slope * slope / (4.0 * curvature);
    let width = if height > 0.0 {
        (2.0 * height / -curvature).sqrt()
    } else {
        half_height_width(correlation, lag, center)
    };

    RefinedPeak {
        lag: lag as f64 + offset,
        height,
        width,
    }
}

/// Number of lags around `lag` that stay above half of `height`, capped at
/// half the correlation length.
pub fn half_height_width(correlation: &[f64], lag: isize, height: f64) -> f64 {
    let limit = (correlation.len() / 2) as isize;
    let half = 0.5 * height;
    let walk = |direction: isize| -> isize {
        let mut steps = 0;
        while steps < limit && at_lag(correlation, lag + direction * (steps + 1)) > half {
            steps += 1;
        }
        steps
    };
    ((walk(-1) + walk(1) + 1).min(limit)) as f64
}

/// Tonry & Davis antisymmetric noise: RMS of `(c[p+m] - c[p-m]) / 2` over
/// the half-length, floored at [`MIN_ANTISYMMETRIC_SIGMA`].
pub fn antisymmetric_sigma(correlation: &[f64], lag: isize) -> f64 {
    let len = correlation.len();
    let sum: f64 = (1..(len / 2) as isize)
        .map(|offset| {
            let antisymmetric =
                0.5 * (at_lag(correlation, lag + offset) - at_lag(correlation, lag - offset));
            antisymmetric * antisymmetric
        })
        .sum();
    (sum / len as f64).sqrt().max(MIN_ANTISYMMETRIC_SIGMA)
}
