use std::f64::consts::PI;

use crate::domain::ValidRange;

/// Number of bins tapered at each end of `range`.
pub fn taper_length(range: ValidRange, percent: f64) -> usize {
    let length = (range.len() as f64 * percent / 100.0).round() as usize;
    length.min(range.len() / 2)
}

/// Raised-cosine taper over `percent` of the valid range at both ends.
/// The outermost bin of each end is forced to zero. Returns the taper
/// length that was applied.
pub fn apodize(flux: &mut [f64], range: ValidRange, percent: f64) -> usize {
    let taper = taper_length(range, percent);
    for offset in 0..taper {
        let weight = 0.5 * (1.0 - (PI * offset as f64 / taper as f64).cos());
        flux[range.start + offset] *= weight;
        flux[range.end - 1 - offset] *= weight;
    }
    taper
}
