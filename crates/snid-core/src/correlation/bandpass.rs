use std::f64::consts::PI;

use crate::common::config::BandpassConfig;

/// Cosine-tapered Fourier bandpass, one real weight per FFT bin.
///
/// With `k = min(j, n - j)` the wavenumber of bin `j`: zero below `k1`,
/// rising to one at `k2`, flat to `k3`, falling to zero at `k4`.
pub fn bandpass_weights(len: usize, config: &BandpassConfig) -> Vec<f64> {
    if !config.enabled {
        return vec![1.0; len];
    }

    let k1 = config.low_cut as f64;
    let k2 = config.low_full as f64;
    let k3 = (len as f64 * config.high_full_fraction).round();
    let k4 = (len as f64 * config.high_cut_fraction).round().max(k3);

    (0..len)
        .map(|bin| {
            let k = bin.min(len - bin) as f64;
            if k < k1 || k > k4 {
                0.0
            } else if k < k2 {
                0.5 * (1.0 - (PI * (k - k1) / (k2 - k1)).cos())
            } else if k <= k3 {
                1.0
            } else {
                0.5 * (1.0 + (PI * (k - k3) / (k4 - k3)).cos())
            }
        })
        .collect()
}
