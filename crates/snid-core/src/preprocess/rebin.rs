use crate::numerics::{LogWavelengthGrid, median};

/// Source samples further apart than this many median spacings are treated
/// as a gap in coverage.
const GAP_FACTOR: f64 = 3.0;

/// Minimum covered fraction of a grid bin for it to count as data.
pub const MIN_BIN_COVERAGE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Rebinned {
    pub flux: Vec<f64>,
    /// Covered fraction of each bin, in `[0, 1]`.
    pub coverage: Vec<f64>,
}

impl Rebinned {
    pub fn valid_mask(&self) -> Vec<bool> {
        self.flux
            .iter()
            .zip(&self.coverage)
            .map(|(flux, coverage)| *coverage >= MIN_BIN_COVERAGE && *flux > 0.0)
            .collect()
    }
}

/// Pixel boundaries for irregularly sampled data.
///
/// Interior edges sit halfway between neighbours, except across gaps wider
/// than `GAP_FACTOR` median spacings, where the pixel is closed half a median
/// step from its sample.
pub fn pixel_edges(wavelength: &[f64]) -> Vec<(f64, f64)> {
    if wavelength.len() < 2 {
        return Vec::new();
    }

    let spacings: Vec<f64> = wavelength.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let median_step = median(&spacings).unwrap_or(0.0);
    let half_step = 0.5 * median_step;
    let is_gap = |spacing: f64| spacing > GAP_FACTOR * median_step;

    let last = wavelength.len() - 1;
    (0..wavelength.len())
        .map(|index| {
            let center = wavelength[index];
            let left = if index == 0 {
                center - 0.5 * spacings[0]
            } else if is_gap(spacings[index - 1]) {
                center - half_step
            } else {
                center - 0.5 * spacings[index - 1]
            };
            let right = if index == last {
                center + 0.5 * spacings[last - 1]
            } else if is_gap(spacings[index]) {
                center + half_step
            } else {
                center + 0.5 * spacings[index]
            };
            (left, right)
        })
        .collect()
}

/// Flux-conserving rebin onto the log grid.
///
/// Each source pixel contributes `flux * overlap` to every bin it overlaps;
/// bins are normalised by the wavelength actually covered. Bins no source
/// pixel touches stay at zero flux and zero coverage.
pub fn rebin_flux_conserving(
    wavelength: &[f64],
    flux: &[f64],
    grid: &LogWavelengthGrid,
) -> Rebinned {
    let bins = grid.num_points();
    let mut integrated = vec![0.0; bins];
    let mut covered = vec![0.0; bins];

    for ((left, right), value) in pixel_edges(wavelength).into_iter().zip(flux) {
        if right <= grid.min_wave() || left >= grid.max_wave() {
            continue;
        }

        let first = grid.position(left.max(grid.min_wave())).floor().max(0.0) as usize;
        let last = (grid.position(right.min(grid.max_wave())).ceil() as usize).min(bins);
        for bin in first..last {
            let overlap = right.min(grid.edge(bin + 1)) - left.max(grid.edge(bin));
            if overlap > 0.0 {
                integrated[bin] += value * overlap;
                covered[bin] += overlap;
            }
        }
    }

    let mut rebinned = Rebinned {
        flux: vec![0.0; bins],
        coverage: vec![0.0; bins],
    };
    for bin in 0..bins {
        if covered[bin] > 0.0 {
            rebinned.flux[bin] = integrated[bin] / covered[bin];
            rebinned.coverage[bin] = (covered[bin] / grid.bin_width(bin)).min(1.0);
        }
    }
    rebinned
}

#[cfg(test)]
mod tests {
    use super::{pixel_edges, rebin_flux_conserving};
    use crate::numerics::LogWavelengthGrid;

    #[test]
    fn pixel_edges_close_around_gaps() {
        let wavelength = [10.0, 11.0, 12.0, 30.0, 31.0];
        let edges = pixel_edges(&wavelength);
        assert_eq!(edges[0], (9.5, 10.5));
        assert_eq!(edges[1], (10.5, 11.5));
        assert_eq!(edges[2], (11.5, 12.5));
        assert_eq!(edges[3], (29.5, 30.5));
        assert_eq!(edges[4], (30.5, 31.5));
        assert!(pixel_edges(&[5.0]).is_empty());
    }

    #[test]
    fn constant_flux_is_preserved_inside_coverage() {
        let grid = LogWavelengthGrid::new(64, 4000.0, 8000.0).expect("grid");
        let wavelength: Vec<f64> = (0..=800).map(|index| 4500.0 + 3.0 * index as f64).collect();
        let flux = vec![2.5; wavelength.len()];
        let rebinned = rebin_flux_conserving(&wavelength, &flux, &grid);
        let valid = rebinned.valid_mask();

        for bin in 0..64 {
            if grid.edge(bin) > 4510.0 && grid.edge(bin + 1) < 6890.0 {
                assert!(valid[bin], "bin {bin} should be fully covered");
                assert!((rebinned.flux[bin] - 2.5).abs() < 1.0e-9);
            }
            if grid.edge(bin + 1) < 4490.0 || grid.edge(bin) > 6910.0 {
                assert!(!valid[bin], "bin {bin} lies outside the data");
                assert_eq!(rebinned.flux[bin], 0.0);
            }
        }
    }

    #[test]
    fn integrated_flux_is_conserved() {
        let grid = LogWavelengthGrid::new(128, 4000.0, 8000.0).expect("grid");
        let wavelength: Vec<f64> = (0..1000).map(|index| 4200.0 + 3.3 * index as f64).collect();
        let flux: Vec<f64> = wavelength
            .iter()
            .map(|lambda| 1.0 + 0.5 * (lambda / 300.0).sin())
            .collect();
        let rebinned = rebin_flux_conserving(&wavelength, &flux, &grid);

        let source: f64 = pixel_edges(&wavelength)
            .iter()
            .zip(&flux)
            .map(|((left, right), value)| value * (right - left))
            .sum();
        let target: f64 = (0..128)
            .map(|bin| rebinned.flux[bin] * rebinned.coverage[bin] * grid.bin_width(bin))
            .sum();
        assert!((source - target).abs() / source < 1.0e-9);
    }

    #[test]
    fn gaps_leave_bins_uncovered() {
        let grid = LogWavelengthGrid::new(64, 4000.0, 8000.0).expect("grid");
        let mut wavelength: Vec<f64> = (0..300).map(|index| 4000.0 + 2.0 * index as f64).collect();
        wavelength.extend((0..300).map(|index| 6500.0 + 2.0 * index as f64));
        let flux = vec![1.0; wavelength.len()];
        let rebinned = rebin_flux_conserving(&wavelength, &flux, &grid);
        let valid = rebinned.valid_mask();

        for bin in 0..64 {
            if grid.edge(bin) > 4700.0 && grid.edge(bin + 1) < 6400.0 {
                assert!(!valid[bin]);
                assert_eq!(rebinned.coverage[bin], 0.0);
            }
        }
    }
}
