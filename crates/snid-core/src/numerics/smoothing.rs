use faer::Mat;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-12;
const FWHM_TO_SIGMA: f64 = 2.35;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmoothingError {
    #[error("Savitzky-Golay window must be odd and >= 3, got {window}")]
    InvalidWindow { window: usize },
    #[error("Savitzky-Golay order {order} must be smaller than window {window}")]
    OrderTooLarge { order: usize, window: usize },
    #[error("smoothing input length mismatch: wavelength={wavelength}, data={data}")]
    LengthMismatch { wavelength: usize, data: usize },
    #[error("Savitzky-Golay normal equations are singular at pivot {pivot_index}")]
    SingularSystem { pivot_index: usize },
}

/// Savitzky-Golay smoothing with a pixel window.
///
/// Interior points use the symmetric kernel; the first and last `window / 2`
/// points are evaluated on the polynomial fitted to the edge window. Inputs
/// shorter than the window are returned unchanged.
pub fn savitzky_golay(
    data: &[f64],
    window: usize,
    order: usize,
) -> Result<Vec<f64>, SmoothingError> {
    if window < 3 || window % 2 == 0 {
        return Err(SmoothingError::InvalidWindow { window });
    }

    if order >= window {
        return Err(SmoothingError::OrderTooLarge { order, window });
    }

    if data.len() < window {
        return Ok(data.to_vec());
    }

    let half = window / 2;
    let projection = least_squares_projection(window, order)?;
    let evaluate = |start: usize, offset: f64| -> f64 {
        let mut value = 0.0;
        let mut power = 1.0;
        for degree in 0..=order {
            let mut coefficient = 0.0;
            for sample in 0..window {
                coefficient += projection[(degree, sample)] * data[start + sample];
            }
            value += coefficient * power;
            power *= offset;
        }
        value
    };

    let mut smoothed = vec![0.0; data.len()];
    for (index, slot) in smoothed.iter_mut().enumerate() {
        *slot = if index < half {
            evaluate(0, index as f64 - half as f64)
        } else if index + half >= data.len() {
            let start = data.len() - window;
            evaluate(start, (index - start) as f64 - half as f64)
        } else {
            evaluate(index - half, 0.0)
        };
    }

    Ok(smoothed)
}

/// Savitzky-Golay smoothing whose window is derived from a FWHM in Angstrom.
pub fn savitzky_golay_fwhm(
    wavelength: &[f64],
    data: &[f64],
    fwhm: f64,
    order: usize,
) -> Result<Vec<f64>, SmoothingError> {
    if wavelength.len() != data.len() {
        return Err(SmoothingError::LengthMismatch {
            wavelength: wavelength.len(),
            data: data.len(),
        });
    }

    if fwhm <= 0.0 || data.len() < 2 {
        return Ok(data.to_vec());
    }

    let mean_step = (wavelength[wavelength.len() - 1] - wavelength[0]) / (data.len() - 1) as f64;
    let sigma = fwhm / FWHM_TO_SIGMA;
    let mut window = ((2.0 * sigma / mean_step) as usize).max(3);
    if window % 2 == 0 {
        window += 1;
    }

    if window > data.len() {
        window = if data.len() % 2 == 0 {
            data.len() - 1
        } else {
            data.len()
        };
    }

    if window < 3 {
        return Ok(data.to_vec());
    }

    savitzky_golay(data, window, order.min(window - 1))
}

/// Gaussian filter with reflect-about-edge-sample boundary handling.
pub fn gaussian_filter_mirror(data: &[f64], sigma: f64) -> Vec<f64> {
    if data.len() < 2 || sigma <= 0.0 {
        return data.to_vec();
    }

    let radius = (4.0 * sigma).ceil() as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|offset| (-0.5 * (offset as f64 / sigma).powi(2)).exp())
        .collect();
    let norm: f64 = kernel.iter().sum();

    let last = data.len() as isize - 1;
    let mirror = |index: isize| -> usize {
        let period = 2 * last;
        let mut folded = index.rem_euclid(period);
        if folded > last {
            folded = period - folded;
        }
        folded as usize
    };

    (0..data.len() as isize)
        .map(|center| {
            kernel
                .iter()
                .enumerate()
                .map(|(tap, weight)| weight * data[mirror(center + tap as isize - radius)])
                .sum::<f64>()
                / norm
        })
        .collect()
}

/// Running median over `2 * half_window + 1` samples, truncated at the ends.
pub fn running_median(data: &[f64], half_window: usize) -> Vec<f64> {
    let mut window = Vec::with_capacity(2 * half_window + 1);
    (0..data.len())
        .map(|center| {
            let start = center.saturating_sub(half_window);
            let end = (center + half_window + 1).min(data.len());
            window.clear();
            window.extend_from_slice(&data[start..end]);
            window.sort_unstable_by(f64::total_cmp);
            let middle = window.len() / 2;
            if window.len() % 2 == 0 {
                0.5 * (window[middle - 1] + window[middle])
            } else {
                window[middle]
            }
        })
        .collect()
}

/// `(A^T A)^-1 A^T` for the Vandermonde design matrix of a centred window,
/// stored as `(order + 1) x window`.
fn least_squares_projection(window: usize, order: usize) -> Result<Mat<f64>, SmoothingError> {
    let half = (window / 2) as f64;
    let terms = order + 1;

    let mut design = Mat::<f64>::zeros(window, terms);
    for sample in 0..window {
        let offset = sample as f64 - half;
        let mut power = 1.0;
        for degree in 0..terms {
            design[(sample, degree)] = power;
            power *= offset;
        }
    }

    let mut normal = Mat::<f64>::zeros(terms, terms);
    let mut rhs = Mat::<f64>::zeros(terms, window);
    for row in 0..terms {
        for col in 0..terms {
            let mut value = 0.0;
            for sample in 0..window {
                value += design[(sample, row)] * design[(sample, col)];
            }
            normal[(row, col)] = value;
        }
        for sample in 0..window {
            rhs[(row, sample)] = design[(sample, row)];
        }
    }

    solve_in_place(&mut normal, &mut rhs)?;
    Ok(rhs)
}

/// Gauss-Jordan elimination with partial pivoting; `rhs` holds the solution
/// on return.
fn solve_in_place(matrix: &mut Mat<f64>, rhs: &mut Mat<f64>) -> Result<(), SmoothingError> {
    let dimension = matrix.nrows();
    let columns = rhs.ncols();

    for pivot_col in 0..dimension {
        let mut pivot_row = pivot_col;
        for row in (pivot_col + 1)..dimension {
            if matrix[(row, pivot_col)].abs() > matrix[(pivot_row, pivot_col)].abs() {
                pivot_row = row;
            }
        }

        if matrix[(pivot_row, pivot_col)].abs() <= SINGULAR_PIVOT_EPSILON {
            return Err(SmoothingError::SingularSystem {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            for col in 0..dimension {
                let swap = matrix[(pivot_col, col)];
                matrix[(pivot_col, col)] = matrix[(pivot_row, col)];
                matrix[(pivot_row, col)] = swap;
            }
            for col in 0..columns {
                let swap = rhs[(pivot_col, col)];
                rhs[(pivot_col, col)] = rhs[(pivot_row, col)];
                rhs[(pivot_row, col)] = swap;
            }
        }

        let pivot = matrix[(pivot_col, pivot_col)];
        for col in 0..dimension {
            matrix[(pivot_col, col)] /= pivot;
        }
        for col in 0..columns {
            rhs[(pivot_col, col)] /= pivot;
        }

        for row in 0..dimension {
            if row == pivot_col {
                continue;
            }
            let factor = matrix[(row, pivot_col)];
            if factor == 0.0 {
                continue;
            }
            for col in 0..dimension {
                let delta = factor * matrix[(pivot_col, col)];
                matrix[(row, col)] -= delta;
            }
            for col in 0..columns {
                let delta = factor * rhs[(pivot_col, col)];
                rhs[(row, col)] -= delta;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        SmoothingError, gaussian_filter_mirror, running_median, savitzky_golay,
        savitzky_golay_fwhm,
    };

    #[test]
    fn savitzky_golay_preserves_polynomials_up_to_its_order() {
        let data: Vec<f64> = (0..25)
            .map(|index| {
                let x = index as f64;
                0.5 + 0.2 * x - 0.01 * x * x + 0.0005 * x * x * x
            })
            .collect();
        let smoothed = savitzky_golay(&data, 7, 3).expect("smoothing");
        for (expected, actual) in data.iter().zip(&smoothed) {
            assert!((expected - actual).abs() < 1.0e-9, "{expected} vs {actual}");
        }
    }

    #[test]
    fn savitzky_golay_attenuates_alternating_noise() {
        let data: Vec<f64> = (0..41)
            .map(|index| 1.0 + if index % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let smoothed = savitzky_golay(&data, 11, 2).expect("smoothing");
        let interior_error = smoothed[10..30]
            .iter()
            .map(|value| (value - 1.0).abs())
            .fold(0.0, f64::max);
        assert!(interior_error < 0.05, "residual ripple {interior_error}");
    }

    #[test]
    fn savitzky_golay_validates_window_and_order() {
        assert_eq!(
            savitzky_golay(&[1.0; 10], 4, 2),
            Err(SmoothingError::InvalidWindow { window: 4 })
        );
        assert_eq!(
            savitzky_golay(&[1.0; 10], 5, 5),
            Err(SmoothingError::OrderTooLarge {
                order: 5,
                window: 5
            })
        );
        assert_eq!(savitzky_golay(&[1.0, 2.0], 5, 2), Ok(vec![1.0, 2.0]));
    }

    #[test]
    fn fwhm_window_is_derived_from_mean_spacing() {
        let wavelength: Vec<f64> = (0..50).map(|index| 4000.0 + 2.0 * index as f64).collect();
        let data: Vec<f64> = (0..50).map(|index| (index as f64 * 0.3).sin()).collect();
        let smoothed = savitzky_golay_fwhm(&wavelength, &data, 0.0, 3).expect("smoothing");
        assert_eq!(smoothed, data);

        let smoothed = savitzky_golay_fwhm(&wavelength, &data, 20.0, 3).expect("smoothing");
        assert_eq!(smoothed.len(), data.len());
        assert!(
            savitzky_golay_fwhm(&wavelength[..10], &data, 20.0, 3).is_err(),
            "length mismatch should be rejected"
        );
    }

    #[test]
    fn gaussian_filter_keeps_constant_signal_and_spreads_impulse() {
        let constant = vec![2.0; 30];
        for value in gaussian_filter_mirror(&constant, 3.0) {
            assert!((value - 2.0).abs() < 1.0e-12);
        }

        let mut impulse = vec![0.0; 31];
        impulse[15] = 1.0;
        let filtered = gaussian_filter_mirror(&impulse, 2.0);
        let total: f64 = filtered.iter().sum();
        assert!((total - 1.0).abs() < 1.0e-6);
        assert!(filtered[15] < 1.0 && filtered[14] > 0.0 && filtered[16] > 0.0);
    }

    #[test]
    fn running_median_removes_isolated_spikes() {
        let mut data = vec![1.0; 15];
        data[7] = 40.0;
        let filtered = running_median(&data, 3);
        assert!(filtered.iter().all(|value| (*value - 1.0).abs() < 1.0e-12));
    }
}
