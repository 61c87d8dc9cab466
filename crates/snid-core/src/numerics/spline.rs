/// Natural cubic spline through strictly increasing knots.
///
/// Outside the knot range the spline is continued linearly with the slope it
/// has at the boundary knot.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalCubicSpline {
    knots_x: Vec<f64>,
    knots_y: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Returns `None` for fewer than two knots, mismatched lengths, or knot
    /// positions that are not strictly increasing.
    pub fn fit(knots_x: &[f64], knots_y: &[f64]) -> Option<Self> {
        let count = knots_x.len();
        if count < 2 || count != knots_y.len() {
            return None;
        }

        if !knots_x.windows(2).all(|pair| pair[0] < pair[1]) {
            return None;
        }

        // Tridiagonal system for the interior second derivatives (Thomas
        // algorithm); natural boundary conditions pin both ends to zero.
        let mut second_derivatives = vec![0.0; count];
        if count > 2 {
            let mut diagonal = vec![0.0; count];
            let mut rhs = vec![0.0; count];
            let mut upper = vec![0.0; count];
            for index in 1..count - 1 {
                let h_left = knots_x[index] - knots_x[index - 1];
                let h_right = knots_x[index + 1] - knots_x[index];
                let lower = h_left;
                let mut diag = 2.0 * (h_left + h_right);
                let mut value = 6.0
                    * ((knots_y[index + 1] - knots_y[index]) / h_right
                        - (knots_y[index] - knots_y[index - 1]) / h_left);
                if index > 1 {
                    let factor = lower / diagonal[index - 1];
                    diag -= factor * upper[index - 1];
                    value -= factor * rhs[index - 1];
                }
                diagonal[index] = diag;
                upper[index] = h_right;
                rhs[index] = value;
            }

            for index in (1..count - 1).rev() {
                let next = second_derivatives[index + 1];
                second_derivatives[index] = (rhs[index] - upper[index] * next) / diagonal[index];
            }
        }

        Some(Self {
            knots_x: knots_x.to_vec(),
            knots_y: knots_y.to_vec(),
            second_derivatives,
        })
    }

    pub fn knot_count(&self) -> usize {
        self.knots_x.len()
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let last = self.knots_x.len() - 1;
        if x <= self.knots_x[0] {
            return self.knots_y[0] + (x - self.knots_x[0]) * self.slope_at_segment_start(0);
        }

        if x >= self.knots_x[last] {
            return self.knots_y[last] + (x - self.knots_x[last]) * self.slope_at_segment_end(last - 1);
        }

        let upper = self.knots_x.partition_point(|knot| *knot <= x).min(last);
        let lower = upper - 1;
        let h = self.knots_x[upper] - self.knots_x[lower];
        let a = (self.knots_x[upper] - x) / h;
        let b = (x - self.knots_x[lower]) / h;
        a * self.knots_y[lower]
            + b * self.knots_y[upper]
            + ((a * a * a - a) * self.second_derivatives[lower]
                + (b * b * b - b) * self.second_derivatives[upper])
                * h
                * h
                / 6.0
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.evaluate(*x)).collect()
    }

    fn slope_at_segment_start(&self, segment: usize) -> f64 {
        let h = self.knots_x[segment + 1] - self.knots_x[segment];
        (self.knots_y[segment + 1] - self.knots_y[segment]) / h
            - h * (2.0 * self.second_derivatives[segment] + self.second_derivatives[segment + 1])
                / 6.0
    }

    fn slope_at_segment_end(&self, segment: usize) -> f64 {
        let h = self.knots_x[segment + 1] - self.knots_x[segment];
        (self.knots_y[segment + 1] - self.knots_y[segment]) / h
            + h * (self.second_derivatives[segment] + 2.0 * self.second_derivatives[segment + 1])
                / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::NaturalCubicSpline;

    #[test]
    fn spline_interpolates_its_knots() {
        let x = [0.0, 1.0, 2.5, 4.0, 6.0];
        let y = [1.0, 3.0, 2.0, -1.0, 0.5];
        let spline = NaturalCubicSpline::fit(&x, &y).expect("spline");
        for (knot, value) in x.iter().zip(&y) {
            assert!((spline.evaluate(*knot) - value).abs() < 1.0e-12);
        }
        assert_eq!(spline.knot_count(), 5);
    }

    #[test]
    fn spline_reproduces_straight_lines_everywhere() {
        let x = [0.0, 1.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|value| 2.0 * value - 1.0).collect();
        let spline = NaturalCubicSpline::fit(&x, &y).expect("spline");
        for point in [-2.0, 0.5, 2.0, 3.7, 9.0] {
            assert!((spline.evaluate(point) - (2.0 * point - 1.0)).abs() < 1.0e-10);
        }
    }

    #[test]
    fn spline_is_smooth_across_interior_knots() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.0, 0.0, 1.0];
        let spline = NaturalCubicSpline::fit(&x, &y).expect("spline");
        let step = 1.0e-6;
        let left = (spline.evaluate(1.0) - spline.evaluate(1.0 - step)) / step;
        let right = (spline.evaluate(1.0 + step) - spline.evaluate(1.0)) / step;
        assert!((left - right).abs() < 1.0e-4);
    }

    #[test]
    fn spline_rejects_degenerate_knots() {
        assert!(NaturalCubicSpline::fit(&[0.0], &[1.0]).is_none());
        assert!(NaturalCubicSpline::fit(&[0.0, 1.0], &[1.0]).is_none());
        assert!(NaturalCubicSpline::fit(&[0.0, 0.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }
}
