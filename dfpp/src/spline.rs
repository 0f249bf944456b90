//! Natural cubic spline through a set of knots.

use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

/// Piecewise cubic interpolant with zero second derivative at both end knots.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalCubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots.
    second_derivatives: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fits the spline. Returns `None` with fewer than two knots, when the x values are not
    /// strictly increasing or when a value is not finite.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return None;
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite())
            || xs.iter().tuple_windows().any(|(a, b)| b <= a)
        {
            return None;
        }

        let n = xs.len();
        let mut second_derivatives = vec![0.0; n];
        // Two knots give a straight line
        if n > 2 {
            let h = xs.iter().tuple_windows().map(|(a, b)| b - a).collect_vec();
            let interior = n - 2;
            let mut a = DMatrix::<f64>::zeros(interior, interior);
            let mut rhs = DVector::<f64>::zeros(interior);
            for row in 0..interior {
                let i = row + 1;
                a[(row, row)] = 2.0 * (h[i - 1] + h[i]);
                if row > 0 {
                    a[(row, row - 1)] = h[i - 1];
                }
                if row + 1 < interior {
                    a[(row, row + 1)] = h[i];
                }
                rhs[row] =
                    6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }
            let solution = a.lu().solve(&rhs)?;
            second_derivatives[1..n - 1].copy_from_slice(solution.as_slice());
        }

        Some(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second_derivatives,
        })
    }

    /// Evaluates the spline at `x`. Returns `None` outside the knot range.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let (first, last) = (*self.xs.first()?, *self.xs.last()?);
        if !(first..=last).contains(&x) {
            return None;
        }
        // Index of the segment [xs[i], xs[i + 1]] that contains x
        let i = self
            .xs
            .partition_point(|knot| *knot <= x)
            .saturating_sub(1)
            .min(self.xs.len() - 2);

        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.second_derivatives[i], self.second_derivatives[i + 1]);
        let h = x1 - x0;
        let a = (x1 - x) / h;
        let b = (x - x0) / h;
        Some(
            a * y0
                + b * y1
                + ((a.powi(3) - a) * m0 + (b.powi(3) - b) * m1) * h * h / 6.0,
        )
    }
}
