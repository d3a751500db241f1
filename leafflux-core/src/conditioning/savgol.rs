//! Savitzky–Golay smoothing
//!
//! Fits a low-order polynomial to each run of `window` consecutive samples
//! by least squares and keeps the fitted value at the centre. A quadratic
//! fit passes straight lines and gentle curvature through untouched, so
//! the CO₂ slope survives while sensor noise is averaged down.
//!
//! ## Edges
//!
//! The first and last `window / 2` samples have no centred window. They
//! take the value of the polynomial fitted to the first (last) full window,
//! evaluated at their own position.
//!
//! ## Spacing
//!
//! Samples are treated as equally spaced. SCD4x refreshes are regular to
//! within a few percent, which is well below the effect of the noise being
//! removed.

use alloc::vec;
use alloc::vec::Vec;

use crate::traits::ConditioningStage;

/// Savitzky–Golay smoother
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavitzkyGolay {
    window: usize,
    order: usize,
}

impl SavitzkyGolay {
    /// Smoother over `window` samples (odd) with a polynomial of `order`
    /// (< `window`)
    pub fn new(window: usize, order: usize) -> Self {
        Self { window, order }
    }

    /// Least-squares polynomial coefficients (lowest power first) for `ys`
    /// sampled at `xs`
    fn fit(&self, xs: &[f64], ys: &[f64]) -> Option<Vec<f64>> {
        let m = self.order + 1;
        let mut normal = vec![0.0; m * m];
        let mut rhs = vec![0.0; m];

        for (&x, &y) in xs.iter().zip(ys) {
            let mut powers = vec![1.0; 2 * m - 1];
            for k in 1..powers.len() {
                powers[k] = powers[k - 1] * x;
            }
            for r in 0..m {
                rhs[r] += powers[r] * y;
                for c in 0..m {
                    normal[r * m + c] += powers[r + c];
                }
            }
        }

        solve(&mut normal, &mut rhs, m)
    }
}

/// Evaluate a polynomial (lowest power first) with Horner's rule
fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Solve `a · x = b` in place by Gaussian elimination with partial pivoting
///
/// `a` is `m × m`, row-major. Returns `None` for a singular system.
fn solve(a: &mut [f64], b: &mut [f64], m: usize) -> Option<Vec<f64>> {
    for col in 0..m {
        let pivot = (col..m).max_by(|&i, &j| a[i * m + col].abs().total_cmp(&a[j * m + col].abs()))?;
        if a[pivot * m + col].abs() < f64::EPSILON {
            return None;
        }
        if pivot != col {
            for k in 0..m {
                a.swap(pivot * m + k, col * m + k);
            }
            b.swap(pivot, col);
        }
        for row in (col + 1)..m {
            let factor = a[row * m + col] / a[col * m + col];
            for k in col..m {
                a[row * m + k] -= factor * a[col * m + k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let tail: f64 = ((row + 1)..m).map(|k| a[row * m + k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row * m + row];
    }
    Some(x)
}

impl ConditioningStage for SavitzkyGolay {
    fn name(&self) -> &'static str {
        "savitzky-golay"
    }

    fn min_len(&self) -> usize {
        self.window
    }

    fn apply(&self, _times: &[f64], values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let w = self.window;
        if w == 0 || w % 2 == 0 || self.order >= w || n < w {
            return values.to_vec();
        }
        let half = w / 2;

        // Abscissa of one window, centred on zero
        let xs: Vec<f64> = (0..w).map(|j| j as f64 - half as f64).collect();

        // Centre weights: the fitted value at x = 0 is linear in the window
        let mut weights = vec![0.0; w];
        for (j, weight) in weights.iter_mut().enumerate() {
            let mut unit = vec![0.0; w];
            unit[j] = 1.0;
            match self.fit(&xs, &unit) {
                Some(coeffs) => *weight = coeffs[0],
                None => return values.to_vec(),
            }
        }

        let mut out = values.to_vec();
        for i in half..(n - half) {
            out[i] = weights
                .iter()
                .zip(&values[i - half..=i + half])
                .map(|(h, v)| h * v)
                .sum();
        }

        // Edges from the polynomial of the first and last full windows
        if let Some(head) = self.fit(&xs, &values[..w]) {
            for (i, slot) in out.iter_mut().enumerate().take(half) {
                *slot = polyval(&head, xs[i]);
            }
        }
        if let Some(tail) = self.fit(&xs, &values[n - w..]) {
            for j in (w - half)..w {
                out[n - w + j] = polyval(&tail, xs[j]);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_passes_through_exactly() {
        let values: Vec<f64> = (0..25)
            .map(|i| {
                let x = i as f64;
                400.0 + 0.8 * x - 0.01 * x * x
            })
            .collect();
        let out = SavitzkyGolay::new(19, 2).apply(&[], &values);
        for (a, b) in out.iter().zip(&values) {
            assert_relative_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn known_five_point_weights() {
        // Classic 5-point quadratic weights: (-3, 12, 17, 12, -3) / 35
        let impulse = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let out = SavitzkyGolay::new(5, 2).apply(&[], &impulse);
        assert_relative_eq!(out[4], 17.0 / 35.0, epsilon = 1e-12);
        assert_relative_eq!(out[3], 12.0 / 35.0, epsilon = 1e-12);
        assert_relative_eq!(out[2], -3.0 / 35.0, epsilon = 1e-12);
    }

    #[test]
    fn noise_is_reduced() {
        let values: Vec<f64> = (0..30)
            .map(|i| 400.0 + i as f64 + if i % 2 == 0 { 1.5 } else { -1.5 })
            .collect();
        let out = SavitzkyGolay::new(7, 2).apply(&[], &values);
        let roughness = |v: &[f64]| -> f64 {
            v.windows(3).map(|w| (w[0] - 2.0 * w[1] + w[2]).abs()).sum()
        };
        assert!(roughness(&out) < 0.5 * roughness(&values));
    }

    #[test]
    fn short_input_passes_through() {
        let values = [400.0, 401.0, 403.0];
        assert_eq!(SavitzkyGolay::new(19, 2).apply(&[], &values), values.to_vec());
    }
}
