//! Running median
//!
//! Knocks out single-sample spikes (bus glitches, a breath near the chamber)
//! before they reach the smoother. Near the ends the window shrinks evenly
//! on both sides, so it always stays centred on its sample: the first and
//! last samples pass through and a straight line comes out unchanged.

use alloc::vec::Vec;

use crate::traits::ConditioningStage;

/// Median filter with an odd kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedianFilter {
    kernel: usize,
}

impl MedianFilter {
    /// Filter over `kernel` samples (odd, ≥ 1)
    pub fn new(kernel: usize) -> Self {
        Self { kernel }
    }

    /// Kernel length
    pub fn kernel(&self) -> usize {
        self.kernel
    }
}

/// Median of a small scratch slice, reordering it in place
fn median_of(scratch: &mut [f64]) -> f64 {
    scratch.sort_by(f64::total_cmp);
    let mid = scratch.len() / 2;
    if scratch.len() % 2 == 1 {
        scratch[mid]
    } else {
        0.5 * (scratch[mid - 1] + scratch[mid])
    }
}

impl ConditioningStage for MedianFilter {
    fn name(&self) -> &'static str {
        "median"
    }

    fn min_len(&self) -> usize {
        self.kernel
    }

    fn apply(&self, _times: &[f64], values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let half = self.kernel / 2;
        let mut scratch = Vec::with_capacity(self.kernel);

        (0..n)
            .map(|i| {
                let reach = half.min(i).min(n - 1 - i);
                scratch.clear();
                scratch.extend_from_slice(&values[i - reach..=i + reach]);
                median_of(&mut scratch)
            })
            .collect()
    }
}
