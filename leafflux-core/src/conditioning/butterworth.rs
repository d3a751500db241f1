//! Zero-phase Butterworth low-pass
//!
//! ## Design
//!
//! An order-N Butterworth prototype is split into second-order sections
//! (plus one first-order section for odd N) and mapped to digital form with
//! the bilinear transform, pre-warped so the −3 dB point lands exactly on
//! the cutoff:
//!
//! ```text
//! K = tan(π · Wn / 2)              Wn = cutoff / (fs / 2)
//!
//! biquad k:   1/Q = 2·sin(π(2k+1) / 2N)
//!             b = K²·[1, 2, 1] / D
//!             a = [1, 2(K²−1), 1 − K/Q + K²] / D      D = 1 + K/Q + K²
//!
//! first order: b = K·[1, 1] / (1+K),  a = [1, (K−1)/(1+K)]
//! ```
//!
//! Every section has unit gain at DC, so a constant input is a fixed point
//! of the whole cascade.
//!
//! ## Forward-Backward Filtering
//!
//! The cascade runs forward, then over the reversed output, cancelling the
//! phase lag that would otherwise shift the CO₂ curve in time and bias the
//! slope. Both ends are padded with an odd reflection of `3·(N+1)` samples
//! and every section starts in the steady state for the first padded value,
//! which suppresses the start-up transient.
//!
//! ## Trend
//!
//! The start-up state is exact only for a constant, so a ramp would leave a
//! small transient that tilts the fitted slope. The least-squares line of
//! the window is removed first and added back after filtering: only the
//! residual is low-passed and a straight line passes through exactly.
//!
//! ## Sampling Rate
//!
//! Taken from the mean spacing of the window's timestamps. With the SCD4x's
//! 5 s refresh the Nyquist frequency is 0.1 Hz, so the default 0.1 Hz
//! cutoff yields `Wn = 1` and the stage passes the data through.

use alloc::vec::Vec;
use core::f64::consts::PI;

use crate::traits::ConditioningStage;

/// Coefficients of one cascade section (transposed direct form II)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    b: [f64; 3],
    a: [f64; 3],
}

impl Section {
    /// Steady-state delay line for a constant input of 1
    fn unit_state(&self) -> [f64; 2] {
        [1.0 - self.b[0], self.b[2] - self.a[2]]
    }

    fn run(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let unit = self.unit_state();
        let mut z = [unit[0] * first, unit[1] * first];

        for x in data.iter_mut() {
            let input = *x;
            let y = self.b[0] * input + z[0];
            z[0] = self.b[1] * input - self.a[1] * y + z[1];
            z[1] = self.b[2] * input - self.a[2] * y;
            *x = y;
        }
    }
}

/// Low-pass Butterworth filter applied forward and backward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButterworthLowPass {
    order: usize,
    cutoff_hz: f64,
}

impl ButterworthLowPass {
    /// Order-`order` filter with its −3 dB point at `cutoff_hz`
    pub fn new(order: usize, cutoff_hz: f64) -> Self {
        Self { order, cutoff_hz }
    }

    /// Samples reflected onto each end before filtering
    pub fn pad_len(&self) -> usize {
        3 * (self.order + 1)
    }

    /// Cascade for a normalized cutoff `wn` in (0, 1)
    fn sections(&self, wn: f64) -> Vec<Section> {
        let k = libm::tan(PI * wn / 2.0);
        let k2 = k * k;
        let n = self.order as f64;
        let mut sections = Vec::with_capacity(self.order / 2 + 1);

        for idx in 0..self.order / 2 {
            let inv_q = 2.0 * libm::sin(PI * (2.0 * idx as f64 + 1.0) / (2.0 * n));
            let norm = 1.0 / (1.0 + k * inv_q + k2);
            let b0 = k2 * norm;
            sections.push(Section {
                b: [b0, 2.0 * b0, b0],
                a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - k * inv_q + k2) * norm],
            });
        }

        if self.order % 2 == 1 {
            let b0 = k / (1.0 + k);
            sections.push(Section {
                b: [b0, b0, 0.0],
                a: [1.0, (k - 1.0) / (1.0 + k), 0.0],
            });
        }

        sections
    }

    /// Normalized cutoff for the sampling rate implied by `times`
    fn normalized_cutoff(&self, times: &[f64]) -> Option<f64> {
        let (first, last) = (times.first()?, times.last()?);
        let span = last - first;
        if times.len() < 2 || span.is_nan() || span <= 0.0 {
            return None;
        }
        let fs = (times.len() - 1) as f64 / span;
        let wn = self.cutoff_hz / (fs / 2.0);
        (wn > 0.0 && wn < 1.0).then_some(wn)
    }
}

/// Least-squares line of `values` over `times` as `(t̄, v̄, slope)`
fn linear_trend(times: &[f64], values: &[f64]) -> Option<(f64, f64, f64)> {
    let n = values.len() as f64;
    let t_mean = times.iter().sum::<f64>() / n;
    let v_mean = values.iter().sum::<f64>() / n;
    let (sxy, sxx) = times
        .iter()
        .zip(values)
        .fold((0.0, 0.0), |(sxy, sxx), (t, v)| {
            let dt = t - t_mean;
            (sxy + dt * (v - v_mean), sxx + dt * dt)
        });
    (sxx > 0.0 && sxy.is_finite()).then(|| (t_mean, v_mean, sxy / sxx))
}

/// Pad with an odd reflection of `pad` samples on each end
fn odd_extend(values: &[f64], pad: usize) -> Vec<f64> {
    let n = values.len();
    let (first, last) = (values[0], values[n - 1]);
    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - values[i]));
    ext.extend_from_slice(values);
    ext.extend((1..=pad).map(|i| 2.0 * last - values[n - 1 - i]));
    ext
}

impl ConditioningStage for ButterworthLowPass {
    fn name(&self) -> &'static str {
        "butterworth"
    }

    fn min_len(&self) -> usize {
        self.pad_len() + 1
    }

    fn apply(&self, times: &[f64], values: &[f64]) -> Vec<f64> {
        let pad = self.pad_len();
        if self.order == 0 || values.len() <= pad || times.len() != values.len() {
            return values.to_vec();
        }
        let Some(wn) = self.normalized_cutoff(times) else {
            return values.to_vec();
        };
        let Some((t_mean, v_mean, slope)) = linear_trend(times, values) else {
            return values.to_vec();
        };
        let trend = |t: f64| v_mean + slope * (t - t_mean);
        let residual: Vec<f64> = times.iter().zip(values).map(|(t, v)| v - trend(*t)).collect();
        let sections = self.sections(wn);

        let mut ext = odd_extend(&residual, pad);
        for section in &sections {
            section.run(&mut ext);
        }
        ext.reverse();
        for section in &sections {
            section.run(&mut ext);
        }
        ext.reverse();

        ext[pad..pad + values.len()]
            .iter()
            .zip(times)
            .map(|(r, t)| r + trend(*t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seconds(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn sections_have_unit_dc_gain() {
        let filter = ButterworthLowPass::new(5, 0.1);
        for section in filter.sections(0.2) {
            let gain = section.b.iter().sum::<f64>() / section.a.iter().sum::<f64>();
            assert_relative_eq!(gain, 1.0, epsilon = 1e-12);
        }
        assert_eq!(filter.sections(0.2).len(), 3);
    }

    #[test]
    fn constant_is_preserved() {
        let values = vec![415.0; 40];
        let out = ButterworthLowPass::new(5, 0.1).apply(&seconds(40), &values);
        for v in out {
            assert_relative_eq!(v, 415.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn line_is_preserved_end_to_end() {
        for n in [19, 24, 100] {
            let values: Vec<f64> = (0..n).map(|i| 400.0 - 0.5 * i as f64).collect();
            let out = ButterworthLowPass::new(5, 0.1).apply(&seconds(n), &values);
            for (got, want) in out.iter().zip(&values) {
                assert_relative_eq!(*got, *want, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn ripple_on_a_ramp_is_attenuated() {
        let values: Vec<f64> = (0..100)
            .map(|i| 400.0 + 0.5 * i as f64 + if i % 2 == 0 { 2.0 } else { -2.0 })
            .collect();
        let out = ButterworthLowPass::new(5, 0.1).apply(&seconds(100), &values);
        for i in 40..60 {
            assert!((out[i] - 400.0 - 0.5 * i as f64).abs() < 0.05);
        }
    }

    #[test]
    fn high_frequency_is_attenuated() {
        let values: Vec<f64> = (0..100)
            .map(|i| 400.0 + if i % 2 == 0 { 2.0 } else { -2.0 })
            .collect();
        let out = ButterworthLowPass::new(5, 0.1).apply(&seconds(100), &values);
        for v in &out[40..60] {
            assert!((v - 400.0).abs() < 0.05);
        }
    }

    #[test]
    fn passes_through_when_too_short_or_cutoff_invalid() {
        let filter = ButterworthLowPass::new(5, 0.1);
        let short: Vec<f64> = (0..18).map(|i| 400.0 + i as f64).collect();
        assert_eq!(filter.apply(&seconds(18), &short), short);

        // 5 s spacing: Nyquist 0.1 Hz, Wn = 1
        let values: Vec<f64> = (0..40).map(|i| 400.0 + (i % 3) as f64).collect();
        let times: Vec<f64> = (0..40).map(|i| 5.0 * i as f64).collect();
        assert_eq!(filter.apply(&times, &values), values);
    }
}
