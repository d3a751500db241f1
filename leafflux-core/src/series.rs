//! Time-windowed output series for live display
//!
//! The renderer shows the last `plot_window_s` seconds of A_net (and of
//! chamber temperature/humidity on a second axis). Entries older than that
//! relative to the time passed in are dropped on every append, so memory
//! stays bounded by horizon × sample rate.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::time::Timestamp;
use crate::traits::Timestamped;

/// Chamber conditions at one sample
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvironmentPoint {
    /// When the sample was taken
    pub timestamp: Timestamp,
    /// Air temperature (°C)
    pub temperature_c: f64,
    /// Relative humidity (%)
    pub humidity_pct: f64,
}

impl Timestamped for EnvironmentPoint {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Entries no older than `horizon_s` relative to the latest `now`
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSeries<T> {
    entries: VecDeque<T>,
    horizon_s: f64,
}

impl<T: Timestamped + Clone> LiveSeries<T> {
    /// Empty series keeping `horizon_s` seconds of history
    pub fn new(horizon_s: f64) -> Self {
        Self {
            entries: VecDeque::new(),
            horizon_s,
        }
    }

    /// History length (s)
    pub fn horizon_s(&self) -> f64 {
        self.horizon_s
    }

    /// Append `entry`, then drop everything older than the horizon at `now`
    pub fn append(&mut self, entry: T, now: Timestamp) {
        self.entries.push_back(entry);
        self.evict(now);
    }

    /// Drop entries with `now - t > horizon`; returns how many went
    pub fn evict(&mut self, now: Timestamp) -> usize {
        let mut dropped = 0;
        while let Some(front) = self.entries.front() {
            if now - front.timestamp() > self.horizon_s {
                self.entries.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }
        dropped
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the series is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest entry
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Iterate oldest → newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Owned copy for a renderer
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux::FluxEstimate;

    fn estimate(t: f64) -> FluxEstimate {
        FluxEstimate {
            timestamp: t,
            value: 1.0,
            lower: 0.5,
            upper: 1.5,
        }
    }

    #[test]
    fn entries_older_than_horizon_are_evicted() {
        let mut series = LiveSeries::new(300.0);
        for t in [0.0, 100.0, 200.0, 300.0] {
            series.append(estimate(t), t);
        }
        assert_eq!(series.len(), 4);

        series.append(estimate(400.0), 400.0);
        let times: Vec<f64> = series.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![100.0, 200.0, 300.0, 400.0]);
    }

    #[test]
    fn boundary_entry_is_kept() {
        let mut series = LiveSeries::new(10.0);
        series.append(estimate(0.0), 0.0);
        assert_eq!(series.evict(10.0), 0);
        assert_eq!(series.evict(10.5), 1);
        assert!(series.is_empty());
    }

    #[test]
    fn environment_points_share_the_window() {
        let mut series = LiveSeries::new(60.0);
        for i in 0..10 {
            let t = i as f64 * 10.0;
            series.append(
                EnvironmentPoint {
                    timestamp: t,
                    temperature_c: 24.0,
                    humidity_pct: 50.0,
                },
                t,
            );
        }
        let snap = series.snapshot();
        assert_eq!(snap.first().map(|p| p.timestamp), Some(30.0));
        assert_eq!(series.latest().map(|p| p.timestamp), Some(90.0));
    }
}
