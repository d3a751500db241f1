//! Chart Frames
//!
//! The render loop never draws from the live session. It locks, copies a
//! [`ChartFrame`], unlocks, then hands the copy to a [`ChartSink`]; drawing
//! time never counts against acquisition.

use std::collections::VecDeque;
use std::sync::Arc;

use leafflux_core::{Mode, Session, SessionSnapshot};
use parking_lot::Mutex;

/// Everything a renderer needs for one redraw
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFrame {
    /// Copy of the session state
    pub session: SessionSnapshot,
    /// A_net unit label
    pub unit: &'static str,
}

impl ChartFrame {
    /// Copy the display state out of `session`
    pub fn capture(session: &Session) -> Self {
        let session = session.snapshot();
        Self {
            unit: session.basis.unit(),
            session,
        }
    }

    /// One-line summary for the console or a window title
    pub fn status_line(&self) -> String {
        let s = &self.session;
        if s.stopped {
            return "stopped".to_string();
        }
        match s.mode {
            Mode::Idle => {
                if s.baseline.accepted {
                    format!("idle | drift {:+.4} ppm/s", s.baseline.slope)
                } else {
                    "idle | no zero run".to_string()
                }
            }
            Mode::ZeroRun => match s.zero_run {
                Some(run) => format!(
                    "zero run {:.0}/{:.0} s | {} samples",
                    run.elapsed_s, run.target_s, run.collected
                ),
                None => "zero run".to_string(),
            },
            Mode::Logging => match &s.latest {
                Some(latest) if s.window_len >= s.window_capacity => format!(
                    "A_net {:.2} [{:.2}, {:.2}] {} | CO2 {:.1} ppm | VPD {:.2} kPa",
                    latest.flux.value,
                    latest.flux.lower,
                    latest.flux.upper,
                    self.unit,
                    latest.co2_ppm,
                    latest.vpd_kpa
                ),
                _ => format!("filling window {}/{}", s.window_len, s.window_capacity),
            },
        }
    }
}

/// Anything that can draw a frame
pub trait ChartSink: Send {
    /// Draw `frame`
    fn render(&mut self, frame: &ChartFrame);
}

/// Keeps the most recent frames; a stand-in renderer for tests and headless runs
#[derive(Debug, Clone)]
pub struct FrameRecorder {
    frames: Arc<Mutex<VecDeque<ChartFrame>>>,
    capacity: usize,
}

impl FrameRecorder {
    /// Recorder holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Frames rendered so far, oldest first
    pub fn frames(&self) -> Vec<ChartFrame> {
        self.frames.lock().iter().cloned().collect()
    }

    /// Newest frame
    pub fn latest(&self) -> Option<ChartFrame> {
        self.frames.lock().back().cloned()
    }
}

impl ChartSink for FrameRecorder {
    fn render(&mut self, frame: &ChartFrame) {
        let mut frames = self.frames.lock();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame.clone());
    }
}
