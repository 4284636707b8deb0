use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Two seconds of samples at the headset's nominal rate.
const SAMPLE_WINDOW: usize = 180;
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Summary of the CPU time the loop spent between polling input and handing
/// frames to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSummary {
    pub samples: usize,
    pub mean_ms: f32,
    pub jitter_ms: f32,
    pub worst_ms: f32,
    pub best_ms: f32,
    /// Samples longer than the per-frame budget.
    pub over_budget: usize,
}

impl FrameSummary {
    pub fn from_samples(samples: &[Duration], budget: Duration) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f32;
        let millis: Vec<f32> = samples.iter().map(|d| d.as_secs_f32() * 1000.0).collect();
        let mean_ms = millis.iter().sum::<f32>() / count;
        let spread = millis.iter().map(|ms| (ms - mean_ms).powi(2)).sum::<f32>() / count;

        Self {
            samples: samples.len(),
            mean_ms,
            jitter_ms: spread.sqrt(),
            worst_ms: millis.iter().copied().fold(0.0, f32::max),
            best_ms: millis.iter().copied().fold(f32::INFINITY, f32::min),
            over_budget: samples.iter().filter(|d| **d > budget).count(),
        }
    }

    /// Rate the loop could sustain if CPU time were the only cost.
    pub fn cpu_bound_fps(&self) -> f32 {
        if self.mean_ms > 0.0 {
            1000.0 / self.mean_ms
        } else {
            0.0
        }
    }
}

/// Measures each loop iteration and logs a [`FrameSummary`] once a second.
pub struct FrameClock {
    samples: VecDeque<Duration>,
    frame_start: Option<Instant>,
    frames: u64,
    budget: Duration,
    last_report: Instant,
}

impl FrameClock {
    pub fn new(target_fps: u32) -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_WINDOW),
            frame_start: None,
            frames: 0,
            budget: Duration::from_secs_f32(1.0 / target_fps.max(1) as f32),
            last_report: Instant::now(),
        }
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    pub fn end_frame(&mut self) {
        let Some(start) = self.frame_start.take() else {
            return;
        };

        if self.samples.len() == SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(start.elapsed());
        self.frames += 1;

        if self.last_report.elapsed() >= REPORT_INTERVAL {
            self.last_report = Instant::now();
            let summary = self.summary();
            log::info!(
                "Frame CPU time: mean {:.2} ms (~{:.0} fps), worst {:.2} ms, {} of {} over budget",
                summary.mean_ms,
                summary.cpu_bound_fps(),
                summary.worst_ms,
                summary.over_budget,
                summary.samples
            );
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn summary(&self) -> FrameSummary {
        let samples: Vec<Duration> = self.samples.iter().copied().collect();
        FrameSummary::from_samples(&samples, self.budget)
    }
}
