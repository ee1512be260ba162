//! Frame loop bookkeeping: run state, pacing and frame-rate measurement.
//!
//! [`FrameLoop`] is the two-state machine (Running, Closed) that both the
//! windowed event loop and the headless driver consult before each
//! iteration. It also guards teardown so it happens exactly once and only
//! after the loop has closed.

use std::collections::VecDeque;

use instant::{Duration, Instant};

/// Number of frames the FPS counter averages over.
pub const FPS_SAMPLES: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Closed,
}

/// What ended the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseSignal {
    WindowClose,
    EscapeKey,
    /// Raised by a flow or a test driver.
    Injected,
}

#[derive(Debug)]
pub struct FrameLoop {
    state: LoopState,
    frames: u64,
    close_signal: Option<CloseSignal>,
    torn_down: bool,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Running,
            frames: 0,
            close_signal: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Number of iterations started so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn close_signal(&self) -> Option<CloseSignal> {
        self.close_signal
    }

    /// Start the next iteration. Returns `false` once the loop is closed, in
    /// which case the caller must not draw.
    pub fn begin_iteration(&mut self) -> bool {
        if self.is_running() {
            self.frames += 1;
            true
        } else {
            false
        }
    }

    /// Returns `true` if this call moved the loop from Running to Closed.
    pub fn signal_close(&mut self, signal: CloseSignal) -> bool {
        if self.is_running() {
            log::info!("Close requested ({:?}) after {} frame(s)", signal, self.frames);
            self.state = LoopState::Closed;
            self.close_signal = Some(signal);
            true
        } else {
            false
        }
    }

    /// Run `release` if the loop is closed and has not been torn down yet.
    /// Returns whether `release` ran.
    pub fn teardown<F: FnOnce()>(&mut self, release: F) -> bool {
        if self.is_running() {
            log::warn!("Refusing to tear down while the frame loop is still running");
            return false;
        }
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        release();
        true
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedules frames at a fixed target rate.
#[derive(Debug)]
pub struct FramePacer {
    frame_time: Option<Duration>,
    next_frame: Instant,
}

impl FramePacer {
    /// `target_fps == 0` disables pacing.
    pub fn new(target_fps: u32, now: Instant) -> Self {
        let frame_time = (target_fps > 0).then(|| Duration::from_secs_f64(1.0 / target_fps as f64));
        Self {
            frame_time,
            next_frame: now,
        }
    }

    pub fn frame_time(&self) -> Option<Duration> {
        self.frame_time
    }

    pub fn next_frame(&self) -> Instant {
        self.next_frame
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_frame
    }

    /// Book a frame presented at `now` and return the deadline of the next
    /// one. A frame that ran late restarts the schedule from `now` instead of
    /// trying to catch up.
    pub fn advance(&mut self, now: Instant) -> Instant {
        match self.frame_time {
            Some(frame_time) => {
                let scheduled = self.next_frame + frame_time;
                self.next_frame = if scheduled <= now {
                    now + frame_time
                } else {
                    scheduled
                };
            }
            None => self.next_frame = now,
        }
        self.next_frame
    }
}

/// Frames per second averaged over the last [`FPS_SAMPLES`] frame times.
#[derive(Debug, Default)]
pub struct FpsCounter {
    samples: VecDeque<Duration>,
    total: Duration,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, dt: Duration) {
        if self.samples.len() == FPS_SAMPLES {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.samples.push_back(dt);
        self.total += dt;
    }

    pub fn fps(&self) -> u32 {
        if self.samples.is_empty() || self.total.is_zero() {
            return 0;
        }
        (self.samples.len() as f64 / self.total.as_secs_f64()).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_closes_once() {
        let mut frame_loop = FrameLoop::new();
        assert!(frame_loop.begin_iteration());
        assert!(frame_loop.signal_close(CloseSignal::EscapeKey));
        assert!(!frame_loop.signal_close(CloseSignal::WindowClose));
        assert_eq!(frame_loop.close_signal(), Some(CloseSignal::EscapeKey));
        assert!(!frame_loop.begin_iteration());
        assert_eq!(frame_loop.frames(), 1);
    }

    #[test]
    fn teardown_waits_for_close_and_runs_once() {
        let mut frame_loop = FrameLoop::new();
        let mut releases = 0;
        assert!(!frame_loop.teardown(|| releases += 1));
        assert_eq!(releases, 0);

        frame_loop.signal_close(CloseSignal::Injected);
        assert!(frame_loop.teardown(|| releases += 1));
        assert!(!frame_loop.teardown(|| releases += 1));
        assert_eq!(releases, 1);
        assert!(frame_loop.is_torn_down());
    }

    #[test]
    fn pacer_steps_by_frame_time() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(60, start);
        let frame_time = pacer.frame_time().unwrap();
        assert!(pacer.is_due(start));

        let next = pacer.advance(start);
        assert_eq!(next, start + frame_time);
        assert!(!pacer.is_due(start));
        assert!(pacer.is_due(start + frame_time));
    }

    #[test]
    fn late_frame_resyncs_schedule() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(60, start);
        let frame_time = pacer.frame_time().unwrap();
        let late = start + Duration::from_millis(100);
        assert_eq!(pacer.advance(late), late + frame_time);
    }

    #[test]
    fn zero_fps_is_unpaced() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(0, start);
        assert_eq!(pacer.frame_time(), None);
        let later = start + Duration::from_millis(3);
        assert_eq!(pacer.advance(later), later);
    }

    #[test]
    fn fps_counter_averages_recent_frames() {
        let mut counter = FpsCounter::new();
        assert_eq!(counter.fps(), 0);
        for _ in 0..FPS_SAMPLES {
            counter.tick(Duration::from_millis(10));
        }
        assert_eq!(counter.fps(), 100);

        // slow frames push the fast ones out of the window
        for _ in 0..FPS_SAMPLES {
            counter.tick(Duration::from_millis(50));
        }
        assert_eq!(counter.fps(), 20);
    }
}
