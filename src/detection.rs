// Detection loop: owns the capture stream and the inference cadence.
//
// Each call to `DetectionLoop::tick` is one cooperative step on the main
// thread. It rate-limits inference, skips ticks whose frame has not
// advanced, classifies the hands and writes the result into the shared
// `GestureState`. A heartbeat watches for a stream that silently stops
// delivering frames and re-acquires it, once per stall. Per-frame errors are
// absorbed; a lost stream is stopped and left to the heartbeat, a dead
// detector is closed and the loop carries on without gestures.
//
// Initializing --open ok--> Running --no fresh frame for 3s--> Stalled
//      ^                       ^                                  |
//      | open failed           +------ open ok ---- Recovering <--+
//      +--- visibility/focus regained (from any phase) ------------

use tracing::{debug, error, info, warn};

use crate::camera::CaptureDevice;
use crate::classifier;
use crate::error::Error;
use crate::gesture::GestureState;
use crate::landmarks::LandmarkSource;
use crate::types::DeviceClass;

/// No fresh frame for this long while running counts as a stall.
pub const HEARTBEAT_WINDOW_MS: f64 = 3000.0;
/// Failed re-acquisitions in a row before the stall is surfaced.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No stream yet, or the last acquisition failed.
    Initializing,
    Running,
    /// Heartbeat lost; only observable inside a tick.
    Stalled,
    /// Re-acquisition after a stall has not succeeded yet.
    Recovering,
    /// Torn down; nothing runs any more.
    Closed,
}

/// What a single tick did. Mostly useful for tests and the HUD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    NotRunning,
    RateLimited,
    NoNewFrame,
    /// Fresh frame but no model loaded: gesture-less mode.
    NoInference,
    Processed { hands: u8 },
    /// Per-frame failure, absorbed.
    Dropped,
    Stalled { recovered: bool },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionConfig {
    /// Minimum time between two inference calls.
    pub min_interval_ms: f64,
    pub heartbeat_ms: f64,
    pub max_recovery_attempts: u32,
}

impl DetectionConfig {
    /// Constrained devices run detection on a coarser cadence.
    pub fn for_device(device: DeviceClass) -> Self {
        Self {
            min_interval_ms: if device.is_constrained() { 30.0 } else { 16.0 },
            heartbeat_ms: HEARTBEAT_WINDOW_MS,
            max_recovery_attempts: MAX_RECOVERY_ATTEMPTS,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::for_device(DeviceClass::Desktop)
    }
}

pub struct DetectionLoop<C: CaptureDevice, S: LandmarkSource> {
    capture: C,
    source: Option<S>,
    config: DetectionConfig,
    phase: Phase,
    last_invocation_ms: Option<f64>,
    last_frame_ts: Option<f64>,
    last_alive_ms: f64,
    recovery_failures: u32,
    stalls: u32,
    degraded: bool,
    surfaced: Option<String>,
}

impl<C: CaptureDevice, S: LandmarkSource> DetectionLoop<C, S> {
    /// `source == None` means the model never loaded: frames still flow but
    /// no hand is ever reported.
    pub fn new(capture: C, source: Option<S>, config: DetectionConfig) -> Self {
        Self {
            capture,
            source,
            config,
            phase: Phase::Initializing,
            last_invocation_ms: None,
            last_frame_ts: None,
            last_alive_ms: 0.0,
            recovery_failures: 0,
            stalls: 0,
            degraded: false,
            surfaced: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_inference(&self) -> bool {
        self.source.is_some()
    }

    /// True once the loop has given up producing gestures for now.
    pub fn is_degraded(&self) -> bool {
        self.degraded || self.source.is_none()
    }

    /// Heartbeat stalls seen so far.
    pub fn stall_count(&self) -> u32 {
        self.stalls
    }

    /// Last error that was surfaced to the user, if any.
    pub fn surfaced_error(&self) -> Option<&str> {
        self.surfaced.as_deref()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.source.as_mut()
    }

    /// Acquire the capture device. A failure is surfaced and leaves the loop
    /// in `Initializing` until a visibility/focus event retries.
    pub fn start(&mut self, now_ms: f64) -> Result<(), Error> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.acquire(now_ms)
    }

    /// Visibility or focus came back: re-acquire whatever phase we are in.
    pub fn on_visibility_regained(&mut self, now_ms: f64) -> Result<(), Error> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        info!(phase = ?self.phase, "visibility regained, re-acquiring capture");
        self.acquire(now_ms)
    }

    fn acquire(&mut self, now_ms: f64) -> Result<(), Error> {
        match self.capture.open() {
            Ok(()) => {
                self.enter_running(now_ms);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "capture unavailable");
                self.phase = Phase::Initializing;
                self.surfaced = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn enter_running(&mut self, now_ms: f64) {
        self.phase = Phase::Running;
        self.last_alive_ms = now_ms;
        self.last_frame_ts = None;
        self.last_invocation_ms = None;
        self.recovery_failures = 0;
        if self.degraded {
            info!("capture recovered, leaving gesture-less mode");
        }
        self.degraded = false;
        self.surfaced = None;
    }

    /// One detection step. Writes `state` only when it has something to say.
    pub fn tick(&mut self, now_ms: f64, state: &mut GestureState) -> Tick {
        match self.phase {
            Phase::Running | Phase::Recovering => {}
            Phase::Initializing | Phase::Stalled | Phase::Closed => return Tick::NotRunning,
        }

        if now_ms - self.last_alive_ms > self.config.heartbeat_ms {
            return self.handle_stall(now_ms, state);
        }
        if self.phase == Phase::Recovering {
            return Tick::NotRunning;
        }

        if let Some(last) = self.last_invocation_ms {
            if now_ms - last < self.config.min_interval_ms {
                return Tick::RateLimited;
            }
        }
        self.last_invocation_ms = Some(now_ms);

        let frame = match self.capture.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Tick::NoNewFrame,
            Err(e) if e.is_per_frame() => {
                debug!(error = %e, "frame grab failed");
                return Tick::Dropped;
            }
            Err(e) => {
                // The heartbeat re-acquires once the window runs out.
                error!(error = %e, "capture lost");
                self.capture.stop();
                self.surfaced = Some(e.to_string());
                return Tick::Dropped;
            }
        };
        if self.last_frame_ts.is_some_and(|ts| frame.timestamp_ms <= ts) {
            return Tick::NoNewFrame;
        }
        self.last_frame_ts = Some(frame.timestamp_ms);
        self.last_alive_ms = now_ms;

        let Some(source) = self.source.as_mut() else {
            state.clear();
            return Tick::NoInference;
        };

        let hands = match source.detect(&frame.image, now_ms) {
            Ok(hands) => hands,
            Err(e) if e.is_per_frame() => {
                warn!(error = %e, "detection failed");
                return Tick::Dropped;
            }
            Err(e) => {
                error!(error = %e, "landmark source lost, continuing without gestures");
                source.close();
                self.source = None;
                self.surfaced = Some(e.to_string());
                state.clear();
                return Tick::Dropped;
            }
        };

        match classifier::classify(&hands) {
            Ok(Some(c)) => {
                state.apply(&c);
                Tick::Processed { hands: c.hand_count }
            }
            Ok(None) => {
                state.clear();
                Tick::Processed { hands: 0 }
            }
            Err(e) => {
                warn!(error = %e, "discarding malformed landmark set");
                state.clear();
                Tick::Dropped
            }
        }
    }

    fn handle_stall(&mut self, now_ms: f64, state: &mut GestureState) -> Tick {
        warn!(
            silent_ms = now_ms - self.last_alive_ms,
            phase = ?self.phase,
            "heartbeat lost, re-acquiring capture"
        );
        self.phase = Phase::Stalled;
        self.stalls += 1;
        state.clear();
        // One attempt per stall window.
        self.last_alive_ms = now_ms;

        self.phase = Phase::Recovering;
        match self.capture.open() {
            Ok(()) => {
                info!(stalls = self.stalls, "capture recovered after stall");
                self.enter_running(now_ms);
                Tick::Stalled { recovered: true }
            }
            Err(e) => {
                self.recovery_failures += 1;
                warn!(error = %e, failures = self.recovery_failures, "stall recovery failed");
                if self.recovery_failures >= self.config.max_recovery_attempts && !self.degraded {
                    let err = Error::DetectionStall { attempts: self.recovery_failures };
                    error!(error = %err, "continuing without gestures");
                    self.degraded = true;
                    self.surfaced = Some(err.to_string());
                }
                Tick::Stalled { recovered: false }
            }
        }
    }

    /// Tear down: release the stream and close the inference session.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closed;
        self.capture.stop();
        if let Some(source) = self.source.as_mut() {
            source.close();
        }
        info!("detection loop shut down");
    }
}

impl<C: CaptureDevice, S: LandmarkSource> Drop for DetectionLoop<C, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
