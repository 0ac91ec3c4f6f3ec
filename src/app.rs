// Orchestrator.
//
// Owns every stage and runs them in one fixed order per tick:
//
// detection tick ─▶ GestureState ─▶ debouncer ─▶ pattern table ─▶ visual tick
//
// The detection tick finishes writing the gesture state before anything
// reads it, so the single-writer cell needs no locking.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::camera::CaptureDevice;
use crate::config::AppConfig;
use crate::debounce::{CommitNotification, CommittedGesture, Debouncer};
use crate::detection::{DetectionConfig, DetectionLoop, Phase, Tick};
use crate::error::Error;
use crate::field::ParticleField;
use crate::gesture::GestureState;
use crate::landmarks::LandmarkSource;
use crate::pattern::{self, Pattern};
use crate::visual::VisualStateMachine;

/// User input, already decoupled from the window backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open the start gate.
    Start,
    /// Next manual pattern.
    CyclePattern,
    /// Focus/visibility regained.
    Focus,
    /// Simulation only.
    SetHands(u8),
    /// Simulation only.
    ToggleOpen,
    /// Rasterize the next configured message.
    NextMessage,
}

/// What one app tick did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub detection: Tick,
    pub commit: Option<CommitNotification>,
    pub pattern: Pattern,
}

pub struct App<C: CaptureDevice, S: LandmarkSource> {
    detection: DetectionLoop<C, S>,
    gesture: GestureState,
    debouncer: Debouncer,
    manual: Pattern,
    pattern: Pattern,
    visual: VisualStateMachine,
    field: ParticleField,
    messages: Vec<String>,
    message_index: usize,
    rng: StdRng,
}

impl<C: CaptureDevice, S: LandmarkSource> App<C, S> {
    /// `source == None` runs without gestures from the first frame.
    pub fn new<R: Rng + ?Sized>(config: &AppConfig, capture: C, source: Option<S>, rng: &mut R) -> Self {
        let field = ParticleField::generate(&config.message, config.particles, config.device, rng);
        info!(particles = field.len(), device = ?config.device, pattern = %config.pattern, "particle field ready");
        Self {
            detection: DetectionLoop::new(capture, source, DetectionConfig::for_device(config.device)),
            gesture: GestureState::default(),
            debouncer: Debouncer::default(),
            manual: config.pattern,
            pattern: config.pattern,
            visual: VisualStateMachine::new(config.base_color, config.device),
            field,
            messages: config.messages(),
            message_index: 0,
            rng: StdRng::seed_from_u64(rng.next_u64()),
        }
    }

    /// Acquire the camera. A refusal is surfaced but not fatal: the scene
    /// keeps rendering without gestures.
    pub fn boot(&mut self, now_ms: f64) -> Result<(), Error> {
        self.detection.start(now_ms)
    }

    pub fn is_started(&self) -> bool {
        self.visual.is_started()
    }

    /// Open the start gate. Repeated calls are no-ops.
    pub fn start(&mut self) {
        if self.visual.is_started() {
            return;
        }
        info!("session started");
        self.visual.set_started(true);
    }

    pub fn set_manual_pattern(&mut self, p: Pattern) {
        if p != self.manual {
            info!(from = %self.manual, to = %p, "manual pattern");
            self.manual = p;
        }
    }

    pub fn manual_pattern(&self) -> Pattern {
        self.manual
    }

    /// Pattern in effect after the last tick.
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn committed(&self) -> CommittedGesture {
        self.debouncer.committed()
    }

    pub fn visual(&self) -> &VisualStateMachine {
        &self.visual
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn detection(&self) -> &DetectionLoop<C, S> {
        &self.detection
    }

    pub fn detection_mut(&mut self) -> &mut DetectionLoop<C, S> {
        &mut self.detection
    }

    /// Replace the message; the field is regenerated only if it changed.
    pub fn set_message(&mut self, message: &str) -> bool {
        let count = self.field.len();
        let changed = self.field.retarget(message, count, &mut self.rng);
        if changed {
            info!(message = %message.replace('\n', " / "), "message changed");
        }
        changed
    }

    /// Step through the configured messages, wrapping around.
    pub fn next_message(&mut self) -> bool {
        if self.messages.len() < 2 {
            debug!("only one message configured");
            return false;
        }
        self.message_index = (self.message_index + 1) % self.messages.len();
        let message = self.messages[self.message_index].clone();
        self.set_message(&message)
    }

    pub fn handle(&mut self, cmd: Command, now_ms: f64) {
        match cmd {
            Command::Start => self.start(),
            Command::CyclePattern => self.set_manual_pattern(self.manual.next()),
            Command::Focus => {
                // Already logged and surfaced by the loop.
                let _ = self.detection.on_visibility_regained(now_ms);
            }
            Command::SetHands(n) => match self.detection.source_mut().and_then(|s| s.simulated()) {
                Some(sim) => sim.set_hand_count(n as usize),
                None => warn!(hands = n, "hand count is only adjustable in simulation"),
            },
            Command::ToggleOpen => match self.detection.source_mut().and_then(|s| s.simulated()) {
                Some(sim) => sim.toggle_open(),
                None => warn!("open/closed is only adjustable in simulation"),
            },
            Command::NextMessage => {
                self.next_message();
            }
        }
    }

    /// One full tick at `now_ms` (monotonic), `dt` seconds after the last.
    pub fn tick(&mut self, now_ms: f64, dt: f32) -> TickReport {
        let detection = self.detection.tick(now_ms, &mut self.gesture);
        let commit = self.debouncer.update(&self.gesture);
        let committed = self.debouncer.committed();

        let next = pattern::select(self.visual.is_started(), self.manual, committed);
        if next != self.pattern {
            info!(from = %self.pattern, to = %next, "pattern");
            self.pattern = next;
        }

        self.visual.tick(dt, self.pattern, committed, &self.gesture);
        TickReport { detection, commit, pattern: self.pattern }
    }

    /// Status lines for the HUD.
    pub fn hud_lines(&self, fps: f32) -> Vec<String> {
        let phase = match self.detection.phase() {
            Phase::Initializing => "INIT",
            Phase::Running => "RUNNING",
            Phase::Stalled => "STALLED",
            Phase::Recovering => "RECOVERING",
            Phase::Closed => "CLOSED",
        };
        let c = self.committed();
        let hand = match (c.hand_count, c.is_open) {
            (0, _) => "NO HANDS".to_string(),
            (n, true) => format!("{n} OPEN"),
            (n, false) => format!("{n} CLOSED"),
        };
        let mut lines = vec![format!(
            "{phase} | {hand} | {} | FPS: {fps:.1}",
            self.pattern.as_str().to_uppercase()
        )];
        if !self.detection.has_inference() {
            lines.push("NO GESTURES: DETECTOR NOT LOADED".to_string());
        }
        if let Some(err) = self.detection.surfaced_error() {
            lines.push(err.to_uppercase());
        }
        if !self.is_started() {
            lines.push("SPACE: START  P: PATTERN  M: MESSAGE  ESC: QUIT".to_string());
        }
        lines
    }

    /// Stop detection, release the camera, close the model. Idempotent.
    pub fn shutdown(&mut self) {
        self.detection.shutdown();
    }
}

impl<C: CaptureDevice, S: LandmarkSource> Drop for App<C, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
