// Landmark Source boundary.
//
// The hand-landmark model is an opaque per-frame inference service. This
// module fixes its contract (`LandmarkSource`), bounds its startup
// (`load_with_timeout`) and provides two implementations:
//
// * `SubprocessLandmarker` talks to an external detector process (for
//   example a MediaPipe hand-landmarker script) over stdin/stdout.
// * `SimulatedHands` fabricates hands from keyboard state, so the whole
//   pipeline can run without a camera or a model.
//
// Detector process protocol:
//
// The process is started as `<python> <script> --model <path> --delegate
// cpu|gpu --num-hands 2` and must print `READY` on its own line once the
// model is loaded. For every frame it receives `width`, `height` and
// `channels` as little-endian `u32`, then `width*height*channels` RGB bytes,
// and answers with one JSON line:
//
// {"hands":[{"landmarks":[{"x":0.51,"y":0.73,"z":0.0}, ...21 points]}],"error":null}

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Error;
use crate::types::{DeviceClass, FrameBuffer, HandResult, Point3};

/// Points per hand in the fixed landmark topology.
pub const LANDMARK_COUNT: usize = 21;

/// The source never reports more than this many hands.
pub const MAX_HANDS: usize = 2;

/// Landmark indices used by the classifier.
pub mod index {
    pub const WRIST: usize = 0;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    pub const FINGERTIPS: [usize; 4] = [INDEX_FINGER_TIP, MIDDLE_FINGER_TIP, RING_FINGER_TIP, PINKY_TIP];
}

/// Compute backend the model should run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delegate {
    Cpu,
    Gpu,
}

impl Delegate {
    /// Constrained devices stay on the CPU; everything else asks for the GPU.
    pub fn for_device(device: DeviceClass) -> Self {
        if device.is_constrained() { Delegate::Cpu } else { Delegate::Gpu }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Delegate::Cpu => "cpu",
            Delegate::Gpu => "gpu",
        }
    }
}

/// Everything a source needs to initialize.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelOptions {
    pub model_path: PathBuf,
    pub delegate: Delegate,
    pub num_hands: usize,
}

impl ModelOptions {
    /// Delegate picked from the device class, up to [`MAX_HANDS`] hands.
    pub fn for_device(model_path: PathBuf, device: DeviceClass) -> Self {
        Self { model_path, delegate: Delegate::for_device(device), num_hands: MAX_HANDS }
    }
}

/// Per-frame hand detection. Calls are never overlapped: `&mut self` makes
/// one outstanding call the only possible shape.
pub trait LandmarkSource {
    /// Detect up to two hands in `frame`. `timestamp_ms` is monotonic.
    fn detect(&mut self, frame: &FrameBuffer, timestamp_ms: f64) -> Result<Vec<HandResult>, Error>;

    /// Release the inference session. Must be idempotent.
    fn close(&mut self) {}

    /// Keyboard controls, for sources that are driven by hand.
    fn simulated(&mut self) -> Option<&mut SimulatedHands> {
        None
    }
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn detect(&mut self, frame: &FrameBuffer, timestamp_ms: f64) -> Result<Vec<HandResult>, Error> {
        (**self).detect(frame, timestamp_ms)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn simulated(&mut self) -> Option<&mut SimulatedHands> {
        (**self).simulated()
    }
}

/// Build a source on a helper thread and give up after `timeout`.
///
/// A source that finishes loading after the deadline is dropped on the
/// helper thread.
pub fn load_with_timeout<S, F>(factory: F, timeout: Duration) -> Result<S, Error>
where
    S: Send + 'static,
    F: FnOnce() -> Result<S, Error> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(factory());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(Error::InferenceInitTimeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(Error::InferenceInit("loader thread exited without a result".into()))
        }
    }
}

/* --- Subprocess detector --- */

#[derive(Deserialize, Debug)]
struct DetectionReply {
    #[serde(default)]
    hands: Vec<HandResult>,
    #[serde(default)]
    error: Option<String>,
}

/// Landmark source backed by an external detector process.
pub struct SubprocessLandmarker {
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    num_hands: usize,
    closed: bool,
}

impl SubprocessLandmarker {
    /// Start `<python> <script>` and wait for its `READY` line.
    pub fn spawn(python: &Path, script: &Path, options: &ModelOptions) -> Result<Self, Error> {
        if !script.exists() {
            return Err(Error::InferenceInit(format!("detector script not found at {}", script.display())));
        }

        info!(script = %script.display(), delegate = options.delegate.as_str(), "starting landmark detector");
        let mut process = Command::new(python)
            .arg(script)
            .arg("--model")
            .arg(&options.model_path)
            .arg("--delegate")
            .arg(options.delegate.as_str())
            .arg("--num-hands")
            .arg(options.num_hands.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::InferenceInit(format!("spawn detector: {e}")))?;

        let stdin = process.stdin.take();
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::InferenceInit("detector stdout unavailable".into()))?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout
            .read_line(&mut ready)
            .map_err(|e| Error::InferenceInit(format!("waiting for READY: {e}")))?;
        if ready.trim() != "READY" {
            let _ = process.kill();
            let _ = process.wait();
            return Err(Error::InferenceInit(format!("detector did not signal ready, got {:?}", ready.trim())));
        }

        info!("landmark detector ready");
        Ok(Self { process, stdin, stdout, num_hands: options.num_hands.min(MAX_HANDS), closed: false })
    }
}

impl LandmarkSource for SubprocessLandmarker {
    fn detect(&mut self, frame: &FrameBuffer, timestamp_ms: f64) -> Result<Vec<HandResult>, Error> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::DetectorExited("session is closed".into()))?;

        let io = |e: std::io::Error| Error::DetectorExited(format!("pipe: {e}"));
        stdin.write_all(&(frame.width as u32).to_le_bytes()).map_err(io)?;
        stdin.write_all(&(frame.height as u32).to_le_bytes()).map_err(io)?;
        stdin.write_all(&3u32.to_le_bytes()).map_err(io)?;
        stdin.write_all(&frame.to_rgb_bytes()).map_err(io)?;
        stdin.flush().map_err(io)?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line).map_err(io)? == 0 {
            return Err(Error::DetectorExited("end of output".into()));
        }
        let reply: DetectionReply = serde_json::from_str(&line)
            .map_err(|e| Error::Inference(format!("bad detector reply: {e}")))?;

        if let Some(err) = reply.error {
            return Err(Error::Inference(err));
        }

        let mut hands = reply.hands;
        hands.truncate(self.num_hands);
        debug!(timestamp_ms, hands = hands.len(), "detector reply");
        Ok(hands)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Closing stdin lets a well-behaved detector exit on its own.
        self.stdin = None;
        if let Err(e) = self.process.kill() {
            debug!(error = %e, "detector already exited");
        }
        let _ = self.process.wait();
        info!("landmark detector closed");
    }
}

impl Drop for SubprocessLandmarker {
    fn drop(&mut self) {
        self.close();
    }
}

/* --- Simulation --- */

/// Tip distance / palm size used for a simulated open palm.
pub const SIM_OPEN_RATIO: f32 = 1.7;
/// ... and for a simulated fist.
pub const SIM_CLOSED_RATIO: f32 = 0.8;

const SIM_PALM_SIZE: f32 = 0.15;

/// Build a plausible 21-point hand with the wrist at (`wrist_x`, `wrist_y`).
///
/// Every fingertip sits at exactly `tip_ratio * palm` from the wrist, so the
/// classifier sees that ratio unchanged.
pub fn synthetic_hand(wrist_x: f32, wrist_y: f32, palm: f32, tip_ratio: f32) -> HandResult {
    let mut pts = vec![Point3::default(); LANDMARK_COUNT];
    let at = |angle: f32, dist: f32| {
        Point3::new(wrist_x + angle.sin() * dist, wrist_y - angle.cos() * dist, 0.0)
    };
    pts[index::WRIST] = Point3::new(wrist_x, wrist_y, 0.0);

    // Thumb (1..=4) fans out to the side.
    for (k, f) in [0.3f32, 0.6, 0.8, 1.0].iter().enumerate() {
        pts[1 + k] = at(-0.9, palm * f * tip_ratio.min(1.0));
    }

    // Index, middle, ring, pinky: MCP at palm distance, tip at ratio * palm.
    // The middle finger points straight up so landmark 9 sits on the palm axis.
    let angles = [-0.2f32, 0.0, 0.2, 0.4];
    for (f, angle) in angles.iter().enumerate() {
        let mcp = 5 + f * 4;
        let tip_dist = palm * tip_ratio;
        pts[mcp] = at(*angle, palm);
        pts[mcp + 1] = at(*angle, palm + (tip_dist - palm) / 3.0);
        pts[mcp + 2] = at(*angle, palm + 2.0 * (tip_dist - palm) / 3.0);
        pts[mcp + 3] = at(*angle, tip_dist);
    }

    HandResult { landmarks: pts }
}

/// Keyboard-driven landmark source for simulation mode.
#[derive(Debug, Default)]
pub struct SimulatedHands {
    hand_count: usize,
    open: bool,
    calls: u64,
}

impl SimulatedHands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hand_count(&mut self, count: usize) {
        self.hand_count = count.min(MAX_HANDS);
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    pub fn hand_count(&self) -> usize {
        self.hand_count
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// How many detection calls reached this source.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl LandmarkSource for SimulatedHands {
    fn detect(&mut self, _frame: &FrameBuffer, _timestamp_ms: f64) -> Result<Vec<HandResult>, Error> {
        self.calls += 1;
        let ratio = if self.open { SIM_OPEN_RATIO } else { SIM_CLOSED_RATIO };
        Ok((0..self.hand_count)
            .map(|i| synthetic_hand(0.35 + 0.3 * i as f32, 0.75, SIM_PALM_SIZE, ratio))
            .collect())
    }

    fn simulated(&mut self) -> Option<&mut SimulatedHands> {
        Some(self)
    }
}
