// Capture boundary: owns the video stream and hands out timestamped frames.
// Exactly one stream is active at a time; `open` releases the previous
// stream's hardware handle before asking for a new one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::types::{Frame, FrameBuffer};

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};
use tracing::{debug, info, warn};

/// Preferred capture request: 640x480 from the user-facing camera.
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

/// How long `open` waits for the device to start streaming.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `stop` waits for the grab thread to release the device.
pub const STOP_TIMEOUT: Duration = Duration::from_millis(250);
/// Back-off after a failed grab so a broken device does not spin.
const GRAB_RETRY: Duration = Duration::from_millis(20);

/// Anything that can hand the detection loop video frames.
pub trait CaptureDevice {
    /// Acquire (or re-acquire) the stream. Idempotent: an open stream is
    /// stopped first.
    fn open(&mut self) -> Result<(), Error>;

    /// Release the stream. Safe to call when already stopped.
    fn stop(&mut self);

    fn is_open(&self) -> bool;

    /// The newest frame, or `None` when nothing new is ready. Never blocks.
    fn poll_frame(&mut self) -> Result<Option<Frame>, Error>;
}

/// A blocking frame source. Built, used and dropped on the grab thread only,
/// so it does not have to be `Send`.
pub trait FrameGrabber {
    /// Wait for the next frame from the device.
    fn grab(&mut self) -> Result<FrameBuffer, Error>;

    /// Release the hardware. Called once, before the grab thread exits.
    fn release(&mut self) {}
}

type Connector = dyn Fn() -> Result<Box<dyn FrameGrabber>, Error> + Send + Sync;
type Slot = Arc<Mutex<Option<Result<Frame, Error>>>>;

struct GrabThread {
    latest: Slot,
    running: Arc<AtomicBool>,
    // Never written; disconnects when the thread ends.
    done: Receiver<()>,
}

/// Runs a blocking [`FrameGrabber`] on its own thread.
///
/// The grab thread overwrites a single slot with every frame it gets, so
/// `poll_frame` only ever takes the newest one and a slow or hung device
/// lowers the detection rate without holding up the caller.
pub struct ThreadedCapture {
    label: String,
    connect: Arc<Connector>,
    epoch: Instant,
    worker: Option<GrabThread>,
}

impl ThreadedCapture {
    /// `connect` is called on the grab thread for every `open`.
    pub fn new<F>(label: impl Into<String>, connect: F) -> Self
    where
        F: Fn() -> Result<Box<dyn FrameGrabber>, Error> + Send + Sync + 'static,
    {
        Self { label: label.into(), connect: Arc::new(connect), epoch: Instant::now(), worker: None }
    }

    /// Webcam `index` through nokhwa, asking for `width`x`height`.
    pub fn camera(index: u32, width: u32, height: u32) -> Self {
        Self::new(format!("camera-{index}"), move || {
            let grabber = NokhwaGrabber::open(index, width, height)?;
            Ok(Box::new(grabber) as Box<dyn FrameGrabber>)
        })
    }
}

impl CaptureDevice for ThreadedCapture {
    fn open(&mut self) -> Result<(), Error> {
        self.stop();

        let latest: Slot = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let connect = Arc::clone(&self.connect);
        let slot = Arc::clone(&latest);
        let flag = Arc::clone(&running);
        let epoch = self.epoch;
        thread::Builder::new()
            .name(format!("grab-{}", self.label))
            .spawn(move || {
                let _done = done_tx;
                let mut grabber = match connect() {
                    Ok(g) => g,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while flag.load(Ordering::Acquire) {
                    let item = grabber
                        .grab()
                        .map(|image| Frame { image, timestamp_ms: epoch.elapsed().as_secs_f64() * 1000.0 });
                    let failed = item.is_err();
                    match slot.lock() {
                        Ok(mut s) => *s = Some(item),
                        Err(poisoned) => *poisoned.into_inner() = Some(item),
                    }
                    if failed {
                        thread::sleep(GRAB_RETRY);
                    }
                }
                grabber.release();
            })
            .map_err(|e| Error::CaptureUnavailable(format!("spawn grab thread: {e}")))?;

        let worker = GrabThread { latest, running, done: done_rx };
        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {
                info!(label = %self.label, "capture acquired");
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => {
                worker.running.store(false, Ordering::Release);
                Err(Error::CaptureUnavailable(format!("{} did not start within {OPEN_TIMEOUT:?}", self.label)))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::CaptureUnavailable(format!("{} grab thread exited while opening", self.label)))
            }
        }
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else { return };
        worker.running.store(false, Ordering::Release);
        match worker.done.recv_timeout(STOP_TIMEOUT) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(label = %self.label, "grab thread still blocked, detaching it");
            }
            _ => info!(label = %self.label, "capture released"),
        }
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>, Error> {
        let Some(worker) = self.worker.as_ref() else { return Ok(None) };
        let taken = match worker.latest.lock() {
            Ok(mut s) => s.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match taken {
            Some(item) => item.map(Some),
            None if matches!(worker.done.try_recv(), Err(TryRecvError::Disconnected)) => {
                Err(Error::CaptureUnavailable(format!("{} grab thread exited", self.label)))
            }
            None => Ok(None),
        }
    }
}

impl Drop for ThreadedCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

// A small wrapper around nokhwa::Camera; lives on the grab thread.
struct NokhwaGrabber {
    cam: Camera,
}

impl NokhwaGrabber {
    fn open(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        // 1) Choose the device (0 = default, user-facing webcam)
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,                // target FPS
        );

        // 2) Ask for RGB frames near our request.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // 3) Create the camera (fails on denied permission or missing device).
        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CaptureUnavailable(format!("create camera: {e}")))?;

        // 4) Start streaming frames from the camera.
        cam.open_stream()
            .map_err(|e| Error::CaptureUnavailable(format!("open stream: {e}")))?;

        // 5) The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();
        info!(index, width = actual.width(), height = actual.height(), "camera streaming");
        Ok(Self { cam })
    }
}

impl FrameGrabber for NokhwaGrabber {
    fn grab(&mut self) -> Result<FrameBuffer, Error> {
        // Blocks until a new frame is ready.
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("fetch frame: {e}")))?;

        // Decode to an ImageBuffer<Rgb<u8>, Vec<u8>> (handles various raw formats safely).
        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("decode RGB: {e}")))?;

        // Pack as 0x00RRGGBB, the layout the rest of the pipeline uses.
        let (w, h) = rgb_img.dimensions();
        let mut out = Vec::with_capacity((w as usize) * (h as usize));
        for pixel in rgb_img.pixels() {
            let r = pixel[0] as u32;
            let g = pixel[1] as u32;
            let b = pixel[2] as u32;
            out.push((r << 16) | (g << 8) | b);
        }
        Ok(FrameBuffer { width: w as usize, height: h as usize, pixels: out })
    }

    fn release(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            warn!(error = %e, "stopping capture stream failed");
        }
        debug!("camera stream stopped");
    }
}

/// Camera stand-in for simulation mode: blank frames on a fixed 30 FPS clock.
///
/// It can be told to refuse the next few `open` calls or to freeze its clock,
/// which is how a denied permission or a silently stalled stream looks from
/// the detection loop's side.
pub struct SyntheticCapture {
    width: usize,
    height: usize,
    open: bool,
    frozen: bool,
    frame_index: u64,
    frame_interval_ms: f64,
    refuse_opens: u32,
    opens: u32,
}

impl SyntheticCapture {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            open: false,
            frozen: false,
            frame_index: 0,
            frame_interval_ms: 1000.0 / 30.0,
            refuse_opens: 0,
            opens: 0,
        }
    }

    /// Make the next `n` calls to `open` fail with `CaptureUnavailable`.
    pub fn refuse_next_opens(&mut self, n: u32) {
        self.refuse_opens = n;
    }

    /// Stop producing new frames (the stream stays "open").
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// How many times `open` was attempted, successful or not.
    pub fn open_attempts(&self) -> u32 {
        self.opens
    }
}

impl CaptureDevice for SyntheticCapture {
    fn open(&mut self) -> Result<(), Error> {
        self.stop();
        self.opens += 1;
        if self.refuse_opens > 0 {
            self.refuse_opens -= 1;
            return Err(Error::CaptureUnavailable("synthetic capture refused".into()));
        }
        // A fresh stream starts ticking again.
        self.frozen = false;
        self.open = true;
        debug!(width = self.width, height = self.height, "synthetic capture acquired");
        Ok(())
    }

    fn stop(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>, Error> {
        if !self.open {
            return Ok(None);
        }
        if !self.frozen {
            self.frame_index += 1;
        }
        Ok(Some(Frame {
            image: FrameBuffer::new(self.width, self.height),
            timestamp_ms: self.frame_index as f64 * self.frame_interval_ms,
        }))
    }
}
