// One error type for the whole pipeline.
// Every variant states *where* things went wrong; the detection loop decides
// which ones are per-frame noise (logged, absorbed) and which are surfaced.
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Creating the window failed.
    #[error("window init error: {0}")]
    WindowInit(String),

    /// Pushing a frame to the window failed.
    #[error("window update error: {0}")]
    WindowUpdate(String),

    /// Camera permission or hardware denied. Terminal for the session.
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Grabbing/decoding a single frame failed.
    #[error("camera frame error: {0}")]
    CameraFrame(String),

    /// The landmark model did not load within the startup bound.
    #[error("inference init timed out after {0:?}")]
    InferenceInitTimeout(Duration),

    #[error("inference init failed: {0}")]
    InferenceInit(String),

    /// A single detection call failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The landmark session is gone for good (detector process died).
    #[error("landmark detector exited: {0}")]
    DetectorExited(String),

    #[error("malformed landmark set: expected {expected} points, got {actual}")]
    MalformedLandmarkSet { expected: usize, actual: usize },

    /// Heartbeat recovery gave up.
    #[error("detection stalled: {attempts} recovery attempts failed")]
    DetectionStall { attempts: u32 },

    #[error("invalid config: {0}")]
    Config(String),

    /// A ring photo could not be read or decoded.
    #[error("photo {path}: {source}")]
    Photo {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

impl Error {
    /// Errors that only affect the current frame and must never leave the
    /// detection loop.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Error::CameraFrame(_) | Error::Inference(_) | Error::MalformedLandmarkSet { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_frame_classification() {
        assert!(Error::MalformedLandmarkSet { expected: 21, actual: 3 }.is_per_frame());
        assert!(Error::CameraFrame("decode".into()).is_per_frame());
        assert!(!Error::CaptureUnavailable("denied".into()).is_per_frame());
        assert!(!Error::InferenceInitTimeout(Duration::from_secs(10)).is_per_frame());
        assert!(!Error::DetectorExited("broken pipe".into()).is_per_frame());
    }

    #[test]
    fn malformed_message_names_counts() {
        let msg = Error::MalformedLandmarkSet { expected: 21, actual: 20 }.to_string();
        assert!(msg.contains("21"));
        assert!(msg.contains("20"));
    }
}
