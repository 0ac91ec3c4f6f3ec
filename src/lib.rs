// Gesture-driven particle text.
//
// A camera feeds a hand-landmark detector; the landmarks become a smoothed
// gesture signal that steers a few thousand particles between a dispersed
// cloud, a rasterized message and a vortex around an orbiting photo ring.
// Gestures are optional: without a camera or model the scene still runs.

pub mod app;
pub mod camera;
pub mod classifier;
pub mod config;
pub mod debounce;
pub mod detection;
pub mod draw;
pub mod error;
pub mod field;
pub mod font;
pub mod gamma;
pub mod gesture;
pub mod landmarks;
pub mod pattern;
pub mod render;
pub mod shader;
pub mod types;
pub mod visual;

pub use app::{App, Command};
pub use config::{AppConfig, Args};
pub use error::Error;
