// Command line → validated runtime config.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use glam::Vec3;

use crate::error::Error;
use crate::field::{DEFAULT_MESSAGE, DEFAULT_PARTICLE_COUNT};
use crate::landmarks::{Delegate, ModelOptions};
use crate::pattern::Pattern;
use crate::types::DeviceClass;

pub const DEFAULT_COLOR: &str = "#FFB6C1";
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 10_000;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "palm-particles",
    version,
    about = "Hand-gesture driven particle text, with a photo ring for two hands"
)]
pub struct Args {
    /// Number of particles (fixed for the session).
    #[arg(long, default_value_t = DEFAULT_PARTICLE_COUNT)]
    pub particles: usize,

    /// Message rasterized into the text formation. `\n` starts a new line.
    #[arg(long, default_value = "HAPPY\\nVALENTINE'S DAY\\nBEBE")]
    pub message: String,

    /// Further messages, cycled with M (repeatable).
    #[arg(long = "alt-message")]
    pub alt_messages: Vec<String>,

    /// Base particle color as #RRGGBB.
    #[arg(long, default_value = DEFAULT_COLOR)]
    pub color: String,

    /// Initial pattern: scatter, text (text_valentine) or vortex.
    #[arg(long, default_value = "scatter")]
    pub pattern: String,

    /// Phone/tablet class device: coarser detection, smaller text, CPU delegate.
    #[arg(long)]
    pub constrained: bool,

    /// Camera index.
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// No camera or model: synthetic frames and keyboard-driven hands.
    #[arg(long)]
    pub simulate: bool,

    /// Python interpreter that runs the detector script.
    #[arg(long, default_value = "python3")]
    pub python: PathBuf,

    /// Detector script speaking the landmark protocol.
    #[arg(long, default_value = "scripts/hand_landmarker.py")]
    pub detector: PathBuf,

    /// Hand landmark model asset.
    #[arg(long, default_value = "models/hand_landmarker.task")]
    pub model: PathBuf,

    /// Model load bound; past it the app runs without gestures.
    #[arg(long, default_value_t = DEFAULT_INIT_TIMEOUT_MS)]
    pub init_timeout_ms: u64,

    /// Photo for the ring (repeatable; members alternate through them).
    #[arg(long = "photo")]
    pub photos: Vec<PathBuf>,

    #[arg(long, default_value_t = 960)]
    pub width: usize,

    #[arg(long, default_value_t = 540)]
    pub height: usize,

    /// Seed for particle seeds and depth jitter.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Where the landmark detector lives when not simulating.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    pub python: PathBuf,
    pub script: PathBuf,
    pub model: ModelOptions,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub particles: usize,
    pub message: String,
    pub alt_messages: Vec<String>,
    pub base_color: Vec3,
    pub pattern: Pattern,
    pub device: DeviceClass,
    pub camera_index: u32,
    pub simulate: bool,
    pub detector: DetectorConfig,
    pub init_timeout: Duration,
    pub photos: Vec<PathBuf>,
    pub width: usize,
    pub height: usize,
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let device = DeviceClass::Desktop;
        Self {
            particles: DEFAULT_PARTICLE_COUNT,
            message: DEFAULT_MESSAGE.to_string(),
            alt_messages: Vec::new(),
            base_color: Vec3::new(1.0, 182.0 / 255.0, 193.0 / 255.0),
            pattern: Pattern::Scatter,
            device,
            camera_index: 0,
            simulate: false,
            detector: DetectorConfig {
                python: PathBuf::from("python3"),
                script: PathBuf::from("scripts/hand_landmarker.py"),
                model: ModelOptions::for_device(PathBuf::from("models/hand_landmarker.task"), device),
            },
            init_timeout: Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS),
            photos: Vec::new(),
            width: 960,
            height: 540,
            seed: None,
        }
    }
}

impl TryFrom<Args> for AppConfig {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Error> {
        if args.particles == 0 {
            return Err(Error::Config("--particles must be > 0".into()));
        }
        if args.width == 0 || args.height == 0 {
            return Err(Error::Config(format!("window size {}x{} is empty", args.width, args.height)));
        }
        let device = if args.constrained { DeviceClass::Constrained } else { DeviceClass::Desktop };
        Ok(Self {
            particles: args.particles,
            message: unescape_message(&args.message),
            alt_messages: args.alt_messages.iter().map(|m| unescape_message(m)).collect(),
            base_color: parse_hex_color(&args.color)?,
            pattern: args.pattern.parse()?,
            device,
            camera_index: args.camera,
            simulate: args.simulate,
            detector: DetectorConfig {
                python: args.python,
                script: args.detector,
                model: ModelOptions::for_device(args.model, device),
            },
            init_timeout: Duration::from_millis(args.init_timeout_ms),
            photos: args.photos,
            width: args.width,
            height: args.height,
            seed: args.seed,
        })
    }
}

impl AppConfig {
    /// The main message followed by the alternates, in cycling order.
    pub fn messages(&self) -> Vec<String> {
        std::iter::once(self.message.clone()).chain(self.alt_messages.iter().cloned()).collect()
    }

    pub fn delegate(&self) -> Delegate {
        self.detector.model.delegate
    }

    /// Base color as sRGB bytes, for tinting placeholder cards.
    pub fn tint(&self) -> [u8; 3] {
        let c = self.base_color * 255.0;
        [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8]
    }
}

/// `#RRGGBB` (or `RRGGBB`) to linear-free 0..1 RGB.
pub fn parse_hex_color(s: &str) -> Result<Vec3, Error> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(Error::Config(format!("color {s:?} is not #RRGGBB")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| Error::Config(format!("color {s:?} is not #RRGGBB")))
    };
    Ok(Vec3::new(channel(0)?, channel(2)?, channel(4)?))
}

/// Shells pass `\n` literally; turn it into a line break.
pub fn unescape_message(s: &str) -> String {
    s.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<AppConfig, Error> {
        let args = Args::try_parse_from(std::iter::once("palm-particles").chain(argv.iter().copied()))
            .map_err(|e| Error::Config(e.to_string()))?;
        AppConfig::try_from(args)
    }

    #[test]
    fn defaults_match_default_config() {
        assert_eq!(parse(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn message_escapes_become_newlines() {
        let cfg = parse(&["--message", "HI\\nTHERE"]).unwrap();
        assert_eq!(cfg.message, "HI\nTHERE");
    }

    #[test]
    fn alternate_messages_follow_the_main_one() {
        let cfg = parse(&["--message", "HI", "--alt-message", "LOVE\\nYOU", "--alt-message", "BEBE"]).unwrap();
        assert_eq!(cfg.messages(), vec!["HI", "LOVE\nYOU", "BEBE"]);
        assert_eq!(AppConfig::default().messages().len(), 1);
    }

    #[test]
    fn constrained_picks_cpu_delegate() {
        let cfg = parse(&["--constrained"]).unwrap();
        assert_eq!(cfg.device, DeviceClass::Constrained);
        assert_eq!(cfg.delegate(), Delegate::Cpu);
        assert_eq!(parse(&[]).unwrap().delegate(), Delegate::Gpu);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["--particles", "0"]).is_err());
        assert!(parse(&["--color", "pink"]).is_err());
        assert!(parse(&["--color", "#GG0000"]).is_err());
        assert!(parse(&["--pattern", "spiral"]).is_err());
        assert!(parse(&["--width", "0"]).is_err());
    }

    #[test]
    fn repeatable_photos_and_pattern_alias() {
        let cfg = parse(&["--photo", "a.jpg", "--photo", "b.jpg", "--pattern", "text_valentine"]).unwrap();
        assert_eq!(cfg.photos.len(), 2);
        assert_eq!(cfg.pattern, Pattern::Text);
    }

    #[test]
    fn hex_color_parses_with_or_without_hash() {
        assert_eq!(parse_hex_color("#FF0000").unwrap(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("00ff00").unwrap(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(AppConfig::default().tint(), [0xFF, 0xB6, 0xC1]);
    }
}
