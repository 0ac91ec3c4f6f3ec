// What you SEE:
// • A cloud of pink particles. Space starts the session.
// • Closed fist (pattern = text): particles collapse into the message, hearts float around it.
// • Open hand: particles scatter again. Two hands: vortex + orbiting photo ring.
// • P cycles the pattern before start, M the message, F re-acquires the camera, ESC quits.
// • With --simulate: 0/1/2 set the hand count, O toggles open/closed.

use std::time::{Duration, Instant};

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use palm_particles::camera::{CAPTURE_HEIGHT, CAPTURE_WIDTH, CaptureDevice, SyntheticCapture, ThreadedCapture};
use palm_particles::draw::{Drawer, draw_text_5x7, draw_text_centered};
use palm_particles::landmarks::{LandmarkSource, SimulatedHands, SubprocessLandmarker, load_with_timeout};
use palm_particles::render::Renderer;
use palm_particles::types::FrameBuffer;
use palm_particles::{App, AppConfig, Args, Command, Error};

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("palm_particles=info")),
        )
        .init();

    let config = AppConfig::try_from(Args::parse())?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if config.simulate {
        info!("simulation mode: synthetic frames, keyboard hands");
        let capture = SyntheticCapture::new(CAPTURE_WIDTH as usize, CAPTURE_HEIGHT as usize);
        let app = App::new(&config, capture, Some(SimulatedHands::new()), &mut rng);
        run(&config, app)
    } else {
        let capture = ThreadedCapture::camera(config.camera_index, CAPTURE_WIDTH, CAPTURE_HEIGHT);
        let source = load_detector(&config);
        let app = App::new(&config, capture, source, &mut rng);
        run(&config, app)
    }
}

/// A detector that fails or times out leaves the app gesture-less.
fn load_detector(config: &AppConfig) -> Option<SubprocessLandmarker> {
    let detector = config.detector.clone();
    let loaded = load_with_timeout(
        move || SubprocessLandmarker::spawn(&detector.python, &detector.script, &detector.model),
        config.init_timeout,
    );
    match loaded {
        Ok(source) => {
            info!(delegate = config.delegate().as_str(), "hand landmarker loaded");
            Some(source)
        }
        Err(e) => {
            warn!(error = %e, "continuing without gestures");
            None
        }
    }
}

fn run<C: CaptureDevice, S: LandmarkSource>(config: &AppConfig, mut app: App<C, S>) -> Result<(), Error> {
    let mut drawer = Drawer::new("Palm Particles", config.width, config.height)?;
    let mut screen = FrameBuffer::new(config.width, config.height);
    let renderer = Renderer::new(config.width, config.height, Renderer::load_photos(&config.photos), config.tint());

    let clock = Instant::now();
    let now_ms = || clock.elapsed().as_secs_f64() * 1000.0;

    // Camera refusal is shown in the HUD; rendering goes on.
    if let Err(e) = app.boot(now_ms()) {
        warn!(error = %e, "starting without camera");
    }

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut fps = 0.0f32;
    let mut last_frame_time = Instant::now();
    let mut was_active = true;

    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();
        let dt = (now - last_frame_time).as_secs_f32();
        last_frame_time = now;

        for cmd in drawer.commands() {
            app.handle(cmd, now_ms());
        }
        let active = drawer.is_active();
        if active && !was_active {
            app.handle(Command::Focus, now_ms());
        }
        was_active = active;

        app.tick(now_ms(), dt);

        renderer.render(&mut screen, app.visual(), app.field());
        if !app.is_started() {
            draw_text_centered(&mut screen, config.height as i32 - 60, "PRESS SPACE", 0x00_FF_B6_C1, 3);
        }
        for (i, line) in app.hud_lines(fps).iter().enumerate() {
            draw_text_5x7(&mut screen, 8, 8 + 10 * i as i32, line, 0x00_FF_FF_FF);
        }
        drawer.present(&screen)?;

        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            fps = frames_this_second as f32 / secs;
            debug!(fps, pattern = %app.pattern(), "frame rate");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    app.shutdown();
    Ok(())
}
