// Demo host: one shiny button on a plain page.
// • Move the mouse: the cursor reflection follows it (visible over the button).
// • Click the button: it sinks and leaves a fingerprint (20 at most).
// • Up/Down: rougher/smoother reflection. ESC quits.

use anyhow::{Context, Result};
use clap::Parser;
use minifb::Key;
use shiny_button::camera::CameraSource;
use shiny_button::media::{MediaSource, UnavailableSource};
use shiny_button::types::{FrameBuffer, Point};
use shiny_button::{Compositor, Config, HostAgent, MediaStatus, PointerRouter, ShinyButton, draw};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const ROUGHNESS_STEP: f64 = 0.05;

#[derive(Parser, Debug)]
#[command(name = "shiny-button")]
#[command(about = "A camera-lit reflective button", long_about = None)]
struct Cli {
    /// TOML config with [button], [camera] and [host] tables
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Button label
    #[arg(short, long)]
    text: Option<String>,

    /// Surface roughness, nominally 0..1
    #[arg(short, long, allow_negative_numbers = true)]
    roughness: Option<f64>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Camera device index
    #[arg(long)]
    camera_index: Option<u32>,

    /// Never open the camera; use the gradient reflection
    #[arg(long)]
    no_camera: bool,

    /// Agent string the corner-radius shim checks
    #[arg(long)]
    user_agent: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(text) = &self.text {
            config.button.text = text.clone();
        }
        if let Some(r) = self.roughness {
            config.button.roughness = r;
        }
        if let Some(w) = self.width {
            config.button.width = w;
        }
        if let Some(h) = self.height {
            config.button.height = h;
        }
        if let Some(i) = self.camera_index {
            config.camera.index = i;
        }
        if let Some(ua) = &self.user_agent {
            config.host.user_agent = Some(ua.clone());
        }
    }
}

fn main() -> Result<()> {
    // RUST_LOG controls the level, e.g. RUST_LOG=shiny_button=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply(&mut config);

    let agent = config
        .host
        .user_agent
        .clone()
        .map(HostAgent)
        .unwrap_or_else(HostAgent::native);
    let source: Box<dyn MediaSource> = if cli.no_camera {
        Box::new(UnavailableSource::new("camera disabled with --no-camera"))
    } else {
        Box::new(CameraSource::new(config.camera.index))
    };

    let margin = config.host.margin;
    let page_w = (config.button.width + 2 * margin) as usize; // widget plus margin on both sides
    let page_h = (config.button.height + 2 * margin) as usize;

    let mut button = ShinyButton::new(
        config.button.clone(),
        &agent,
        source,
        config.camera.constraints(),
    );
    button.mount(Point::new(margin as f32, margin as f32));

    let mut drawer = draw::Drawer::new("Shiny Button", page_w, page_h)?;
    let mut page = FrameBuffer::new(page_w, page_h);
    let mut compositor = Compositor::new();
    let mut router = PointerRouter::new();

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0; // frames counted since the last FPS update
    let mut hud_fps_text = String::from("FPS: 0.0");

    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        // 1) Mouse → widget events (move, enter/leave, press/release).
        for event in router.route(drawer.pointer(), button.container_rect(), button.button_rect()) {
            button.handle(&event);
        }

        // 2) Up/Down: rougher/smoother. Visual: the button reflection blurs or sharpens at once.
        if drawer.key_pressed_once(Key::Up) {
            button.set_roughness(button.options().roughness + ROUGHNESS_STEP);
        }
        if drawer.key_pressed_once(Key::Down) {
            button.set_roughness(button.options().roughness - ROUGHNESS_STEP);
        }

        // 3) Camera result, if it has arrived. Visual: reflections appear (live or gradient).
        button.poll_media();

        // 4) Compose page + widget.
        page.fill(config.host.background);
        compositor.render(&button, &mut page)?;

        // 5) HUD: media status, roughness, FPS.
        let status = match button.media_status() {
            MediaStatus::Pending => "WAITING FOR CAMERA",
            MediaStatus::Live => "LIVE",
            MediaStatus::Fallback => "NO CAMERA",
            MediaStatus::Released => "STOPPED",
        };
        let hud = format!(
            "{} | ROUGHNESS {:.2} | {}",
            status,
            button.options().roughness,
            hud_fps_text
        );
        draw::draw_text_5x7(&mut page, 8, 8, &hud, 0x00_FF_FF_FF);

        // 6) Push to the window.
        drawer.present(&page)?;

        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            tracing::debug!(fps, "frame rate");
            hud_fps_text = format!("FPS: {:.1}", fps);
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    button.destroy();
    Ok(())
}
