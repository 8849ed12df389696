use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::{debug, error, info, warn};

use obbview::build_info::BuildInfo;
use obbview::detection::export::{write_json, write_labels_txt};
use obbview::logging::{export_debug_logs, setup_logger, setup_panic_hook};
use obbview::{
    Config, DetectionSession, DetectorClient, HttpDetectorClient, OverlayError, OverlayRenderer,
    RasterSurface, SavedResponseClient, UserSettings,
};

#[derive(Parser, Debug)]
#[command(version = BuildInfo::DISPLAY_VERSION, about = "Detect once, then render oriented-box overlays at any confidence threshold.")]
struct Args {
    /// Image to analyze
    image: PathBuf,

    /// Detector service base URL (overrides settings)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Model/task selector (overrides settings)
    #[arg(short, long)]
    model: Option<String>,

    /// Replay a saved detector response instead of calling the service
    #[arg(long, value_name = "JSON")]
    response: Option<PathBuf>,

    /// Save the raw detector response
    #[arg(long, value_name = "JSON")]
    save_response: Option<PathBuf>,

    /// Thresholds to render, comma separated; defaults to the suggested one
    #[arg(short, long, value_delimiter = ',')]
    threshold: Vec<f32>,

    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Also write the base image preview at the same display size
    #[arg(long, action = ArgAction::SetTrue)]
    preview: bool,

    /// Write filtered detections as .txt and .json next to each render
    #[arg(long, action = ArgAction::SetTrue)]
    export: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    no_labels: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    no_legend: bool,

    /// Keep label chips from leaving the top edge
    #[arg(long, action = ArgAction::SetTrue)]
    clamp_labels: bool,

    /// Device pixel ratio
    #[arg(long)]
    dpr: Option<f32>,

    #[arg(long)]
    max_width: Option<u32>,

    /// TrueType/OpenType font for label text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Persist the effective settings, overrides included
    #[arg(long, action = ArgAction::SetTrue)]
    write_settings: bool,

    /// Export captured logs to this directory before exiting
    #[arg(long, value_name = "DIR")]
    export_logs: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn apply_overrides(settings: &mut UserSettings, args: &Args) {
    if let Some(endpoint) = &args.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(model) = &args.model {
        settings.model = model.clone();
    }
    if let Some(dpr) = args.dpr {
        settings.device_pixel_ratio = dpr;
    }
    if let Some(width) = args.max_width {
        settings.max_display_width = width;
    }
    if let Some(font) = &args.font {
        settings.font_path = Some(font.to_string_lossy().into_owned());
    }
    if args.no_labels {
        settings.show_labels = false;
    }
    if args.no_legend {
        settings.show_legend = false;
    }
    if args.clamp_labels {
        settings.clamp_labels = true;
    }
}

fn make_surface(font: Option<&Path>) -> RasterSurface {
    match font {
        Some(path) => RasterSurface::with_font_file(path).unwrap_or_else(|e| {
            warn!("Label text disabled: {}", e);
            RasterSurface::new()
        }),
        None => {
            warn!("No font configured, labels and legend are drawn without text");
            RasterSurface::new()
        }
    }
}

/// File-name-safe threshold tag, e.g. 0.35 -> "conf035".
fn threshold_tag(threshold: f32) -> String {
    format!("conf{:03}", (threshold * 100.0).round() as u32)
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut settings = UserSettings::load(args.settings.as_deref());
    apply_overrides(&mut settings, &args);
    if args.write_settings {
        settings.save(args.settings.as_deref())?;
    }
    let config = Config::from_settings(&settings);
    debug!("Resolved config: {:?}", config);

    let client: Box<dyn DetectorClient> = match &args.response {
        Some(path) => Box::new(SavedResponseClient::new(path)),
        None => Box::new(HttpDetectorClient::new(
            &config.endpoint,
            Duration::from_secs(config.request_timeout_secs),
        )?),
    };

    let mut session = DetectionSession::new(config.clone());

    let file_name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let bytes = tokio::fs::read(&args.image).await?;
    session.select_image(file_name, bytes)?;

    // The single request for this image. Everything below is local.
    let ticket = session.begin_request()?;
    let result = client.detect(&ticket.request).await;
    if let (Ok(body), Some(path)) = (&result, &args.save_response) {
        tokio::fs::write(path, serde_json::to_vec_pretty(body)?).await?;
        info!("Saved detector response to {}", path.display());
    }
    if let Err(e) = session.finish_request(ticket.generation, result) {
        if e.is_user_visible() {
            error!("{}", e);
        }
        return Err(e.into());
    }
    if session.skipped() > 0 {
        warn!("{} detection(s) in the response could not be used", session.skipped());
    }

    tokio::fs::create_dir_all(&args.output).await?;
    let stem = args
        .image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    if args.preview {
        let mut preview = OverlayRenderer::new(RasterSurface::new());
        let state = session.render_state().ok_or(OverlayError::NoImage)?;
        preview.render_base(&state);
        preview.surface().save_png(&args.output.join(format!("{}_preview.png", stem)))?;
    }

    let thresholds = if args.threshold.is_empty() {
        vec![session.threshold()]
    } else {
        args.threshold.clone()
    };

    let mut renderer = OverlayRenderer::new(make_surface(config.font_path.as_deref()));
    for threshold in thresholds {
        session.set_threshold(threshold);
        let state = session.render_state().ok_or(OverlayError::NoImage)?;
        let report = renderer.render(&state);

        let tag = threshold_tag(session.threshold());
        let artifact = |ext: &str| args.output.join(format!("{}_{}.{}", stem, tag, ext));
        renderer.surface().save_png(&artifact("png"))?;
        if args.export {
            write_labels_txt(&artifact("txt"), &state.filtered)?;
            write_json(&artifact("json"), &state.filtered)?;
        }

        println!("threshold {:.2}: {} polygon(s)", session.threshold(), report.polygons);
        println!("{}", session.summary());
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let log_buffer = setup_logger(args.verbose);
    setup_panic_hook(log_buffer.clone());

    info!("Starting obbview {}", BuildInfo::display_version());
    debug!("{}", BuildInfo::detailed_info());

    let export_logs = args.export_logs.clone();
    let result = run(args).await;
    if let Err(e) = &result {
        error!("obbview failed: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
    }

    if let Some(dir) = export_logs {
        match export_debug_logs(&dir, &log_buffer) {
            Ok(path) => println!("Debug logs exported to: {}", path.display()),
            Err(e) => eprintln!("Failed to export debug logs: {e}"),
        }
    }
    result
}
