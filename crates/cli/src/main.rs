use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use facescan_core::camera::infrastructure::image_dir_camera::ImageDirCameraProvider;
use facescan_core::camera::infrastructure::static_permission_gate::StaticPermissionGate;
use facescan_core::detection::domain::options::{
    ClassificationMode, ContourMode, DetectorOptions, LandmarkMode, LensFacing, PerformanceMode,
    ScanOptions,
};
use facescan_core::detection::infrastructure::onnx_detector_factory::OnnxDetectorFactory;
use facescan_core::scan::detect_image_use_case::DetectImageUseCase;
use facescan_core::scan::scan_controller::ScanController;

/// Face detection for images and frame streams.
#[derive(Parser)]
#[command(name = "facescan")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect faces in a single image and print the result as JSON.
    Detect {
        /// Input image file.
        image: PathBuf,

        #[command(flatten)]
        detector: DetectorArgs,

        /// Pretty-print the JSON result.
        #[arg(long)]
        pretty: bool,
    },

    /// Run a live scan over a directory of frame images, streaming events.
    Scan {
        /// Directory of frames (optionally with back/ and front/ subdirs).
        frames: PathBuf,

        #[command(flatten)]
        detector: DetectorArgs,

        /// Camera lens to bind: back or front.
        #[arg(long, default_value = "back")]
        lens_facing: String,

        /// Enable the torch for the duration of the scan.
        #[arg(long)]
        torch: bool,
    },
}

#[derive(Args)]
struct DetectorArgs {
    /// Detection mode: fast or accurate.
    #[arg(long, default_value = "fast")]
    performance_mode: String,

    /// Compute facial landmarks.
    #[arg(long)]
    landmarks: bool,

    /// Compute face contours.
    #[arg(long)]
    contours: bool,

    /// Compute classification probabilities (smiling, eyes open).
    #[arg(long)]
    classifications: bool,

    /// Minimum face width as a fraction of image width (0.0-1.0).
    #[arg(long, default_value = "0.1")]
    min_face_size: f32,

    /// Assign stable tracking ids across frames.
    #[arg(long)]
    tracking: bool,

    /// Directory to look for a bundled detection model before downloading.
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

impl DetectorArgs {
    fn to_options(&self) -> Result<DetectorOptions, Box<dyn std::error::Error>> {
        let performance_mode = match self.performance_mode.as_str() {
            "fast" => PerformanceMode::Fast,
            "accurate" => PerformanceMode::Accurate,
            other => return Err(format!("unknown performance mode: {other}").into()),
        };
        Ok(DetectorOptions {
            performance_mode,
            landmark_mode: if self.landmarks {
                LandmarkMode::All
            } else {
                LandmarkMode::None
            },
            contour_mode: if self.contours {
                ContourMode::All
            } else {
                ContourMode::None
            },
            classification_mode: if self.classifications {
                ClassificationMode::All
            } else {
                ClassificationMode::None
            },
            min_face_size: self.min_face_size,
            enable_tracking: self.tracking,
        })
    }

    fn factory(&self) -> OnnxDetectorFactory {
        match &self.model_dir {
            Some(dir) => OnnxDetectorFactory::with_bundled_dir(dir.clone()),
            None => OnnxDetectorFactory::new(),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Detect {
            image,
            detector,
            pretty,
        } => run_detect(&image, &detector, pretty),
        Command::Scan {
            frames,
            detector,
            lens_facing,
            torch,
        } => run_scan(frames, &detector, &lens_facing, torch),
    }
}

fn run_detect(
    image: &std::path::Path,
    detector: &DetectorArgs,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = detector.to_options()?;
    let use_case = DetectImageUseCase::new(Arc::new(detector.factory()));
    let result = use_case.execute(image, &options)?;

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    log::info!("detected {} face(s)", result.faces.len());
    Ok(())
}

fn run_scan(
    frames: PathBuf,
    detector: &DetectorArgs,
    lens_facing: &str,
    torch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = ScanOptions {
        detector: detector.to_options()?,
        lens_facing: lens_facing.parse::<LensFacing>()?,
    };

    let mut controller = ScanController::new(
        Arc::new(detector.factory()),
        Arc::new(ImageDirCameraProvider::new(frames)),
        Arc::new(StaticPermissionGate::granted()),
    );

    let rx = controller.start_scan(options)?;
    if torch {
        controller.enable_torch()?;
    }

    // One NDJSON line per event, named the way listeners key on them.
    for event in rx.iter() {
        let line = serde_json::json!({
            "event": event.name(),
            "data": event,
        });
        println!("{line}");
    }

    controller.stop_scan();
    Ok(())
}
