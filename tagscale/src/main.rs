use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tagscale_common::{RoundingPolicy, ScalerConfig, TagFamily};

mod batch;
mod commands;
mod error;
mod runner;
mod scaler;

use batch::ConvertRequest;
use commands::{ImageTool, DEFAULT_BORDER_WIDTH_PIXELS, DEFAULT_LABEL_POINT_SIZE};
use runner::{CommandRunner, DryRunRunner, ProcessRunner};
use scaler::MarkerScaler;

/// Scale fiducial marker images to an exact printed size
#[derive(Parser, Debug)]
#[command(name = "tagscale")]
#[command(about = "Compute print-accurate integer scale factors for AprilTag images", long_about = None)]
struct Args {
    #[command(flatten)]
    scaler: ScalerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct ScalerArgs {
    /// Printer resolution in dots per inch
    #[arg(long, global = true, default_value = "72")]
    dpi: f64,

    /// Tag family of the source images (sets the reference geometry)
    #[arg(long, global = true, value_enum, default_value = "36h11")]
    family: FamilyArg,

    /// Tag edge (data + black border) in source pixels, overrides --family
    #[arg(long, global = true)]
    marker_pixels: Option<u32>,

    /// Full source image edge in pixels, overrides --family
    #[arg(long, global = true)]
    image_pixels: Option<u32>,
}

impl ScalerArgs {
    fn config(&self) -> Result<ScalerConfig> {
        let family: TagFamily = self.family.into();
        let (marker, image) = family.reference_pixels();
        let config = ScalerConfig::new(
            self.dpi,
            self.marker_pixels.unwrap_or(marker),
            self.image_pixels.unwrap_or(image),
        )?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scale (and label) every file in a directory
    Convert {
        /// Directory holding the unscaled tag images
        src_dir: PathBuf,

        /// Where scaled copies are written (defaults to SRC_DIR)
        #[arg(short, long)]
        dst_dir: Option<PathBuf>,

        /// Integer scale factor (10 = 1000%)
        #[arg(short, long, conflicts_with = "marker_size", required_unless_present = "marker_size")]
        scale_factor: Option<u32>,

        /// Desired printed marker size in millimeters
        #[arg(short, long, value_parser = parse_positive)]
        marker_size: Option<f64>,

        /// Rounding used when deriving the factor from --marker-size
        #[arg(short, long, value_enum, default_value = "floor")]
        rounding: RoundingArg,

        /// White border added around each scaled image, in pixels
        #[arg(short, long, default_value_t = DEFAULT_BORDER_WIDTH_PIXELS)]
        border: u32,

        /// Do not write the size label onto the scaled images
        #[arg(long)]
        no_label: bool,

        /// Point size of the label text
        #[arg(long, default_value_t = DEFAULT_LABEL_POINT_SIZE)]
        label_size: u32,

        /// ImageMagick-compatible program to run
        #[arg(long, default_value = "convert")]
        tool: String,

        /// Print the commands without running them
        #[arg(long)]
        dry_run: bool,

        /// Stop at the first failing file
        #[arg(long)]
        fail_fast: bool,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend a scale factor for a desired marker size
    Recommend {
        /// Desired printed marker size in millimeters
        #[arg(value_parser = parse_positive)]
        marker_size: f64,

        #[arg(short, long, value_enum, default_value = "floor")]
        rounding: RoundingArg,
    },

    /// Printed marker size for a scale factor or a scaled image width
    Size {
        /// Integer scale factor
        #[arg(short, long, conflicts_with = "png_pixels", required_unless_present = "png_pixels")]
        scale_factor: Option<u32>,

        /// Width of an already scaled image in pixels
        #[arg(short, long, value_parser = parse_positive)]
        png_pixels: Option<f64>,
    },
}

/// Accept only finite lengths greater than zero
fn parse_positive(value: &str) -> Result<f64, String> {
    let number: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if number.is_finite() && number > 0.0 {
        Ok(number)
    } else {
        Err(format!("must be a positive number, got {value}"))
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FamilyArg {
    #[value(name = "36h11")]
    Tag36h11,
    #[value(name = "25h9")]
    Tag25h9,
    #[value(name = "16h5")]
    Tag16h5,
}

impl From<FamilyArg> for TagFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Tag36h11 => TagFamily::Tag36h11,
            FamilyArg::Tag25h9 => TagFamily::Tag25h9,
            FamilyArg::Tag16h5 => TagFamily::Tag16h5,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum RoundingArg {
    Floor,
    Ceil,
    Nearest,
}

impl From<RoundingArg> for RoundingPolicy {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Floor => RoundingPolicy::Floor,
            RoundingArg::Ceil => RoundingPolicy::Ceil,
            RoundingArg::Nearest => RoundingPolicy::Nearest,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.scaler.config().context("Invalid scaler configuration")?;

    match args.command {
        Command::Convert {
            src_dir,
            dst_dir,
            scale_factor,
            marker_size,
            rounding,
            border,
            no_label,
            label_size,
            tool,
            dry_run,
            fail_fast,
            json,
        } => {
            let scaler = MarkerScaler::new(config)
                .with_tool(ImageTool::new(tool).with_label_point_size(label_size));
            let request = ConvertRequest {
                destination_dir: dst_dir,
                scale_factor,
                marker_size_mm: marker_size,
                rounding: rounding.into(),
                border_width_pixels: border,
                emit_label: !no_label,
                fail_fast,
                ..ConvertRequest::new(src_dir)
            };
            run_convert(&scaler, &request, dry_run, json)
        }
        Command::Recommend {
            marker_size,
            rounding,
        } => {
            let scaler = MarkerScaler::new(config);
            let result = scaler.recommended_scale(marker_size, rounding.into())?;
            if result.scale_factor == 0 {
                bail!(
                    "{}mm is smaller than one source pixel per bit at {} DPI",
                    marker_size,
                    config.dpi()
                );
            }

            println!(
                "exact: scale {:.3} ({:.1}pix png) for {}mm",
                scaler.marker_size_to_scale_factor(marker_size),
                scaler.marker_size_to_image_pixels(marker_size),
                marker_size
            );
            println!("marker_size: {:.2}mm", result.marker_size_mm);
            println!(
                "png_size: {}pix ({:.2}mm), scale_factor: {}%",
                scaler.scaled_image_pixels(result.scale_factor),
                scaler.image_size_mm(result.scale_factor),
                result.percent()
            );
            Ok(())
        }
        Command::Size {
            scale_factor,
            png_pixels,
        } => {
            let scaler = MarkerScaler::new(config);
            let marker_mm = match (scale_factor, png_pixels) {
                (Some(factor), _) => scaler.scale_factor_to_marker_size(factor),
                (None, Some(pixels)) => scaler.image_pixels_to_marker_size(pixels),
                (None, None) => bail!("either --scale-factor or --png-pixels is required"),
            };
            println!("marker_size: {:.2}mm", marker_mm);
            Ok(())
        }
    }
}

fn run_convert(
    scaler: &MarkerScaler,
    request: &ConvertRequest,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let mut process_runner = ProcessRunner;
    let mut dry_runner = DryRunRunner::default();
    let runner: &mut dyn CommandRunner = if dry_run {
        &mut dry_runner
    } else {
        &mut process_runner
    };

    let report = batch::convert(scaler, request, runner)
        .with_context(|| format!("Failed to convert {}", request.source_dir.display()))?;

    if dry_run {
        for command in &dry_runner.commands {
            println!("{}", command);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Scaled {} file(s) by {}% -> {:.2}mm markers",
            report.files.len(),
            report.scale_factor as u64 * 100,
            report.marker_size_mm
        );
        for file in &report.files {
            let status = if file.succeeded() { "ok" } else { "FAILED" };
            println!("  [{}] {} -> {}", status, file.source.display(), file.output.display());
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, report.files.len());
    }
    Ok(())
}
