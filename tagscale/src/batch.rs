// Batch conversion of every file in a directory with one scale factor

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Serialize;
use tagscale_common::{RoundingPolicy, ScalerConfig};
use walkdir::WalkDir;

use crate::commands::{FileConversionJob, DEFAULT_BORDER_WIDTH_PIXELS};
use crate::error::ScaleError;
use crate::runner::{CommandOutcome, CommandRunner};
use crate::scaler::MarkerScaler;

/// Arguments of a `convert` run
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequest {
    pub source_dir: PathBuf,
    /// Defaults to `source_dir`
    pub destination_dir: Option<PathBuf>,
    pub scale_factor: Option<u32>,
    pub marker_size_mm: Option<f64>,
    /// Only used when the factor is derived from `marker_size_mm`
    pub rounding: RoundingPolicy,
    pub border_width_pixels: u32,
    pub emit_label: bool,
    /// Stop at the first failing file instead of recording it and moving on
    pub fail_fast: bool,
}

impl ConvertRequest {
    /// Request with labels on, floor rounding and the default border; the
    /// scale factor or marker size still has to be set
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_dir: None,
            scale_factor: None,
            marker_size_mm: None,
            rounding: RoundingPolicy::default(),
            border_width_pixels: DEFAULT_BORDER_WIDTH_PIXELS,
            emit_label: true,
            fail_fast: false,
        }
    }
}

/// What happened to one source file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Commands that ran, in order; stops at the first failure
    pub outcomes: Vec<CommandOutcome>,
}

impl FileReport {
    /// True when every command that ran exited successfully
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

/// Summary of a `convert` run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub config: ScalerConfig,
    pub scale_factor: u32,
    pub marker_size_mm: f64,
    pub files: Vec<FileReport>,
    /// Directory entries that are not regular files
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    /// Files with at least one unsuccessful command
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.succeeded())
    }
}

/// Pick the scale factor from exactly one of `scale_factor` / `marker_size_mm`
pub fn resolve_scale_factor(
    scaler: &MarkerScaler,
    request: &ConvertRequest,
) -> Result<u32, ScaleError> {
    let factor = match (request.scale_factor, request.marker_size_mm) {
        (Some(_), Some(_)) => return Err(ScaleError::ConflictingArguments),
        (None, None) => return Err(ScaleError::MissingArgument),
        (Some(factor), None) => factor,
        (None, Some(size_mm)) => {
            let result = scaler.recommended_scale(size_mm, request.rounding)?;
            debug!(
                "{size_mm}mm requested, {}% ({:.2}mm) chosen with {} rounding",
                result.percent(),
                result.marker_size_mm,
                request.rounding
            );
            result.scale_factor
        }
    };

    if factor == 0 {
        return Err(ScaleError::InvalidScaleFactor(factor));
    }
    Ok(factor)
}

/// List the direct children of `dir` sorted by file name
///
/// Returns (regular files, everything else). Symlinks are followed, so a
/// link to a file counts as a file.
pub fn list_source_files(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ScaleError> {
    let mut files = Vec::new();
    let mut skipped = Vec::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in entries {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(entry) => skipped.push(entry.into_path()),
            Err(err) => match err.path() {
                // dangling symlinks and the like
                Some(path) if err.depth() > 0 => {
                    warn!("Skipping unreadable entry {}: {err}", path.display());
                    skipped.push(path.to_path_buf());
                }
                _ => {
                    return Err(ScaleError::Io {
                        path: dir.to_path_buf(),
                        source: io::Error::from(err),
                    })
                }
            },
        }
    }

    Ok((files, skipped))
}

/// Scale every regular file in `request.source_dir` by one integer factor
///
/// Files are processed one at a time in file name order; each command is
/// logged and then run to completion through `runner`. A command that exits
/// unsuccessfully is recorded in the report (or aborts with
/// [`ScaleError::CommandFailed`] under `fail_fast`). A source file that
/// disappears mid-batch aborts the batch; files converted before it are kept.
pub fn convert(
    scaler: &MarkerScaler,
    request: &ConvertRequest,
    runner: &mut dyn CommandRunner,
) -> Result<BatchReport, ScaleError> {
    if !request.source_dir.is_dir() {
        return Err(ScaleError::InvalidDirectory(request.source_dir.clone()));
    }
    if let Some(dir) = &request.destination_dir {
        if !dir.is_dir() {
            return Err(ScaleError::InvalidDirectory(dir.clone()));
        }
    }

    let scale_factor = resolve_scale_factor(scaler, request)?;
    let marker_size_mm = scaler.scale_factor_to_marker_size(scale_factor);
    info!(
        "Scaling {} by {}% (marker {:.2}mm)",
        request.source_dir.display(),
        scale_factor as u64 * 100,
        marker_size_mm
    );

    let (sources, skipped) = list_source_files(&request.source_dir)?;
    for path in &skipped {
        debug!("Skipping non-file entry {}", path.display());
    }

    let mut files = Vec::with_capacity(sources.len());
    for source in sources {
        let job = FileConversionJob::new(&source, scale_factor)
            .with_destination_dir(request.destination_dir.clone())
            .with_border_width(request.border_width_pixels);

        let built = match scaler.build_scale_commands(&job, request.emit_label) {
            Ok(built) => built,
            Err(err) => {
                error!("Stopping batch at {}: {err}", source.display());
                return Err(err);
            }
        };

        let mut outcomes = Vec::with_capacity(built.commands.len());
        for command in &built.commands {
            info!("{command}");
            let outcome = runner.run(command)?;
            if outcome.success {
                outcomes.push(outcome);
                continue;
            }

            warn!(
                "Command failed for {} (exit status {:?}): {}",
                source.display(),
                outcome.exit_code,
                outcome.stderr.trim()
            );
            if request.fail_fast {
                return Err(ScaleError::CommandFailed {
                    command: outcome.command,
                    exit_code: outcome.exit_code,
                });
            }
            outcomes.push(outcome);
            // the label step needs the scaled output
            break;
        }

        files.push(FileReport {
            source,
            output: built.output_path,
            outcomes,
        });
    }

    Ok(BatchReport {
        config: *scaler.config(),
        scale_factor,
        marker_size_mm,
        files,
        skipped,
    })
}
