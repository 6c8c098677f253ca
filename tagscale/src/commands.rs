// Command generation for the external image tool
// Nothing here runs a process; see runner.rs for execution.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ScaleError;
use crate::scaler::MarkerScaler;

pub const DEFAULT_BORDER_WIDTH_PIXELS: u32 = 4;
pub const DEFAULT_LABEL_POINT_SIZE: u32 = 12;

/// External ImageMagick-compatible program used for scaling and labelling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTool {
    program: String,
    label_point_size: u32,
}

impl ImageTool {
    /// Run `program` (looked up on PATH) with the default label size
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            label_point_size: DEFAULT_LABEL_POINT_SIZE,
        }
    }

    /// Point size of the label text written by the second command
    pub fn with_label_point_size(mut self, point_size: u32) -> Self {
        self.label_point_size = point_size;
        self
    }

    fn command(&self, args: &[&str]) -> ToolCommand {
        ToolCommand {
            program: self.program.clone(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

impl Default for ImageTool {
    fn default() -> Self {
        Self::new("convert")
    }
}

/// One invocation of the image tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Program name, as given to [`ImageTool::new`]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, unquoted
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Renders as a command line that can be pasted into a POSIX shell
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> Cow<'_, str> {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./%+=:,@".contains(c));
    if safe {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

/// Escape text so the tool's `-annotate` prints it literally
fn escape_label_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('%', "%%")
}

/// A single source file to be scaled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConversionJob {
    pub source_path: PathBuf,
    /// Defaults to the source file's own directory
    pub destination_dir: Option<PathBuf>,
    pub scale_factor: u32,
    pub border_width_pixels: u32,
}

impl FileConversionJob {
    /// Job writing next to the source with the default 4px border
    pub fn new(source_path: impl Into<PathBuf>, scale_factor: u32) -> Self {
        Self {
            source_path: source_path.into(),
            destination_dir: None,
            scale_factor,
            border_width_pixels: DEFAULT_BORDER_WIDTH_PIXELS,
        }
    }

    pub fn with_destination_dir(mut self, destination_dir: Option<PathBuf>) -> Self {
        self.destination_dir = destination_dir;
        self
    }

    pub fn with_border_width(mut self, border_width_pixels: u32) -> Self {
        self.border_width_pixels = border_width_pixels;
        self
    }
}

/// Commands for one file, in execution order, and the file they produce
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleCommands {
    pub output_path: PathBuf,
    pub commands: Vec<ToolCommand>,
}

/// Build `{stem}_{percent}%_{size}mm{.ext}` for a scaled copy of `source`
pub fn output_file_name(source: &Path, scale_factor: u32, marker_size_mm: f64) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let percent = scale_factor as u64 * 100;
    let mut name = format!("{stem}_{percent}%_{marker_size_mm:.2}mm");
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    name
}

impl MarkerScaler {
    /// Build the image tool commands that scale `job.source_path` by an integer factor
    ///
    /// The first command scales by `scale_factor * 100` percent and adds a white
    /// border of `border_width_pixels`. With `emit_label`, a second command
    /// writes the file name, the scaled pixel size and the printed marker size
    /// onto that output in place. The pixel size is left to the tool's
    /// `%[fx:w]` escapes, so the source is never decoded here.
    ///
    /// All preconditions are checked before any command is built.
    pub fn build_scale_commands(
        &self,
        job: &FileConversionJob,
        emit_label: bool,
    ) -> Result<ScaleCommands, ScaleError> {
        if job.scale_factor == 0 {
            return Err(ScaleError::InvalidScaleFactor(job.scale_factor));
        }
        if !job.source_path.is_file() {
            return Err(ScaleError::FileNotFound(job.source_path.clone()));
        }
        let destination = match &job.destination_dir {
            Some(dir) if dir.is_dir() => dir.clone(),
            Some(dir) => return Err(ScaleError::InvalidDirectory(dir.clone())),
            None => match job.source_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };

        let factor = job.scale_factor;
        let marker_size_mm = self.scale_factor_to_marker_size(factor);
        let output_path =
            destination.join(output_file_name(&job.source_path, factor, marker_size_mm));

        let source = job.source_path.to_string_lossy();
        let output = output_path.to_string_lossy();
        let tool = self.tool();

        let percent = format!("{}%", factor as u64 * 100);
        let border = job.border_width_pixels.to_string();
        let mut commands = vec![tool.command(&[
            &*source,
            "-filter",
            "point",
            "-scale",
            percent.as_str(),
            "-bordercolor",
            "white",
            "-border",
            border.as_str(),
            &*output,
        ])];

        if emit_label {
            let stem = job
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy())
                .unwrap_or_default();
            // w and h of the output include the border on both sides
            let borders = job.border_width_pixels as u64 * 2;
            let label = format!(
                "{} %[fx:w-{borders}]x%[fx:h-{borders}]px {marker_size_mm:.2}mm",
                escape_label_text(&stem),
            );
            let point_size = tool.label_point_size.to_string();
            commands.push(tool.command(&[
                &*output,
                "-gravity",
                "south",
                "-fill",
                "black",
                "-pointsize",
                point_size.as_str(),
                "-annotate",
                "+0+0",
                label.as_str(),
                &*output,
            ]));
        }

        Ok(ScaleCommands {
            output_path,
            commands,
        })
    }
}
