use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a scale job before or while the image tool runs
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("not an existing directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("either a scale factor or a marker size must be given")]
    MissingArgument,

    #[error("give either a scale factor or a marker size, not both")]
    ConflictingArguments,

    #[error("scale factor must be at least 1, got {0}")]
    InvalidScaleFactor(u32),

    #[error("a {0}mm marker needs a scale factor larger than {max}", max = u32::MAX)]
    ScaleFactorOverflow(f64),

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("command failed ({}): {command}", exit_label(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}
