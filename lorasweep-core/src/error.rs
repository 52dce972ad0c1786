use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    /// A job-definition token did not start with `--`, a flag had no value,
    /// or the line could not be split.
    #[error("malformed argument: {0}")]
    MalformedArgument(String),

    #[error("unknown commandline option: --{0}")]
    UnknownOption(String),

    #[error("invalid value for --{flag}: {value:?}")]
    InvalidValue { flag: String, value: String },

    #[error("template file {path} could not be read")]
    TemplateFileMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sweep range: start {start}, stop {stop}, step {step} ({reason})")]
    InvalidSweepRange {
        start: f64,
        stop: f64,
        step: f64,
        reason: &'static str,
    },

    #[error("pipeline failed on job {index}")]
    Pipeline {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, SweepError>;
