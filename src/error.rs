use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A log line that does not follow the combined log grammar. Carries the
/// offending raw text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed log line: {0:?}")]
pub struct MalformedLine(pub String);

/// Fatal failures of a load pass.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed log line {line_number}: {line:?}")]
    MalformedLine { line_number: u64, line: String },

    #[error("failed to read log input")]
    Io(#[from] io::Error),

    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Invalid or missing inputs, detected before any line is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("log file not found: {0:?}")]
    MissingLog(PathBuf),

    #[error("GeoIP database not found: {0:?}")]
    MissingGeoDatabase(PathBuf),

    #[error("ignore pattern file not found: {0:?}")]
    MissingPatternFile(PathBuf),

    #[error("invalid ignore pattern at line {line}: {source}")]
    InvalidPattern {
        line: usize,
        #[source]
        source: regex::Error,
    },

    #[error("ignore patterns could not be combined: {0}")]
    PatternSet(#[source] regex::Error),

    #[error("{0}")]
    InvalidArgument(String),
}
