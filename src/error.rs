use std::path::PathBuf;
use thiserror::Error;

/// Failures local to one timestamp/temperature pair.
/// Every variant keeps the raw text so the log can be fixed by hand.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("skipping last unpaired line {line}: {text}")]
    UnpairedTrailingLine { line: usize, text: String },

    #[error("unrecognized timestamp format: {0}")]
    UnrecognizedTimestampFormat(String),

    #[error("missing '=' in temperature data: {0}")]
    MissingDelimiter(String),

    #[error("non-numeric temperature data: {0}")]
    NonNumericPayload(String),
}

/// Failures that end a conversion run.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("could not read input {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not write output {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not package workbook {path}: {source}")]
    Packaging {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("invalid input path {0}, the output would overwrite it")]
    InvalidInputPath(PathBuf),

    #[error("malformed pair starting at line {line}: {source}")]
    Strict { line: usize, source: ParseError },
}
