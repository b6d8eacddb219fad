//! Error types for vidgrab operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::OperationKind;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching, downloading or setting up the app.
#[derive(Debug, Error)]
pub enum Error {
    /// The URL field was empty.
    #[error("Please enter a YouTube video URL.")]
    EmptyUrl,

    /// A download was requested before any formats were fetched.
    #[error("Please fetch video information first.")]
    NoFormatsFetched,

    /// The fetched catalog had no MP4 variant with a resolution.
    #[error("No MP4 formats with resolution found.")]
    NoFormatsFound,

    /// An operation of this kind is already running.
    #[error("A {0} is already in progress.")]
    Busy(OperationKind),

    /// Controls are disabled for the session.
    #[error("Downloads are disabled: {0}")]
    Disabled(String),

    /// The merge executable could not be run.
    #[error("{program} is not installed or not found in PATH: {reason}")]
    MergeToolMissing {
        /// Program that was probed.
        program: String,
        /// Why the probe failed.
        reason: String,
    },

    /// Extracting video information failed.
    #[error("{0}")]
    Extraction(String),

    /// Downloading or merging failed.
    #[error("{0}")]
    Download(String),

    /// Thumbnail could not be fetched or decoded.
    #[error("Thumbnail unavailable: {0}")]
    Thumbnail(String),

    /// The log file could not be opened.
    #[error("Failed to open log file {path}: {reason}")]
    Logging {
        /// Log file path.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed info dump.
    #[error("Could not parse video information: {0}")]
    Json(#[from] serde_json::Error),
}

/// Broad category of an [`Error`], used to decide how it is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing user input; reported immediately, nothing changes.
    Input,
    /// Download requested without a resolution to download.
    Selection,
    /// The external tool returned an empty catalog.
    NoFormatsFound,
    /// The extraction or download call failed.
    ExternalOperation,
    /// The machine is missing something the app needs.
    Environment,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyUrl | Self::Busy(_) => ErrorKind::Input,
            Self::NoFormatsFetched => ErrorKind::Selection,
            Self::NoFormatsFound => ErrorKind::NoFormatsFound,
            Self::Disabled(_) | Self::MergeToolMissing { .. } | Self::Logging { .. } => {
                ErrorKind::Environment
            }
            Self::Extraction(_)
            | Self::Download(_)
            | Self::Thumbnail(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::ExternalOperation,
        }
    }

    /// Title used when the error is shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            Self::EmptyUrl => "Input Error",
            Self::NoFormatsFetched => "Selection Error",
            Self::NoFormatsFound => "No Formats",
            Self::Busy(_) => "Busy",
            Self::Disabled(_) | Self::MergeToolMissing { .. } => "FFmpeg Not Found",
            _ => "Error",
        }
    }
}
