use std::{fmt, path::PathBuf};

use serde::{Deserialize, Deserializer};

/// Container every download is merged into
pub const MERGE_FORMAT: &str = "mp4";

/// The two kinds of background operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Fetching video information (no download)
    Fetch,
    /// Downloading and merging the selected streams
    Download,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Download => f.write_str("download"),
        }
    }
}

/// One encoded stream offered by the video source, as listed in the
/// `formats` array of the yt-dlp info dump
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamVariant {
    /// Format identifier understood by yt-dlp's `-f`
    #[serde(rename = "format_id", default)]
    pub id: String,
    /// Container extension (e.g. "mp4", "webm")
    #[serde(rename = "ext", default)]
    pub container_ext: String,
    /// Vertical resolution in pixels, absent for audio-only streams
    #[serde(rename = "height", default)]
    pub vertical_resolution: Option<u32>,
    /// Total bitrate in kbit/s
    #[serde(rename = "tbr", default)]
    pub bitrate: Option<f64>,
}

/// The part of the info dump the app cares about
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub formats: Vec<StreamVariant>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A user-facing entry in the resolution selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionChoice {
    /// Display label such as "1080p"
    pub label: String,
    /// Variant that will be downloaded when this entry is chosen
    pub variant_id: String,
    /// Vertical resolution in pixels
    pub resolution: u32,
}

/// Phase reported by the download tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    /// Bytes are still arriving
    Downloading,
    /// One stream finished; merging may follow
    Finished,
}

/// A single progress report from a running download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSample {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    /// Exact total if known, otherwise the tool's estimate
    pub total_bytes: Option<u64>,
}

/// Options copied into every download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Folder the merged file is written to
    pub output_dir: PathBuf,
    /// Container the streams are merged into
    pub merge_format: String,
    /// Explicit ffmpeg location handed to yt-dlp, if not on PATH
    pub ffmpeg_location: Option<PathBuf>,
}

/// Everything a download runner needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// yt-dlp format expression, always "<video id>+bestaudio"
    pub format: String,
    pub options: DownloadOptions,
}

impl DownloadRequest {
    /// Build the request for the chosen resolution, pairing it with the best audio
    pub fn for_choice(url: impl Into<String>, choice: &ResolutionChoice, options: DownloadOptions) -> Self {
        Self {
            url: url.into(),
            format: format!("{}+bestaudio", choice.variant_id),
            options: DownloadOptions {
                merge_format: MERGE_FORMAT.to_string(),
                ..options
            },
        }
    }
}
