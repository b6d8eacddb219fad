//! Runtime configuration.
//!
//! There is no config file; defaults can be overridden through `VIDGRAB_*`
//! environment variables read once at startup.

use std::{path::PathBuf, time::Duration};

use crate::{
    model::{DownloadOptions, MERGE_FORMAT},
    progress::{DEFAULT_SMOOTHING_WINDOW, DEFAULT_UPDATE_INTERVAL},
};

/// Path or name of the yt-dlp executable.
pub const ENV_YTDLP: &str = "VIDGRAB_YTDLP";
/// Whitespace-separated arguments placed before ours, e.g. `-m yt_dlp`.
pub const ENV_YTDLP_ARGS: &str = "VIDGRAB_YTDLP_ARGS";
/// Path or name of the ffmpeg executable.
pub const ENV_FFMPEG: &str = "VIDGRAB_FFMPEG";
/// Folder downloads are written to.
pub const ENV_OUTPUT_DIR: &str = "VIDGRAB_OUTPUT_DIR";
/// Session log file.
pub const ENV_LOG_FILE: &str = "VIDGRAB_LOG_FILE";

const DEFAULT_YTDLP: &str = "yt-dlp";
const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// yt-dlp executable used for info fetches and downloads.
    pub ytdlp_program: PathBuf,
    /// Launcher arguments, for running yt-dlp through an interpreter.
    pub ytdlp_args: Vec<String>,
    /// ffmpeg executable probed at startup.
    pub ffmpeg_program: PathBuf,
    /// Set when ffmpeg was configured explicitly, so yt-dlp is told where it is.
    pub ffmpeg_location: Option<PathBuf>,
    /// Default download folder shown in the window.
    pub output_dir: PathBuf,
    /// Log file, truncated at every launch.
    pub log_file: PathBuf,
    /// Minimum gap between two displayed progress updates.
    pub progress_interval: Duration,
    /// Number of samples averaged for the progress bar.
    pub smoothing_window: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ytdlp_program: PathBuf::from(DEFAULT_YTDLP),
            ytdlp_args: Vec::new(),
            ffmpeg_program: PathBuf::from(DEFAULT_FFMPEG),
            ffmpeg_location: None,
            output_dir: PathBuf::from("./downloads"),
            log_file: PathBuf::from("youtube_downloader.log"),
            progress_interval: DEFAULT_UPDATE_INTERVAL,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
        }
    }
}

impl AppConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        let defaults = Self::default();

        let ffmpeg_override = get(ENV_FFMPEG);
        Self {
            ytdlp_program: get(ENV_YTDLP).unwrap_or(defaults.ytdlp_program),
            ytdlp_args: lookup(ENV_YTDLP_ARGS)
                .map(|v| v.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
            ffmpeg_program: ffmpeg_override.clone().unwrap_or(defaults.ffmpeg_program),
            ffmpeg_location: ffmpeg_override,
            output_dir: get(ENV_OUTPUT_DIR).unwrap_or(defaults.output_dir),
            log_file: get(ENV_LOG_FILE).unwrap_or(defaults.log_file),
            ..defaults
        }
    }

    /// Options handed (by copy) to every download.
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            output_dir: self.output_dir.clone(),
            merge_format: MERGE_FORMAT.to_string(),
            ffmpeg_location: self.ffmpeg_location.clone(),
        }
    }
}
