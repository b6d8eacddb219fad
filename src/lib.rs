//! Desktop YouTube downloader: fetch the formats of a video, pick a
//! resolution, and let yt-dlp download and merge it into an MP4.

pub mod config;
pub mod controller;
pub mod downloader;
pub mod environment;
pub mod error;
pub mod formats;
pub mod logging;
pub mod model;
pub mod progress;
pub mod runner;
pub mod thumbnail;

pub use config::AppConfig;
pub use controller::{Controller, Notice, NoticeLevel};
pub use downloader::{MediaBackend, YtDlp};
pub use error::{Error, ErrorKind, Result};
