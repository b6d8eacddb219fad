use std::{future::Future, path::PathBuf, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    model::{DownloadRequest, ProgressSample, VideoInfo},
    progress::{PROGRESS_TEMPLATE, parse_progress_from_line},
};

/// Output name template, relative to the chosen folder
const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// Callback invoked for every progress report during a download
pub type ProgressHook<'a> = &'a (dyn Fn(ProgressSample) + Send + Sync);

/// The external extraction/download collaborator.
///
/// Both calls are long-running and fallible; the runners drive them on the
/// tokio runtime.
pub trait MediaBackend: Send + Sync + 'static {
    /// Fetch the video's metadata and format catalog without downloading.
    fn extract_info(&self, url: &str) -> impl Future<Output = Result<VideoInfo>> + Send;

    /// Download the requested streams and merge them, reporting progress.
    fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressHook<'_>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// [`MediaBackend`] backed by the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    /// Placed before our own arguments, e.g. `-m yt_dlp` for a Python launcher
    leading_args: Vec<String>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl MediaBackend for YtDlp {
    async fn extract_info(&self, url: &str) -> Result<VideoInfo> {
        info!(%url, "extracting video info");
        let output = self
            .command()
            .args(info_args(url))
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Extraction(failure_message(&stderr, output.status)));
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout)?;
        debug!(formats = info.formats.len(), title = ?info.title, "video info extracted");
        Ok(info)
    }

    async fn download(&self, request: &DownloadRequest, on_progress: ProgressHook<'_>) -> Result<()> {
        info!(url = %request.url, format = %request.format, "starting download");
        let mut child = self.command().args(download_args(request)).spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Download("yt-dlp stdout was not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Download("yt-dlp stderr was not captured".into()))?;

        // Drain stderr alongside stdout so neither pipe fills up
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        // Titles echoed on stdout are not guaranteed to be UTF-8
        let mut lines = BufReader::new(stdout).split(b'\n');
        while let Some(raw) = lines.next_segment().await? {
            let line = String::from_utf8_lossy(&raw);
            match parse_progress_from_line(&line) {
                Some(sample) => on_progress(sample),
                None => debug!(target: "vidgrab::ytdlp", "{}", line.trim_end()),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            info!(url = %request.url, "download finished");
            Ok(())
        } else {
            Err(Error::Download(failure_message(&stderr, status)))
        }
    }
}

/// Arguments for a metadata-only fetch
pub fn info_args(url: &str) -> Vec<String> {
    vec![
        "-J".to_owned(),
        "--no-playlist".to_owned(),
        "--no-warnings".to_owned(),
        url.to_owned(),
    ]
}

/// Arguments for downloading and merging the requested format
pub fn download_args(request: &DownloadRequest) -> Vec<String> {
    let mut args = vec![
        "-f".to_owned(),
        request.format.clone(),
        "--merge-output-format".to_owned(),
        request.options.merge_format.clone(),
        "--newline".to_owned(),
        "--encoding".to_owned(),
        "utf-8".to_owned(),
        "--no-playlist".to_owned(),
        "--no-warnings".to_owned(),
    ];

    args.push("--progress-template".to_owned());
    args.push(PROGRESS_TEMPLATE.to_owned());

    args.push("-o".to_owned());
    args.push(
        request
            .options
            .output_dir
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned(),
    );

    if let Some(ffmpeg) = &request.options.ffmpeg_location {
        args.push("--ffmpeg-location".to_owned());
        args.push(ffmpeg.to_string_lossy().into_owned());
    }

    args.push(request.url.clone());
    args
}

/// Pick the most useful line out of yt-dlp's stderr
fn failure_message(stderr: &str, status: std::process::ExitStatus) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("ERROR:"))
        .map(|l| l.trim().to_owned())
        .or_else(|| lines.last().map(|l| (*l).to_owned()))
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}
