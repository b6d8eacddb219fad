//! Application state machine.
//!
//! The controller owns everything the window shows. Runners never touch it
//! directly; their events are queued on a channel and applied here, one at a
//! time, when the UI thread calls [`Controller::poll`].

use std::{collections::VecDeque, path::PathBuf, sync::Arc, time::Instant};

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    downloader::MediaBackend,
    error::{Error, ErrorKind, Result},
    formats::select_formats,
    model::{DownloadOptions, DownloadRequest, OperationKind, ProgressSample, ResolutionChoice, VideoInfo},
    progress::ProgressTracker,
    runner::{self, AppEvent},
};

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Critical,
}

/// A message box waiting to be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

pub struct Controller<B: MediaBackend> {
    /// URL input field
    pub url: String,
    /// Output folder field
    pub output_dir: String,

    backend: Arc<B>,
    runtime: Handle,
    options: DownloadOptions,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,

    choices: Vec<ResolutionChoice>,
    selected: usize,
    video_title: Option<String>,
    pending_thumbnail: Option<String>,

    /// Progress bar value, 0..=100
    progress: f32,
    status: String,
    tracker: ProgressTracker,

    /// Live runner per kind; `Some` doubles as the busy flag
    fetch_task: Option<JoinHandle<()>>,
    download_task: Option<JoinHandle<()>>,

    /// Set when the merge tool is unusable; disables everything
    disabled_reason: Option<String>,
    notices: VecDeque<Notice>,
}

impl<B: MediaBackend> Controller<B> {
    pub fn new(backend: Arc<B>, config: &AppConfig, runtime: Handle) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            url: String::new(),
            output_dir: config.output_dir.display().to_string(),
            backend,
            runtime,
            options: config.download_options(),
            events_tx,
            events_rx,
            choices: Vec::new(),
            selected: 0,
            video_title: None,
            pending_thumbnail: None,
            progress: 0.0,
            status: String::new(),
            tracker: ProgressTracker::new(config.progress_interval, config.smoothing_window),
            fetch_task: None,
            download_task: None,
            disabled_reason: None,
            notices: VecDeque::new(),
        }
    }

    /// Record the startup probe of the merge tool. A failure disables all
    /// controls for the rest of the session.
    pub fn apply_environment_check(&mut self, result: Result<()>) {
        // check_merge_tool has already logged the failure
        if let Err(err) = result {
            self.notices.push_back(Notice::new(
                NoticeLevel::Critical,
                "FFmpeg Not Found",
                "FFmpeg is required to merge audio and video streams.\n\
                 Please install FFmpeg and ensure it's added to your system's PATH.",
            ));
            self.status = "FFmpeg not found. Downloads are disabled.".to_string();
            self.disabled_reason = Some(err.to_string());
        }
    }

    pub fn controls_enabled(&self) -> bool {
        self.disabled_reason.is_none() && !self.is_busy()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_task.is_some()
    }

    pub fn is_downloading(&self) -> bool {
        self.download_task.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.is_fetching() || self.is_downloading()
    }

    pub fn choices(&self) -> &[ResolutionChoice] {
        &self.choices
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_choice(&self) -> Option<&ResolutionChoice> {
        self.choices.get(self.selected)
    }

    pub fn select(&mut self, index: usize) {
        if index < self.choices.len() {
            self.selected = index;
        }
    }

    pub fn video_title(&self) -> Option<&str> {
        self.video_title.as_deref()
    }

    /// Thumbnail URL of the most recent fetch, handed out once.
    pub fn take_thumbnail_request(&mut self) -> Option<String> {
        self.pending_thumbnail.take()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn current_notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    /// Surface a synchronous start error as a warning.
    pub fn report(&mut self, err: &Error) {
        if matches!(err, Error::Busy(_) | Error::Disabled(_)) {
            debug!("start ignored: {err}");
            return;
        }
        if matches!(err.kind(), ErrorKind::Input | ErrorKind::Selection) {
            warn!("{}: {err}", err.title());
        }
        self.notices
            .push_back(Notice::new(NoticeLevel::Warning, err.title(), err.to_string()));
    }

    fn ensure_enabled(&self) -> Result<()> {
        match &self.disabled_reason {
            Some(reason) => Err(Error::Disabled(reason.clone())),
            None => Ok(()),
        }
    }

    /// `Idle -> Fetching`
    pub fn start_fetch(&mut self) -> Result<()> {
        self.ensure_enabled()?;
        if self.is_fetching() {
            return Err(Error::Busy(OperationKind::Fetch));
        }
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::EmptyUrl);
        }

        info!(%url, "fetching video information");
        self.status = "Fetching video information...".to_string();
        self.fetch_task = Some(runner::spawn_fetch(
            &self.runtime,
            Arc::clone(&self.backend),
            url,
            self.events_tx.clone(),
        ));
        Ok(())
    }

    /// `Idle -> Downloading`
    pub fn start_download(&mut self) -> Result<()> {
        self.ensure_enabled()?;
        if self.is_downloading() {
            return Err(Error::Busy(OperationKind::Download));
        }
        let choice = self.selected_choice().cloned().ok_or(Error::NoFormatsFetched)?;
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::EmptyUrl);
        }

        let mut options = self.options.clone();
        let output_dir = self.output_dir.trim();
        if !output_dir.is_empty() {
            options.output_dir = PathBuf::from(output_dir);
        }
        let request = DownloadRequest::for_choice(url, &choice, options);
        info!(format = %request.format, resolution = %choice.label, "starting download");

        self.tracker.reset();
        self.progress = 0.0;
        self.status = "Starting download...".to_string();
        self.download_task = Some(runner::spawn_download(
            &self.runtime,
            Arc::clone(&self.backend),
            request,
            self.events_tx.clone(),
        ));
        Ok(())
    }

    /// Apply every event that has arrived since the last call.
    ///
    /// Returns how many events were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event, Instant::now());
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::InfoFetched(info) => self.on_info_fetched(info),
            AppEvent::FetchFailed(message) => self.on_fetch_failed(&message),
            AppEvent::Progress(sample) => self.on_progress(&sample, now),
            AppEvent::Finished => self.on_download_finished(),
            AppEvent::DownloadFailed(message) => self.on_download_failed(&message),
        }
    }

    fn on_info_fetched(&mut self, info: VideoInfo) {
        self.fetch_task = None;

        match select_formats(&info.formats) {
            Ok(choices) => {
                info!(count = choices.len(), "video information fetched");
                self.choices = choices;
                self.selected = 0;
                self.video_title = info.title;
                self.pending_thumbnail = info.thumbnail;
                self.status =
                    "Video information fetched. Select resolution and click Download.".to_string();
            }
            Err(err) => {
                warn!("{err}");
                // a list left over from another URL must not stay downloadable
                self.choices.clear();
                self.selected = 0;
                self.video_title = info.title;
                self.status = "No suitable video formats found.".to_string();
                self.notices
                    .push_back(Notice::new(NoticeLevel::Warning, err.title(), err.to_string()));
            }
        }
    }

    fn on_fetch_failed(&mut self, message: &str) {
        self.fetch_task = None;
        self.status = "Failed to fetch video information.".to_string();
        self.notices.push_back(Notice::new(
            NoticeLevel::Critical,
            "Error",
            format!("An error occurred: {message}"),
        ));
    }

    fn on_progress(&mut self, sample: &ProgressSample, now: Instant) {
        if !self.is_downloading() {
            debug!(?sample, "progress without an active download");
            return;
        }
        if let Some(update) = self.tracker.observe(sample, now) {
            self.progress = update.percent;
            self.status = update.message;
        }
    }

    fn on_download_finished(&mut self) {
        info!("download and merging completed");
        self.download_task = None;
        self.progress = 100.0;
        self.status = "Download and merging completed!".to_string();
        self.notices.push_back(Notice::new(
            NoticeLevel::Info,
            "Success",
            "Download and merging completed successfully!",
        ));
    }

    fn on_download_failed(&mut self, message: &str) {
        self.download_task = None;
        self.progress = 0.0;
        self.status = "Download failed.".to_string();
        self.notices.push_back(Notice::new(
            NoticeLevel::Critical,
            "Error",
            format!("An error occurred during download: {message}"),
        ));
    }
}
