//! Controller state machine driven by a scripted backend.

use std::{
    future::pending,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::{runtime::Handle, time::sleep};
use vidgrab::{
    AppConfig, Controller, Error, MediaBackend, NoticeLevel,
    downloader::ProgressHook,
    model::{DownloadRequest, OperationKind, ProgressSample, ProgressStatus, StreamVariant, VideoInfo},
    runner::AppEvent,
};

#[derive(Default)]
struct FakeBackend {
    /// Ok(info) or Err(message) for the next fetch
    fetch_outcome: Mutex<Option<Result<VideoInfo, String>>>,
    hold_fetch: bool,
    hold_download: bool,
    progress: Vec<ProgressSample>,
    download_error: Option<String>,
    fetch_calls: AtomicUsize,
    download_calls: AtomicUsize,
    last_request: Mutex<Option<DownloadRequest>>,
}

impl FakeBackend {
    fn set_fetch_outcome(&self, outcome: Result<VideoInfo, String>) {
        *self.fetch_outcome.lock().unwrap() = Some(outcome);
    }
}

impl MediaBackend for FakeBackend {
    async fn extract_info(&self, _url: &str) -> vidgrab::Result<VideoInfo> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_fetch {
            pending::<()>().await;
        }
        let outcome = self.fetch_outcome.lock().unwrap().clone();
        match outcome {
            Some(Ok(info)) => Ok(info),
            Some(Err(message)) => Err(Error::Extraction(message)),
            None => Ok(VideoInfo::default()),
        }
    }

    async fn download(&self, request: &DownloadRequest, on_progress: ProgressHook<'_>) -> vidgrab::Result<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.hold_download {
            pending::<()>().await;
        }
        for sample in &self.progress {
            on_progress(sample.clone());
        }
        match &self.download_error {
            Some(message) => Err(Error::Download(message.clone())),
            None => Ok(()),
        }
    }
}

fn variant(id: &str, ext: &str, height: Option<u32>, tbr: Option<f64>) -> StreamVariant {
    StreamVariant {
        id: id.to_string(),
        container_ext: ext.to_string(),
        vertical_resolution: height,
        bitrate: tbr,
    }
}

fn sample_info() -> VideoInfo {
    VideoInfo {
        title: Some("Example clip".into()),
        thumbnail: Some("https://i.ytimg.com/vi/example/hqdefault.jpg".into()),
        formats: vec![
            variant("140", "m4a", None, Some(129.0)),
            variant("18", "mp4", Some(360), Some(600.0)),
            variant("134", "mp4", Some(360), Some(300.0)),
            variant("137", "mp4", Some(1080), Some(4400.0)),
            variant("248", "webm", Some(1080), Some(5000.0)),
        ],
    }
}

fn downloading(downloaded: u64, total: Option<u64>) -> ProgressSample {
    ProgressSample {
        status: ProgressStatus::Downloading,
        downloaded_bytes: downloaded,
        total_bytes: total,
    }
}

fn controller(backend: &Arc<FakeBackend>) -> Controller<FakeBackend> {
    let config = AppConfig::default();
    Controller::new(Arc::clone(backend), &config, Handle::current())
}

/// Poll until no operation is in flight.
async fn settle(controller: &mut Controller<FakeBackend>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            controller.poll();
            if !controller.is_busy() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("operations should settle");
}

async fn fetched(backend: &Arc<FakeBackend>) -> Controller<FakeBackend> {
    backend.set_fetch_outcome(Ok(sample_info()));
    let mut ctl = controller(backend);
    ctl.url = "https://www.youtube.com/watch?v=example".into();
    ctl.start_fetch().unwrap();
    settle(&mut ctl).await;
    while ctl.dismiss_notice().is_some() {}
    ctl
}

#[tokio::test]
async fn test_empty_url_is_rejected_without_spawning() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = controller(&backend);
    ctl.url = "   ".into();

    let err = ctl.start_fetch().unwrap_err();
    assert!(matches!(err, Error::EmptyUrl));
    assert!(!ctl.is_fetching());
    assert!(ctl.controls_enabled());

    tokio::task::yield_now().await;
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);

    ctl.report(&err);
    let notice = ctl.current_notice().unwrap();
    assert_eq!(notice.title, "Input Error");
    assert_eq!(notice.level, NoticeLevel::Warning);
}

#[tokio::test]
async fn test_fetch_populates_resolutions() {
    let backend = Arc::new(FakeBackend::default());
    backend.set_fetch_outcome(Ok(sample_info()));
    let mut ctl = controller(&backend);
    ctl.url = "https://www.youtube.com/watch?v=example".into();

    ctl.start_fetch().unwrap();
    assert!(ctl.is_fetching());
    assert!(!ctl.controls_enabled());
    assert_eq!(ctl.status(), "Fetching video information...");

    settle(&mut ctl).await;

    let labels: Vec<_> = ctl.choices().iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["1080p", "360p"]);
    assert_eq!(ctl.choices()[1].variant_id, "18");
    assert_eq!(ctl.selected_index(), 0);
    assert_eq!(ctl.video_title(), Some("Example clip"));
    assert!(ctl.take_thumbnail_request().is_some());
    assert!(ctl.take_thumbnail_request().is_none());
    assert!(ctl.controls_enabled());
    assert!(!ctl.is_fetching());
    assert!(ctl.status().starts_with("Video information fetched"));
}

#[tokio::test]
async fn test_no_formats_found_warns_and_leaves_list_empty() {
    let backend = Arc::new(FakeBackend::default());
    backend.set_fetch_outcome(Ok(VideoInfo {
        title: Some("audio only".into()),
        thumbnail: None,
        formats: vec![variant("140", "m4a", None, Some(129.0))],
    }));
    let mut ctl = controller(&backend);
    ctl.url = "https://www.youtube.com/watch?v=audio".into();
    ctl.start_fetch().unwrap();
    settle(&mut ctl).await;

    assert!(ctl.choices().is_empty());
    assert!(ctl.controls_enabled());
    assert_eq!(ctl.status(), "No suitable video formats found.");
    let notice = ctl.current_notice().unwrap();
    assert_eq!(notice.title, "No Formats");
    assert_eq!(notice.level, NoticeLevel::Warning);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_resolutions() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = fetched(&backend).await;
    let before = ctl.choices().to_vec();
    assert!(!before.is_empty());

    backend.set_fetch_outcome(Err("Video unavailable".into()));
    ctl.start_fetch().unwrap();
    settle(&mut ctl).await;

    assert_eq!(ctl.choices(), before.as_slice());
    assert_eq!(ctl.status(), "Failed to fetch video information.");
    assert!(ctl.controls_enabled());
    let notice = ctl.current_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Critical);
    assert!(notice.message.contains("Video unavailable"));
}

#[tokio::test]
async fn test_second_fetch_while_busy_is_rejected() {
    let backend = Arc::new(FakeBackend {
        hold_fetch: true,
        ..FakeBackend::default()
    });
    let mut ctl = controller(&backend);
    ctl.url = "https://www.youtube.com/watch?v=example".into();

    ctl.start_fetch().unwrap();
    let err = ctl.start_fetch().unwrap_err();
    assert!(matches!(err, Error::Busy(OperationKind::Fetch)));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
    assert!(ctl.is_fetching());
}

#[tokio::test]
async fn test_download_without_formats_is_a_selection_error() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = controller(&backend);
    ctl.url = "https://www.youtube.com/watch?v=example".into();

    let err = ctl.start_download().unwrap_err();
    assert!(matches!(err, Error::NoFormatsFetched));
    assert_eq!(err.title(), "Selection Error");
    assert!(!ctl.is_downloading());

    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.download_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_requires_url() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = fetched(&backend).await;
    ctl.url.clear();

    assert!(matches!(ctl.start_download().unwrap_err(), Error::EmptyUrl));
    assert!(!ctl.is_downloading());
}

#[tokio::test]
async fn test_download_flow() {
    let backend = Arc::new(FakeBackend {
        progress: vec![
            downloading(50, Some(100)),
            downloading(100, Some(100)),
            ProgressSample {
                status: ProgressStatus::Finished,
                downloaded_bytes: 100,
                total_bytes: Some(100),
            },
        ],
        ..FakeBackend::default()
    });
    let mut ctl = fetched(&backend).await;
    ctl.select(1);
    ctl.output_dir = "/tmp/vidgrab-test".into();

    ctl.start_download().unwrap();
    assert!(ctl.is_downloading());
    assert!(!ctl.controls_enabled());
    assert_eq!(ctl.progress(), 0.0);
    assert_eq!(ctl.status(), "Starting download...");

    settle(&mut ctl).await;

    let request = backend.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.format, "18+bestaudio");
    assert_eq!(request.options.merge_format, "mp4");
    assert_eq!(request.options.output_dir.to_string_lossy(), "/tmp/vidgrab-test");

    assert_eq!(ctl.progress(), 100.0);
    assert_eq!(ctl.status(), "Download and merging completed!");
    assert!(ctl.controls_enabled());
    assert!(!ctl.is_downloading());
    let notice = ctl.current_notice().unwrap();
    assert_eq!(notice.title, "Success");
    assert_eq!(notice.level, NoticeLevel::Info);
}

#[tokio::test]
async fn test_download_failure() {
    let backend = Arc::new(FakeBackend {
        progress: vec![downloading(10, Some(100))],
        download_error: Some("HTTP Error 403: Forbidden".into()),
        ..FakeBackend::default()
    });
    let mut ctl = fetched(&backend).await;

    ctl.start_download().unwrap();
    settle(&mut ctl).await;

    assert_eq!(ctl.progress(), 0.0);
    assert_eq!(ctl.status(), "Download failed.");
    assert!(ctl.controls_enabled());
    assert!(!ctl.is_downloading());
    assert!(ctl.current_notice().unwrap().message.contains("HTTP Error 403"));
}

#[tokio::test]
async fn test_progress_is_rate_limited() {
    let backend = Arc::new(FakeBackend {
        hold_download: true,
        ..FakeBackend::default()
    });
    let mut ctl = fetched(&backend).await;
    ctl.start_download().unwrap();

    let t0 = Instant::now();
    ctl.handle_event(AppEvent::Progress(downloading(10, Some(100))), t0);
    assert_eq!(ctl.progress(), 10.0);
    assert_eq!(ctl.status(), "Downloading: 10.0% of 100 B");

    ctl.handle_event(
        AppEvent::Progress(downloading(60, Some(100))),
        t0 + Duration::from_millis(50),
    );
    assert_eq!(ctl.progress(), 10.0);
    assert_eq!(ctl.status(), "Downloading: 10.0% of 100 B");

    ctl.handle_event(
        AppEvent::Progress(downloading(50, Some(100))),
        t0 + Duration::from_millis(150),
    );
    assert_eq!(ctl.progress(), 30.0);

    ctl.handle_event(
        AppEvent::Progress(downloading(5_242_880, None)),
        t0 + Duration::from_millis(300),
    );
    assert_eq!(ctl.progress(), 0.0);
    assert_eq!(ctl.status(), "Downloading: 5.0 MB downloaded");

    ctl.handle_event(
        AppEvent::Progress(ProgressSample {
            status: ProgressStatus::Finished,
            downloaded_bytes: 100,
            total_bytes: Some(100),
        }),
        t0 + Duration::from_millis(310),
    );
    assert_eq!(ctl.progress(), 100.0);
    assert_eq!(ctl.status(), "Download finished, now merging audio and video...");
    assert!(ctl.is_downloading());
}

#[tokio::test]
async fn test_smoothing_restarts_for_each_download() {
    let backend = Arc::new(FakeBackend {
        progress: vec![downloading(90, Some(100))],
        ..FakeBackend::default()
    });
    let mut ctl = fetched(&backend).await;

    ctl.start_download().unwrap();
    settle(&mut ctl).await;
    while ctl.dismiss_notice().is_some() {}

    // The 90% sample of the first download must not bias the second one
    ctl.start_download().unwrap();
    ctl.handle_event(AppEvent::Progress(downloading(20, Some(100))), Instant::now());
    assert_eq!(ctl.progress(), 20.0);
}

#[tokio::test]
async fn test_stray_progress_is_ignored_when_idle() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = controller(&backend);
    ctl.handle_event(AppEvent::Progress(downloading(10, Some(100))), Instant::now());
    assert_eq!(ctl.progress(), 0.0);
    assert_eq!(ctl.status(), "");
}

#[tokio::test]
async fn test_missing_merge_tool_disables_everything() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = controller(&backend);
    ctl.apply_environment_check(Err(Error::MergeToolMissing {
        program: "ffmpeg".into(),
        reason: "No such file or directory".into(),
    }));

    assert!(!ctl.controls_enabled());
    let notice = ctl.dismiss_notice().unwrap();
    assert_eq!(notice.title, "FFmpeg Not Found");
    assert_eq!(notice.level, NoticeLevel::Critical);
    // stays disabled after the notice is acknowledged
    assert!(!ctl.controls_enabled());

    ctl.url = "https://www.youtube.com/watch?v=example".into();
    assert!(matches!(ctl.start_fetch(), Err(Error::Disabled(_))));
    assert!(matches!(ctl.start_download(), Err(Error::Disabled(_))));

    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_environment_ok_keeps_controls_enabled() {
    let backend = Arc::new(FakeBackend::default());
    let mut ctl = controller(&backend);
    ctl.apply_environment_check(Ok(()));
    assert!(ctl.controls_enabled());
    assert!(ctl.current_notice().is_none());
}
