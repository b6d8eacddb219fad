//! Background operation runners.
//!
//! Each runner drives one backend call on the tokio runtime and reports back
//! over an unbounded channel. Exactly one terminal event is sent per run:
//! errors and panics from the backend are caught here and turned into the
//! failure event, so nothing escapes to the caller.

use std::{any::Any, sync::Arc};

use tokio::{
    runtime::Handle,
    sync::mpsc::UnboundedSender,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error};

use crate::{
    downloader::MediaBackend,
    model::{DownloadRequest, ProgressSample, VideoInfo},
};

/// Messages delivered from a runner to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Fetch succeeded
    InfoFetched(VideoInfo),
    /// Fetch failed with the given message
    FetchFailed(String),
    /// Intermediate download progress
    Progress(ProgressSample),
    /// Download and merge completed
    Finished,
    /// Download failed with the given message
    DownloadFailed(String),
}

impl AppEvent {
    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Fetch video info for `url` in the background.
pub fn spawn_fetch<B: MediaBackend>(
    runtime: &Handle,
    backend: Arc<B>,
    url: String,
    events: UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let call = tokio::spawn(async move { backend.extract_info(&url).await });

        let event = match call.await {
            Ok(Ok(info)) => AppEvent::InfoFetched(info),
            Ok(Err(e)) => {
                error!("Error fetching video info: {e}");
                AppEvent::FetchFailed(e.to_string())
            }
            Err(e) => {
                let message = join_failure(e);
                error!("Error fetching video info: {message}");
                AppEvent::FetchFailed(message)
            }
        };

        if events.send(event).is_err() {
            debug!("controller dropped before fetch result was delivered");
        }
    })
}

/// Download `request` in the background, forwarding progress as it arrives.
pub fn spawn_download<B: MediaBackend>(
    runtime: &Handle,
    backend: Arc<B>,
    request: DownloadRequest,
    events: UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let progress_tx = events.clone();
        let call = tokio::spawn(async move {
            let hook = move |sample: ProgressSample| {
                let _ = progress_tx.send(AppEvent::Progress(sample));
            };
            backend.download(&request, &hook).await
        });

        let event = match call.await {
            Ok(Ok(())) => AppEvent::Finished,
            Ok(Err(e)) => {
                error!("Download error: {e}");
                AppEvent::DownloadFailed(e.to_string())
            }
            Err(e) => {
                let message = join_failure(e);
                error!("Download error: {message}");
                AppEvent::DownloadFailed(message)
            }
        };

        if events.send(event).is_err() {
            debug!("controller dropped before download result was delivered");
        }
    })
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        format!("internal error: {}", panic_message(err.into_panic()))
    } else {
        "operation was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast_ref::<&'static str>()
            .map_or_else(|| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{Error, Result},
        downloader::ProgressHook,
        model::{DownloadOptions, ProgressStatus},
    };
    use std::path::PathBuf;
    use tokio::sync::mpsc::unbounded_channel;

    struct Scripted {
        fail: bool,
        panic: bool,
    }

    impl MediaBackend for Scripted {
        async fn extract_info(&self, _url: &str) -> Result<VideoInfo> {
            if self.panic {
                panic!("extractor exploded");
            }
            if self.fail {
                return Err(Error::Extraction("Video unavailable".into()));
            }
            Ok(VideoInfo {
                title: Some("clip".into()),
                ..VideoInfo::default()
            })
        }

        async fn download(&self, _request: &DownloadRequest, on_progress: ProgressHook<'_>) -> Result<()> {
            if self.panic {
                panic!("merger exploded");
            }
            on_progress(ProgressSample {
                status: ProgressStatus::Downloading,
                downloaded_bytes: 1,
                total_bytes: Some(2),
            });
            if self.fail {
                return Err(Error::Download("HTTP Error 403".into()));
            }
            Ok(())
        }
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            url: "https://youtu.be/x".into(),
            format: "18+bestaudio".into(),
            options: DownloadOptions {
                output_dir: PathBuf::from("."),
                merge_format: "mp4".into(),
                ffmpeg_location: None,
            },
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let (tx, mut rx) = unbounded_channel();
        let backend = Arc::new(Scripted { fail: false, panic: false });
        spawn_fetch(&Handle::current(), backend, "u".into(), tx).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::InfoFetched(info) => assert_eq!(info.title.as_deref(), Some("clip")),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_error_becomes_event() {
        let (tx, mut rx) = unbounded_channel();
        let backend = Arc::new(Scripted { fail: true, panic: false });
        spawn_fetch(&Handle::current(), backend, "u".into(), tx).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::FetchFailed("Video unavailable".into())
        );
    }

    #[tokio::test]
    async fn test_fetch_panic_becomes_event() {
        let (tx, mut rx) = unbounded_channel();
        let backend = Arc::new(Scripted { fail: false, panic: true });
        // The runner task itself completes normally
        spawn_fetch(&Handle::current(), backend, "u".into(), tx).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::FetchFailed(msg) => assert!(msg.contains("extractor exploded")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_streams_progress_then_one_terminal_event() {
        let (tx, mut rx) = unbounded_channel();
        let backend = Arc::new(Scripted { fail: true, panic: false });
        spawn_download(&Handle::current(), backend, request(), tx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, AppEvent::Progress(_)));
        assert!(!first.is_terminal());

        let last = rx.recv().await.unwrap();
        assert_eq!(last, AppEvent::DownloadFailed("HTTP Error 403".into()));
        assert!(last.is_terminal());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_download_panic_becomes_event() {
        let (tx, mut rx) = unbounded_channel();
        let backend = Arc::new(Scripted { fail: false, panic: true });
        spawn_download(&Handle::current(), backend, request(), tx).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::DownloadFailed(msg) => {
                assert!(msg.starts_with("internal error"));
                assert!(msg.contains("merger exploded"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_download_success() {
        let (tx, mut rx) = unbounded_channel();
        let backend = Arc::new(Scripted { fail: false, panic: false });
        spawn_download(&Handle::current(), backend, request(), tx).await.unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], AppEvent::Finished);
    }
}
