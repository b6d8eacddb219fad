//! Progress decoding, smoothing and display formatting.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::model::{ProgressSample, ProgressStatus};

/// Marker at the start of every progress line we ask yt-dlp to print
pub const PROGRESS_PREFIX: &str = "vidgrab:";

/// Value for `--progress-template`; `NA` stands in for unknown fields
pub const PROGRESS_TEMPLATE: &str = "download:vidgrab:%(progress.status)s:%(progress.downloaded_bytes)s:%(progress.total_bytes)s:%(progress.total_bytes_estimate)s";

/// Number of samples averaged by default
pub const DEFAULT_SMOOTHING_WINDOW: usize = 10;

/// Minimum gap between two displayed progress updates
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Decode one stdout line produced by [`PROGRESS_TEMPLATE`].
///
/// Returns `None` for anything that is not a progress line or carries a
/// status other than downloading/finished.
pub fn parse_progress_from_line(line: &str) -> Option<ProgressSample> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.splitn(4, ':');

    let status = match fields.next()? {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        _ => return None,
    };
    let downloaded_bytes = fields.next().and_then(parse_byte_count).unwrap_or(0);
    let total = fields.next().and_then(parse_byte_count);
    let estimate = fields.next().and_then(parse_byte_count);

    Some(ProgressSample {
        status,
        downloaded_bytes,
        total_bytes: total.or(estimate),
    })
}

// yt-dlp prints estimates as floats ("1048576.0") and unknowns as "NA"
fn parse_byte_count(field: &str) -> Option<u64> {
    let field = field.trim();
    field.parse::<u64>().ok().or_else(|| {
        field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

/// Human-readable byte count using binary units.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Moving average over the most recent percentages.
#[derive(Debug, Clone)]
pub struct ProgressSmoother {
    window: VecDeque<f64>,
    capacity: usize,
}

impl Default for ProgressSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_WINDOW)
    }
}

impl ProgressSmoother {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a raw percentage and return the mean of the current window.
    pub fn smooth(&mut self, raw: f64) -> f64 {
        self.window.push_back(raw);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// What the progress bar and status line should show after a sample
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// 0.0 ..= 100.0
    pub percent: f32,
    pub message: String,
}

/// Rate-limits and smooths samples for display.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    smoother: ProgressSmoother,
    interval: Duration,
    last_update: Option<Instant>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL, DEFAULT_SMOOTHING_WINDOW)
    }
}

impl ProgressTracker {
    pub fn new(interval: Duration, window: usize) -> Self {
        Self {
            smoother: ProgressSmoother::new(window),
            interval,
            last_update: None,
        }
    }

    /// Forget the history of a previous download.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.last_update = None;
    }

    /// Turn a sample into a display update, or `None` when it arrives within
    /// the update interval of the previous displayed sample.
    pub fn observe(&mut self, sample: &ProgressSample, now: Instant) -> Option<ProgressUpdate> {
        match sample.status {
            ProgressStatus::Finished => Some(ProgressUpdate {
                percent: 100.0,
                message: "Download finished, now merging audio and video...".to_string(),
            }),
            ProgressStatus::Downloading => {
                if let Some(last) = self.last_update {
                    if now.saturating_duration_since(last) < self.interval {
                        return None;
                    }
                }
                self.last_update = Some(now);

                match sample.total_bytes.filter(|total| *total > 0) {
                    Some(total) => {
                        let raw = sample.downloaded_bytes as f64 / total as f64 * 100.0;
                        let smoothed = self.smoother.smooth(raw);
                        Some(ProgressUpdate {
                            percent: smoothed.clamp(0.0, 100.0) as f32,
                            message: format!(
                                "Downloading: {smoothed:.1}% of {}",
                                format_bytes(total)
                            ),
                        })
                    }
                    None => Some(ProgressUpdate {
                        percent: 0.0,
                        message: format!(
                            "Downloading: {} downloaded",
                            format_bytes(sample.downloaded_bytes)
                        ),
                    }),
                }
            }
        }
    }
}
