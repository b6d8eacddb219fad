//! Main application for the YouTube Video Downloader GUI

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{ColorImage, TextureOptions, Visuals};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use vidgrab::{
    AppConfig, Controller, NoticeLevel, YtDlp, environment,
    logging::{self, LoggingConfig},
    thumbnail,
};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

const WINDOW_TITLE: &str = "YouTube Video Downloader";

/// Program entry point: initializes logging and runtime, then launches GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    let _log_guard = logging::init(&LoggingConfig::auto().with_log_file(&config.log_file))?;
    info!(?config, "starting");

    // Create a new Tokio runtime and store it globally
    let rt = Arc::new(Runtime::new()?);
    let handle = rt.handle().clone();
    RUNTIME
        .set(rt)
        .map_err(|_| "tokio runtime initialised twice")?;

    let mut controller = Controller::new(
        Arc::new(YtDlp::new(&config.ytdlp_program).with_leading_args(config.ytdlp_args.clone())),
        &config,
        handle,
    );
    // Validate FFmpeg availability before the first frame
    controller.apply_environment_check(environment::check_merge_tool(&config.ffmpeg_program));

    // Fixed-size window like a small utility dialog
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([600.0, 450.0])
            .with_resizable(false)
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(controller))
        }),
    )?;
    Ok(())
}

/// Application state for the GUI
struct DownloaderApp {
    /// Owns all download state; the window only renders it
    controller: Controller<YtDlp>,
    /// Cached texture for the fetched video's thumbnail
    thumbnail: Option<egui::TextureHandle>,
    /// Incoming thumbnail fetch result
    thumbnail_result: Arc<Mutex<Option<ColorImage>>>,
}

impl DownloaderApp {
    fn new(controller: Controller<YtDlp>) -> Self {
        Self {
            controller,
            thumbnail: None,
            thumbnail_result: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn a blocking thumbnail fetch for the latest video info
    fn request_thumbnail(&mut self, ctx: &egui::Context, url: String) {
        self.thumbnail = None;
        let Some(rt) = RUNTIME.get() else {
            warn!("no runtime available for thumbnail fetch");
            return;
        };
        let results = Arc::clone(&self.thumbnail_result);
        let ctx_c = ctx.clone();
        rt.spawn_blocking(move || match thumbnail::fetch_thumbnail(&url) {
            Ok(img) => {
                if let Ok(mut slot) = results.lock() {
                    *slot = Some(img);
                }
                ctx_c.request_repaint();
            }
            Err(e) => warn!(%url, "{e}"),
        });
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.controller.current_notice().cloned() else {
            return;
        };
        let color = match notice.level {
            NoticeLevel::Info => egui::Color32::LIGHT_GREEN,
            NoticeLevel::Warning => egui::Color32::YELLOW,
            NoticeLevel::Critical => egui::Color32::LIGHT_RED,
        };
        egui::Window::new(notice.title.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(&notice.message).color(color));
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    self.controller.dismiss_notice();
                }
            });
    }

    fn render_form(&mut self, ui: &mut egui::Ui) {
        // URL input field
        ui.label(egui::RichText::new("Enter YouTube Video URL:").size(14.0));
        ui.add(
            egui::TextEdit::singleline(&mut self.controller.url)
                .hint_text("https://www.youtube.com/watch?v=example")
                .desired_width(f32::INFINITY),
        );

        if ui.button("Fetch Video Info").clicked() {
            if let Err(e) = self.controller.start_fetch() {
                self.controller.report(&e);
            }
        }
        ui.add_space(8.0);

        // Resolution dropdown
        ui.label(egui::RichText::new("Select Resolution:").size(14.0));
        let labels: Vec<String> = self
            .controller
            .choices()
            .iter()
            .map(|c| c.label.clone())
            .collect();
        let mut selected = self.controller.selected_index();
        let selected_text = labels.get(selected).cloned().unwrap_or_default();
        egui::ComboBox::from_id_source("resolution")
            .selected_text(selected_text)
            .width(160.0)
            .show_ui(ui, |ui| {
                for (i, label) in labels.iter().enumerate() {
                    ui.selectable_value(&mut selected, i, label.as_str());
                }
            });
        self.controller.select(selected);

        // Folder selection
        ui.horizontal(|ui| {
            ui.label("Download folder:");
            ui.text_edit_singleline(&mut self.controller.output_dir);
            if ui.button("Browse…").clicked() {
                if let Some(folder) = FileDialog::new()
                    .set_directory(&self.controller.output_dir)
                    .pick_folder()
                {
                    self.controller.output_dir = folder.display().to_string();
                }
            }
        });

        if ui.button("Download").clicked() {
            if let Err(e) = self.controller.start_download() {
                self.controller.report(&e);
            }
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply runner events (fetch results, progress, completion)
        self.controller.poll();

        // 2️⃣ Start a thumbnail fetch for freshly fetched info
        if let Some(url) = self.controller.take_thumbnail_request() {
            self.request_thumbnail(ctx, url);
        }

        // 3️⃣ Handle a completed thumbnail fetch
        if let Some(img) = self
            .thumbnail_result
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
        {
            self.thumbnail = Some(ctx.load_texture("thumbnail", img, TextureOptions::default()));
        }

        // 4️⃣ Modal notices
        self.render_notice(ctx);

        // 5️⃣ Main panel: inputs, progress bar and status line
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(WINDOW_TITLE);
            ui.add_space(6.0);

            let enabled = self.controller.controls_enabled()
                && self.controller.current_notice().is_none();
            ui.add_enabled_ui(enabled, |ui| self.render_form(ui));

            ui.add_space(8.0);
            ui.add(egui::ProgressBar::new(self.controller.progress() / 100.0).show_percentage());
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(self.controller.status()).size(12.0));
            });

            if let Some(title) = self.controller.video_title() {
                ui.separator();
                ui.horizontal(|ui| {
                    if let Some(tex) = &self.thumbnail {
                        ui.add(egui::Image::new(tex).max_width(120.0));
                    }
                    ui.label(egui::RichText::new(title).strong());
                });
            }
        });

        // Request periodic repaint for progress updates
        if self.controller.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
