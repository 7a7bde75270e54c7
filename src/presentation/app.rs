use crate::domain::models::{
    AppEvent, BusCommand, ConnectionStatus, MessageSeverity, StatusMessage, Topic,
};
use crate::domain::session::{BusPoller, PlotSession, PollReport, SessionControls};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bus::subscriber::spawn_receive_worker;
use eframe::egui;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const MIN_POLL_INTERVAL_MS: u64 = 10;
pub const MAX_POLL_INTERVAL_MS: u64 = 2000;

pub struct SensorPlotApp {
    pub(crate) settings: SettingsService,
    pub(crate) session: PlotSession<mpsc::UnboundedSender<BusCommand>>,
    pub(crate) events: mpsc::UnboundedReceiver<AppEvent>,

    // Bus state
    pub(crate) bus_url: String,
    pub(crate) connection_status: ConnectionStatus,
    pub(crate) status_message: Option<StatusMessage>,

    // Timer
    pub(crate) poll_interval_ms: u64,
    pub(crate) poller: BusPoller,

    // UI controls
    pub(crate) series_enabled: [bool; 2],
    pub(crate) auto_stop_enabled: bool,
    pub(crate) auto_stop_secs: f64,
    pub(crate) export_path: String,
    pub(crate) is_dark_mode: bool,
}

impl SensorPlotApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: SettingsService, bus_url: String) -> Self {
        crate::presentation::theme::configure_style(&cc.egui_ctx, false);

        let worker = spawn_receive_worker(bus_url.clone(), Topic::ALL.to_vec());
        let s = settings.get().clone();
        let mut session = PlotSession::new(worker.commands, s.plot_window);
        let auto_stop_secs = s.auto_stop_secs.unwrap_or(10.0);
        session.set_auto_stop(s.auto_stop_secs.map(Duration::from_secs_f64));

        tracing::info!("GUI subscriber on {}", bus_url);

        Self {
            settings,
            session,
            events: worker.events,
            bus_url,
            connection_status: ConnectionStatus::Disconnected,
            status_message: None,
            poll_interval_ms: s
                .poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
            poller: BusPoller::default(),
            series_enabled: [true, true],
            auto_stop_enabled: s.auto_stop_secs.is_some(),
            auto_stop_secs,
            export_path: default_export_path(),
            is_dark_mode: false,
        }
    }

    /// Timer callback: move pending bus messages into the session.
    fn poll_bus(&mut self, now: Instant) {
        let interval = Duration::from_millis(self.poll_interval_ms);
        let events = &mut self.events;
        let drained = std::iter::from_fn(|| events.try_recv().ok());
        if let Some(report) = self.poller.poll(&mut self.session, now, interval, drained) {
            self.apply_report(report);
        }
    }

    fn apply_report(&mut self, report: PollReport) {
        if let Some(status) = report.connection {
            self.connection_status = status;
        }
        if let Some(msg) = report.log {
            self.status_message = Some(msg);
        }

        if report.end_of_stream {
            self.report_end_of_stream();
        } else if report.tick.is_some_and(|t| t.auto_stopped) {
            self.status_message = Some(StatusMessage::new(
                format!("Auto-stopped after {:.1}s", self.auto_stop_secs),
                MessageSeverity::Info,
            ));
        }
    }

    fn report_end_of_stream(&mut self) {
        self.status_message = Some(StatusMessage::new(
            "Publisher sent end of stream",
            MessageSeverity::Warning,
        ));
    }

    pub(crate) fn toggle_running(&mut self) {
        if self.session.is_running() {
            self.session.on_stop();
        } else {
            self.apply_auto_stop();
            self.poller.reset();
            self.session.on_start();
        }
    }

    pub(crate) fn apply_auto_stop(&mut self) {
        let limit = self
            .auto_stop_enabled
            .then(|| Duration::from_secs_f64(self.auto_stop_secs.max(0.0)));
        self.session.set_auto_stop(limit);
    }

    pub(crate) fn set_series(&mut self, topic: Topic, enabled: bool) {
        self.session.on_toggle_series(topic, enabled);
    }

    pub(crate) fn export(&mut self) {
        let path = std::path::PathBuf::from(self.export_path.trim());
        self.status_message = Some(match self.session.on_export(&path) {
            Ok(rows) => StatusMessage::new(
                format!("Exported {} rows to {}", rows, path.display()),
                MessageSeverity::Success,
            ),
            Err(e) => {
                tracing::error!("Export failed: {}", e);
                StatusMessage::new(format!("Export failed: {}", e), MessageSeverity::Error)
            }
        });
    }

    pub(crate) fn save_settings(&mut self) {
        {
            let s = self.settings.get_mut();
            s.poll_interval_ms = self.poll_interval_ms;
            s.auto_stop_secs = self.auto_stop_enabled.then_some(self.auto_stop_secs);
            s.bus_url = self.bus_url.clone();
        }
        self.status_message = Some(match self.settings.save() {
            Ok(()) => StatusMessage::new(
                format!("Settings saved to {}", self.settings.path().display()),
                MessageSeverity::Success,
            ),
            Err(e) => StatusMessage::new(
                format!("Failed to save settings: {}", e),
                MessageSeverity::Error,
            ),
        });
    }
}

fn default_export_path() -> String {
    format!(
        "sensor_data_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

impl eframe::App for SensorPlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_bus(Instant::now());

        use crate::presentation::panels;

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            panels::render_header(self, ui);
        });

        egui::SidePanel::left("controls")
            .resizable(false)
            .min_width(260.0)
            .show(ctx, |ui| {
                panels::render_controls(self, ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                panels::render_plots(self, ui);
                ui.add_space(10.0);
                panels::render_stats(self, ui);
            });
        });

        ctx.request_repaint_after(Duration::from_millis(self.poll_interval_ms));
    }
}
