use crate::domain::models::{ConnectionStatus, MessageSeverity, Topic};
use crate::presentation::app::{SensorPlotApp, MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
use crate::presentation::components::Components;
use crate::presentation::theme::{configure_style, LabPalette};
use eframe::egui;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::time::Instant;

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

pub fn render_header(app: &mut SensorPlotApp, ui: &mut egui::Ui) {
    let palette = LabPalette::new(app.is_dark_mode);

    ui.horizontal(|ui| {
        Components::heading(ui, "BLE Sensor Lab");
        ui.separator();

        let (text, color) = match app.connection_status {
            ConnectionStatus::Connected => ("Bus connected", palette.running),
            ConnectionStatus::Connecting => ("Connecting...", palette.accent),
            ConnectionStatus::Disconnected => ("Bus disconnected", palette.stopped),
            ConnectionStatus::Error => ("Bus error", egui::Color32::RED),
        };
        ui.colored_label(color, text);
        ui.label(egui::RichText::new(&app.bus_url).monospace().weak());

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let label = if app.is_dark_mode { "Light" } else { "Dark" };
            if ui.button(label).clicked() {
                app.is_dark_mode = !app.is_dark_mode;
                configure_style(ui.ctx(), app.is_dark_mode);
            }
        });
    });

    if let Some(status) = &app.status_message {
        let bg = match status.severity {
            MessageSeverity::Info => palette.bg,
            MessageSeverity::Success => egui::Color32::from_rgb(200, 240, 200),
            MessageSeverity::Warning => egui::Color32::from_rgb(255, 235, 160),
            MessageSeverity::Error => egui::Color32::from_rgb(255, 200, 200),
        };
        let fg = match status.severity {
            MessageSeverity::Info => palette.fg,
            _ => egui::Color32::BLACK,
        };
        Components::status_banner(ui, &status.message, bg, fg);
    }
    ui.add_space(4.0);
}

pub fn render_controls(app: &mut SensorPlotApp, ui: &mut egui::Ui) {
    let palette = LabPalette::new(app.is_dark_mode);

    Components::card(ui, "Acquisition", |ui| {
        let running = app.session.is_running();
        let (label, color) = if running {
            ("Stop", palette.stopped)
        } else {
            ("Start", palette.running)
        };
        let button = egui::Button::new(egui::RichText::new(label).strong().color(color))
            .min_size(egui::vec2(ui.available_width(), 32.0));
        if ui.add(button).clicked() {
            app.toggle_running();
        }

        if let Some(elapsed) = app.session.run_elapsed(Instant::now()) {
            ui.label(format!("Running for {:.1}s", elapsed.as_secs_f64()));
        }

        ui.add_space(6.0);
        ui.label("Poll interval (ms)");
        ui.add(egui::Slider::new(
            &mut app.poll_interval_ms,
            MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS,
        ));

        ui.horizontal(|ui| {
            let toggled = ui.checkbox(&mut app.auto_stop_enabled, "Auto-stop after").changed();
            let edited = ui
                .add_enabled(
                    app.auto_stop_enabled,
                    egui::DragValue::new(&mut app.auto_stop_secs)
                        .speed(0.5)
                        .range(0.5..=3600.0)
                        .suffix(" s"),
                )
                .changed();
            if toggled || edited {
                app.apply_auto_stop();
            }
        });
    });

    ui.add_space(8.0);

    Components::card(ui, "Series", |ui| {
        for (i, topic) in Topic::ALL.into_iter().enumerate() {
            if ui
                .checkbox(&mut app.series_enabled[i], topic.label())
                .changed()
            {
                let enabled = app.series_enabled[i];
                app.set_series(topic, enabled);
            }
        }
    });

    ui.add_space(8.0);

    Components::card(ui, "Export", |ui| {
        ui.add(egui::TextEdit::singleline(&mut app.export_path).desired_width(f32::INFINITY));
        let has_data = !app.session.history().accel().is_empty();
        if ui
            .add_enabled(has_data, egui::Button::new("Export CSV"))
            .clicked()
        {
            app.export();
        }
    });

    ui.add_space(8.0);

    if ui.button("Save as defaults").clicked() {
        app.save_settings();
    }
}

pub fn render_plots(app: &SensorPlotApp, ui: &mut egui::Ui) {
    let palette = LabPalette::new(app.is_dark_mode);
    let height = ((ui.available_height() - 140.0) / 2.0).max(160.0);

    for topic in Topic::ALL {
        if !app.session.is_enabled(topic) {
            continue;
        }
        Components::card(ui, topic.label(), |ui| {
            let points = app.session.visible_points(topic);
            Plot::new(topic.as_str())
                .height(height)
                .legend(Legend::default())
                .allow_scroll(false)
                .x_axis_label("t (s)")
                .show(ui, |plot_ui| {
                    for (axis, series) in points.into_iter().enumerate() {
                        plot_ui.line(
                            Line::new(PlotPoints::new(series))
                                .name(AXIS_NAMES[axis])
                                .color(palette.axis[axis]),
                        );
                    }
                });
        });
        ui.add_space(8.0);
    }
}

pub fn render_stats(app: &SensorPlotApp, ui: &mut egui::Ui) {
    Components::card(ui, "Statistics", |ui| {
        egui::Grid::new("stats_grid")
            .num_columns(4)
            .striped(true)
            .spacing([24.0, 4.0])
            .show(ui, |ui| {
                ui.strong("");
                for name in AXIS_NAMES {
                    ui.strong(format!("{} mean / stdev", name));
                }
                ui.end_row();

                for topic in Topic::ALL {
                    let series = app.session.history().series(topic);
                    ui.label(format!("{} ({})", topic.label(), series.len()));
                    for stats in series.stats() {
                        ui.monospace(format!("{:>9.4} / {:<9.4}", stats.mean, stats.stdev));
                    }
                    ui.end_row();
                }
            });
    });
}
