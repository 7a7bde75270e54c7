use eframe::egui;

pub struct LabPalette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub axis: [egui::Color32; 3],
    pub running: egui::Color32,
    pub stopped: egui::Color32,
    pub accent: egui::Color32,
}

impl LabPalette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(25, 25, 25),
                fg: egui::Color32::WHITE,
                stroke: egui::Color32::from_gray(200),
                axis: [
                    egui::Color32::from_rgb(255, 90, 90),
                    egui::Color32::from_rgb(90, 230, 120),
                    egui::Color32::from_rgb(100, 160, 255),
                ],
                running: egui::Color32::from_rgb(0, 255, 127),
                stopped: egui::Color32::from_gray(150),
                accent: egui::Color32::from_rgb(255, 200, 0),
            }
        } else {
            Self {
                bg: egui::Color32::from_rgb(245, 245, 245),
                fg: egui::Color32::BLACK,
                stroke: egui::Color32::BLACK,
                axis: [
                    egui::Color32::from_rgb(220, 40, 40),
                    egui::Color32::from_rgb(0, 150, 60),
                    egui::Color32::from_rgb(30, 80, 220),
                ],
                running: egui::Color32::from_rgb(0, 160, 0),
                stopped: egui::Color32::from_gray(100),
                accent: egui::Color32::from_rgb(255, 220, 0),
            }
        }
    }
}

pub fn configure_style(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = LabPalette::new(is_dark);

    style.visuals = if is_dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 24.0,
                egui::TextStyle::Body | egui::TextStyle::Button => 14.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(10.0, 8.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);

    style.visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.5, palette.stroke);
    style.visuals.widgets.noninteractive.rounding = egui::Rounding::ZERO;
    style.visuals.widgets.noninteractive.bg_fill = palette.bg;
    style.visuals.widgets.inactive.rounding = egui::Rounding::ZERO;
    style.visuals.widgets.hovered.rounding = egui::Rounding::ZERO;
    style.visuals.widgets.hovered.bg_fill = palette.accent;
    style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
    style.visuals.widgets.active.rounding = egui::Rounding::ZERO;

    style.visuals.panel_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    ctx.set_style(style);
}
