use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(136, 192, 208))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(94, 129, 172))
    .fg(Color::Rgb(236, 239, 244))
    .add_modifier(Modifier::BOLD);
pub const KPI_LABEL_STYLE: Style = Style::new().fg(Color::Rgb(129, 140, 155));
pub const KPI_VALUE_STYLE: Style = Style::new()
    .fg(Color::Rgb(229, 233, 240))
    .add_modifier(Modifier::BOLD);

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(21, 24, 30)
    } else {
        Color::Rgb(27, 31, 38)
    };
    Style::new().bg(bg)
}

pub fn running_color(running: bool) -> Color {
    if running {
        Color::Rgb(163, 190, 140)
    } else {
        Color::Rgb(208, 135, 112)
    }
}

pub fn note_color(is_error: bool) -> Color {
    if is_error {
        Color::Rgb(191, 97, 106)
    } else {
        Color::Rgb(143, 188, 187)
    }
}

pub mod icons {
    pub const EXPANDED: &str = "v";
    pub const COLLAPSED: &str = ">";
    pub const LEAF: &str = " ";
    pub const UP: &str = "↑";
    pub const DOWN: &str = "↓";
    pub const RUNNING: &str = "●";
    pub const STOPPED: &str = "○";
}
