use crate::state::{ActionKind, App, ConfigForm, FieldKind};
use crate::theme::{self, icons};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};
use sockpit_core::format::{format_bytes, format_uptime};
use sockpit_core::stats::{self, TreeRow};

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, layout[0]);
    render_kpis(f, app, layout[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(layout[2]);
    render_clients(f, app, body[0]);
    render_logs(f, app, body[1]);

    render_footer(f, app, layout[3]);

    if let Some(form) = &app.config_form {
        render_config_form(f, form, area);
    } else if app.config_loading {
        render_config_loading(f, area);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("sockpit");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut spans = vec![
        Span::styled(app.base_url.clone(), Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
    ];
    if app.connected {
        let (icon, label) = if app.running {
            (icons::RUNNING, "Running")
        } else {
            (icons::STOPPED, "Stopped")
        };
        spans.push(Span::styled(
            format!("{icon} {label}"),
            Style::default()
                .fg(theme::running_color(app.running))
                .add_modifier(Modifier::BOLD),
        ));
    } else {
        spans.push(Span::styled(
            "Disconnected",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn render_kpis(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Statistics");
    let inner = block.inner(area);
    f.render_widget(block, area);

    // The headline numbers keep their last rendered values while the relay
    // is stopped, matching the rest of the snapshot display.
    let stats = app.stats.clone().unwrap_or_default();
    let spans = vec![
        kpi("Conn", stats::connections_label(&stats)),
        kpi("Total", stats.total_connections.to_string()),
        kpi("Rejected", stats.rejected_connections.to_string()),
        kpi("Closed", stats.closed_connections.to_string()),
        kpi(icons::UP, format_bytes(stats.bytes_sent)),
        kpi(icons::DOWN, format_bytes(stats.bytes_received)),
        kpi("Traffic", format_bytes(stats.total_traffic)),
        kpi("Uptime", format_uptime(stats.uptime)),
    ];
    let line: Vec<Span> = spans.into_iter().flatten().collect();
    f.render_widget(Paragraph::new(Line::from(line)), inner);
}

fn kpi(label: &str, value: String) -> Vec<Span<'static>> {
    vec![
        Span::styled(format!("{label} "), theme::KPI_LABEL_STYLE),
        Span::styled(value, theme::KPI_VALUE_STYLE),
        Span::raw("  "),
    ]
}

fn render_clients(f: &mut Frame, app: &mut App, area: Rect) {
    if app.display.is_placeholder() {
        let block = Block::default().borders(Borders::ALL).title("Clients");
        let inner = block.inner(area);
        f.render_widget(block, area);
        let p = Paragraph::new(Span::styled("No active clients", Color::DarkGray))
            .wrap(Wrap { trim: true });
        f.render_widget(p, inner);
        return;
    }

    let rows: Vec<Row> = app
        .display
        .rows
        .iter()
        .enumerate()
        .map(|(visual_idx, row)| match row {
            TreeRow::Client(client) => {
                let mut title_spans = Vec::new();
                let icon = if !client.expandable {
                    icons::LEAF
                } else if client.expanded {
                    icons::EXPANDED
                } else {
                    icons::COLLAPSED
                };
                title_spans.push(Span::styled(format!("{icon} "), Color::Blue));
                title_spans.push(Span::raw(client.address.clone()));
                if client.expandable && !client.expanded {
                    title_spans.push(Span::styled(
                        format!(" ({})", client.target_count),
                        Color::DarkGray,
                    ));
                }
                Row::new(vec![
                    Cell::from(Line::from(title_spans)),
                    Cell::from(client.active_connections.to_string()),
                    Cell::from(Span::styled(
                        format!("{}{}", icons::UP, client.sent),
                        Color::Green,
                    )),
                    Cell::from(Span::styled(
                        format!("{}{}", icons::DOWN, client.received),
                        Color::Cyan,
                    )),
                    Cell::from(client.total.clone()),
                ])
                .style(theme::zebra_row_style(visual_idx))
            }
            TreeRow::Target(target) => Row::new(vec![
                Cell::from(Line::from(vec![
                    Span::raw("    - "),
                    Span::styled(target.address.clone(), Color::Gray),
                ])),
                Cell::from(format!("{} conn", target.active_connections)),
                Cell::from(""),
                Cell::from(""),
                Cell::from(target.total.clone()),
            ])
            .style(theme::zebra_row_style(visual_idx)),
            TreeRow::Empty => Row::new(vec![Cell::from("No active clients")]),
        })
        .collect();

    let widths = [
        Constraint::Min(18),
        Constraint::Length(8),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Client", "Conn", "Sent", "Recv", "Total"]).style(theme::HEADER_STYLE))
        .block(Block::default().borders(Borders::ALL).title("Clients"))
        .highlight_style(theme::SELECTED_STYLE);

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_logs(f: &mut Frame, app: &mut App, area: Rect) {
    let title = format!("Logs ({})", app.feed.len());
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines: Vec<Line> = app.feed.iter().map(Line::from).collect();

    let max_scroll = (lines.len() as u16).saturating_sub(inner.height);
    app.log_max_scroll = max_scroll;
    app.log_page = inner.height;
    if let Some(scroll) = app.log_scroll {
        if scroll >= max_scroll {
            app.log_scroll = None;
        }
    }
    let offset = app.log_scroll.unwrap_or(max_scroll);

    let p = Paragraph::new(lines).scroll((offset, 0));
    f.render_widget(p, inner);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(note) = &app.status_note {
        Line::from(Span::styled(
            note.text.clone(),
            Style::default()
                .fg(theme::note_color(note.error))
                .add_modifier(Modifier::BOLD),
        ))
    } else if let Some(pending) = app.pending_action {
        let label = match pending {
            ActionKind::Start => "starting server...",
            ActionKind::Stop => "stopping server...",
            ActionKind::SaveConfig => "saving configuration...",
        };
        Line::from(Span::styled(label, Color::Yellow))
    } else if let Some(error) = &app.last_poll_error {
        Line::from(Span::styled(error.clone(), Color::Red))
    } else {
        Line::from(Span::styled(
            "q quit  j/k move  space expand  s start  x stop  c config  r refresh  PgUp/PgDn logs",
            Color::DarkGray,
        ))
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_config_form(f: &mut Frame, form: &ConfigForm, area: Rect) {
    let popup = centered_rect(area, 52, 16);
    f.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Configuration")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let mut lines = Vec::new();
    for (idx, field) in form.fields.iter().enumerate() {
        let selected = idx == form.selected;
        let editing = selected && form.editing;

        let shown = if editing {
            format!("{}_", form.buffer)
        } else {
            match field.kind {
                FieldKind::Secret if field.value.is_empty() => "(unchanged)".to_string(),
                FieldKind::Secret => "*".repeat(field.value.len()),
                FieldKind::Flag => {
                    let mark = if field.value == "on" { "x" } else { " " };
                    format!("[{mark}]")
                }
                _ => field.value.clone(),
            }
        };

        let label_style = if selected {
            theme::SELECTED_STYLE
        } else {
            Style::default().fg(Color::DarkGray)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<28}", field.label), label_style),
            Span::raw(shown),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "enter edit  space toggle  s save  esc close",
        Color::DarkGray,
    )));

    f.render_widget(Paragraph::new(lines), inner);
}

fn render_config_loading(f: &mut Frame, area: Rect) {
    let popup = centered_rect(area, 30, 3);
    f.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup);
    f.render_widget(block, popup);
    f.render_widget(Paragraph::new("Loading configuration..."), inner);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
