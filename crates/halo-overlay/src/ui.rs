use crate::app::App;
use crate::theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Rows the chrome takes around the history log: header, status line,
/// input bar with its borders.
const CHROME_ROWS: u16 = 6;

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(area);

    render_header(frame, app, layout[0]);
    render_history(frame, app, layout[1]);
    render_status_line(frame, app, layout[2]);
    render_input(frame, app, layout[3]);

    // Report the content box the rendered log would like to occupy so the
    // hosting window can grow or shrink around it.
    let desired = desired_rows(app);
    app.report_content_box(area.width, desired);
}

/// How many rows the overlay wants: one per history line plus chrome.
fn desired_rows(app: &App) -> u16 {
    let history = app.controller.state().history().len();
    u16::try_from(history).unwrap_or(u16::MAX).saturating_add(CHROME_ROWS)
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.controller.state();
    let phase = state.phase();
    let indicator = if state.is_agent_running() {
        "agent running"
    } else {
        "agent idle"
    };
    let line = Line::from(vec![
        Span::styled("halo", theme::HEADER_STYLE),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", phase.as_str()),
            Style::new().fg(theme::phase_color(phase)),
        ),
        Span::raw("  "),
        Span::styled(indicator, theme::MUTED_STYLE),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .controller
        .state()
        .history()
        .iter()
        .map(|event| {
            Line::from(vec![
                Span::styled(
                    format!("{} ", theme::origin_marker(event.origin)),
                    theme::origin_style(event.origin),
                ),
                Span::styled(
                    event.display_message.clone(),
                    theme::origin_style(event.origin),
                ),
                Span::raw("  "),
                Span::styled(
                    event.received_at.format("%H:%M:%S").to_string(),
                    theme::MUTED_STYLE,
                ),
            ])
        })
        .collect();

    // Follow the tail; Up/Down walks back through the log.
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let tail_offset = total.saturating_sub(area.height);
    let offset = tail_offset.saturating_sub(app.scroll);
    let log = Paragraph::new(lines).scroll((offset, 0));
    frame.render_widget(log, area);
}

fn render_status_line(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.controller.state();
    let line = if let Some(notice) = &app.status_note {
        Line::from(Span::styled(notice.clone(), theme::NOTICE_STYLE))
    } else if let Some(current) = state.current_status() {
        Line::from(Span::styled(
            current.display_message.clone(),
            theme::MUTED_STYLE,
        ))
    } else {
        Line::from(Span::styled(
            "enter a task, ^P pause, ^R resume, ^X stop",
            theme::MUTED_STYLE,
        ))
    };
    frame.render_widget(Paragraph::new(line).wrap(Wrap { trim: true }), area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let input = Paragraph::new(Line::from(vec![
        Span::styled("> ", theme::HEADER_STYLE),
        Span::styled(app.input.clone(), theme::INPUT_STYLE),
    ]))
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(input, area);
}
