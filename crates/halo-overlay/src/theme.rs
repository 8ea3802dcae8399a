use halo_core::{run::RunPhase, EventOrigin};
use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(191, 219, 254))
    .add_modifier(Modifier::BOLD);
pub const MUTED_STYLE: Style = Style::new().fg(Color::Rgb(148, 163, 184));
pub const NOTICE_STYLE: Style = Style::new()
    .fg(Color::Rgb(245, 158, 11))
    .add_modifier(Modifier::BOLD);
pub const INPUT_STYLE: Style = Style::new().fg(Color::Rgb(226, 232, 240));

pub fn phase_color(phase: RunPhase) -> Color {
    match phase {
        RunPhase::Idle => Color::Rgb(148, 163, 184),
        RunPhase::Running => Color::Rgb(34, 197, 94),
        RunPhase::Paused => Color::Rgb(250, 189, 47),
        RunPhase::Stopped => Color::Rgb(239, 68, 68),
    }
}

pub fn origin_style(origin: EventOrigin) -> Style {
    match origin {
        EventOrigin::User => Style::new()
            .fg(Color::Rgb(56, 189, 248))
            .add_modifier(Modifier::BOLD),
        EventOrigin::Agent => Style::new().fg(Color::Rgb(226, 232, 240)),
        EventOrigin::System => Style::new().fg(Color::Rgb(245, 158, 11)),
    }
}

pub fn origin_marker(origin: EventOrigin) -> &'static str {
    match origin {
        EventOrigin::User => ">",
        EventOrigin::Agent => "*",
        EventOrigin::System => "!",
    }
}
