//! Full-screen player surface: active channel, session status, now/next.
//!
//! The in-player channel switcher overlay is not drawn here; the app lays it
//! over this surface using the same list renderer as the browse screen.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Gauge, Paragraph},
    Frame,
};

use zaptv_core::model::PlaybackStatus;

use crate::app_state::AppState;
use crate::theme::{
    style_default, style_muted, style_playing, style_secondary, C_BADGE_LIVE, C_BADGE_LOADING,
    C_ERROR, C_LOADING, C_SELECTION_BG,
};
use crate::widgets::pane_chrome::{pane_chrome, Badge};

pub fn draw(frame: &mut Frame, area: Rect, state: &AppState) {
    let badge = match state.session.status {
        PlaybackStatus::Playing => Some(Badge {
            text: "LIVE",
            color: C_BADGE_LIVE,
        }),
        PlaybackStatus::Loading => Some(Badge {
            text: "LOADING",
            color: C_BADGE_LOADING,
        }),
        _ => None,
    };
    let block = pane_chrome("Now Playing", true, badge);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(channel) = state.session.channel.as_ref() else {
        frame.render_widget(
            Paragraph::new("Nothing playing").style(style_muted()),
            inner,
        );
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // channel name + status
            Constraint::Length(1),
            Constraint::Length(3), // now programme + progress
            Constraint::Length(2), // next programme
            Constraint::Min(0),
            Constraint::Length(1), // key hints
        ])
        .split(inner);

    let name = Line::from(Span::styled(
        channel.name.clone(),
        style_default().add_modifier(ratatui::style::Modifier::BOLD),
    ));
    let status = match state.session.status {
        PlaybackStatus::Playing => Line::from(Span::styled("● playing", style_playing())),
        PlaybackStatus::Loading => {
            let attempts = state.session.attempts;
            let msg = if attempts > 1 {
                format!("◌ connecting… (attempt {})", attempts)
            } else {
                "◌ connecting…".to_string()
            };
            Line::from(Span::styled(msg, Style::default().fg(C_LOADING)))
        }
        PlaybackStatus::Unsupported => Line::from(Span::styled(
            "✗ playback not available on this system",
            Style::default().fg(C_ERROR),
        )),
        PlaybackStatus::Idle => Line::from(Span::styled("stopped", style_muted())),
    };
    frame.render_widget(Paragraph::new(vec![name, status]), chunks[0]);

    let (now, next) = state.now_next(channel);

    if let Some(program) = now {
        let span = format!(
            "{}–{}  {}",
            program.start.format("%H:%M"),
            program.end.format("%H:%M"),
            program.title
        );
        let lines = vec![Line::from(Span::styled("Now", style_secondary())), Line::from(span)];
        frame.render_widget(Paragraph::new(lines), chunks[2]);

        // Elapsed fraction of the running programme.
        let total = (program.end - program.start).num_seconds().max(1);
        let elapsed = (state.now - program.start).num_seconds().clamp(0, total);
        let gauge_area = Rect {
            x: chunks[2].x,
            y: chunks[2].y + 2,
            width: chunks[2].width,
            height: 1,
        };
        frame.render_widget(
            Gauge::default()
                .ratio(elapsed as f64 / total as f64)
                .gauge_style(Style::default().fg(C_LOADING).bg(C_SELECTION_BG))
                .label(""),
            gauge_area,
        );
    } else {
        frame.render_widget(
            Paragraph::new(Span::styled("No guide data", style_muted())),
            chunks[2],
        );
    }

    if let Some(program) = next {
        let span = format!(
            "Next  {}  {}",
            program.start.format("%H:%M"),
            program.title
        );
        frame.render_widget(
            Paragraph::new(Span::styled(span, style_secondary())),
            chunks[3],
        );
    }

    frame.render_widget(
        Paragraph::new(Span::styled(
            "Enter: channel list   Ch±: zap   Back: stop",
            style_muted(),
        )),
        chunks[5],
    );
}
