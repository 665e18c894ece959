//! Channel list — virtualized projection of the flattened row sequence.
//!
//! Only rows intersecting the viewport (plus a small overscan band) are ever
//! turned into widgets, so a 10k-channel playlist draws at the same cost as
//! a 10-channel one.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use zaptv_core::model::PlaybackStatus;
use zaptv_core::nav::{Navigator, Region};
use zaptv_core::rows::{Row, RowKind, CHANNEL_ROW_HEIGHT};
use zaptv_core::window::{sticky_header, visible_range};

use crate::app_state::AppState;
use crate::theme::{
    style_default, style_group_header, style_muted, style_playing, style_secondary,
    style_selected, style_selected_focused, C_BADGE_LOADING, C_CHANNEL_NUMBER,
};
use crate::widgets::pane_chrome::{pane_chrome, Badge};

/// Extra cells rendered beyond each viewport edge.
const OVERSCAN: u16 = 2 * CHANNEL_ROW_HEIGHT;

/// Draw the list into `area` and return the inner rect used for rows, which
/// the app keeps for pointer hit-testing.
pub fn draw(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    state: &AppState,
    nav: &mut Navigator,
) -> Rect {
    let focused = nav.region == Region::List;
    let badge = state.loading_category.then_some(Badge {
        text: "LOADING",
        color: C_BADGE_LOADING,
    });
    let block = pane_chrome(title, focused, badge);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    nav.set_viewport(inner.height);

    if nav.rows.is_empty() {
        let hint = if state.loading_category {
            "Loading channels…"
        } else {
            "No channels"
        };
        frame.render_widget(Paragraph::new(hint).style(style_muted()), inner);
        return inner;
    }

    let range = visible_range(&nav.rows.rows, nav.scroll, inner.height, OVERSCAN);
    for idx in range {
        let row = &nav.rows.rows[idx];
        draw_row(frame, inner, state, nav, idx, row);
    }

    // Pinned section caption when its header has scrolled off the top.
    if let Some(idx) = sticky_header(&nav.rows.rows, nav.scroll) {
        let header = &nav.rows.rows[idx];
        if header.top < nav.scroll {
            let strip = Rect {
                x: inner.x,
                y: inner.y,
                width: inner.width,
                height: 1,
            };
            frame.render_widget(
                Paragraph::new(header_line(state, &header.kind)).style(style_group_header()),
                strip,
            );
        }
    }

    if nav.rows.total_height > inner.height as u32 {
        let mut bar = ScrollbarState::new(nav.rows.total_height as usize)
            .viewport_content_length(inner.height as usize)
            .position(nav.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut bar,
        );
    }

    inner
}

fn draw_row(
    frame: &mut Frame,
    inner: Rect,
    state: &AppState,
    nav: &Navigator,
    idx: usize,
    row: &Row,
) {
    let focused_row = nav.focus == Some(idx);
    let list_focused = nav.region == Region::List;

    for line_idx in 0..row.height {
        let cell = row.top + line_idx as u32;
        if cell < nav.scroll {
            continue;
        }
        let rel = cell - nav.scroll;
        if rel >= inner.height as u32 {
            break;
        }
        let strip = Rect {
            x: inner.x,
            y: inner.y + rel as u16,
            width: inner.width,
            height: 1,
        };

        let base = if focused_row && list_focused {
            style_selected_focused()
        } else if focused_row {
            style_selected()
        } else {
            style_default()
        };

        let line = match &row.kind {
            RowKind::GroupHeader { .. } => header_line(state, &row.kind),
            RowKind::GroupEntry { group_idx } => {
                let (title, count) = state
                    .groups
                    .get(*group_idx)
                    .map(|g| (g.title.as_str(), g.channels.len()))
                    .unwrap_or(("?", 0));
                Line::from(vec![
                    Span::styled(format!(" {} ", truncate(title, inner.width.saturating_sub(12))), base),
                    Span::styled(format!("({}) ▸", count), style_secondary()),
                ])
            }
            RowKind::ChannelEntry {
                group_idx,
                channel_idx,
                number,
            } => channel_line(state, *group_idx, *channel_idx, *number, line_idx, base, inner.width),
        };

        let style = match row.kind {
            RowKind::GroupHeader { .. } => style_group_header(),
            _ => base,
        };
        frame.render_widget(Paragraph::new(line).style(style), strip);
    }
}

fn header_line<'a>(state: &'a AppState, kind: &RowKind) -> Line<'a> {
    let RowKind::GroupHeader { group_idx } = kind else {
        return Line::default();
    };
    match state.groups.get(*group_idx) {
        Some(group) => Line::from(format!(" {} ", group.title)),
        None => Line::default(),
    }
}

#[allow(clippy::too_many_arguments)]
fn channel_line<'a>(
    state: &'a AppState,
    group_idx: usize,
    channel_idx: usize,
    number: usize,
    line_idx: u16,
    base: ratatui::style::Style,
    width: u16,
) -> Line<'a> {
    let Some(channel) = state.channel(group_idx, channel_idx) else {
        return Line::default();
    };

    if line_idx == 0 {
        let live = state.session.status == PlaybackStatus::Playing
            && state.session.channel.as_ref().map(|c| c.id.as_str()) == Some(channel.id.as_str());
        let marker = if live {
            Span::styled("▶ ", style_playing())
        } else {
            Span::raw("  ")
        };
        Line::from(vec![
            Span::styled(
                format!("{:>4} ", number),
                ratatui::style::Style::default().fg(C_CHANNEL_NUMBER),
            ),
            marker,
            Span::styled(truncate(&channel.name, width.saturating_sub(8)), base),
        ])
    } else {
        // Second line: what's on now, from the guide join.
        let (now, _) = state.now_next(channel);
        match now {
            Some(program) => Line::from(vec![
                Span::raw("       "),
                Span::styled(
                    truncate(&program.title, width.saturating_sub(9)),
                    style_secondary(),
                ),
            ]),
            None => Line::from(vec![Span::raw("       "), Span::styled("—", style_muted())]),
        }
    }
}

/// Cut `s` to at most `max` display cells, appending an ellipsis when cut.
fn truncate(s: &str, max: u16) -> String {
    let max = max as usize;
    if s.width() <= max {
        return s.to_string();
    }
    let mut width = 0usize;
    let mut out = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if width + w > max.saturating_sub(1) {
            out.push('…');
            return out;
        }
        width += w;
        out.push(c);
    }
    out
}
