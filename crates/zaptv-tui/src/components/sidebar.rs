//! Category sidebar — pure projection of the navigator's sidebar state.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use zaptv_core::nav::{Navigator, Region};

use crate::app_state::AppState;
use crate::theme::{
    style_default, style_muted, style_playing, style_secondary, style_selected,
    style_selected_focused,
};
use crate::widgets::pane_chrome::pane_chrome;

pub fn draw(frame: &mut Frame, area: Rect, state: &AppState, nav: &Navigator) {
    let focused = nav.region == Region::Sidebar;
    let block = pane_chrome("Categories", focused, None);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    for (idx, category) in state.categories.iter().enumerate() {
        if idx as u16 >= inner.height {
            break;
        }
        let row = Rect {
            x: inner.x,
            y: inner.y + idx as u16,
            width: inner.width,
            height: 1,
        };

        let cursor = idx == nav.cursor_category;
        let active = idx == nav.active_category;

        let style = if cursor && focused {
            style_selected_focused()
        } else if cursor {
            style_selected()
        } else if active {
            style_default()
        } else {
            style_secondary()
        };

        // Active category keeps a marker even when the cursor is elsewhere.
        let marker = if active {
            Span::styled("● ", style_playing())
        } else {
            Span::styled("  ", style_muted())
        };
        let line = Line::from(vec![marker, Span::styled(&category.name, style)]);
        frame.render_widget(Paragraph::new(line).style(style), row);
    }
}
