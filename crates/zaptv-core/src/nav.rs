//! Focus and navigation state machine for the two-region browse layout.
//!
//! All key interpretation lives here; the UI layer only projects this state
//! into widgets and forwards effects.  One region is active at a time
//! (category sidebar or row list), focus is remembered per region, and focus
//! can never rest on a non-selectable header row.

use tracing::debug;

use crate::model::Group;
use crate::rows::{Row, RowKind, RowSet, ViewMode};
use crate::window::{max_scroll, scroll_into_view};

/// Rows moved by a PageUp/PageDown press.
pub const PAGE_STEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Sidebar,
    List,
}

/// Device-independent navigation inputs.  The terminal layer maps key codes
/// (and remote-control codes) onto these before anything else happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Enter,
    Back,
    /// Zap keys: move focus by the configured step and activate the result.
    ChannelUp,
    ChannelDown,
    /// Pointer hover over a list row (mouse support on desk setups).
    Hover(usize),
}

/// Side effects the owner must carry out.  The navigator itself never does
/// I/O; activating a channel or reloading a category is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEffect {
    /// Focus landed on a channel the user committed to: start playback.
    Activate { group_idx: usize, channel_idx: usize },
    /// A different category was committed in the sidebar: reload data.
    LoadCategory(usize),
    /// Back was pressed with nothing left to pop here; the caller owns the
    /// next layer (close overlay, leave player, quit prompt).
    BackUnhandled,
}

#[derive(Debug, Clone)]
struct DrillFrame {
    saved_focus: Option<usize>,
    saved_scroll: u32,
}

/// Per-surface navigation state.  The browse screen and the in-player
/// switcher each own one, differing only in base view mode and zap step.
#[derive(Debug, Clone)]
pub struct Navigator {
    pub region: Region,
    /// Sidebar cursor, committed or not.
    pub cursor_category: usize,
    /// Category whose data the list currently shows.
    pub active_category: usize,
    category_count: usize,
    /// Focused row index in `rows`, never a header row.
    pub focus: Option<usize>,
    /// Scroll offset in cells.
    pub scroll: u32,
    pub rows: RowSet,
    base_mode: ViewMode,
    drill: Option<(usize, DrillFrame)>,
    /// Viewport height in cells, updated by the renderer each frame.
    viewport: u16,
    zap_step: usize,
}

impl Navigator {
    pub fn new(category_count: usize, base_mode: ViewMode, zap_step: usize) -> Self {
        Self {
            region: Region::Sidebar,
            cursor_category: 0,
            active_category: 0,
            category_count: category_count.max(1),
            focus: None,
            scroll: 0,
            rows: RowSet::default(),
            base_mode,
            drill: None,
            viewport: 0,
            zap_step: zap_step.max(1),
        }
    }

    /// Group index currently drilled into, if any.
    pub fn drilled_group(&self) -> Option<usize> {
        self.drill.as_ref().map(|(g, _)| *g)
    }

    pub fn current_mode(&self) -> ViewMode {
        match self.drill {
            Some((group_idx, _)) => ViewMode::ChannelsOfGroup(group_idx),
            None => self.base_mode,
        }
    }

    /// Called by the renderer with the measured list height so auto-scroll
    /// works against real geometry.
    pub fn set_viewport(&mut self, height: u16) {
        self.viewport = height;
        self.clamp_scroll();
    }

    /// Replace the backing data, rebuilding rows under the current mode and
    /// remapping focus onto the nearest selectable row.
    pub fn set_groups(&mut self, groups: &[Group]) {
        if let Some((group_idx, _)) = self.drill {
            if group_idx >= groups.len() {
                self.drill = None;
            }
        }
        self.rows = RowSet::flatten(groups, self.current_mode());
        self.focus = self.remapped_focus(self.focus);
        self.clamp_scroll();
        self.ensure_focus_visible();
    }

    /// Fresh data for a newly committed category: back to the list top with
    /// no remembered drill or focus.
    pub fn on_category_loaded(&mut self, category: usize, groups: &[Group]) {
        self.active_category = category;
        self.cursor_category = category.min(self.category_count - 1);
        self.drill = None;
        self.rows = RowSet::flatten(groups, self.base_mode);
        self.focus = None;
        self.scroll = 0;
    }

    pub fn set_category_count(&mut self, count: usize) {
        self.category_count = count.max(1);
        self.cursor_category = self.cursor_category.min(self.category_count - 1);
    }

    /// Interpret one navigation input against current state.
    pub fn handle_key(&mut self, key: NavKey, groups: &[Group]) -> Vec<NavEffect> {
        match self.region {
            Region::Sidebar => self.handle_sidebar_key(key),
            Region::List => self.handle_list_key(key, groups),
        }
    }

    fn handle_sidebar_key(&mut self, key: NavKey) -> Vec<NavEffect> {
        match key {
            NavKey::Up => {
                self.cursor_category = self.cursor_category.saturating_sub(1);
                Vec::new()
            }
            NavKey::Down => {
                self.cursor_category =
                    (self.cursor_category + 1).min(self.category_count - 1);
                Vec::new()
            }
            NavKey::Right => {
                self.enter_list_region();
                Vec::new()
            }
            NavKey::Enter => {
                if self.cursor_category != self.active_category {
                    debug!("nav: commit category {}", self.cursor_category);
                    vec![NavEffect::LoadCategory(self.cursor_category)]
                } else {
                    // Same category: nothing to reload, just move over.
                    self.enter_list_region();
                    Vec::new()
                }
            }
            NavKey::Hover(idx) => {
                self.hover(idx);
                Vec::new()
            }
            NavKey::Back => vec![NavEffect::BackUnhandled],
            // Left / paging / zap keys mean nothing in the sidebar.
            _ => Vec::new(),
        }
    }

    fn handle_list_key(&mut self, key: NavKey, groups: &[Group]) -> Vec<NavEffect> {
        match key {
            NavKey::Up => {
                self.move_focus(-1, 1);
                Vec::new()
            }
            NavKey::Down => {
                self.move_focus(1, 1);
                Vec::new()
            }
            NavKey::PageUp => {
                self.move_focus(-1, PAGE_STEP);
                Vec::new()
            }
            NavKey::PageDown => {
                self.move_focus(1, PAGE_STEP);
                Vec::new()
            }
            NavKey::Left => {
                // Focus is remembered; returning with Right resumes it.
                self.region = Region::Sidebar;
                Vec::new()
            }
            NavKey::Right => Vec::new(),
            NavKey::Enter => self.commit_focused(groups),
            NavKey::Back => {
                if self.pop_drill(groups) {
                    Vec::new()
                } else {
                    vec![NavEffect::BackUnhandled]
                }
            }
            NavKey::ChannelUp => self.zap(-1),
            NavKey::ChannelDown => self.zap(1),
            NavKey::Hover(idx) => {
                self.hover(idx);
                Vec::new()
            }
        }
    }

    fn enter_list_region(&mut self) {
        self.region = Region::List;
        if self.focus.is_none() {
            self.focus = self.rows.first_selectable();
        }
        self.ensure_focus_visible();
    }

    /// Move focus `count` selectable steps in `dir` (−1 up, +1 down).
    /// Header rows are skipped in the direction of travel; at either end the
    /// focus clamps to the last selectable row reached.
    fn move_focus(&mut self, dir: i64, count: usize) {
        if self.rows.is_empty() {
            return;
        }
        let mut at = match self.focus {
            Some(f) => f,
            None => {
                self.focus = self.rows.first_selectable();
                self.ensure_focus_visible();
                return;
            }
        };
        for _ in 0..count {
            match self.next_selectable(at, dir) {
                Some(next) => at = next,
                None => break,
            }
        }
        self.focus = Some(at);
        self.ensure_focus_visible();
    }

    /// Nearest selectable row strictly beyond `from` in direction `dir`.
    fn next_selectable(&self, from: usize, dir: i64) -> Option<usize> {
        let mut idx = from as i64;
        loop {
            idx += dir;
            if idx < 0 || idx as usize >= self.rows.len() {
                return None;
            }
            if self.rows.rows[idx as usize].is_selectable() {
                return Some(idx as usize);
            }
        }
    }

    fn commit_focused(&mut self, groups: &[Group]) -> Vec<NavEffect> {
        let Some(focus) = self.focus else {
            return Vec::new();
        };
        let Some(row) = self.rows.get(focus) else {
            return Vec::new();
        };
        match row.kind {
            RowKind::GroupEntry { group_idx } => {
                self.push_drill(group_idx, groups);
                Vec::new()
            }
            RowKind::ChannelEntry {
                group_idx,
                channel_idx,
                ..
            } => vec![NavEffect::Activate {
                group_idx,
                channel_idx,
            }],
            // Unreachable while the no-header-focus invariant holds.
            RowKind::GroupHeader { .. } => Vec::new(),
        }
    }

    fn push_drill(&mut self, group_idx: usize, groups: &[Group]) {
        debug!("nav: drill into group {}", group_idx);
        let frame = DrillFrame {
            saved_focus: self.focus,
            saved_scroll: self.scroll,
        };
        self.drill = Some((group_idx, frame));
        self.rows = RowSet::flatten(groups, ViewMode::ChannelsOfGroup(group_idx));
        self.focus = self.rows.first_selectable();
        self.scroll = 0;
    }

    /// Pop the drill stack, restoring the saved focus and scroll.  Returns
    /// false when there was nothing to pop.
    fn pop_drill(&mut self, groups: &[Group]) -> bool {
        let Some((_, frame)) = self.drill.take() else {
            return false;
        };
        self.rows = RowSet::flatten(groups, self.base_mode);
        self.focus = self.remapped_focus(frame.saved_focus);
        self.scroll = frame.saved_scroll.min(max_scroll(self.rows.total_height, self.viewport));
        self.ensure_focus_visible();
        true
    }

    /// Zap: move focus by the configured step and activate the landing
    /// channel in one press.
    fn zap(&mut self, dir: i64) -> Vec<NavEffect> {
        if self.focus.is_none() {
            self.focus = self.rows.first_selectable();
        }
        let before = self.focus;
        self.move_focus(dir, self.zap_step);
        if self.focus == before {
            // Already at the end of the list: zapping past it is a no-op.
            return Vec::new();
        }
        match self.focus.and_then(|f| self.rows.channel_at(f)) {
            Some((group_idx, channel_idx)) => vec![NavEffect::Activate {
                group_idx,
                channel_idx,
            }],
            None => Vec::new(),
        }
    }

    fn hover(&mut self, idx: usize) {
        if self.rows.get(idx).map(Row::is_selectable) == Some(true) {
            self.region = Region::List;
            // The pointer is already on the row; no auto-scroll.
            self.focus = Some(idx);
        }
    }

    /// Manual scroll (wheel / swipe).  Moves the window without touching
    /// focus, so the next key press still acts from the focused row.
    pub fn scroll_by(&mut self, delta: i32) {
        let max = max_scroll(self.rows.total_height, self.viewport);
        let next = self.scroll as i64 + delta as i64;
        self.scroll = next.clamp(0, max as i64) as u32;
    }

    fn clamp_scroll(&mut self) {
        self.scroll = self
            .scroll
            .min(max_scroll(self.rows.total_height, self.viewport));
    }

    /// Keep the focused row fully inside the viewport, adjusting scroll by
    /// the minimal amount.  Rows already in view leave scroll untouched.
    fn ensure_focus_visible(&mut self) {
        let Some(focus) = self.focus else {
            return;
        };
        if self.viewport == 0 {
            return;
        }
        if let Some(row) = self.rows.get(focus) {
            if let Some(scroll) = scroll_into_view(row, self.scroll, self.viewport) {
                self.scroll = scroll;
            }
        }
    }

    /// Clamp a stale focus index into the current rows, then slide off any
    /// header it may have landed on (downward first, then upward).
    fn remapped_focus(&self, focus: Option<usize>) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        let idx = focus?.min(self.rows.len() - 1);
        if self.rows.rows[idx].is_selectable() {
            return Some(idx);
        }
        self.next_selectable(idx, 1)
            .or_else(|| self.next_selectable(idx, -1))
    }
}
