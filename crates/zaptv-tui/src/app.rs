//! App — the TUI event loop.
//!
//! Owns `AppState`, both navigators (browse and in-player switcher), and the
//! terminal.  All key/mouse input is translated into `NavKey`s or `Action`s
//! here; drawing code never interprets input and never mutates state.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ratatui::crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::CrosstermBackend;
use ratatui::widgets::{Clear, Paragraph};
use ratatui::Terminal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use zaptv_core::config::Config;
use zaptv_core::epg::{fetch_epg, ProgramGuide};
use zaptv_core::model::{Group, PlaybackStatus, SessionSnapshot};
use zaptv_core::nav::{NavEffect, NavKey, Navigator, Region};
use zaptv_core::playlist::fetch_playlist;
use zaptv_core::rows::ViewMode;
use zaptv_core::window::row_at;

use crate::action::{Action, Screen};
use crate::app_state::AppState;
use crate::components::{channel_list, player, sidebar};
use crate::session::{PlayerMessage, SessionCommand, SessionEvent, SessionState};
use crate::theme::style_muted;
use crate::widgets::toast::ToastManager;

const SIDEBAR_WIDTH: u16 = 24;

/// Everything that wakes the main loop.
enum AppMessage {
    /// Terminal input.
    Event(Event),
    /// PlayerCore broadcast a change; carries the fresh snapshot.
    SessionUpdated(SessionSnapshot),
    /// A category fetch finished.  `token` identifies the request; only the
    /// newest token is applied, so a slow old fetch can never clobber a
    /// newer selection.
    CategoryLoaded {
        token: u64,
        index: usize,
        groups: Vec<Group>,
        guide: ProgramGuide,
    },
}

pub struct App {
    state: AppState,
    /// Browse-screen navigator: groups list with drill-in.
    nav: Navigator,
    /// In-player switcher navigator: one flat list for fast zapping.
    zap_nav: Navigator,
    screen: Screen,
    switcher_open: bool,
    toast: ToastManager,
    config: Config,
    session_tx: mpsc::Sender<SessionEvent>,
    session_state: Arc<SessionState>,
    /// Monotonic token for category loads ("latest wins").
    request_token: u64,
    /// Inner rects of the two lists from the last frame, for hit-testing.
    list_area: Rect,
    switcher_area: Rect,
    msg_tx: Option<mpsc::Sender<AppMessage>>,
    should_quit: bool,
}

impl App {
    pub fn new(
        config: Config,
        session_tx: mpsc::Sender<SessionEvent>,
        session_state: Arc<SessionState>,
    ) -> Self {
        let categories = config.categories.clone();
        let n = categories.len();
        let zap_step = config.playback.zap_step;
        Self {
            state: AppState::new(categories),
            nav: Navigator::new(n, ViewMode::GroupsOnly, 1),
            zap_nav: Navigator::new(n, ViewMode::FlatList, zap_step),
            screen: Screen::Browse,
            switcher_open: false,
            toast: ToastManager::new(),
            config,
            session_tx,
            session_state,
            request_token: 0,
            list_area: Rect::default(),
            switcher_area: Rect::default(),
            msg_tx: None,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<PlayerMessage>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);
        self.msg_tx = Some(tx.clone());

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: session broadcasts → AppMessage ──────────────────
        let bc_tx = tx.clone();
        let bc_session = self.session_state.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(PlayerMessage::SessionUpdated) => {
                        let snap = bc_session.snapshot().await;
                        if bc_tx.send(AppMessage::SessionUpdated(snap)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Snapshots are self-contained; only the latest matters.
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Kick off the initial category load.
        self.start_category_load(0);

        // ── Periodic timers ───────────────────────────────────────────────────
        let mut guide_tick =
            tokio::time::interval(Duration::from_secs(self.config.epg.refresh_secs.max(1)));
        guide_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                    // Drain whatever queued up behind it so a burst of input
                    // costs one frame, not one frame per event.
                    while let Ok(next) = rx.try_recv() {
                        needs_redraw |= self.handle_message(next).await;
                    }
                }

                _ = guide_tick.tick() => {
                    // Display-only refresh: re-evaluate now/next against the
                    // wall clock.  No network here.
                    self.state.now = Utc::now();
                    needs_redraw = true;
                }

                _ = toast_tick.tick() => {
                    if !self.toast.is_empty() {
                        self.toast.tick();
                        needs_redraw = true;
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        let _ = self.session_tx.send(SessionEvent::Shutdown).await;
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    // ── Message handling ──────────────────────────────────────────────────────

    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key).await
            }
            AppMessage::Event(Event::Mouse(mouse)) => self.handle_mouse(mouse).await,
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,

            AppMessage::SessionUpdated(snap) => {
                if snap.status == PlaybackStatus::Unsupported
                    && self.state.session.status != PlaybackStatus::Unsupported
                {
                    self.toast
                        .error("Playback not available: mpv not found on this system");
                }
                self.state.session = snap;
                true
            }

            AppMessage::CategoryLoaded {
                token,
                index,
                groups,
                guide,
            } => {
                if token != self.request_token {
                    debug!("category load token {} superseded, dropping", token);
                    return false;
                }
                info!(
                    "category {} loaded: {} groups",
                    index,
                    groups.len()
                );
                self.state.groups = groups;
                self.state.guide = guide;
                self.state.now = Utc::now();
                self.state.loading_category = false;
                self.nav.on_category_loaded(index, &self.state.groups);
                self.zap_nav.on_category_loaded(index, &self.state.groups);
                if self.state.groups.is_empty() {
                    self.toast.warning("Playlist is empty or unreachable");
                } else {
                    let channels: usize =
                        self.state.groups.iter().map(|g| g.channels.len()).sum();
                    self.toast.info(format!("{} channels loaded", channels));
                }
                true
            }
        }
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        // Global keys first.
        match key.code {
            KeyCode::Char('q') => {
                self.dispatch(Action::Quit).await;
                return true;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(Action::Quit).await;
                return true;
            }
            _ => {}
        }

        match self.screen {
            Screen::Browse => self.handle_browse_key(key).await,
            Screen::Player => self.handle_player_key(key).await,
        }
    }

    /// Map a terminal key to the device-independent navigation vocabulary.
    /// Esc and Backspace both carry the remote's Back gesture.
    fn nav_key(key: &KeyEvent) -> Option<NavKey> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(NavKey::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(NavKey::Down),
            KeyCode::Left | KeyCode::Char('h') => Some(NavKey::Left),
            KeyCode::Right | KeyCode::Char('l') => Some(NavKey::Right),
            KeyCode::PageUp => Some(NavKey::PageUp),
            KeyCode::PageDown => Some(NavKey::PageDown),
            KeyCode::Enter => Some(NavKey::Enter),
            // F24 is the back code some TV remotes emit over CEC bridges.
            KeyCode::Esc | KeyCode::Backspace | KeyCode::F(24) => Some(NavKey::Back),
            KeyCode::Char('+') | KeyCode::Char(']') => Some(NavKey::ChannelUp),
            KeyCode::Char('-') | KeyCode::Char('[') => Some(NavKey::ChannelDown),
            _ => None,
        }
    }

    async fn handle_browse_key(&mut self, key: KeyEvent) -> bool {
        let Some(nav_key) = Self::nav_key(&key) else {
            return false;
        };
        let effects = self.nav.handle_key(nav_key, &self.state.groups);
        self.apply_nav_effects(effects, false).await;
        true
    }

    async fn handle_player_key(&mut self, key: KeyEvent) -> bool {
        if self.switcher_open {
            let Some(nav_key) = Self::nav_key(&key) else {
                return false;
            };
            if nav_key == NavKey::Back {
                self.dispatch(Action::Back).await;
                return true;
            }
            self.zap_nav.region = Region::List;
            let effects = self.zap_nav.handle_key(nav_key, &self.state.groups);
            self.apply_nav_effects(effects, true).await;
            return true;
        }

        match Self::nav_key(&key) {
            Some(NavKey::Enter) => {
                self.dispatch(Action::OpenSwitcher).await;
                true
            }
            Some(NavKey::Back) => {
                self.dispatch(Action::Back).await;
                true
            }
            // With the overlay closed, Up/Down and PageUp/PageDown zap
            // directly (TV convention), as do the dedicated channel keys.
            Some(NavKey::Up) | Some(NavKey::PageUp) | Some(NavKey::ChannelUp) => {
                self.zap(NavKey::ChannelUp).await;
                true
            }
            Some(NavKey::Down) | Some(NavKey::PageDown) | Some(NavKey::ChannelDown) => {
                self.zap(NavKey::ChannelDown).await;
                true
            }
            _ => false,
        }
    }

    async fn zap(&mut self, key: NavKey) {
        self.zap_nav.region = Region::List;
        let effects = self.zap_nav.handle_key(key, &self.state.groups);
        self.apply_nav_effects(effects, true).await;
    }

    async fn apply_nav_effects(&mut self, effects: Vec<NavEffect>, from_switcher: bool) {
        for effect in effects {
            match effect {
                NavEffect::Activate {
                    group_idx,
                    channel_idx,
                } => {
                    self.dispatch(Action::Activate {
                        group_idx,
                        channel_idx,
                    })
                    .await;
                }
                NavEffect::LoadCategory(idx) => {
                    self.dispatch(Action::LoadCategory(idx)).await;
                }
                NavEffect::BackUnhandled => {
                    if from_switcher || self.screen == Screen::Player {
                        self.dispatch(Action::Back).await;
                    }
                    // At the browse top level Back has nothing to do.
                }
            }
        }
    }

    // ── Mouse handling ────────────────────────────────────────────────────────

    async fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        let (area, in_switcher) = if self.screen == Screen::Player {
            if !self.switcher_open {
                return false;
            }
            (self.switcher_area, true)
        } else {
            (self.list_area, false)
        };

        let inside = mouse.column >= area.x
            && mouse.column < area.x + area.width
            && mouse.row >= area.y
            && mouse.row < area.y + area.height;

        let nav = if in_switcher {
            &mut self.zap_nav
        } else {
            &mut self.nav
        };

        match mouse.kind {
            MouseEventKind::ScrollUp if inside => {
                nav.scroll_by(-2);
                true
            }
            MouseEventKind::ScrollDown if inside => {
                nav.scroll_by(2);
                true
            }
            MouseEventKind::Moved if inside => {
                let rel = mouse.row - area.y;
                if let Some(idx) = row_at(&nav.rows.rows, nav.scroll, rel) {
                    nav.handle_key(NavKey::Hover(idx), &self.state.groups);
                    return true;
                }
                false
            }
            MouseEventKind::Down(_) if inside => {
                let rel = mouse.row - area.y;
                if let Some(idx) = row_at(&nav.rows.rows, nav.scroll, rel) {
                    nav.handle_key(NavKey::Hover(idx), &self.state.groups);
                    let effects = nav.handle_key(NavKey::Enter, &self.state.groups);
                    self.apply_nav_effects(effects, in_switcher).await;
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    // ── Action dispatch ───────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        match action {
            Action::Activate {
                group_idx,
                channel_idx,
            } => self.activate(group_idx, channel_idx).await,

            Action::LoadCategory(idx) => self.start_category_load(idx),

            Action::OpenSwitcher => {
                self.switcher_open = true;
                // Open with focus on the channel being watched.
                if let Some(current) = self.state.session.channel.as_ref() {
                    let found = self
                        .state
                        .groups
                        .iter()
                        .enumerate()
                        .find_map(|(g, group)| {
                            group
                                .channels
                                .iter()
                                .position(|c| c.id == current.id)
                                .map(|c| (g, c))
                        });
                    if let Some((g, c)) = found {
                        if let Some(row) = self.zap_nav.rows.find_channel(g, c) {
                            self.zap_nav.region = Region::List;
                            self.zap_nav.focus = Some(row);
                        }
                    }
                }
            }

            Action::Back => self.request_cancel().await,

            Action::Quit => {
                info!("quit requested");
                let _ = self
                    .session_tx
                    .send(SessionEvent::Command(SessionCommand::Stop))
                    .await;
                self.should_quit = true;
            }
        }
    }

    async fn activate(&mut self, group_idx: usize, channel_idx: usize) {
        let Some(channel) = self.state.channel(group_idx, channel_idx).cloned() else {
            return;
        };

        // Enter on the channel already playing closes the switcher instead of
        // restarting the stream.
        let same = self.state.session.channel.as_ref().map(|c| c.id.as_str())
            == Some(channel.id.as_str());
        if same && self.switcher_open && self.state.session.status != PlaybackStatus::Idle {
            self.switcher_open = false;
            return;
        }

        info!("activate channel '{}'", channel.name);
        // Keep the switcher cursor on whatever is now playing.
        if let Some(row) = self.zap_nav.rows.find_channel(group_idx, channel_idx) {
            self.zap_nav.focus = Some(row);
        }
        let _ = self
            .session_tx
            .send(SessionEvent::Command(SessionCommand::Play(channel)))
            .await;
        self.screen = Screen::Player;
    }

    /// One step of the back gesture.  Layered and idempotent: overlay first,
    /// then the active session, then nothing.
    async fn request_cancel(&mut self) {
        if self.switcher_open {
            self.switcher_open = false;
            return;
        }
        if self.screen == Screen::Player {
            let _ = self
                .session_tx
                .send(SessionEvent::Command(SessionCommand::Stop))
                .await;
            self.screen = Screen::Browse;
        }
    }

    // ── Category loading ──────────────────────────────────────────────────────

    /// Fetch playlist + guide for a category in the background.  The token
    /// makes the newest request win however slowly older ones resolve.
    fn start_category_load(&mut self, index: usize) {
        let Some(category) = self.state.categories.get(index).cloned() else {
            return;
        };
        let Some(tx) = self.msg_tx.clone() else {
            return;
        };

        self.request_token += 1;
        let token = self.request_token;
        self.state.loading_category = true;
        info!(
            "loading category {} '{}' (token {})",
            index, category.name, token
        );

        tokio::spawn(async move {
            let playlist = fetch_playlist(&category.playlist_url).await;
            let epg_url = category.epg_url.clone().or(playlist.epg_url.clone());
            let guide = match epg_url {
                Some(url) => fetch_epg(&url).await,
                None => ProgramGuide::new(),
            };
            let _ = tx
                .send(AppMessage::CategoryLoaded {
                    token,
                    index,
                    groups: playlist.groups,
                    guide,
                })
                .await;
        });
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        match self.screen {
            Screen::Browse => self.draw_browse(frame, area),
            Screen::Player => self.draw_player(frame, area),
        }
        self.toast.draw(frame, area);
    }

    fn draw_browse(&mut self, frame: &mut ratatui::Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
            .split(rows[0]);

        sidebar::draw(frame, panes[0], &self.state, &self.nav);

        let title = match self.nav.drilled_group() {
            Some(g) => self
                .state
                .groups
                .get(g)
                .map(|g| g.title.clone())
                .unwrap_or_else(|| "Channels".to_string()),
            None => "Channels".to_string(),
        };
        self.list_area = channel_list::draw(frame, panes[1], &title, &self.state, &mut self.nav);

        let hints = match self.nav.region {
            Region::Sidebar => " ↑↓ category   Enter load   → channels   q quit",
            Region::List => " ↑↓ move   Enter select   Back up   ← categories   q quit",
        };
        frame.render_widget(Paragraph::new(hints).style(style_muted()), rows[1]);
    }

    fn draw_player(&mut self, frame: &mut ratatui::Frame, area: Rect) {
        player::draw(frame, area, &self.state);

        if self.switcher_open {
            // Overlay on the right edge, mirroring the TV idiom of a channel
            // rail over live video.
            let width = (area.width / 3).clamp(28, 44).min(area.width);
            let overlay = Rect {
                x: area.x + area.width - width,
                y: area.y,
                width,
                height: area.height,
            };
            frame.render_widget(Clear, overlay);
            self.zap_nav.region = Region::List;
            self.switcher_area =
                channel_list::draw(frame, overlay, "Channels", &self.state, &mut self.zap_nav);
        }
    }
}
