//! PlayerCore — single-owner event loop for the playback session.
//!
//! Runs embedded in the TUI process.  Everything that mutates playback state
//! sends a `SessionEvent` into this loop; PlayerCore owns the `MpvDriver`
//! and the session snapshot exclusively.  After each mutation it broadcasts
//! `PlayerMessage::SessionUpdated` so the UI can re-fetch the snapshot.
//!
//! Retry policy: live streams drop routinely and a TV surface has no retry
//! button, so failed loads are retried forever at a fixed delay.  Each
//! `Play`/`Stop` bumps a generation counter; retry timers carry the
//! generation they were armed under and are ignored once it is stale, which
//! is what makes zapping away during a retry window safe.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use zaptv_core::config::PlaybackConfig;
use zaptv_core::model::{Channel, PlaybackStatus, SessionSnapshot};

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_CORE_IDLE, OBS_PAUSE};

// ── messages ──────────────────────────────────────────────────────────────────

/// Broadcast from PlayerCore to all UI listeners.
#[derive(Debug, Clone)]
pub enum PlayerMessage {
    /// The session snapshot changed; receivers should fetch from SessionState.
    SessionUpdated,
}

/// Commands from the UI.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Tear down whatever is active and start this channel.
    Play(Channel),
    /// Tear down and go idle.  Safe to send when already idle.
    Stop,
}

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum SessionEvent {
    Command(SessionCommand),
    /// Raw mpv unsolicited event (forwarded from the reader task).
    Mpv(MpvEvent),
    /// A retry timer fired.  Ignored unless `generation` is still current.
    RetryTick { generation: u64 },
    /// Heartbeat — process liveness check.
    HeartbeatTick,
    Shutdown,
}

// ── shared snapshot ───────────────────────────────────────────────────────────

/// Owner of the session snapshot shared with the UI.  Every mutation bumps
/// `rev` so listeners can detect missed updates.
pub struct SessionState {
    inner: RwLock<SessionSnapshot>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SessionSnapshot::default()),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().await.clone()
    }

    async fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        let mut snap = self.inner.write().await;
        f(&mut snap);
        snap.rev += 1;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ── status derivation ─────────────────────────────────────────────────────────

/// Derive the session status from observed mpv properties.  Pure so the
/// transition table is testable without a running mpv.
///
/// `paused` counts as Playing: mpv reports core-idle while paused, and a
/// user pause in the player window must not look like a stall.
pub fn derive_status(
    intend_playing: bool,
    obs_pause: bool,
    obs_core_idle: Option<bool>,
) -> PlaybackStatus {
    if !intend_playing {
        PlaybackStatus::Idle
    } else if obs_pause {
        PlaybackStatus::Playing
    } else {
        match obs_core_idle {
            Some(false) => PlaybackStatus::Playing,
            // true or not yet observed: still buffering / retrying.
            _ => PlaybackStatus::Loading,
        }
    }
}

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore {
    config: PlaybackConfig,
    state: Arc<SessionState>,
    mpv_driver: MpvDriver,
    /// Live handle to the mpv IO tasks.  `None` until first playback.
    mpv_handle: Option<MpvHandle>,
    /// Channel to forward mpv events back into our own event loop.
    event_tx: mpsc::Sender<SessionEvent>,
    broadcast_tx: broadcast::Sender<PlayerMessage>,
    /// Channel the current session is (re)trying to play.
    current: Option<Channel>,
    /// Bumped on every Play/Stop; stale retry ticks compare unequal.
    generation: u64,
    /// true while a retry timer is armed, so stalls and end-file errors for
    /// the same outage arm only one timer.
    retry_armed: bool,
    intend_playing: bool,
    attempts: u32,
    obs_core_idle: Option<bool>,
    obs_pause: bool,
    last_status: PlaybackStatus,
}

impl PlayerCore {
    pub fn new(
        config: PlaybackConfig,
        broadcast_tx: broadcast::Sender<PlayerMessage>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(SessionState::new()),
            mpv_driver: MpvDriver::new(),
            mpv_handle: None,
            event_tx,
            broadcast_tx,
            current: None,
            generation: 0,
            retry_armed: false,
            intend_playing: false,
            attempts: 0,
            obs_core_idle: None,
            obs_pause: false,
            last_status: PlaybackStatus::Idle,
        }
    }

    pub fn session_state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Run the core event loop.  Returns when `Shutdown` arrives or the
    /// event channel closes (UI exited).
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<SessionEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
                if heartbeat_tx.send(SessionEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        loop {
            match event_rx.recv().await {
                None => {
                    info!("PlayerCore: event channel closed, shutting down");
                    break;
                }
                Some(SessionEvent::Shutdown) => {
                    info!("PlayerCore: shutdown requested");
                    break;
                }
                Some(SessionEvent::Command(cmd)) => {
                    info!("PlayerCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd).await {
                        error!("PlayerCore: command error: {}", e);
                    }
                }
                Some(SessionEvent::Mpv(evt)) => {
                    self.handle_mpv_event(evt).await;
                }
                Some(SessionEvent::RetryTick { generation }) => {
                    self.handle_retry_tick(generation).await;
                }
                Some(SessionEvent::HeartbeatTick) => {
                    self.handle_heartbeat().await;
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> anyhow::Result<()> {
        match cmd {
            SessionCommand::Play(channel) => self.play(channel).await,
            SessionCommand::Stop => self.stop().await,
        }
    }

    // ── play / stop ───────────────────────────────────────────────────────────

    /// Teardown-before-load: the previous stream is replaced before the new
    /// one starts, and the generation bump invalidates its retry timers, so
    /// at most one stream holds resources at any point.
    async fn play(&mut self, channel: Channel) -> anyhow::Result<()> {
        info!("PlayerCore: play '{}'", channel.name);
        self.generation += 1;
        self.retry_armed = false;
        self.intend_playing = true;
        self.attempts = 1;
        self.obs_core_idle = None;
        self.current = Some(channel.clone());

        self.state
            .update(|s| {
                s.channel = Some(channel);
                s.status = PlaybackStatus::Loading;
                s.attempts = 1;
            })
            .await;
        self.last_status = PlaybackStatus::Loading;
        let _ = self.broadcast_tx.send(PlayerMessage::SessionUpdated);

        self.load_current().await;
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        info!("PlayerCore: stop");
        self.generation += 1;
        self.retry_armed = false;
        self.intend_playing = false;
        self.attempts = 0;
        self.current = None;
        self.obs_core_idle = None;
        self.obs_pause = false;

        if let Some(handle) = self.mpv_handle.as_ref() {
            let _ = handle.stop().await;
        }

        self.last_status = PlaybackStatus::Idle;
        self.state
            .update(|s| {
                s.channel = None;
                s.status = PlaybackStatus::Idle;
                s.attempts = 0;
            })
            .await;
        let _ = self.broadcast_tx.send(PlayerMessage::SessionUpdated);
        Ok(())
    }

    /// Issue a loadfile for the current channel.  Load failures arm a retry;
    /// a missing playback engine is the one fatal, non-retried outcome.
    async fn load_current(&mut self) {
        let Some(channel) = self.current.clone() else {
            return;
        };
        match self.ensure_mpv_handle().await {
            Some(handle) => {
                if let Err(e) = handle.load_stream(&channel.stream_url).await {
                    warn!("PlayerCore: load '{}' failed: {}", channel.name, e);
                    self.arm_retry();
                }
            }
            None => {
                warn!("PlayerCore: no playback engine for '{}'", channel.name);
                self.intend_playing = false;
                self.set_status(PlaybackStatus::Unsupported).await;
            }
        }
    }

    // ── retry timers ──────────────────────────────────────────────────────────

    fn arm_retry(&mut self) {
        if self.retry_armed {
            return;
        }
        self.retry_armed = true;
        let generation = self.generation;
        let delay = tokio::time::Duration::from_secs(self.config.retry_delay_secs);
        debug!(
            "PlayerCore: retry armed gen={} delay={:?}",
            generation, delay
        );
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionEvent::RetryTick { generation }).await;
        });
    }

    async fn handle_retry_tick(&mut self, generation: u64) {
        if generation != self.generation || !self.intend_playing {
            debug!("PlayerCore: stale retry tick gen={} ignored", generation);
            return;
        }
        self.retry_armed = false;
        self.attempts += 1;
        info!("PlayerCore: retry attempt {}", self.attempts);
        let attempts = self.attempts;
        self.state.update(|s| s.attempts = attempts).await;
        let _ = self.broadcast_tx.send(PlayerMessage::SessionUpdated);
        self.load_current().await;
    }

    // ── mpv events ────────────────────────────────────────────────────────────

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if let Some((obs_id, data)) = evt.as_property_change() {
            match obs_id {
                OBS_CORE_IDLE => {
                    let val = data.as_bool();
                    if val != self.obs_core_idle {
                        debug!("mpv: core-idle → {:?}", val);
                        self.obs_core_idle = val;
                        self.refresh_status().await;
                    }
                }
                OBS_PAUSE => {
                    let val = data.as_bool().unwrap_or(false);
                    if val != self.obs_pause {
                        debug!("mpv: pause → {}", val);
                        self.obs_pause = val;
                        self.refresh_status().await;
                    }
                }
                _ => {}
            }
            return;
        }

        match evt.event_name() {
            Some("end-file") => {
                let reason = evt.end_reason().unwrap_or("unknown");
                info!("mpv: end-file reason={}", reason);
                self.obs_core_idle = Some(true);
                // Any end-file while we intend to play is treated as a
                // transient stream error: silent retry, no user-facing fault.
                if self.intend_playing && matches!(reason, "error" | "network" | "eof" | "unknown")
                {
                    self.set_status(PlaybackStatus::Loading).await;
                    self.arm_retry();
                } else {
                    self.refresh_status().await;
                }
            }
            Some("start-file") => {
                info!("mpv: start-file");
                // Flips to false once the stream actually delivers data.
                self.obs_core_idle = Some(true);
            }
            Some("file-loaded") => {
                // Re-register observations so mpv pushes current values for
                // the new file immediately.
                if let Some(h) = self.mpv_handle.clone() {
                    tokio::spawn(async move {
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                        h.observe_playback_properties().await;
                    });
                }
            }
            _ => {}
        }
    }

    /// Re-derive the status from observed properties, arming a retry when a
    /// previously playing stream stalls.
    async fn refresh_status(&mut self) {
        let status = derive_status(self.intend_playing, self.obs_pause, self.obs_core_idle);
        let stalled = status == PlaybackStatus::Loading && self.last_status == PlaybackStatus::Playing;
        self.set_status(status).await;
        if stalled {
            warn!("PlayerCore: stream stalled, retrying");
            self.arm_retry();
        }
    }

    async fn set_status(&mut self, status: PlaybackStatus) {
        if status == self.last_status {
            return;
        }
        info!("PlayerCore: status {:?} → {:?}", self.last_status, status);
        self.last_status = status.clone();
        self.state.update(|s| s.status = status).await;
        let _ = self.broadcast_tx.send(PlayerMessage::SessionUpdated);
    }

    // ── mpv handle management ─────────────────────────────────────────────────

    async fn ensure_mpv_handle(&mut self) -> Option<MpvHandle> {
        if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
            warn!("PlayerCore: mpv process died, dropping handle");
            self.mpv_handle = None;
            self.obs_core_idle = None;
            self.obs_pause = false;
        }

        if self.mpv_handle.is_none() {
            // One forwarder task per connection; both its senders come from
            // the same mpsc pair so events stay ordered.
            let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
            let core_tx = self.event_tx.clone();
            tokio::spawn(async move {
                while let Some(evt) = event_rx.recv().await {
                    if core_tx.send(SessionEvent::Mpv(evt)).await.is_err() {
                        break;
                    }
                }
            });

            let handle = match self.mpv_driver.spawn_and_connect(event_tx).await {
                Ok(h) => h,
                Err(e) => {
                    warn!("PlayerCore: failed to start mpv: {}", e);
                    return None;
                }
            };

            let h = handle.clone();
            tokio::spawn(async move {
                h.observe_playback_properties().await;
            });

            self.mpv_handle = Some(handle);
        }

        self.mpv_handle.clone()
    }

    async fn handle_heartbeat(&mut self) {
        let Some(handle) = self.mpv_handle.clone() else {
            return;
        };
        let dead = !self.mpv_driver.process_alive() || handle.ping().await.is_err();
        if dead {
            warn!("PlayerCore: heartbeat: mpv unresponsive");
            self.mpv_handle = None;
            self.obs_core_idle = None;
            self.obs_pause = false;
            if self.intend_playing {
                // Respawn happens on the next retry attempt.
                self.set_status(PlaybackStatus::Loading).await;
                self.arm_retry();
            }
        }
    }

    async fn cleanup(&mut self) {
        info!("PlayerCore: cleanup — killing mpv");
        if let Some(handle) = self.mpv_handle.take() {
            let _ = handle.stop().await;
        }
        self.mpv_driver.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        // Nothing requested: always Idle, whatever mpv reports.
        assert_eq!(derive_status(false, false, Some(false)), PlaybackStatus::Idle);
        assert_eq!(derive_status(false, false, None), PlaybackStatus::Idle);
        // Requested, stream flowing.
        assert_eq!(
            derive_status(true, false, Some(false)),
            PlaybackStatus::Playing
        );
        // Requested but idle core: buffering or between retries.
        assert_eq!(
            derive_status(true, false, Some(true)),
            PlaybackStatus::Loading
        );
        assert_eq!(derive_status(true, false, None), PlaybackStatus::Loading);
        // Paused in the player window is not a stall.
        assert_eq!(
            derive_status(true, true, Some(true)),
            PlaybackStatus::Playing
        );
    }

    #[tokio::test]
    async fn snapshot_rev_increments_on_update() {
        let state = SessionState::new();
        let before = state.snapshot().await;
        state
            .update(|s| s.status = PlaybackStatus::Loading)
            .await;
        let after = state.snapshot().await;
        assert_eq!(after.rev, before.rev + 1);
        assert_eq!(after.status, PlaybackStatus::Loading);
    }

    #[tokio::test]
    async fn stale_retry_generation_is_ignored() {
        let (broadcast_tx, _keep) = broadcast::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(16);
        let mut core = PlayerCore::new(PlaybackConfig::default(), broadcast_tx, event_tx);
        core.generation = 5;
        core.intend_playing = true;
        core.attempts = 2;

        // A tick armed under an older generation must not advance attempts.
        core.handle_retry_tick(4).await;
        assert_eq!(core.attempts, 2);

        // A tick from the current generation does.  No channel is loaded in
        // this test, so the follow-up load is a no-op.
        core.handle_retry_tick(5).await;
        assert_eq!(core.attempts, 3);
    }

    #[tokio::test]
    async fn second_play_during_load_supersedes_the_first() {
        // Empty PATH so no playback engine is found: loads fail fast and no
        // process is ever spawned.
        std::env::set_var("PATH", "");
        let (broadcast_tx, _keep) = broadcast::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(16);
        let mut core = PlayerCore::new(PlaybackConfig::default(), broadcast_tx, event_tx);

        let alpha = Channel {
            id: "a".to_string(),
            name: "Alpha".to_string(),
            stream_url: "http://x/a.m3u8".to_string(),
            ..Channel::default()
        };
        let beta = Channel {
            id: "b".to_string(),
            name: "Beta".to_string(),
            stream_url: "http://x/b.m3u8".to_string(),
            ..Channel::default()
        };

        core.play(alpha).await.unwrap();
        let alpha_generation = core.generation;

        // Zap to B before A ever reaches Playing.
        core.play(beta).await.unwrap();
        assert!(core.generation > alpha_generation);
        assert_eq!(core.current.as_ref().map(|c| c.id.as_str()), Some("b"));

        // B is the only session left: snapshot channel is B and the attempt
        // counter restarted for it.
        let snap = core.state.snapshot().await;
        assert_eq!(snap.channel.as_ref().map(|c| c.id.as_str()), Some("b"));
        assert_eq!(snap.attempts, 1);

        // A retry timer armed under A's generation is dead after the zap.
        let attempts = core.attempts;
        core.handle_retry_tick(alpha_generation).await;
        assert_eq!(core.attempts, attempts);
        let snap = core.state.snapshot().await;
        assert_eq!(snap.channel.as_ref().map(|c| c.id.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn retry_arming_is_idempotent_per_outage() {
        let (broadcast_tx, _keep) = broadcast::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let mut core = PlayerCore::new(
            PlaybackConfig {
                retry_delay_secs: 0,
                ..PlaybackConfig::default()
            },
            broadcast_tx,
            event_tx,
        );
        core.intend_playing = true;
        core.arm_retry();
        core.arm_retry();
        core.arm_retry();

        // Only the first arm spawned a timer.
        let first = event_rx.recv().await;
        assert!(matches!(first, Some(SessionEvent::RetryTick { .. })));
        assert!(event_rx.try_recv().is_err());
    }
}
