use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One live channel as produced by playlist parsing.  Immutable once built;
/// identity is `id` (playlist entries with the same name in different groups
/// stay distinct).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo_url: String,
    /// Raw `group-title` attribute; empty means "Uncategorized".
    #[serde(default)]
    pub group_title: String,
    pub stream_url: String,
    /// XMLTV channel id (`tvg-id`) used to join guide data, when present.
    #[serde(default)]
    pub epg_channel_id: Option<String>,
}

/// A named group of channels, in playlist order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Group {
    pub title: String,
    pub channels: Vec<Channel>,
}

/// Title used for channels that carry no `group-title`.  Groups with this
/// title (compared case-insensitively) never get a header row in flattened
/// list views, though their channels are still shown.
pub const UNCATEGORIZED: &str = "Uncategorized";

impl Group {
    pub fn is_uncategorized(&self) -> bool {
        self.title.eq_ignore_ascii_case(UNCATEGORIZED)
    }
}

/// Result of a playlist fetch: sorted groups plus the EPG URL advertised by
/// the playlist header (`url-tvg`), if any.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub groups: Vec<Group>,
    pub epg_url: Option<String>,
}

impl Playlist {
    pub fn channel_count(&self) -> usize {
        self.groups.iter().map(|g| g.channels.len()).sum()
    }
}

/// One guide entry.  `start`/`end` are half-open: a program is current for
/// `start <= now < end`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub channel_epg_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Playback lifecycle of the single active session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum PlaybackStatus {
    /// No session (nothing requested, or session torn down).
    #[default]
    Idle,
    /// loadfile issued, stream buffering/connecting — also the state during
    /// the retry backoff window.
    Loading,
    /// Stream data is flowing.
    Playing,
    /// No usable playback engine — fatal for the session, never retried.
    Unsupported,
}

/// Snapshot of the playback session broadcast to the UI.  `rev` increments on
/// every change so listeners can detect missed updates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub rev: u64,
    /// The channel this session is (re)trying to play, if any.
    pub channel: Option<Channel>,
    pub status: PlaybackStatus,
    /// Number of load attempts for the current channel, for the loading UI.
    #[serde(default)]
    pub attempts: u32,
}

impl SessionSnapshot {
    pub fn is_active(&self) -> bool {
        self.channel.is_some() && self.status != PlaybackStatus::Idle
    }
}
