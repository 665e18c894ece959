//! App-level intents produced by key/mouse handling and navigator effects.

/// Which top-level surface is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Sidebar + channel list.
    Browse,
    /// Full-screen player (optionally with the switcher overlay).
    Player,
}

/// All actions the app dispatcher executes.
#[derive(Debug, Clone)]
pub enum Action {
    /// Start playback of a channel by its source coordinates.
    Activate { group_idx: usize, channel_idx: usize },
    /// Reload data for a sidebar category.
    LoadCategory(usize),
    /// Open the in-player channel switcher overlay.
    OpenSwitcher,
    /// One step of the back gesture: close overlay, else stop and leave the
    /// player, else nothing.  Idempotent.
    Back,
    Quit,
}
