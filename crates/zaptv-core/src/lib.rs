//! Shared core for the zaptv channel browser: data model, playlist/EPG
//! boundaries, and the pure navigation engine the TUI projects onto the
//! terminal.

pub mod config;
pub mod epg;
pub mod model;
pub mod nav;
pub mod platform;
pub mod playlist;
pub mod rows;
pub mod window;
