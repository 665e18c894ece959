pub mod pane_chrome;
pub mod toast;
