pub mod channel_list;
pub mod player;
pub mod sidebar;
