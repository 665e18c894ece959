//! AppState — read-only data shared with the draw layer.
//!
//! The app event loop is the only writer; components receive `&AppState`
//! and project it onto the terminal.

use chrono::{DateTime, Utc};

use zaptv_core::config::CategoryConfig;
use zaptv_core::epg::{current_program, next_program, ProgramGuide};
use zaptv_core::model::{Channel, Group, Program, SessionSnapshot};

pub struct AppState {
    pub categories: Vec<CategoryConfig>,
    /// Channel groups of the active category, sorted by title.
    pub groups: Vec<Group>,
    pub guide: ProgramGuide,
    /// Latest session snapshot fetched from PlayerCore.
    pub session: SessionSnapshot,
    /// A category fetch is in flight (shows a loading hint in the list pane).
    pub loading_category: bool,
    /// Wall clock used for now/next lookups.  Refreshed on the guide tick so
    /// every frame within a tick window agrees on "now".
    pub now: DateTime<Utc>,
}

impl AppState {
    pub fn new(categories: Vec<CategoryConfig>) -> Self {
        Self {
            categories,
            groups: Vec::new(),
            guide: ProgramGuide::new(),
            session: SessionSnapshot::default(),
            loading_category: false,
            now: Utc::now(),
        }
    }

    pub fn channel(&self, group_idx: usize, channel_idx: usize) -> Option<&Channel> {
        self.groups.get(group_idx)?.channels.get(channel_idx)
    }

    /// Now/next guide entries for a channel, joined via its XMLTV id.
    pub fn now_next(&self, channel: &Channel) -> (Option<&Program>, Option<&Program>) {
        let Some(epg_id) = channel.epg_channel_id.as_deref() else {
            return (None, None);
        };
        let Some(programs) = self.guide.get(epg_id) else {
            return (None, None);
        };
        (
            current_program(programs, self.now),
            next_program(programs, self.now),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, h, m, 0).unwrap()
    }

    #[test]
    fn now_next_joins_on_epg_id() {
        let mut state = AppState::new(Vec::new());
        state.now = at(10, 15);
        state.guide.insert(
            "one.example".to_string(),
            vec![
                Program {
                    channel_epg_id: "one.example".to_string(),
                    title: "Current".to_string(),
                    description: String::new(),
                    start: at(10, 0),
                    end: at(10, 30),
                },
                Program {
                    channel_epg_id: "one.example".to_string(),
                    title: "Upcoming".to_string(),
                    description: String::new(),
                    start: at(10, 30),
                    end: at(11, 0),
                },
            ],
        );

        let with_id = Channel {
            epg_channel_id: Some("one.example".to_string()),
            ..Channel::default()
        };
        let (now, next) = state.now_next(&with_id);
        assert_eq!(now.map(|p| p.title.as_str()), Some("Current"));
        assert_eq!(next.map(|p| p.title.as_str()), Some("Upcoming"));

        // No tvg-id means no guide join at all.
        let without_id = Channel::default();
        let (now, next) = state.now_next(&without_id);
        assert!(now.is_none() && next.is_none());
    }
}
