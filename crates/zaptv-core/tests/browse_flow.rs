//! End-to-end browse flow over the public API: parse a playlist, flatten,
//! navigate with remote-style keys, drill, and commit a channel.

use zaptv_core::nav::{NavEffect, NavKey, Navigator, Region};
use zaptv_core::playlist::parse_m3u_from_str;
use zaptv_core::rows::{RowSet, ViewMode, CHANNEL_ROW_HEIGHT, GROUP_ROW_HEIGHT};
use zaptv_core::window::visible_range;

const PLAYLIST: &str = r#"#EXTM3U url-tvg="http://example.org/guide.xml"
#EXTINF:-1 tvg-id="news.example" group-title="News",World News
http://example.org/news.m3u8
#EXTINF:-1 group-title="Sports",Football One
http://example.org/foot1.m3u8
#EXTINF:-1 group-title="Sports",Football Two
http://example.org/foot2.m3u8
#EXTINF:-1,Community Channel
http://example.org/community.m3u8
"#;

#[test]
fn parse_flatten_and_project() {
    let playlist = parse_m3u_from_str(PLAYLIST);
    assert_eq!(playlist.channel_count(), 4);

    let set = RowSet::flatten(&playlist.groups, ViewMode::FlatList);
    // Groups sort to News, Sports, Uncategorized; the last has no header.
    assert_eq!(set.len(), 2 + 4);
    assert_eq!(
        set.total_height,
        2 * GROUP_ROW_HEIGHT as u32 + 4 * CHANNEL_ROW_HEIGHT as u32
    );

    // A small viewport sees a prefix of the rows, never the whole list.
    let range = visible_range(&set.rows, 0, 4, 0);
    assert!(range.start == 0 && range.end < set.len());
}

#[test]
fn remote_walk_from_sidebar_to_playback() {
    let playlist = parse_m3u_from_str(PLAYLIST);
    let groups = playlist.groups;

    let mut nav = Navigator::new(2, ViewMode::GroupsOnly, 1);
    nav.set_viewport(10);
    nav.set_groups(&groups);
    assert_eq!(nav.region, Region::Sidebar);

    // Right into the list of group entries, down to Sports, drill in.
    assert!(nav.handle_key(NavKey::Right, &groups).is_empty());
    assert!(nav.handle_key(NavKey::Down, &groups).is_empty());
    assert!(nav.handle_key(NavKey::Enter, &groups).is_empty());
    assert_eq!(nav.drilled_group(), Some(1));

    // Second channel of Sports, then commit.
    assert!(nav.handle_key(NavKey::Down, &groups).is_empty());
    let effects = nav.handle_key(NavKey::Enter, &groups);
    let NavEffect::Activate {
        group_idx,
        channel_idx,
    } = effects[0]
    else {
        panic!("expected activation, got {:?}", effects);
    };
    assert_eq!(groups[group_idx].channels[channel_idx].name, "Football Two");

    // Back pops the drill and lands on the Sports entry again.
    assert!(nav.handle_key(NavKey::Back, &groups).is_empty());
    assert_eq!(nav.drilled_group(), None);
    assert_eq!(nav.focus, Some(1));

    // A second Back has nothing left to pop and bubbles to the app layer.
    assert_eq!(
        nav.handle_key(NavKey::Back, &groups),
        vec![NavEffect::BackUnhandled]
    );
}

#[test]
fn switching_category_resets_list_state() {
    let playlist = parse_m3u_from_str(PLAYLIST);
    let groups = playlist.groups;
    let mut nav = Navigator::new(2, ViewMode::FlatList, 1);
    nav.set_viewport(10);
    nav.set_groups(&groups);

    nav.handle_key(NavKey::Right, &groups);
    nav.handle_key(NavKey::Down, &groups);
    nav.handle_key(NavKey::Left, &groups);
    nav.handle_key(NavKey::Down, &groups);
    let effects = nav.handle_key(NavKey::Enter, &groups);
    assert_eq!(effects, vec![NavEffect::LoadCategory(1)]);

    let other = parse_m3u_from_str("#EXTM3U\n#EXTINF:-1,Solo\nhttp://x/solo.m3u8\n");
    nav.on_category_loaded(1, &other.groups);
    assert_eq!(nav.active_category, 1);
    assert_eq!(nav.focus, None);
    assert_eq!(nav.scroll, 0);
    assert_eq!(nav.drilled_group(), None);
}
