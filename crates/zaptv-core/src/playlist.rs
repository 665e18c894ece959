//! M3U playlist boundary: fetch + parse into sorted channel groups.
//!
//! All failures here are soft — the navigation/playback core only ever sees
//! a (possibly empty) `Playlist`, never an error.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::model::{Channel, Group, Playlist, UNCATEGORIZED};

/// Fetch and parse a playlist URL.  Network or parse trouble degrades to an
/// empty playlist; an empty channel list is a valid, displayable state.
pub async fn fetch_playlist(url: &str) -> Playlist {
    match fetch_text(url).await {
        Ok(text) => {
            let playlist = parse_m3u_from_str(&text);
            info!(
                "playlist: {} groups / {} channels from {}",
                playlist.groups.len(),
                playlist.channel_count(),
                url
            );
            playlist
        }
        Err(e) => {
            warn!("playlist: fetch failed for {}: {}", url, e);
            Playlist::default()
        }
    }
}

async fn fetch_text(url: &str) -> anyhow::Result<String> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    Ok(response.text().await?)
}

/// Parse extended-M3U text.  Channels keep playlist order within their
/// group; groups come out sorted by title (case-sensitive lexicographic).
pub fn parse_m3u_from_str(content: &str) -> Playlist {
    let mut epg_url: Option<String> = None;
    let mut channels: Vec<Channel> = Vec::new();
    let mut pending: Option<ExtInf> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTM3U") {
            if epg_url.is_none() {
                epg_url = attr(rest, "url-tvg").or_else(|| attr(rest, "x-tvg-url"));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            pending = Some(parse_extinf(rest));
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        // A non-comment line is the stream URL for the pending EXTINF (or a
        // bare URL with no metadata at all).
        let info = pending.take().unwrap_or_default();
        let idx = channels.len();
        channels.push(Channel {
            id: format!("ch{}", idx),
            name: if info.name.is_empty() {
                line.to_string()
            } else {
                info.name
            },
            logo_url: info.logo,
            group_title: info.group,
            stream_url: line.to_string(),
            epg_channel_id: info.tvg_id,
        });
    }

    Playlist {
        groups: group_channels(channels),
        epg_url,
    }
}

/// Bucket channels by `group_title` (empty → "Uncategorized") and emit the
/// groups sorted by title.  Channel order inside each group is preserved.
pub fn group_channels(channels: Vec<Channel>) -> Vec<Group> {
    let mut buckets: BTreeMap<String, Vec<Channel>> = BTreeMap::new();
    for ch in channels {
        let title = if ch.group_title.trim().is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            ch.group_title.clone()
        };
        buckets.entry(title).or_default().push(ch);
    }
    buckets
        .into_iter()
        .map(|(title, channels)| Group { title, channels })
        .collect()
}

#[derive(Default)]
struct ExtInf {
    name: String,
    logo: String,
    group: String,
    tvg_id: Option<String>,
}

fn parse_extinf(rest: &str) -> ExtInf {
    // "#EXTINF:-1 tvg-id=".." group-title="..",Display Name"
    // The display name follows the first comma outside quotes; some
    // playlists omit it and only carry tvg-name.
    let name = display_name(rest)
        .filter(|s| !s.is_empty())
        .or_else(|| attr(rest, "tvg-name"))
        .unwrap_or_default();
    ExtInf {
        name,
        logo: attr(rest, "tvg-logo").unwrap_or_default(),
        group: attr(rest, "group-title").unwrap_or_default(),
        tvg_id: attr(rest, "tvg-id").filter(|s| !s.is_empty()),
    }
}

/// Extract a `key="value"` attribute from an EXTINF/EXTM3U line.
fn attr(line: &str, key: &str) -> Option<String> {
    let needle = format!("{}=\"", key);
    let start = line.find(&needle)? + needle.len();
    let end = line[start..].find('"')? + start;
    Some(line[start..end].to_string())
}

/// The channel display name: text after the first comma that is not inside a
/// quoted attribute value.
fn display_name(rest: &str) -> Option<String> {
    let mut in_quotes = false;
    for (i, c) in rest.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                return Some(rest[i + 1..].trim().to_string());
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#EXTM3U url-tvg="http://example.org/guide.xml"
#EXTINF:-1 tvg-id="one.example" tvg-logo="http://example.org/one.png" group-title="Sports",Sports One
http://example.org/one.m3u8
#EXTINF:-1 group-title="Sports",Sports Two
http://example.org/two.m3u8
#EXTINF:-1,Loose Channel
http://example.org/loose.m3u8
#EXTINF:-1 group-title="Movies",Movie Channel
http://example.org/movies.m3u8
"#;

    #[test]
    fn parses_header_epg_url() {
        let playlist = parse_m3u_from_str(SAMPLE);
        assert_eq!(
            playlist.epg_url.as_deref(),
            Some("http://example.org/guide.xml")
        );
    }

    #[test]
    fn groups_sorted_and_uncategorized_bucketed() {
        let playlist = parse_m3u_from_str(SAMPLE);
        let titles: Vec<&str> = playlist.groups.iter().map(|g| g.title.as_str()).collect();
        // BTreeMap order: case-sensitive lexicographic.
        assert_eq!(titles, vec!["Movies", "Sports", "Uncategorized"]);
        let sports = &playlist.groups[1];
        assert_eq!(sports.channels.len(), 2);
        // Playlist order within the group is preserved.
        assert_eq!(sports.channels[0].name, "Sports One");
        assert_eq!(sports.channels[1].name, "Sports Two");
        assert!(playlist.groups[2].is_uncategorized());
        assert_eq!(playlist.groups[2].channels[0].name, "Loose Channel");
    }

    #[test]
    fn attributes_and_ids() {
        let playlist = parse_m3u_from_str(SAMPLE);
        let sports_one = &playlist.groups[1].channels[0];
        assert_eq!(sports_one.epg_channel_id.as_deref(), Some("one.example"));
        assert_eq!(sports_one.logo_url, "http://example.org/one.png");
        // Ids are unique across the whole playlist.
        let mut ids: Vec<&str> = playlist
            .groups
            .iter()
            .flat_map(|g| g.channels.iter().map(|c| c.id.as_str()))
            .collect();
        let n = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn display_name_commas_inside_quotes() {
        let p = parse_m3u_from_str(
            "#EXTM3U\n#EXTINF:-1 group-title=\"News, World\",BBC News\nhttp://x/bbc.m3u8\n",
        );
        let ch = &p.groups[0].channels[0];
        assert_eq!(ch.name, "BBC News");
        assert_eq!(ch.group_title, "News, World");
    }

    #[test]
    fn tvg_name_is_a_display_name_fallback() {
        let p = parse_m3u_from_str(
            "#EXTM3U\n#EXTINF:-1 tvg-name=\"Named Only\",\nhttp://x/named.m3u8\n",
        );
        assert_eq!(p.groups[0].channels[0].name, "Named Only");
    }

    #[test]
    fn empty_input_is_empty_playlist() {
        let playlist = parse_m3u_from_str("");
        assert!(playlist.groups.is_empty());
        assert!(playlist.epg_url.is_none());
    }
}
