//! EPG (XMLTV) boundary: fetch + parse guide data, plus the pure now/next
//! lookups the UI joins into channel rows and the player overlay.
//!
//! Like the playlist boundary this fails soft: any trouble produces an empty
//! guide, never an error crossing into the core.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{info, warn};

use crate::model::Program;

/// Programs per XMLTV channel id, each list sorted ascending by start.
pub type ProgramGuide = HashMap<String, Vec<Program>>;

/// Guide entries older than this (relative to now) are dropped on parse.
const TRIM_PAST: Duration = Duration::hours(3);
/// Guide entries starting later than this are dropped on parse.  Purely a
/// memory cap; correctness never depends on the window.
const TRIM_FUTURE: Duration = Duration::hours(24);

/// Fetch and parse an XMLTV guide.  Degrades to an empty guide on failure.
pub async fn fetch_epg(url: &str) -> ProgramGuide {
    let text = match fetch_text(url).await {
        Ok(t) => t,
        Err(e) => {
            warn!("epg: fetch failed for {}: {}", url, e);
            return ProgramGuide::new();
        }
    };
    let guide = parse_xmltv(&text, Utc::now());
    info!(
        "epg: {} channels / {} programs from {}",
        guide.len(),
        guide.values().map(Vec::len).sum::<usize>(),
        url
    );
    guide
}

async fn fetch_text(url: &str) -> anyhow::Result<String> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    Ok(response.text().await?)
}

/// Parse XMLTV text, keeping only programs inside the rolling window around
/// `now`.  Malformed `<programme>` elements are skipped, not fatal.
pub fn parse_xmltv(content: &str, now: DateTime<Utc>) -> ProgramGuide {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let keep_from = now - TRIM_PAST;
    let keep_until = now + TRIM_FUTURE;

    let mut guide = ProgramGuide::new();
    let mut current: Option<Program> = None;
    // Which text element we are inside, within a <programme>.
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"programme" => {
                    current = programme_from_attrs(&e);
                }
                b"title" if current.is_some() => field = Some(Field::Title),
                b"desc" if current.is_some() => field = Some(Field::Desc),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let (Some(prog), Some(f)) = (current.as_mut(), field) {
                    let text = t.unescape().unwrap_or_default();
                    match f {
                        Field::Title => prog.title.push_str(&text),
                        Field::Desc => prog.description.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"programme" => {
                    if let Some(prog) = current.take() {
                        let in_window = prog.end > keep_from && prog.start < keep_until;
                        if in_window && prog.end > prog.start {
                            guide
                                .entry(prog.channel_epg_id.clone())
                                .or_insert_with(Vec::new)
                                .push(prog);
                        }
                    }
                    field = None;
                }
                b"title" | b"desc" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("epg: parse aborted: {}", e);
                break;
            }
        }
    }

    for programs in guide.values_mut() {
        programs.sort_by_key(|p| p.start);
    }
    guide
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Desc,
}

fn programme_from_attrs(e: &quick_xml::events::BytesStart<'_>) -> Option<Program> {
    let mut channel = None;
    let mut start = None;
    let mut stop = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().ok()?;
        match attr.key.as_ref() {
            b"channel" => channel = Some(value.to_string()),
            b"start" => start = parse_xmltv_time(&value),
            b"stop" => stop = parse_xmltv_time(&value),
            _ => {}
        }
    }
    Some(Program {
        channel_epg_id: channel?,
        title: String::new(),
        description: String::new(),
        start: start?,
        end: stop?,
    })
}

/// XMLTV timestamps look like `20260824103000 +0000`; the zone suffix is
/// optional (absent means UTC).
fn parse_xmltv_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y%m%d%H%M%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// The program airing at `now`, if any.  Bounds are half-open `[start, end)`.
pub fn current_program(programs: &[Program], now: DateTime<Utc>) -> Option<&Program> {
    programs.iter().find(|p| p.start <= now && p.end > now)
}

/// The first program starting after `now`, if any.
pub fn next_program(programs: &[Program], now: DateTime<Utc>) -> Option<&Program> {
    programs.iter().find(|p| p.start > now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn prog(channel: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Program {
        Program {
            channel_epg_id: channel.to_string(),
            title: title.to_string(),
            description: String::new(),
            start,
            end,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, h, m, 0).unwrap()
    }

    #[test]
    fn current_and_next_at_boundaries() {
        let programs = vec![
            prog("one", "Morning Show", at(10, 0), at(10, 30)),
            prog("one", "Midday News", at(10, 30), at(11, 0)),
        ];
        assert_eq!(
            current_program(&programs, at(10, 15)).map(|p| p.title.as_str()),
            Some("Morning Show")
        );
        assert_eq!(
            current_program(&programs, at(10, 45)).map(|p| p.title.as_str()),
            Some("Midday News")
        );
        assert!(current_program(&programs, at(9, 59)).is_none());
        // End bound is exclusive, start inclusive.
        assert_eq!(
            current_program(&programs, at(10, 30)).map(|p| p.title.as_str()),
            Some("Midday News")
        );
        assert_eq!(
            next_program(&programs, at(10, 15)).map(|p| p.title.as_str()),
            Some("Midday News")
        );
        assert!(next_program(&programs, at(10, 45)).is_none());
    }

    #[test]
    fn parses_xmltv_and_sorts() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="one"><display-name>One</display-name></channel>
  <programme start="20260824103000 +0000" stop="20260824110000 +0000" channel="one">
    <title>Midday News</title>
    <desc>Headlines.</desc>
  </programme>
  <programme start="20260824100000 +0000" stop="20260824103000 +0000" channel="one">
    <title>Morning Show</title>
  </programme>
</tv>"#;
        let guide = parse_xmltv(xml, at(10, 15));
        let programs = guide.get("one").expect("channel parsed");
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[0].title, "Morning Show");
        assert_eq!(programs[1].title, "Midday News");
        assert_eq!(programs[1].description, "Headlines.");
    }

    #[test]
    fn trims_outside_rolling_window() {
        let xml = r#"<tv>
  <programme start="20260823100000 +0000" stop="20260823110000 +0000" channel="one">
    <title>Yesterday</title>
  </programme>
  <programme start="20260824100000 +0000" stop="20260824103000 +0000" channel="one">
    <title>Now-ish</title>
  </programme>
  <programme start="20260826100000 +0000" stop="20260826110000 +0000" channel="one">
    <title>Far Future</title>
  </programme>
</tv>"#;
        let guide = parse_xmltv(xml, at(10, 15));
        let programs = guide.get("one").expect("channel parsed");
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].title, "Now-ish");
    }

    #[test]
    fn malformed_programme_is_skipped() {
        let xml = r#"<tv>
  <programme start="garbage" stop="20260824103000 +0000" channel="one">
    <title>Broken</title>
  </programme>
  <programme start="20260824100000 +0000" stop="20260824103000 +0000" channel="one">
    <title>Fine</title>
  </programme>
</tv>"#;
        let guide = parse_xmltv(xml, at(10, 15));
        assert_eq!(guide.get("one").map(Vec::len), Some(1));
    }

    #[test]
    fn timezone_offsets_normalised_to_utc() {
        let t = parse_xmltv_time("20260824120000 +0200").unwrap();
        assert_eq!(t, at(10, 0));
        let t = parse_xmltv_time("20260824100000").unwrap();
        assert_eq!(t, at(10, 0));
    }
}
