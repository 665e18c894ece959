//! Virtual window over a flattened row sequence.
//!
//! The renderer never walks all rows: the visible slice is found by binary
//! search over the monotonically increasing `top` offsets, so frame cost
//! scales with viewport height, not playlist size.

use std::ops::Range;

use crate::rows::{Row, RowKind};

/// Indices of the rows intersecting the viewport `[scroll, scroll + viewport)`,
/// widened by `overscan` cells on both sides.  The result is clamped to the
/// row slice and empty when there is nothing to draw.
pub fn visible_range(rows: &[Row], scroll: u32, viewport: u16, overscan: u16) -> Range<usize> {
    if rows.is_empty() || viewport == 0 {
        return 0..0;
    }
    let from = scroll.saturating_sub(overscan as u32);
    let until = scroll + viewport as u32 + overscan as u32;

    // First row whose bottom edge reaches `from`.
    let start = rows.partition_point(|r| r.bottom() <= from);
    // First row at or past `until`; rows are contiguous so another
    // partition_point on `top` suffices.
    let end = rows.partition_point(|r| r.top < until);
    start..end
}

/// The header whose section spans the top edge of the viewport, for pinned
/// ("sticky") rendering.  `None` when the topmost visible section has no
/// header (e.g. leading uncategorized channels) or the list is groups-only.
pub fn sticky_header(rows: &[Row], scroll: u32) -> Option<usize> {
    let at_top = rows.partition_point(|r| r.bottom() <= scroll);
    rows[..=at_top.min(rows.len().checked_sub(1)?)]
        .iter()
        .rposition(|r| matches!(r.kind, RowKind::GroupHeader { .. }))
}

/// Minimal scroll adjustment that brings `row` fully into a viewport of
/// `viewport` cells.  `None` when the row is already fully visible, so callers
/// can leave a manual scroll position alone.
pub fn scroll_into_view(row: &Row, scroll: u32, viewport: u16) -> Option<u32> {
    let viewport = viewport as u32;
    if row.top < scroll {
        Some(row.top)
    } else if row.bottom() > scroll + viewport {
        Some(row.bottom().saturating_sub(viewport))
    } else {
        None
    }
}

/// Largest scroll offset that still fills the viewport.
pub fn max_scroll(total_height: u32, viewport: u16) -> u32 {
    total_height.saturating_sub(viewport as u32)
}

/// Pointer hit-test: the row containing viewport-relative cell `rel_y`.
pub fn row_at(rows: &[Row], scroll: u32, rel_y: u16) -> Option<usize> {
    let y = scroll + rel_y as u32;
    let idx = rows.partition_point(|r| r.bottom() <= y);
    let row = rows.get(idx)?;
    (row.top <= y).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, Group};
    use crate::rows::{RowSet, ViewMode, CHANNEL_ROW_HEIGHT, GROUP_ROW_HEIGHT};

    fn many_channels(n: usize) -> Vec<Group> {
        vec![Group {
            title: "Uncategorized".to_string(),
            channels: (0..n)
                .map(|i| Channel {
                    id: format!("ch{}", i),
                    name: format!("Channel {}", i),
                    stream_url: format!("http://x/{}.m3u8", i),
                    ..Channel::default()
                })
                .collect(),
        }]
    }

    #[test]
    fn range_is_small_for_large_lists() {
        let set = RowSet::flatten(&many_channels(10_000), ViewMode::FlatList);
        let range = visible_range(&set.rows, 5_000, 20, 0);
        assert!(!range.is_empty());
        // 20 cells of 2-cell rows: at most 11 rows intersect.
        assert!(range.len() <= 11);
        for row in &set.rows[range.clone()] {
            assert!(row.bottom() > 5_000 && row.top < 5_020);
        }
        // Everything outside the range really is outside the viewport.
        if range.start > 0 {
            assert!(set.rows[range.start - 1].bottom() <= 5_000);
        }
        if range.end < set.len() {
            assert!(set.rows[range.end].top >= 5_020);
        }
    }

    #[test]
    fn overscan_widens_both_sides() {
        let set = RowSet::flatten(&many_channels(100), ViewMode::FlatList);
        let plain = visible_range(&set.rows, 50, 10, 0);
        let wide = visible_range(&set.rows, 50, 10, 2 * CHANNEL_ROW_HEIGHT);
        assert!(wide.start <= plain.start);
        assert!(wide.end >= plain.end);
        assert!(wide.len() > plain.len());
    }

    #[test]
    fn empty_rows_or_zero_viewport() {
        assert_eq!(visible_range(&[], 0, 24, 0), 0..0);
        let set = RowSet::flatten(&many_channels(5), ViewMode::FlatList);
        assert_eq!(visible_range(&set.rows, 0, 0, 0), 0..0);
    }

    #[test]
    fn scroll_past_end_yields_empty_range() {
        let set = RowSet::flatten(&many_channels(3), ViewMode::FlatList);
        let range = visible_range(&set.rows, set.total_height + 100, 10, 0);
        assert!(range.is_empty());
    }

    fn grouped(n_groups: usize, per_group: usize) -> Vec<Group> {
        (0..n_groups)
            .map(|g| Group {
                title: format!("Group {}", g),
                channels: (0..per_group)
                    .map(|i| Channel {
                        id: format!("g{}c{}", g, i),
                        name: format!("C{}", i),
                        stream_url: "http://x/s.m3u8".to_string(),
                        ..Channel::default()
                    })
                    .collect(),
            })
            .collect()
    }

    #[test]
    fn sticky_header_tracks_scrolled_section() {
        let set = RowSet::flatten(&grouped(3, 4), ViewMode::FlatList);
        // At the very top the first header owns the viewport edge.
        assert_eq!(sticky_header(&set.rows, 0), Some(0));
        // Scrolled into the middle of the second section.
        let second_header_top = GROUP_ROW_HEIGHT as u32 + 4 * CHANNEL_ROW_HEIGHT as u32;
        let idx = sticky_header(&set.rows, second_header_top + 3).unwrap();
        assert!(matches!(
            set.rows[idx].kind,
            RowKind::GroupHeader { group_idx: 1 }
        ));
    }

    #[test]
    fn sticky_header_none_without_headers() {
        let set = RowSet::flatten(&many_channels(10), ViewMode::FlatList);
        assert_eq!(sticky_header(&set.rows, 6), None);
    }

    #[test]
    fn scroll_into_view_is_minimal() {
        let set = RowSet::flatten(&many_channels(50), ViewMode::FlatList);
        let row = &set.rows[20]; // top = 40, bottom = 42
        // Above the viewport: align the row's top to the top edge.
        assert_eq!(scroll_into_view(row, 60, 10), Some(40));
        // Below the viewport: align the row's bottom to the bottom edge.
        assert_eq!(scroll_into_view(row, 10, 10), Some(32));
        // Already fully visible: leave scroll alone.
        assert_eq!(scroll_into_view(row, 38, 10), None);
        assert_eq!(scroll_into_view(row, 40, 10), None);
    }

    #[test]
    fn max_scroll_clamps() {
        assert_eq!(max_scroll(100, 24), 76);
        assert_eq!(max_scroll(10, 24), 0);
    }

    #[test]
    fn row_at_maps_pointer_cells() {
        let set = RowSet::flatten(&many_channels(5), ViewMode::FlatList);
        // Rows of height 2: cells 0-1 → row 0, cells 2-3 → row 1, …
        assert_eq!(row_at(&set.rows, 0, 0), Some(0));
        assert_eq!(row_at(&set.rows, 0, 1), Some(0));
        assert_eq!(row_at(&set.rows, 0, 2), Some(1));
        assert_eq!(row_at(&set.rows, 4, 0), Some(2));
        assert_eq!(row_at(&set.rows, 0, 40), None);
    }
}
