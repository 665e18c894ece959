//! Flattening engine: hierarchical groups → one positioned row sequence.
//!
//! Rebuilt whole whenever the source groups, view mode, or drill target
//! change; a `RowSet` is immutable once built and replaces the previous one
//! atomically.  Offsets are in terminal cell rows.

use crate::model::Group;

/// Height of group-header and group-entry rows, in cells.
pub const GROUP_ROW_HEIGHT: u16 = 1;
/// Height of channel rows (name line + now-playing line), in cells.
pub const CHANNEL_ROW_HEIGHT: u16 = 2;

/// Which projection of the groups to flatten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Headers and channels interleaved in one list.
    FlatList,
    /// One selectable entry per group (drill roots).
    GroupsOnly,
    /// Channels of a single group (drilled in), by group index.
    ChannelsOfGroup(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    /// Non-selectable section caption above a group's channels.
    GroupHeader { group_idx: usize },
    /// Selectable drill target for a group.
    GroupEntry { group_idx: usize },
    /// Selectable channel.  `number` is the 1-based on-screen channel
    /// number, counted across the whole flattened sequence.
    ChannelEntry {
        group_idx: usize,
        channel_idx: usize,
        number: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: RowKind,
    /// Sum of the heights of all preceding rows.
    pub top: u32,
    pub height: u16,
}

impl Row {
    pub fn bottom(&self) -> u32 {
        self.top + self.height as u32
    }

    pub fn is_selectable(&self) -> bool {
        !matches!(self.kind, RowKind::GroupHeader { .. })
    }
}

/// The flattened sequence plus its total scrollable extent.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub total_height: u32,
}

impl RowSet {
    /// Flatten `groups` under `mode`.  Empty groups are omitted; in FlatList
    /// mode the "Uncategorized" group contributes channels but no header.
    /// Deterministic and order-preserving: same inputs, same rows.
    pub fn flatten(groups: &[Group], mode: ViewMode) -> Self {
        let mut rows = Vec::new();
        let mut top: u32 = 0;
        let mut number: usize = 0;

        let mut push = |rows: &mut Vec<Row>, kind: RowKind, height: u16, top: &mut u32| {
            rows.push(Row {
                kind,
                top: *top,
                height,
            });
            *top += height as u32;
        };

        match mode {
            ViewMode::FlatList => {
                for (group_idx, group) in groups.iter().enumerate() {
                    if group.channels.is_empty() {
                        continue;
                    }
                    if !group.is_uncategorized() {
                        push(
                            &mut rows,
                            RowKind::GroupHeader { group_idx },
                            GROUP_ROW_HEIGHT,
                            &mut top,
                        );
                    }
                    for channel_idx in 0..group.channels.len() {
                        number += 1;
                        push(
                            &mut rows,
                            RowKind::ChannelEntry {
                                group_idx,
                                channel_idx,
                                number,
                            },
                            CHANNEL_ROW_HEIGHT,
                            &mut top,
                        );
                    }
                }
            }
            ViewMode::GroupsOnly => {
                for (group_idx, group) in groups.iter().enumerate() {
                    if group.channels.is_empty() {
                        continue;
                    }
                    push(
                        &mut rows,
                        RowKind::GroupEntry { group_idx },
                        GROUP_ROW_HEIGHT,
                        &mut top,
                    );
                }
            }
            ViewMode::ChannelsOfGroup(group_idx) => {
                if let Some(group) = groups.get(group_idx) {
                    for channel_idx in 0..group.channels.len() {
                        number += 1;
                        push(
                            &mut rows,
                            RowKind::ChannelEntry {
                                group_idx,
                                channel_idx,
                                number,
                            },
                            CHANNEL_ROW_HEIGHT,
                            &mut top,
                        );
                    }
                }
            }
        }

        Self {
            rows,
            total_height: top,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    /// First row focus may rest on, i.e. the first non-header row.
    pub fn first_selectable(&self) -> Option<usize> {
        self.rows.iter().position(Row::is_selectable)
    }

    /// Source coordinates of the channel at `idx`, if that row is a channel.
    pub fn channel_at(&self, idx: usize) -> Option<(usize, usize)> {
        match self.rows.get(idx)?.kind {
            RowKind::ChannelEntry {
                group_idx,
                channel_idx,
                ..
            } => Some((group_idx, channel_idx)),
            _ => None,
        }
    }

    /// Row index of the channel at the given source coordinates.
    pub fn find_channel(&self, group_idx: usize, channel_idx: usize) -> Option<usize> {
        self.rows.iter().position(|r| {
            matches!(
                r.kind,
                RowKind::ChannelEntry {
                    group_idx: g,
                    channel_idx: c,
                    ..
                } if g == group_idx && c == channel_idx
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;

    fn channel(name: &str) -> Channel {
        Channel {
            id: name.to_string(),
            name: name.to_string(),
            stream_url: format!("http://example/{}.m3u8", name),
            ..Channel::default()
        }
    }

    fn group(title: &str, names: &[&str]) -> Group {
        Group {
            title: title.to_string(),
            channels: names.iter().map(|n| channel(n)).collect(),
        }
    }

    #[test]
    fn flat_list_counts_and_heights() {
        let groups = vec![
            group("Movies", &["M1", "M2", "M3"]),
            group("Sports", &["S1", "S2"]),
        ];
        let set = RowSet::flatten(&groups, ViewMode::FlatList);
        // channels + headers for every non-uncategorized group
        assert_eq!(set.len(), 5 + 2);
        assert_eq!(
            set.total_height,
            2 * GROUP_ROW_HEIGHT as u32 + 5 * CHANNEL_ROW_HEIGHT as u32
        );
    }

    #[test]
    fn offsets_strictly_contiguous() {
        let groups = vec![group("A", &["a1", "a2"]), group("B", &["b1"])];
        let set = RowSet::flatten(&groups, ViewMode::FlatList);
        for pair in set.rows.windows(2) {
            assert_eq!(pair[1].top, pair[0].top + pair[0].height as u32);
        }
        let last = set.rows.last().unwrap();
        assert_eq!(set.total_height, last.top + last.height as u32);
    }

    #[test]
    fn uncategorized_channels_without_header() {
        let groups = vec![
            group("Sports", &["A", "B"]),
            group("Uncategorized", &["C"]),
        ];
        let set = RowSet::flatten(&groups, ViewMode::FlatList);
        assert_eq!(set.len(), 4);
        assert!(matches!(set.rows[0].kind, RowKind::GroupHeader { .. }));
        let numbers: Vec<usize> = set
            .rows
            .iter()
            .filter_map(|r| match r.kind {
                RowKind::ChannelEntry { number, .. } => Some(number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(
            set.total_height,
            GROUP_ROW_HEIGHT as u32 + 3 * CHANNEL_ROW_HEIGHT as u32
        );
    }

    #[test]
    fn empty_groups_are_omitted() {
        let groups = vec![group("Empty", &[]), group("Full", &["x"])];
        let flat = RowSet::flatten(&groups, ViewMode::FlatList);
        assert_eq!(flat.len(), 2); // header + channel for "Full" only
        let only = RowSet::flatten(&groups, ViewMode::GroupsOnly);
        assert_eq!(only.len(), 1);
        assert!(matches!(
            only.rows[0].kind,
            RowKind::GroupEntry { group_idx: 1 }
        ));
    }

    #[test]
    fn empty_input_is_empty_output() {
        let set = RowSet::flatten(&[], ViewMode::FlatList);
        assert!(set.is_empty());
        assert_eq!(set.total_height, 0);
        assert!(set.first_selectable().is_none());
    }

    #[test]
    fn drill_mode_restarts_numbering() {
        let groups = vec![group("A", &["a1", "a2"]), group("B", &["b1", "b2"])];
        let set = RowSet::flatten(&groups, ViewMode::ChannelsOfGroup(1));
        assert_eq!(set.len(), 2);
        assert_eq!(set.channel_at(0), Some((1, 0)));
        assert!(matches!(
            set.rows[0].kind,
            RowKind::ChannelEntry { number: 1, .. }
        ));
    }

    #[test]
    fn flatten_is_deterministic() {
        let groups = vec![group("A", &["a1"]), group("B", &["b1"])];
        let a = RowSet::flatten(&groups, ViewMode::FlatList);
        let b = RowSet::flatten(&groups, ViewMode::FlatList);
        assert_eq!(a.rows, b.rows);
    }
}
