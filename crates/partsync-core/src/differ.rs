//! Version comparison and timestamp labels
//!
//! Character-level diff between two transcription snapshots, and calendar
//! style labels ("Today at 2:30 PM") for version timestamps.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};

use crate::models::Version;

/// Entries kept by a `VersionDiffer` before its cache is cleared
const CACHE_LIMIT: usize = 512;

/// Kind of a span in a diff result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Unchanged,
    Inserted,
    Deleted,
}

/// A run of text sharing one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub kind: SpanKind,
    pub text: String,
}

impl DiffSpan {
    fn new(kind: SpanKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Compute a character-level diff between two texts using LCS
///
/// Without a previous text the current one is returned as a single
/// unchanged span. Adjacent spans never share a kind, and inside a changed
/// stretch the deleted text comes before the inserted text.
pub fn diff(previous: Option<&str>, current: &str) -> Vec<DiffSpan> {
    let Some(previous) = previous else {
        if current.is_empty() {
            return Vec::new();
        }
        return vec![DiffSpan::new(SpanKind::Unchanged, current)];
    };

    let old: Vec<char> = previous.chars().collect();
    let new: Vec<char> = current.chars().collect();

    // Only the stretch between the common prefix and suffix needs the table
    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let m = old_mid.len();
    let n = new_mid.len();

    // lcs[i][j] is the LCS length of old_mid[i..] and new_mid[j..]
    let mut lcs = vec![vec![0u32; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            lcs[i][j] = if old_mid[i] == new_mid[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut spans = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();
    let mut unchanged: String = old[..prefix].iter().collect();

    let mut i = 0;
    let mut j = 0;
    while i < m || j < n {
        if i < m && j < n && old_mid[i] == new_mid[j] {
            flush_changes(&mut spans, &mut deleted, &mut inserted);
            unchanged.push(old_mid[i]);
            i += 1;
            j += 1;
            continue;
        }

        if !unchanged.is_empty() {
            spans.push(DiffSpan::new(SpanKind::Unchanged, std::mem::take(&mut unchanged)));
        }
        if i < m && (j == n || lcs[i + 1][j] >= lcs[i][j + 1]) {
            deleted.push(old_mid[i]);
            i += 1;
        } else {
            inserted.push(new_mid[j]);
            j += 1;
        }
    }

    flush_changes(&mut spans, &mut deleted, &mut inserted);
    unchanged.extend(&old[old.len() - suffix..]);
    if !unchanged.is_empty() {
        spans.push(DiffSpan::new(SpanKind::Unchanged, unchanged));
    }
    spans
}

fn flush_changes(spans: &mut Vec<DiffSpan>, deleted: &mut String, inserted: &mut String) {
    if !deleted.is_empty() {
        spans.push(DiffSpan::new(SpanKind::Deleted, std::mem::take(deleted)));
    }
    if !inserted.is_empty() {
        spans.push(DiffSpan::new(SpanKind::Inserted, std::mem::take(inserted)));
    }
}

/// Calendar label for an instant, relative to the current time
pub fn format_timestamp<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String {
    format_timestamp_at(instant, tz, Utc::now())
}

/// Calendar label for an instant, relative to `now`
///
/// Both instants are shifted into `tz` first. The distance is measured from
/// the start of today in fractional days:
///
/// | distance      | label                    |
/// |---------------|--------------------------|
/// | [-6, -1)      | `Last Monday at 2:30 PM` |
/// | [-1, 0)       | `Yesterday at 2:30 PM`   |
/// | [0, 1)        | `Today at 2:30 PM`       |
/// | [1, 2)        | `Tomorrow at 2:30 PM`    |
/// | [2, 7)        | `Friday at 2:30 PM`      |
/// | anything else | `03/14/2024`             |
pub fn format_timestamp_at<Tz: TimeZone>(
    instant: DateTime<Utc>,
    tz: &Tz,
    now: DateTime<Utc>,
) -> String {
    let local = instant.with_timezone(tz).naive_local();
    let today = now.with_timezone(tz).date_naive();
    let start_of_today = NaiveDateTime::from(today);

    let days = (local - start_of_today).num_seconds() as f64 / 86_400.0;
    let time = local.format("%-I:%M %p");

    if days < -6.0 {
        format_date(local)
    } else if days < -1.0 {
        format!("Last {} at {}", local.format("%A"), time)
    } else if days < 0.0 {
        format!("Yesterday at {}", time)
    } else if days < 1.0 {
        format!("Today at {}", time)
    } else if days < 2.0 {
        format!("Tomorrow at {}", time)
    } else if days < 7.0 {
        format!("{} at {}", local.format("%A"), time)
    } else {
        format_date(local)
    }
}

fn format_date(local: NaiveDateTime) -> String {
    format!("{:02}/{:02}/{}", local.month(), local.day(), local.year())
}

/// Diffs and labels versions in one time zone
///
/// Diffs are memoized on the compared contents.
pub struct VersionDiffer<Tz: TimeZone> {
    tz: Tz,
    cache: HashMap<(Option<String>, String), Vec<DiffSpan>>,
}

impl<Tz: TimeZone> VersionDiffer<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            cache: HashMap::new(),
        }
    }

    /// Diff a version against the one before it
    pub fn compare(&mut self, previous: Option<&Version>, version: &Version) -> &[DiffSpan] {
        let key = (
            previous.map(|p| p.content().to_string()),
            version.content().to_string(),
        );
        if self.cache.len() >= CACHE_LIMIT && !self.cache.contains_key(&key) {
            self.cache.clear();
        }
        self.cache
            .entry(key)
            .or_insert_with_key(|(previous, current)| diff(previous.as_deref(), current))
    }

    /// Calendar label for when a version was taken
    pub fn label(&self, version: &Version) -> String {
        format_timestamp(version.created_at, &self.tz)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VersionData;
    use chrono::FixedOffset;

    fn span(kind: SpanKind, text: &str) -> DiffSpan {
        DiffSpan::new(kind, text)
    }

    fn version(content: &str) -> Version {
        Version {
            revision: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 14, 14, 30, 0).unwrap(),
            author: None,
            source: None,
            data: VersionData {
                content: content.to_string(),
            },
        }
    }

    // ==================== diff ====================

    #[test]
    fn test_diff_without_previous() {
        assert_eq!(
            diff(None, "abc"),
            vec![span(SpanKind::Unchanged, "abc")]
        );
        assert!(diff(None, "").is_empty());
    }

    #[test]
    fn test_diff_from_empty() {
        assert_eq!(
            diff(Some(""), "abc"),
            vec![span(SpanKind::Inserted, "abc")]
        );
        assert_eq!(
            diff(Some("abc"), ""),
            vec![span(SpanKind::Deleted, "abc")]
        );
    }

    #[test]
    fn test_diff_identical() {
        assert_eq!(
            diff(Some("abc"), "abc"),
            vec![span(SpanKind::Unchanged, "abc")]
        );
    }

    #[test]
    fn test_diff_replacement_deletes_first() {
        assert_eq!(
            diff(Some("abc"), "abd"),
            vec![
                span(SpanKind::Unchanged, "ab"),
                span(SpanKind::Deleted, "c"),
                span(SpanKind::Inserted, "d"),
            ]
        );
    }

    #[test]
    fn test_diff_reconstructs_both_sides() {
        let old = "In principio erat verbum";
        let new = "In principio erat Verbum, et verbum";
        let spans = diff(Some(old), new);

        let before: String = spans
            .iter()
            .filter(|s| s.kind != SpanKind::Inserted)
            .map(|s| s.text.as_str())
            .collect();
        let after: String = spans
            .iter()
            .filter(|s| s.kind != SpanKind::Deleted)
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(before, old);
        assert_eq!(after, new);

        for pair in spans.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
            assert!(!(pair[0].kind == SpanKind::Inserted && pair[1].kind == SpanKind::Deleted));
        }
    }

    #[test]
    fn test_diff_long_text_with_one_edit() {
        let previous = format!("{}x{}", "a".repeat(10_000), "b".repeat(10_000));
        let current = format!("{}y{}", "a".repeat(10_000), "b".repeat(10_000));

        let spans = diff(Some(&previous), &current);
        assert_eq!(
            spans,
            vec![
                span(SpanKind::Unchanged, &"a".repeat(10_000)),
                span(SpanKind::Deleted, "x"),
                span(SpanKind::Inserted, "y"),
                span(SpanKind::Unchanged, &"b".repeat(10_000)),
            ]
        );
    }

    #[test]
    fn test_diff_multibyte() {
        assert_eq!(
            diff(Some("žluť"), "žlutý"),
            vec![
                span(SpanKind::Unchanged, "žlu"),
                span(SpanKind::Deleted, "ť"),
                span(SpanKind::Inserted, "tý"),
            ]
        );
    }

    // ==================== labels ====================

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_calendar_labels() {
        // Thursday 2024-03-14, 18:00 UTC
        let now = at(14, 18, 0);

        assert_eq!(format_timestamp_at(at(14, 14, 30), &Utc, now), "Today at 2:30 PM");
        assert_eq!(format_timestamp_at(at(13, 9, 5), &Utc, now), "Yesterday at 9:05 AM");
        assert_eq!(format_timestamp_at(at(11, 0, 0), &Utc, now), "Last Monday at 12:00 AM");
        assert_eq!(format_timestamp_at(at(15, 8, 0), &Utc, now), "Tomorrow at 8:00 AM");
        assert_eq!(format_timestamp_at(at(18, 8, 0), &Utc, now), "Monday at 8:00 AM");
        assert_eq!(format_timestamp_at(at(1, 8, 0), &Utc, now), "03/01/2024");
        assert_eq!(format_timestamp_at(at(28, 8, 0), &Utc, now), "03/28/2024");
    }

    #[test]
    fn test_calendar_labels_use_time_zone() {
        let now = at(14, 18, 0);
        // 23:30 UTC on the 13th is already the 14th in UTC+2
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();

        assert_eq!(format_timestamp_at(at(13, 23, 30), &tz, now), "Today at 1:30 AM");
        assert_eq!(format_timestamp_at(at(13, 23, 30), &Utc, now), "Yesterday at 11:30 PM");
    }

    // ==================== differ ====================

    #[test]
    fn test_compare_is_memoized() {
        let mut differ = VersionDiffer::new(Utc);
        let older = version("abc");
        let newer = version("abd");

        let first = differ.compare(Some(&older), &newer).to_vec();
        let second = differ.compare(Some(&older), &newer).to_vec();
        assert_eq!(first, second);
        assert_eq!(differ.cached(), 1);

        assert_eq!(
            differ.compare(None, &older),
            &[span(SpanKind::Unchanged, "abc")]
        );
        assert_eq!(differ.cached(), 2);
    }
}
