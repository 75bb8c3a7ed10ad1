//! Data models for a document part
//!
//! Defines the entities held in memory while a part is being edited:
//! lines, region blocks, per-line transcriptions and their versions.
//! Everything here mirrors server state; nothing is persisted locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document primary key
pub type DocumentId = u64;
/// Document part primary key
pub type PartId = u64;
/// Line primary key
pub type LineId = u64;
/// Region block primary key
pub type BlockId = u64;
/// Transcription layer primary key
pub type TranscriptionId = u64;
/// Line transcription primary key
pub type LineTranscriptionId = u64;

/// A point in image pixel coordinates
pub type Point = [f64; 2];
/// An open (baseline) or closed (mask, box) polyline
pub type Polygon = Vec<Point>;

/// Axis-aligned bounds of a polygon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Compute the bounds of a set of points, `None` when empty
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let init = Self {
            x_min: first[0],
            y_min: first[1],
            x_max: first[0],
            y_max: first[1],
        };
        Some(rest.iter().fold(init, |b, p| Self {
            x_min: b.x_min.min(p[0]),
            y_min: b.y_min.min(p[1]),
            x_max: b.x_max.max(p[0]),
            y_max: b.y_max.max(p[1]),
        }))
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Image of a part as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartImage {
    /// Location of the image file
    #[serde(default)]
    pub uri: Option<String>,
    /// Pixel size as `[width, height]`
    #[serde(default)]
    pub size: Option<[u32; 2]>,
}

/// An immutable snapshot of a line transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Revision identifier
    pub revision: String,
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
    /// Who took the snapshot
    #[serde(default)]
    pub author: Option<String>,
    /// What produced the content (manual edit, OCR model, import...)
    #[serde(default)]
    pub source: Option<String>,
    /// Snapshotted fields
    #[serde(default)]
    pub data: VersionData,
}

/// Fields captured by a version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionData {
    #[serde(default)]
    pub content: String,
}

impl Version {
    /// Snapshotted content
    pub fn content(&self) -> &str {
        &self.data.content
    }
}

/// The content of one line under one transcription layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTranscription {
    /// Primary key, `None` until first saved
    #[serde(default)]
    pub pk: Option<LineTranscriptionId>,
    /// Owning line
    pub line: LineId,
    /// Transcription layer
    pub transcription: TranscriptionId,
    /// Text content, may carry inline markup
    #[serde(default)]
    pub content: String,
    /// Snapshots, newest first
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl LineTranscription {
    /// Empty, unsaved transcription for a line
    pub fn placeholder(line: LineId, transcription: TranscriptionId) -> Self {
        Self {
            pk: None,
            line,
            transcription,
            content: String::new(),
            versions: Vec::new(),
        }
    }

    /// Whether the server knows about this transcription
    pub fn is_saved(&self) -> bool {
        self.pk.is_some()
    }

    /// Content with inline markup tags removed
    pub fn text(&self) -> String {
        strip_tags(&self.content)
    }

    /// Insert a version, keeping the sequence newest first
    ///
    /// A fresh snapshot is the newest and lands at index 0.
    pub fn prepend_version(&mut self, version: Version) {
        let at = self
            .versions
            .partition_point(|v| v.created_at > version.created_at);
        self.versions.insert(at, version);
    }

    /// Restore newest-first order after a wholesale replacement
    pub fn sort_versions(&mut self) {
        self.versions
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Find a version by revision
    pub fn version(&self, revision: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.revision == revision)
    }
}

/// A segmented text line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Server-assigned key
    pub pk: LineId,
    /// Baseline polyline
    pub baseline: Option<Polygon>,
    /// Closed mask polygon
    pub mask: Option<Polygon>,
    /// Containing region, if any
    pub region: Option<BlockId>,
    /// Reading order index, authoritative only after a recalculation
    pub order: u32,
    /// Transcription for the selected layer
    pub transcription: LineTranscription,
}

impl Line {
    /// Bounds of the mask, or of the baseline when there is no mask
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.mask
            .as_deref()
            .or(self.baseline.as_deref())
            .and_then(BoundingBox::from_points)
    }
}

/// A region grouping lines (paragraph, column, marginal note...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBlock {
    pub pk: BlockId,
    /// Bounding polygon
    #[serde(rename = "box")]
    pub bounds: Polygon,
}

impl RegionBlock {
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.bounds)
    }
}

/// In-memory state of the active document part
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartState {
    /// Primary key, `None` until loaded
    pub pk: Option<PartId>,
    pub lines: Vec<Line>,
    pub blocks: Vec<RegionBlock>,
    pub image: Option<PartImage>,
    /// Previous part in the document
    pub previous: Option<PartId>,
    /// Next part in the document
    pub next: Option<PartId>,
    /// Transcription layer shown for every line
    pub selected_transcription: TranscriptionId,
}

impl PartState {
    /// Create an unloaded state showing the given layer
    pub fn new(selected_transcription: TranscriptionId) -> Self {
        Self {
            selected_transcription,
            ..Self::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.pk.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.is_loaded() && self.previous.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.is_loaded() && self.next.is_some()
    }

    /// Whether any held line has a mask
    pub fn has_masks(&self) -> bool {
        self.lines.iter().any(|l| l.mask.is_some())
    }

    pub fn line(&self, pk: LineId) -> Option<&Line> {
        self.lines.iter().find(|l| l.pk == pk)
    }

    pub fn line_mut(&mut self, pk: LineId) -> Option<&mut Line> {
        self.lines.iter_mut().find(|l| l.pk == pk)
    }

    pub fn block(&self, pk: BlockId) -> Option<&RegionBlock> {
        self.blocks.iter().find(|b| b.pk == pk)
    }

    pub fn block_mut(&mut self, pk: BlockId) -> Option<&mut RegionBlock> {
        self.blocks.iter_mut().find(|b| b.pk == pk)
    }

    /// Lines sorted by reading order (ties broken by key)
    ///
    /// The held sequence itself is never reordered.
    pub fn lines_in_order(&self) -> Vec<&Line> {
        let mut lines: Vec<&Line> = self.lines.iter().collect();
        lines.sort_by_key(|l| (l.order, l.pk));
        lines
    }
}

/// Geometry for a line that does not exist yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLine {
    pub baseline: Option<Polygon>,
    pub mask: Option<Polygon>,
    pub region: Option<BlockId>,
}

/// New geometry for an existing line
#[derive(Debug, Clone, PartialEq)]
pub struct LineUpdate {
    pub pk: LineId,
    pub baseline: Option<Polygon>,
    pub mask: Option<Polygon>,
    pub region: Option<BlockId>,
}

impl LineUpdate {
    /// Update carrying the line's current geometry
    pub fn from_line(line: &Line) -> Self {
        Self {
            pk: line.pk,
            baseline: line.baseline.clone(),
            mask: line.mask.clone(),
            region: line.region,
        }
    }
}

/// Bounds for a region that does not exist yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegion {
    pub bounds: Polygon,
}

/// New bounds for an existing region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionUpdate {
    pub pk: BlockId,
    pub bounds: Polygon,
}

/// Remove `<...>` markup tags, leaving unmatched brackets alone
fn strip_tags(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let close = tail.find('>');
        let reopen = tail.find('<');
        match close {
            Some(end) if end > 0 && reopen.map_or(true, |r| r > end) => {
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('<');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn version(revision: &str, hour: u32, content: &str) -> Version {
        Version {
            revision: revision.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            author: None,
            source: None,
            data: VersionData {
                content: content.to_string(),
            },
        }
    }

    fn line(pk: LineId, mask: Option<Polygon>) -> Line {
        Line {
            pk,
            baseline: Some(vec![[10.0, 50.0], [200.0, 55.0]]),
            mask,
            region: None,
            order: 0,
            transcription: LineTranscription::placeholder(pk, 1),
        }
    }

    #[test]
    fn test_placeholder() {
        let t = LineTranscription::placeholder(7, 3);
        assert_eq!(t.line, 7);
        assert_eq!(t.transcription, 3);
        assert!(t.content.is_empty());
        assert!(t.versions.is_empty());
        assert!(!t.is_saved());
    }

    #[test]
    fn test_prepend_version_keeps_newest_first() {
        let mut t = LineTranscription::placeholder(1, 1);
        t.prepend_version(version("a", 8, "one"));
        t.prepend_version(version("b", 10, "two"));
        t.prepend_version(version("c", 12, "three"));

        let revisions: Vec<&str> = t.versions.iter().map(|v| v.revision.as_str()).collect();
        assert_eq!(revisions, vec!["c", "b", "a"]);

        // A snapshot older than the head does not jump the queue
        t.prepend_version(version("d", 9, "late"));
        let revisions: Vec<&str> = t.versions.iter().map(|v| v.revision.as_str()).collect();
        assert_eq!(revisions, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_sort_versions() {
        let mut t = LineTranscription::placeholder(1, 1);
        t.versions = vec![version("a", 8, ""), version("c", 12, ""), version("b", 10, "")];
        t.sort_versions();
        assert_eq!(t.versions[0].revision, "c");
        assert_eq!(t.versions[2].revision, "a");
        assert_eq!(t.version("b").unwrap().created_at.format("%H").to_string(), "10");
    }

    #[test]
    fn test_text_strips_markup() {
        let mut t = LineTranscription::placeholder(1, 1);
        t.content = "Dominus <sup>et</sup> magister".to_string();
        assert_eq!(t.text(), "Dominus et magister");

        t.content = "a < b and c <> d".to_string();
        assert_eq!(t.text(), "a < b and c <> d");
    }

    #[test]
    fn test_bounding_box_prefers_mask() {
        let masked = line(
            1,
            Some(vec![[5.0, 30.0], [210.0, 30.0], [210.0, 70.0], [5.0, 70.0]]),
        );
        let bbox = masked.bounding_box().unwrap();
        assert_eq!(bbox.width(), 205.0);
        assert_eq!(bbox.height(), 40.0);

        let bare = line(2, None);
        let bbox = bare.bounding_box().unwrap();
        assert_eq!(bbox.x_min, 10.0);
        assert_eq!(bbox.y_max, 55.0);

        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_part_state_helpers() {
        let mut state = PartState::new(4);
        assert!(!state.is_loaded());
        assert!(!state.has_next());

        state.pk = Some(9);
        state.next = Some(10);
        state.lines = vec![line(1, None), line(2, None)];
        assert!(state.is_loaded());
        assert!(state.has_next());
        assert!(!state.has_previous());
        assert!(!state.has_masks());

        state.line_mut(2).unwrap().mask = Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        assert!(state.has_masks());
    }

    #[test]
    fn test_lines_in_order() {
        let mut state = PartState::new(1);
        let mut a = line(1, None);
        a.order = 2;
        let mut b = line(2, None);
        b.order = 0;
        let mut c = line(3, None);
        c.order = 1;
        state.lines = vec![a, b, c];

        let ordered: Vec<LineId> = state.lines_in_order().iter().map(|l| l.pk).collect();
        assert_eq!(ordered, vec![2, 3, 1]);
        // held sequence untouched
        assert_eq!(state.lines[0].pk, 1);
    }

    #[test]
    fn test_region_block_box_field() {
        let json = r#"{"pk": 3, "box": [[0, 0], [100, 0], [100, 40]]}"#;
        let block: RegionBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.pk, 3);
        assert_eq!(block.bounding_box().unwrap().height(), 40.0);
    }

    #[test]
    fn test_version_deserialization() {
        let json = r#"{
            "revision": "9f1c2d",
            "created_at": "2024-03-01T10:15:00Z",
            "author": "ana",
            "data": {"content": "incipit"}
        }"#;
        let v: Version = serde_json::from_str(json).unwrap();
        assert_eq!(v.content(), "incipit");
        assert_eq!(v.author.as_deref(), Some("ana"));
        assert!(v.source.is_none());
    }
}
