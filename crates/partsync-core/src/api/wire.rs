//! Wire types for the part REST service
//!
//! Request payloads and response records exchanged as JSON. Records are
//! deliberately separate from the held models: reconciliation decides which
//! record fields are authoritative.

use serde::{Deserialize, Serialize};

use crate::models::{
    BlockId, LineId, LineTranscriptionId, PartId, PartImage, Polygon, TranscriptionId, Version,
};

/// A document part as returned by `GET parts/{pk}/`
#[derive(Debug, Clone, Deserialize)]
pub struct PartRecord {
    pub pk: PartId,
    #[serde(default)]
    pub lines: Vec<LineRecord>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub image: Option<PartImage>,
    #[serde(default)]
    pub previous: Option<PartId>,
    #[serde(default)]
    pub next: Option<PartId>,
}

/// A line as returned by the line endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct LineRecord {
    pub pk: LineId,
    #[serde(default)]
    pub baseline: Option<Polygon>,
    #[serde(default)]
    pub mask: Option<Polygon>,
    #[serde(default)]
    pub block: Option<BlockId>,
    #[serde(default)]
    pub order: u32,
}

/// A region block as returned by the block endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct BlockRecord {
    pub pk: BlockId,
    #[serde(rename = "box")]
    pub bounds: Polygon,
}

/// A line transcription as returned by the transcription endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionRecord {
    pub pk: LineTranscriptionId,
    pub line: LineId,
    pub transcription: TranscriptionId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub versions: Vec<Version>,
}

/// Result of a mask reset, one entry per recomputed line
#[derive(Debug, Clone, Deserialize)]
pub struct MaskRecord {
    pub pk: LineId,
    #[serde(default)]
    pub mask: Option<Polygon>,
}

/// Result of an ordering recalculation, entries in reading order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub pk: LineId,
}

/// One page of a paginated list
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    /// Link to the next page, absent or null on the last one
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// `{"lines": [...]}` envelope used by bulk and recalculation endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinesEnvelope<T> {
    pub lines: Vec<T>,
}

/// Body for line create/update
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinePayload {
    pub document_part: PartId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pk: Option<LineId>,
    pub baseline: Option<Polygon>,
    pub mask: Option<Polygon>,
    pub block: Option<BlockId>,
}

/// Body for block create/update
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockPayload {
    pub document_part: PartId,
    #[serde(rename = "box")]
    pub bounds: Polygon,
}

/// Body for transcription create/replace
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TranscriptionPayload {
    pub line: LineId,
    pub transcription: TranscriptionId,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_record_defaults() {
        let record: PartRecord = serde_json::from_value(json!({
            "pk": 12,
            "name": "folio 3r",
            "lines": [{"pk": 1, "baseline": [[0, 10], [50, 12]], "mask": null, "block": null}],
            "previous": 11,
            "next": null
        }))
        .unwrap();

        assert_eq!(record.pk, 12);
        assert_eq!(record.lines.len(), 1);
        assert_eq!(record.lines[0].order, 0);
        assert!(record.blocks.is_empty());
        assert_eq!(record.previous, Some(11));
        assert!(record.next.is_none());
    }

    #[test]
    fn test_page_has_next() {
        let page: Page<OrderRecord> = serde_json::from_value(json!({
            "count": 3,
            "next": "http://localhost/api/documents/1/parts/2/transcriptions/?page=2",
            "results": [{"pk": 1}]
        }))
        .unwrap();
        assert!(page.has_next());

        let last: Page<OrderRecord> =
            serde_json::from_value(json!({"next": null, "results": []})).unwrap();
        assert!(!last.has_next());

        let absent: Page<OrderRecord> = serde_json::from_value(json!({"results": []})).unwrap();
        assert!(!absent.has_next());
    }

    #[test]
    fn test_line_payload_omits_missing_pk() {
        let payload = LinePayload {
            document_part: 3,
            pk: None,
            baseline: Some(vec![[0.0, 1.0], [2.0, 3.0]]),
            mask: None,
            block: Some(8),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("pk").is_none());
        assert_eq!(value["block"], json!(8));
        assert!(value["mask"].is_null());
    }

    #[test]
    fn test_block_payload_uses_box_key() {
        let payload = BlockPayload {
            document_part: 3,
            bounds: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("box").is_some());
    }
}
