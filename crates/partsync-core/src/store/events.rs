//! Change notifications emitted by the part store

use crate::models::{BlockId, LineId, PartId, TranscriptionId};

/// Field of a line that changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineField {
    Baseline,
    Mask,
    Region,
    Order,
    /// Transcription object or its content
    Transcription,
    /// Version history of the transcription
    Versions,
}

/// Events emitted by the part store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A part replaced the previous state
    PartLoaded(PartId),
    /// The selected transcription layer changed
    LayerChanged(TranscriptionId),
    /// Every line got a fresh placeholder transcription
    TranscriptionsReset,
    LineAdded(LineId),
    LineChanged { line: LineId, field: LineField },
    LineRemoved(LineId),
    RegionAdded(BlockId),
    RegionChanged(BlockId),
    RegionRemoved(BlockId),
    /// An operation failed; local state was left as is
    Failed {
        operation: &'static str,
        message: String,
    },
    /// The store was disposed
    Disposed,
}
