//! Reconciliation of server records into held state
//!
//! Each function names exactly which fields the server is authoritative
//! for; everything else on the held entity is left alone. Records are
//! always matched by key, never by position in the held sequence.

use crate::api::wire::{
    BlockRecord, LineRecord, MaskRecord, OrderRecord, PartRecord, TranscriptionRecord,
};
use crate::models::{
    Line, LineId, LineTranscription, LineUpdate, PartState, RegionBlock, TranscriptionId,
};

use super::events::LineField;

/// Replace every part-level field with the fetched part
///
/// Lines get a placeholder transcription for the selected layer.
pub fn load_part(state: &mut PartState, record: PartRecord) {
    let layer = state.selected_transcription;
    state.pk = Some(record.pk);
    state.lines = record
        .lines
        .into_iter()
        .map(|l| line_from_record(l, layer))
        .collect();
    state.blocks = record.blocks.into_iter().map(block_from_record).collect();
    state.image = record.image;
    state.previous = record.previous;
    state.next = record.next;
}

/// Build a held line from a record, with an empty transcription
pub fn line_from_record(record: LineRecord, layer: TranscriptionId) -> Line {
    Line {
        pk: record.pk,
        baseline: record.baseline,
        mask: record.mask,
        region: record.block,
        order: record.order,
        transcription: LineTranscription::placeholder(record.pk, layer),
    }
}

pub fn block_from_record(record: BlockRecord) -> RegionBlock {
    RegionBlock {
        pk: record.pk,
        bounds: record.bounds,
    }
}

/// Give every line an empty transcription for the selected layer
pub fn reset_transcriptions(state: &mut PartState) {
    let layer = state.selected_transcription;
    for line in &mut state.lines {
        line.transcription = LineTranscription::placeholder(line.pk, layer);
    }
}

/// Apply locally edited geometry before it is sent
pub fn apply_line_update(line: &mut Line, update: &LineUpdate) -> Vec<LineField> {
    let mut changed = Vec::new();
    if line.baseline != update.baseline {
        line.baseline = update.baseline.clone();
        changed.push(LineField::Baseline);
    }
    if line.mask != update.mask {
        line.mask = update.mask.clone();
        changed.push(LineField::Mask);
    }
    if line.region != update.region {
        line.region = update.region;
        changed.push(LineField::Region);
    }
    changed
}

/// Take baseline, mask and region from the server; keep the rest
pub fn apply_line_geometry(line: &mut Line, record: &LineRecord) -> Vec<LineField> {
    apply_line_update(
        line,
        &LineUpdate {
            pk: line.pk,
            baseline: record.baseline.clone(),
            mask: record.mask.clone(),
            region: record.block,
        },
    )
}

/// Attach a fetched transcription to its line
///
/// Returns the line key when applied. Records for lines not held or for
/// another layer (a stale page after a layer switch) are ignored.
pub fn apply_transcription(state: &mut PartState, record: TranscriptionRecord) -> Option<LineId> {
    if record.transcription != state.selected_transcription {
        return None;
    }
    let line = state.line_mut(record.line)?;
    let mut transcription = LineTranscription {
        pk: Some(record.pk),
        line: record.line,
        transcription: record.transcription,
        content: record.content,
        versions: record.versions,
    };
    transcription.sort_versions();
    line.transcription = transcription;
    Some(line.pk)
}

/// Take key, content and version history from a saved transcription
pub fn apply_saved_transcription(
    transcription: &mut LineTranscription,
    record: TranscriptionRecord,
) {
    transcription.pk = Some(record.pk);
    transcription.content = record.content;
    transcription.versions = record.versions;
    transcription.sort_versions();
}

/// Take recomputed masks, returns the lines that were held
pub fn apply_masks(state: &mut PartState, records: Vec<MaskRecord>) -> Vec<LineId> {
    records
        .into_iter()
        .filter_map(|record| {
            let line = state.line_mut(record.pk)?;
            line.mask = record.mask;
            Some(line.pk)
        })
        .collect()
}

/// Take the reading order from the position of each record
pub fn apply_ordering(state: &mut PartState, records: &[OrderRecord]) -> Vec<LineId> {
    let mut changed = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let Some(line) = state.line_mut(record.pk) else {
            continue;
        };
        let order = index as u32;
        if line.order != order {
            line.order = order;
            changed.push(line.pk);
        }
    }
    changed
}

/// Take the bounds of a saved region, returns whether they changed
pub fn apply_block_bounds(block: &mut RegionBlock, record: &BlockRecord) -> bool {
    if block.bounds == record.bounds {
        return false;
    }
    block.bounds = record.bounds.clone();
    true
}
