//! Line command handlers

use anyhow::{Context, Result};
use chrono::Local;

use partsync_core::models::{LineId, PartId};
use partsync_core::{PartStore, VersionDiffer};

use crate::output::{HistoryEntry, Output};

/// Show the versions of a line, each diffed against the one before it
pub async fn history(store: &PartStore, part: PartId, line: LineId, output: &Output) -> Result<()> {
    store.load_part(part).await?;
    let held = store
        .line(line)
        .await
        .with_context(|| format!("Line #{} is not part of part {}", line, part))?;

    let mut differ = VersionDiffer::new(Local);
    let versions = &held.transcription.versions;
    let mut entries = Vec::with_capacity(versions.len());
    for (index, version) in versions.iter().enumerate() {
        // newest first, so the older version follows
        let previous = versions.get(index + 1);
        entries.push(HistoryEntry {
            revision: &version.revision,
            label: differ.label(version),
            author: version.author.as_deref(),
            content: version.content(),
            spans: differ.compare(previous, version).to_vec(),
        });
    }

    output.print_history(&held, &entries);
    Ok(())
}

/// Save new content for a line, optionally snapshotting it
pub async fn set_text(
    store: &PartStore,
    part: PartId,
    line: LineId,
    text: String,
    snapshot: bool,
    output: &Output,
) -> Result<()> {
    store.load_part(part).await?;
    let mut transcription = store
        .line(line)
        .await
        .with_context(|| format!("Line #{} is not part of part {}", line, part))?
        .transcription;

    let created = !transcription.is_saved();
    transcription.content = text;
    store.push_transcription(transcription).await?;

    let version = if snapshot {
        store.push_version(line).await?
    } else {
        None
    };

    let action = if created { "Created" } else { "Updated" };
    match version {
        Some(version) => output.success(&format!(
            "{} transcription of line #{} (version {})",
            action, line, version.revision
        )),
        None => output.success(&format!("{} transcription of line #{}", action, line)),
    }

    Ok(())
}
