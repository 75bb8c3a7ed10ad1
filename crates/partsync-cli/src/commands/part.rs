//! Part command handlers

use anyhow::{bail, Result};

use partsync_core::models::{LineId, PartId};
use partsync_core::PartStore;

use super::take_failure;
use crate::output::Output;

/// Show the lines of a part in reading order
pub async fn show(store: &PartStore, part: PartId, output: &Output) -> Result<()> {
    store.load_part(part).await?;

    let state = store.snapshot().await;
    let lines = store.lines_in_order().await;
    output.print_part(&state, &lines);

    Ok(())
}

/// Recompute masks now instead of after the quiet period
pub async fn masks(
    store: &PartStore,
    part: PartId,
    only: Vec<LineId>,
    output: &Output,
) -> Result<()> {
    store.load_part(part).await?;
    let requested = only.len();

    let mut events = store.subscribe();
    store.recalculate_masks(only).await?;
    store.flush().await;
    if let Some(failure) = take_failure(&mut events) {
        bail!("Mask recalculation failed ({})", failure);
    }

    let masked = store
        .snapshot()
        .await
        .lines
        .iter()
        .filter(|l| l.mask.is_some())
        .count();
    if requested == 0 {
        output.success(&format!("Recomputed masks of part {} ({} masked lines)", part, masked));
    } else {
        output.success(&format!("Recomputed {} mask(s) of part {}", requested, part));
    }

    Ok(())
}

/// Recompute the reading order now and show the result
pub async fn reorder(store: &PartStore, part: PartId, output: &Output) -> Result<()> {
    store.load_part(part).await?;

    let mut events = store.subscribe();
    store.recalculate_ordering().await?;
    store.flush().await;
    if let Some(failure) = take_failure(&mut events) {
        bail!("Ordering recalculation failed ({})", failure);
    }

    let state = store.snapshot().await;
    let lines = store.lines_in_order().await;
    output.print_part(&state, &lines);

    Ok(())
}
