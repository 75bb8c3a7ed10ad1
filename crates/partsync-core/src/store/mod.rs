//! Part store
//!
//! The `PartStore` holds the in-memory state of the active document part
//! and keeps it in step with the REST service:
//!
//! 1. A mutation is applied locally first when there is something to apply
//!    (geometry edits, transcription content)
//! 2. The request is sent
//! 3. The response is reconciled back by key
//! 4. Structural side effects (masks, reading order) are scheduled on two
//!    coalescers so bursts of edits cost one request each
//!
//! Failures are reported once (log + `StoreEvent::Failed`) and returned.
//! Nothing is retried and optimistic changes are never rolled back.
//!
//! ## Usage
//!
//! ```ignore
//! let store = PartStore::new(api, layer, StoreSettings::default());
//! let mut events = store.subscribe();
//! store.load_part(12).await?;
//! store.update_line(LineUpdate { pk: 3, baseline, mask: None, region: None }).await?;
//! ```

mod events;
pub mod reconcile;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::api::wire::{BlockPayload, LinePayload, TranscriptionPayload};
use crate::api::{Credentials, HttpTransport, PartApi};
use crate::coalesce::Coalescer;
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::models::{
    BlockId, Line, LineId, LineTranscription, LineUpdate, NewLine, NewRegion, PartId, PartState,
    RegionBlock, RegionUpdate, TranscriptionId, Version,
};

pub use events::{LineField, StoreEvent};

/// Tunables for a part store
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Quiet period before masks are recomputed
    pub mask_window: Duration,
    /// Quiet period before the reading order is recomputed
    pub ordering_window: Duration,
    /// Events buffered per subscriber before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            mask_window: Duration::from_millis(1500),
            ordering_window: Duration::from_millis(3000),
            event_capacity: 256,
        }
    }
}

/// Arguments of a coalesced mask reset
#[derive(Debug, Clone, PartialEq)]
struct MaskJob {
    part: PartId,
    /// Lines to recompute, all when empty
    only: Vec<LineId>,
}

struct StoreInner {
    api: PartApi,
    state: Mutex<PartState>,
    events: broadcast::Sender<StoreEvent>,
    settings: StoreSettings,
    masks: OnceLock<Coalescer<MaskJob>>,
    ordering: OnceLock<Coalescer<PartId>>,
    disposed: AtomicBool,
}

/// State and sync engine for one document part
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct PartStore {
    inner: Arc<StoreInner>,
}

impl PartStore {
    /// Create an unloaded store showing the given transcription layer
    pub fn new(api: PartApi, transcription: TranscriptionId, settings: StoreSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                api,
                state: Mutex::new(PartState::new(transcription)),
                events,
                settings,
                masks: OnceLock::new(),
                ordering: OnceLock::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a store talking HTTP to the configured server
    pub fn from_config(config: &Config) -> Result<Self> {
        let document = config
            .document_id
            .context("No document configured (set document_id or PARTSYNC_DOCUMENT)")?;
        let transcription = config.transcription.context(
            "No transcription layer configured (set transcription or PARTSYNC_TRANSCRIPTION)",
        )?;

        let credentials = Credentials {
            csrf_token: config.csrf_token.clone(),
            session_id: config.session_id.clone(),
        };
        let transport = HttpTransport::new(
            &config.server_url,
            credentials,
            Duration::from_secs(config.request_timeout_secs),
        )
        .context("Failed to create HTTP client")?;

        let api = PartApi::new(Arc::new(transport), document);
        Ok(Self::new(api, transcription, config.store_settings()))
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn api(&self) -> &PartApi {
        &self.inner.api
    }

    // ==================== Reads ====================

    /// Copy of the current state
    pub async fn snapshot(&self) -> PartState {
        self.inner.state.lock().await.clone()
    }

    pub async fn line(&self, pk: LineId) -> Option<Line> {
        self.inner.state.lock().await.line(pk).cloned()
    }

    pub async fn lines_in_order(&self) -> Vec<Line> {
        let state = self.inner.state.lock().await;
        state.lines_in_order().into_iter().cloned().collect()
    }

    pub async fn selected_transcription(&self) -> TranscriptionId {
        self.inner.state.lock().await.selected_transcription
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.state.lock().await.is_loaded()
    }

    // ==================== Lifecycle ====================

    /// Load a part, replacing whatever is held
    pub async fn load_part(&self, pk: PartId) -> SyncResult<()> {
        self.fetch(Some(pk)).await
    }

    /// Fetch a part (the current one when `pk` is `None`) and its transcriptions
    ///
    /// Concurrent fetches are not cancelled; the last response to arrive wins.
    pub async fn fetch(&self, pk: Option<PartId>) -> SyncResult<()> {
        const OP: &str = "fetch";
        self.inner.ensure_open(OP)?;

        let target = match pk {
            Some(pk) => pk,
            None => self.inner.loaded_pk(OP).await?,
        };

        let record = self
            .inner
            .api
            .get_part(target)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        {
            let mut state = self.inner.state.lock().await;
            let pk = record.pk;
            reconcile::load_part(&mut state, record);
            info!(
                "Loaded part {} ({} lines, {} regions)",
                pk,
                state.lines.len(),
                state.blocks.len()
            );
            self.inner.emit(StoreEvent::PartLoaded(pk));
        }

        self.fetch_transcriptions().await
    }

    /// Load the previous part, `false` when there is none
    pub async fn get_previous(&self) -> SyncResult<bool> {
        let previous = {
            let state = self.inner.state.lock().await;
            state.has_previous().then_some(state.previous).flatten()
        };
        match previous {
            Some(pk) => self.fetch(Some(pk)).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Load the next part, `false` when there is none
    pub async fn get_next(&self) -> SyncResult<bool> {
        let next = {
            let state = self.inner.state.lock().await;
            state.has_next().then_some(state.next).flatten()
        };
        match next {
            Some(pk) => self.fetch(Some(pk)).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Stop the coalescers and return to the unloaded state
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(masks) = self.inner.masks.get() {
            masks.close();
        }
        if let Some(ordering) = self.inner.ordering.get() {
            ordering.close();
        }

        let mut state = self.inner.state.lock().await;
        *state = PartState::new(state.selected_transcription);
        debug!("Part store disposed");
        self.inner.emit(StoreEvent::Disposed);
    }

    /// Fire pending mask and ordering recalculations now
    pub async fn flush(&self) {
        if let Some(masks) = self.inner.masks.get() {
            masks.flush().await;
        }
        if let Some(ordering) = self.inner.ordering.get() {
            ordering.flush().await;
        }
    }

    // ==================== Transcriptions ====================

    /// Reset every line to a placeholder, then load the selected layer page by page
    pub async fn fetch_transcriptions(&self) -> SyncResult<()> {
        const OP: &str = "fetch_transcriptions";

        let (part, layer) = {
            let mut state = self.inner.state.lock().await;
            let Some(part) = state.pk else {
                return Err(self.inner.report(OP, SyncError::NotLoaded));
            };
            reconcile::reset_transcriptions(&mut state);
            self.inner.emit(StoreEvent::TranscriptionsReset);
            (part, state.selected_transcription)
        };

        let mut page = 1;
        loop {
            let records = self
                .inner
                .api
                .list_transcriptions(part, layer, page)
                .await
                .map_err(|e| self.inner.report(OP, e))?;
            let has_next = records.has_next();

            {
                let Some(mut state) = self.inner.lock_part(part).await else {
                    return Ok(());
                };
                if state.selected_transcription != layer {
                    debug!("Layer changed while fetching layer {}, stopping", layer);
                    return Ok(());
                }
                for record in records.results {
                    if let Some(line) = reconcile::apply_transcription(&mut state, record) {
                        self.inner.emit(StoreEvent::LineChanged {
                            line,
                            field: LineField::Transcription,
                        });
                    }
                }
            }

            if !has_next {
                break;
            }
            page += 1;
        }

        debug!("Loaded layer {} of part {} in {} page(s)", layer, part, page);
        Ok(())
    }

    /// Switch the transcription layer and reload every line's transcription
    pub async fn change_transcription(&self, transcription: TranscriptionId) -> SyncResult<()> {
        let loaded = {
            let mut state = self.inner.state.lock().await;
            state.selected_transcription = transcription;
            self.inner.emit(StoreEvent::LayerChanged(transcription));
            state.is_loaded()
        };
        if !loaded {
            return Ok(());
        }
        self.fetch_transcriptions().await
    }

    /// Snapshot a line's saved transcription as a new version
    ///
    /// Returns `None` without sending anything when the transcription was
    /// never saved.
    pub async fn push_version(&self, line: LineId) -> SyncResult<Option<Version>> {
        const OP: &str = "push_version";
        let part = self.inner.loaded_pk(OP).await?;

        let pk = {
            let state = self.inner.state.lock().await;
            let Some(held) = state.line(line) else {
                return Err(self.inner.report(OP, SyncError::UnknownLine(line)));
            };
            match held.transcription.pk {
                Some(pk) => pk,
                None => return Ok(None),
            }
        };

        let version = self
            .inner
            .api
            .new_version(part, pk)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        if let Some(mut state) = self.inner.lock_part(part).await {
            if let Some(held) = state.line_mut(line) {
                if held.transcription.pk == Some(pk) {
                    held.transcription.prepend_version(version.clone());
                    self.inner.emit(StoreEvent::LineChanged {
                        line,
                        field: LineField::Versions,
                    });
                }
            }
        }

        Ok(Some(version))
    }

    /// Save a transcription, creating it on first save
    ///
    /// The content is applied to the held line before the request. On
    /// success key, content and version history are taken from the server.
    pub async fn push_transcription(
        &self,
        transcription: LineTranscription,
    ) -> SyncResult<LineTranscription> {
        const OP: &str = "push_transcription";
        let part = self.inner.loaded_pk(OP).await?;
        let line = transcription.line;

        let saved_pk = {
            let mut state = self.inner.state.lock().await;
            let Some(held) = state.line_mut(line) else {
                return Err(self.inner.report(OP, SyncError::UnknownLine(line)));
            };
            let held = &mut held.transcription;
            if held.transcription != transcription.transcription {
                transcription.pk
            } else {
                if held.content != transcription.content {
                    held.content = transcription.content.clone();
                    self.inner.emit(StoreEvent::LineChanged {
                        line,
                        field: LineField::Transcription,
                    });
                }
                transcription.pk.or(held.pk)
            }
        };

        let payload = TranscriptionPayload {
            line,
            transcription: transcription.transcription,
            content: transcription.content.clone(),
        };
        let response = match saved_pk {
            Some(pk) => self.inner.api.update_transcription(part, pk, &payload).await,
            None => self.inner.api.create_transcription(part, &payload).await,
        };
        let record = response.map_err(|e| self.inner.report(OP, e))?;

        let mut saved = transcription;
        reconcile::apply_saved_transcription(&mut saved, record.clone());

        if let Some(mut state) = self.inner.lock_part(part).await {
            if let Some(held) = state.line_mut(line) {
                if held.transcription.transcription == saved.transcription {
                    reconcile::apply_saved_transcription(&mut held.transcription, record);
                    self.inner.emit(StoreEvent::LineChanged {
                        line,
                        field: LineField::Transcription,
                    });
                    self.inner.emit(StoreEvent::LineChanged {
                        line,
                        field: LineField::Versions,
                    });
                }
            }
        }

        Ok(saved)
    }

    /// Put a version's content back into the line's transcription
    ///
    /// Local only; persist it with `push_transcription`.
    pub async fn restore_version(&self, line: LineId, revision: &str) -> SyncResult<String> {
        const OP: &str = "restore_version";
        let mut state = self.inner.state.lock().await;
        let Some(held) = state.line_mut(line) else {
            return Err(self.inner.report(OP, SyncError::UnknownLine(line)));
        };
        let Some(content) = held
            .transcription
            .version(revision)
            .map(|v| v.content().to_string())
        else {
            return Err(self.inner.report(
                OP,
                SyncError::UnknownVersion {
                    line,
                    revision: revision.to_string(),
                },
            ));
        };

        held.transcription.content = content.clone();
        self.inner.emit(StoreEvent::LineChanged {
            line,
            field: LineField::Transcription,
        });
        Ok(content)
    }

    // ==================== Lines ====================

    /// Create a line and append it once the server assigned its key
    pub async fn create_line(&self, line: NewLine) -> SyncResult<Line> {
        const OP: &str = "create_line";
        let part = self.inner.loaded_pk(OP).await?;

        let payload = LinePayload {
            document_part: part,
            pk: None,
            baseline: line.baseline,
            mask: line.mask,
            block: line.region,
        };
        let record = self
            .inner
            .api
            .create_line(part, &payload)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        let Some(mut state) = self.inner.lock_part(part).await else {
            let layer = self.selected_transcription().await;
            return Ok(reconcile::line_from_record(record, layer));
        };
        let had_masks = state.has_masks();
        let created = reconcile::line_from_record(record, state.selected_transcription);
        state.lines.push(created.clone());
        self.inner.emit(StoreEvent::LineAdded(created.pk));
        drop(state);

        self.inner.schedule_ordering(part);
        if had_masks {
            self.inner.schedule_masks(part, Vec::new());
        }
        Ok(created)
    }

    /// Create several lines in one request
    ///
    /// Results are matched to inputs by position; the returned lines are in
    /// input order.
    pub async fn bulk_create_lines(&self, lines: Vec<NewLine>) -> SyncResult<Vec<Line>> {
        const OP: &str = "bulk_create_lines";
        let part = self.inner.loaded_pk(OP).await?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let expected = lines.len();
        let payloads = lines
            .into_iter()
            .map(|l| LinePayload {
                document_part: part,
                pk: None,
                baseline: l.baseline,
                mask: l.mask,
                block: l.region,
            })
            .collect();
        let records = self
            .inner
            .api
            .bulk_create_lines(part, payloads)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        if records.len() != expected {
            let err = SyncError::malformed(
                format!("{}lines/bulk_create/", self.inner.api.part_root(part)),
                format!("{} lines created for {} requested", records.len(), expected),
            );
            return Err(self.inner.report(OP, err));
        }

        let Some(mut state) = self.inner.lock_part(part).await else {
            let layer = self.selected_transcription().await;
            return Ok(records
                .into_iter()
                .map(|r| reconcile::line_from_record(r, layer))
                .collect());
        };
        let had_masks = state.has_masks();
        let layer = state.selected_transcription;
        let created: Vec<Line> = records
            .into_iter()
            .map(|r| reconcile::line_from_record(r, layer))
            .collect();
        for line in &created {
            state.lines.push(line.clone());
            self.inner.emit(StoreEvent::LineAdded(line.pk));
        }
        drop(state);

        self.inner.schedule_ordering(part);
        if had_masks {
            self.inner.schedule_masks(part, created.iter().map(|l| l.pk).collect());
        }
        Ok(created)
    }

    /// Change a line's geometry
    ///
    /// The new geometry is applied locally before sending and stays even
    /// if the request fails.
    pub async fn update_line(&self, update: LineUpdate) -> SyncResult<Line> {
        const OP: &str = "update_line";
        let part = self.inner.loaded_pk(OP).await?;
        let pk = update.pk;

        let had_masks = {
            let mut state = self.inner.state.lock().await;
            let had_masks = state.has_masks();
            let Some(line) = state.line_mut(pk) else {
                return Err(self.inner.report(OP, SyncError::UnknownLine(pk)));
            };
            for field in reconcile::apply_line_update(line, &update) {
                self.inner.emit(StoreEvent::LineChanged { line: pk, field });
            }
            had_masks
        };

        let payload = LinePayload {
            document_part: part,
            pk: None,
            baseline: update.baseline,
            mask: update.mask,
            block: update.region,
        };
        let record = self
            .inner
            .api
            .update_line(part, pk, &payload)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        let updated = match self.inner.lock_part(part).await {
            Some(mut state) => state.line_mut(pk).map(|line| {
                for field in reconcile::apply_line_geometry(line, &record) {
                    self.inner.emit(StoreEvent::LineChanged { line: pk, field });
                }
                line.clone()
            }),
            None => None,
        };
        let updated = match updated {
            Some(line) => line,
            None => {
                let layer = self.selected_transcription().await;
                reconcile::line_from_record(record, layer)
            }
        };

        if had_masks {
            self.inner.schedule_masks(part, vec![pk]);
        }
        Ok(updated)
    }

    /// Change the geometry of several lines in one request
    pub async fn bulk_update_lines(&self, updates: Vec<LineUpdate>) -> SyncResult<Vec<Line>> {
        const OP: &str = "bulk_update_lines";
        let part = self.inner.loaded_pk(OP).await?;
        if updates.is_empty() {
            return Ok(Vec::new());
        }

        let had_masks = {
            let mut state = self.inner.state.lock().await;
            if let Some(missing) = updates.iter().find(|u| state.line(u.pk).is_none()) {
                return Err(self.inner.report(OP, SyncError::UnknownLine(missing.pk)));
            }
            let had_masks = state.has_masks();
            for update in &updates {
                if let Some(line) = state.line_mut(update.pk) {
                    for field in reconcile::apply_line_update(line, update) {
                        self.inner.emit(StoreEvent::LineChanged {
                            line: update.pk,
                            field,
                        });
                    }
                }
            }
            had_masks
        };

        let payloads = updates
            .into_iter()
            .map(|u| LinePayload {
                document_part: part,
                pk: Some(u.pk),
                baseline: u.baseline,
                mask: u.mask,
                block: u.region,
            })
            .collect();
        let records = self
            .inner
            .api
            .bulk_update_lines(part, payloads)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        let Some(mut state) = self.inner.lock_part(part).await else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::with_capacity(records.len());
        for record in &records {
            let Some(line) = state.line_mut(record.pk) else {
                continue;
            };
            for field in reconcile::apply_line_geometry(line, record) {
                self.inner.emit(StoreEvent::LineChanged {
                    line: record.pk,
                    field,
                });
            }
            updated.push(line.clone());
        }
        drop(state);

        if had_masks && !updated.is_empty() {
            self.inner.schedule_masks(part, updated.iter().map(|l| l.pk).collect());
        }
        Ok(updated)
    }

    /// Delete a line; it is removed locally once the server confirmed
    pub async fn delete_line(&self, pk: LineId) -> SyncResult<()> {
        const OP: &str = "delete_line";
        let part = self.inner.loaded_pk(OP).await?;

        self.inner
            .api
            .delete_line(part, pk)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        if let Some(mut state) = self.inner.lock_part(part).await {
            if let Some(index) = state.lines.iter().position(|l| l.pk == pk) {
                state.lines.remove(index);
                self.inner.emit(StoreEvent::LineRemoved(pk));
            }
        }

        self.inner.schedule_ordering(part);
        Ok(())
    }

    /// Delete several lines, returns the keys removed locally
    pub async fn bulk_delete_lines(&self, pks: Vec<LineId>) -> SyncResult<Vec<LineId>> {
        const OP: &str = "bulk_delete_lines";
        let part = self.inner.loaded_pk(OP).await?;
        if pks.is_empty() {
            return Ok(Vec::new());
        }

        self.inner
            .api
            .bulk_delete_lines(part, &pks)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        let mut deleted = Vec::new();
        if let Some(mut state) = self.inner.lock_part(part).await {
            for pk in pks {
                if let Some(index) = state.lines.iter().position(|l| l.pk == pk) {
                    state.lines.remove(index);
                    self.inner.emit(StoreEvent::LineRemoved(pk));
                    deleted.push(pk);
                }
            }
        }

        self.inner.schedule_ordering(part);
        Ok(deleted)
    }

    /// Schedule a mask recomputation (all lines when `only` is empty)
    pub async fn recalculate_masks(&self, only: Vec<LineId>) -> SyncResult<()> {
        let part = self.inner.loaded_pk("recalculate_masks").await?;
        self.inner.schedule_masks(part, only);
        Ok(())
    }

    /// Schedule a reading order recomputation
    pub async fn recalculate_ordering(&self) -> SyncResult<()> {
        let part = self.inner.loaded_pk("recalculate_ordering").await?;
        self.inner.schedule_ordering(part);
        Ok(())
    }

    // ==================== Regions ====================

    pub async fn create_region(&self, region: NewRegion) -> SyncResult<RegionBlock> {
        const OP: &str = "create_region";
        let part = self.inner.loaded_pk(OP).await?;

        let payload = BlockPayload {
            document_part: part,
            bounds: region.bounds,
        };
        let record = self
            .inner
            .api
            .create_block(part, &payload)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        let block = reconcile::block_from_record(record);
        if let Some(mut state) = self.inner.lock_part(part).await {
            state.blocks.push(block.clone());
            self.inner.emit(StoreEvent::RegionAdded(block.pk));
        }
        Ok(block)
    }

    /// Change a region's bounds, applied locally before sending
    pub async fn update_region(&self, update: RegionUpdate) -> SyncResult<RegionBlock> {
        const OP: &str = "update_region";
        let part = self.inner.loaded_pk(OP).await?;
        let pk = update.pk;

        {
            let mut state = self.inner.state.lock().await;
            let Some(block) = state.block_mut(pk) else {
                return Err(self.inner.report(OP, SyncError::UnknownRegion(pk)));
            };
            if block.bounds != update.bounds {
                block.bounds = update.bounds.clone();
                self.inner.emit(StoreEvent::RegionChanged(pk));
            }
        }

        let payload = BlockPayload {
            document_part: part,
            bounds: update.bounds,
        };
        let record = self
            .inner
            .api
            .update_block(part, pk, &payload)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        if let Some(mut state) = self.inner.lock_part(part).await {
            if let Some(block) = state.block_mut(pk) {
                if reconcile::apply_block_bounds(block, &record) {
                    self.inner.emit(StoreEvent::RegionChanged(pk));
                }
                return Ok(block.clone());
            }
        }
        Ok(reconcile::block_from_record(record))
    }

    /// Delete a region, returns the removed block if it was held
    ///
    /// Lines inside the region are not touched.
    pub async fn delete_region(&self, pk: BlockId) -> SyncResult<Option<RegionBlock>> {
        const OP: &str = "delete_region";
        let part = self.inner.loaded_pk(OP).await?;

        self.inner
            .api
            .delete_block(part, pk)
            .await
            .map_err(|e| self.inner.report(OP, e))?;

        let Some(mut state) = self.inner.lock_part(part).await else {
            return Ok(None);
        };
        let Some(index) = state.blocks.iter().position(|b| b.pk == pk) else {
            return Ok(None);
        };
        let removed = state.blocks.remove(index);
        self.inner.emit(StoreEvent::RegionRemoved(pk));
        Ok(Some(removed))
    }
}

impl StoreInner {
    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    /// Log a failure, notify subscribers, and hand the error back
    fn report(&self, operation: &'static str, error: SyncError) -> SyncError {
        warn!("{} failed: {}", operation, error);
        self.emit(StoreEvent::Failed {
            operation,
            message: error.to_string(),
        });
        error
    }

    fn ensure_open(&self, operation: &'static str) -> SyncResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(self.report(operation, SyncError::Closed));
        }
        Ok(())
    }

    /// Key of the loaded part
    async fn loaded_pk(&self, operation: &'static str) -> SyncResult<PartId> {
        self.ensure_open(operation)?;
        let pk = self.state.lock().await.pk;
        pk.ok_or_else(|| self.report(operation, SyncError::NotLoaded))
    }

    /// Lock the state if `part` is still the loaded part
    async fn lock_part(&self, part: PartId) -> Option<MutexGuard<'_, PartState>> {
        let state = self.state.lock().await;
        if state.pk == Some(part) {
            Some(state)
        } else {
            debug!("Part {} is no longer loaded, dropping response", part);
            None
        }
    }

    fn schedule_masks(self: &Arc<Self>, part: PartId, only: Vec<LineId>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.masks().trigger(MaskJob { part, only });
    }

    fn schedule_ordering(self: &Arc<Self>, part: PartId) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.ordering().trigger(part);
    }

    fn masks(self: &Arc<Self>) -> &Coalescer<MaskJob> {
        self.masks.get_or_init(|| {
            let weak = Arc::downgrade(self);
            Coalescer::new("mask", self.settings.mask_window, move |job: MaskJob| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.reset_masks(job).await;
                    }
                }
            })
        })
    }

    fn ordering(self: &Arc<Self>) -> &Coalescer<PartId> {
        self.ordering.get_or_init(|| {
            let weak = Arc::downgrade(self);
            Coalescer::new("ordering", self.settings.ordering_window, move |part: PartId| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.recalculate_ordering(part).await;
                    }
                }
            })
        })
    }

    async fn reset_masks(&self, job: MaskJob) {
        let records = match self.api.reset_masks(job.part, &job.only).await {
            Ok(records) => records,
            Err(e) => {
                self.report("recalculate_masks", e);
                return;
            }
        };

        let Some(mut state) = self.lock_part(job.part).await else {
            return;
        };
        for line in reconcile::apply_masks(&mut state, records) {
            self.emit(StoreEvent::LineChanged {
                line,
                field: LineField::Mask,
            });
        }
    }

    async fn recalculate_ordering(&self, part: PartId) {
        let records = match self.api.recalculate_ordering(part).await {
            Ok(records) => records,
            Err(e) => {
                self.report("recalculate_ordering", e);
                return;
            }
        };

        let Some(mut state) = self.lock_part(part).await else {
            return;
        };
        for line in reconcile::apply_ordering(&mut state, &records) {
            self.emit(StoreEvent::LineChanged {
                line,
                field: LineField::Order,
            });
        }
    }
}
