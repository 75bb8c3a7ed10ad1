//! Typed client for the part REST service
//!
//! Builds resource paths under `/api/documents/{document}/parts/{part}/`
//! and decodes responses into wire records.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::transport::{ApiRequest, Transport};
use super::wire::{
    BlockPayload, BlockRecord, LinePayload, LineRecord, LinesEnvelope, MaskRecord, OrderRecord,
    Page, PartRecord, TranscriptionPayload, TranscriptionRecord,
};
use crate::error::{SyncError, SyncResult};
use crate::models::{
    BlockId, DocumentId, LineId, LineTranscriptionId, PartId, TranscriptionId, Version,
};

/// REST client for the parts of one document
#[derive(Clone)]
pub struct PartApi {
    transport: Arc<dyn Transport>,
    document: DocumentId,
}

impl PartApi {
    pub fn new(transport: Arc<dyn Transport>, document: DocumentId) -> Self {
        Self {
            transport,
            document,
        }
    }

    /// Root path of a part resource
    pub fn part_root(&self, part: PartId) -> String {
        format!("/api/documents/{}/parts/{}/", self.document, part)
    }

    // ==================== Part ====================

    pub async fn get_part(&self, part: PartId) -> SyncResult<PartRecord> {
        self.fetch(ApiRequest::get(self.part_root(part))).await
    }

    // ==================== Transcriptions ====================

    /// One page of the transcriptions of a layer (pages start at 1)
    pub async fn list_transcriptions(
        &self,
        part: PartId,
        transcription: TranscriptionId,
        page: u32,
    ) -> SyncResult<Page<TranscriptionRecord>> {
        let path = format!(
            "{}transcriptions/?transcription={}&page={}",
            self.part_root(part),
            transcription,
            page
        );
        self.fetch(ApiRequest::get(path)).await
    }

    pub async fn create_transcription(
        &self,
        part: PartId,
        payload: &TranscriptionPayload,
    ) -> SyncResult<TranscriptionRecord> {
        let path = format!("{}transcriptions/", self.part_root(part));
        self.fetch(ApiRequest::post(path, to_body(payload)?)).await
    }

    pub async fn update_transcription(
        &self,
        part: PartId,
        pk: LineTranscriptionId,
        payload: &TranscriptionPayload,
    ) -> SyncResult<TranscriptionRecord> {
        let path = format!("{}transcriptions/{}/", self.part_root(part), pk);
        self.fetch(ApiRequest::put(path, to_body(payload)?)).await
    }

    /// Snapshot the current content of a transcription
    pub async fn new_version(
        &self,
        part: PartId,
        pk: LineTranscriptionId,
    ) -> SyncResult<Version> {
        let path = format!("{}transcriptions/{}/new_version/", self.part_root(part), pk);
        self.fetch(ApiRequest::post(path, empty_body())).await
    }

    // ==================== Lines ====================

    pub async fn create_line(&self, part: PartId, payload: &LinePayload) -> SyncResult<LineRecord> {
        let path = format!("{}lines/", self.part_root(part));
        self.fetch(ApiRequest::post(path, to_body(payload)?)).await
    }

    pub async fn bulk_create_lines(
        &self,
        part: PartId,
        payloads: Vec<LinePayload>,
    ) -> SyncResult<Vec<LineRecord>> {
        let path = format!("{}lines/bulk_create/", self.part_root(part));
        let body = to_body(&LinesEnvelope { lines: payloads })?;
        let envelope: LinesEnvelope<LineRecord> = self.fetch(ApiRequest::post(path, body)).await?;
        Ok(envelope.lines)
    }

    pub async fn update_line(
        &self,
        part: PartId,
        pk: LineId,
        payload: &LinePayload,
    ) -> SyncResult<LineRecord> {
        let path = format!("{}lines/{}/", self.part_root(part), pk);
        self.fetch(ApiRequest::put(path, to_body(payload)?)).await
    }

    pub async fn bulk_update_lines(
        &self,
        part: PartId,
        payloads: Vec<LinePayload>,
    ) -> SyncResult<Vec<LineRecord>> {
        let path = format!("{}lines/bulk_update/", self.part_root(part));
        let body = to_body(&LinesEnvelope { lines: payloads })?;
        let envelope: LinesEnvelope<LineRecord> = self.fetch(ApiRequest::put(path, body)).await?;
        Ok(envelope.lines)
    }

    pub async fn delete_line(&self, part: PartId, pk: LineId) -> SyncResult<()> {
        let path = format!("{}lines/{}/", self.part_root(part), pk);
        self.transport.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    pub async fn bulk_delete_lines(&self, part: PartId, pks: &[LineId]) -> SyncResult<()> {
        let path = format!("{}lines/bulk_delete/", self.part_root(part));
        let body = to_body(&LinesEnvelope {
            lines: pks.to_vec(),
        })?;
        self.transport.send(ApiRequest::post(path, body)).await?;
        Ok(())
    }

    /// Recompute masks, for all lines or only the given ones
    pub async fn reset_masks(&self, part: PartId, only: &[LineId]) -> SyncResult<Vec<MaskRecord>> {
        let mut path = format!("{}reset_masks/", self.part_root(part));
        if !only.is_empty() {
            let keys: Vec<String> = only.iter().map(|pk| pk.to_string()).collect();
            path.push_str("?only=");
            path.push_str(&keys.join(","));
        }
        let envelope: LinesEnvelope<MaskRecord> =
            self.fetch(ApiRequest::post(path, empty_body())).await?;
        Ok(envelope.lines)
    }

    /// Recompute the reading order, lines come back in order
    pub async fn recalculate_ordering(&self, part: PartId) -> SyncResult<Vec<OrderRecord>> {
        let path = format!("{}recalculate_ordering/", self.part_root(part));
        let envelope: LinesEnvelope<OrderRecord> =
            self.fetch(ApiRequest::post(path, empty_body())).await?;
        Ok(envelope.lines)
    }

    // ==================== Blocks ====================

    pub async fn create_block(
        &self,
        part: PartId,
        payload: &BlockPayload,
    ) -> SyncResult<BlockRecord> {
        let path = format!("{}blocks/", self.part_root(part));
        self.fetch(ApiRequest::post(path, to_body(payload)?)).await
    }

    pub async fn update_block(
        &self,
        part: PartId,
        pk: BlockId,
        payload: &BlockPayload,
    ) -> SyncResult<BlockRecord> {
        let path = format!("{}blocks/{}/", self.part_root(part), pk);
        self.fetch(ApiRequest::put(path, to_body(payload)?)).await
    }

    pub async fn delete_block(&self, part: PartId, pk: BlockId) -> SyncResult<()> {
        let path = format!("{}blocks/{}/", self.part_root(part), pk);
        self.transport.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Send a request and decode the response body
    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> SyncResult<T> {
        let path = request.path.clone();
        let value = self.transport.send(request).await?;
        serde_json::from_value(value).map_err(|e| SyncError::malformed(path, e))
    }
}

fn empty_body() -> Value {
    Value::Object(Default::default())
}

fn to_body<T: Serialize>(payload: &T) -> SyncResult<Value> {
    serde_json::to_value(payload).map_err(|e| SyncError::malformed("<request body>", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::Method;
    use crate::error::FailureKind;
    use crate::testing::FakeTransport;
    use serde_json::json;

    fn api(fake: &Arc<FakeTransport>) -> PartApi {
        PartApi::new(fake.clone(), 5)
    }

    #[test]
    fn test_part_root() {
        let fake = Arc::new(FakeTransport::new());
        assert_eq!(api(&fake).part_root(7), "/api/documents/5/parts/7/");
    }

    #[tokio::test]
    async fn test_list_transcriptions_path() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::Get,
            "/api/documents/5/parts/7/transcriptions/?transcription=2&page=3",
            json!({"results": [], "next": null}),
        );

        let page = api(&fake).list_transcriptions(7, 2, 3).await.unwrap();
        assert!(page.results.is_empty());
        assert!(!page.has_next());
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_masks_query() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::Post,
            "/api/documents/5/parts/7/reset_masks/?only=3,9",
            json!({"lines": [{"pk": 3, "mask": [[0, 0], [1, 0], [1, 1]]}]}),
        );
        fake.respond(
            Method::Post,
            "/api/documents/5/parts/7/reset_masks/",
            json!({"lines": []}),
        );

        let only = api(&fake).reset_masks(7, &[3, 9]).await.unwrap();
        assert_eq!(only.len(), 1);
        assert!(only[0].mask.is_some());

        let all = api(&fake).reset_masks(7, &[]).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_create_wraps_lines() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::Post,
            "/api/documents/5/parts/7/lines/bulk_create/",
            json!({"lines": [{"pk": 40}, {"pk": 41}]}),
        );

        let payloads = vec![
            LinePayload {
                document_part: 7,
                pk: None,
                baseline: Some(vec![[0.0, 0.0], [5.0, 0.0]]),
                mask: None,
                block: None,
            };
            2
        ];
        let created = api(&fake).bulk_create_lines(7, payloads).await.unwrap();
        assert_eq!(created.iter().map(|l| l.pk).collect::<Vec<_>>(), vec![40, 41]);

        let sent = &fake.requests()[0];
        assert_eq!(sent.body.as_ref().unwrap()["lines"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_malformed() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::Post,
            "/api/documents/5/parts/7/recalculate_ordering/",
            json!({"detail": "ok"}),
        );

        let err = api(&fake).recalculate_ordering(7).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);
    }

    #[tokio::test]
    async fn test_delete_ignores_empty_body() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::Delete,
            "/api/documents/5/parts/7/blocks/4/",
            serde_json::Value::Null,
        );

        api(&fake).delete_block(7, 4).await.unwrap();
        assert_eq!(fake.requests()[0].method, Method::Delete);
    }
}
