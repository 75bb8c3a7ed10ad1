//! REST access to document parts
//!
//! ## Resources
//!
//! All paths live under `/api/documents/{document}/parts/{part}/`:
//! `lines/` (plus `bulk_create/`, `bulk_update/`, `bulk_delete/`),
//! `blocks/`, `transcriptions/` (paginated, filtered by layer),
//! `transcriptions/{pk}/new_version/`, `reset_masks/` and
//! `recalculate_ordering/`.
//!
//! ## Usage
//!
//! ```ignore
//! let transport = HttpTransport::new("https://host", credentials, timeout)?;
//! let api = PartApi::new(Arc::new(transport), document_id);
//! let part = api.get_part(12).await?;
//! ```

mod client;
mod transport;
pub mod wire;

pub use client::PartApi;
pub use transport::{ApiRequest, Credentials, HttpTransport, Method, Transport, CSRF_HEADER};
