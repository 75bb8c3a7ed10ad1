//! partsync Core Library
//!
//! This crate keeps the client-side state of one document part of a
//! transcription editor (lines, regions, per-line transcriptions and their
//! version history) in step with the part REST service.
//!
//! # Architecture
//!
//! - **PartStore**: holds the active part, applies edits optimistically and
//!   reconciles server responses by key
//! - **Coalescer**: collapses bursts of edits into one mask reset and one
//!   reading order recalculation
//! - **Transport**: the HTTP seam, `reqwest` in production and an in-memory
//!   fake in tests
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = PartStore::from_config(&config)?;
//!
//! store.load_part(12).await?;
//! for line in store.lines_in_order().await {
//!     println!("{}", line.transcription.text());
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: Part state and sync engine (main entry point)
//! - `api`: REST client, wire types and transport
//! - `coalesce`: Trailing-edge debouncing
//! - `differ`: Version diffs and timestamp labels
//! - `models`: Parts, lines, regions and transcriptions
//! - `config`: Application configuration

pub mod api;
pub mod coalesce;
pub mod config;
pub mod differ;
pub mod error;
pub mod models;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::{Credentials, HttpTransport, PartApi, Transport};
pub use config::Config;
pub use differ::{diff, format_timestamp, DiffSpan, SpanKind, VersionDiffer};
pub use error::{FailureKind, SyncError, SyncResult};
pub use models::{Line, LineTranscription, PartState, RegionBlock, Version};
pub use store::{LineField, PartStore, StoreEvent, StoreSettings};
