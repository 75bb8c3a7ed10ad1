//! Command handlers

pub mod config;
pub mod line;
pub mod part;

use tokio::sync::broadcast;

use partsync_core::StoreEvent;

/// First failure reported by the store since the receiver was created
///
/// Recalculations run in the background and only report through events.
fn take_failure(events: &mut broadcast::Receiver<StoreEvent>) -> Option<String> {
    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        if let StoreEvent::Failed { operation, message } = event {
            failure.get_or_insert(format!("{}: {}", operation, message));
        }
    }
    failure
}
