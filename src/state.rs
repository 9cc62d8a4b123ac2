use std::sync::Arc;

use tokio::sync::broadcast;

use crate::geo::geocoder::{Geocoder, StaticGeocoder};
use crate::models::event::ProgressEvent;
use crate::observability::metrics::Metrics;
use crate::storage::{MemoryObjectStorage, ObjectStorage};
use crate::store::Store;

/// Explicit context handed to every operation: the document store, the
/// external collaborators and the outbound event channel.
pub struct AppState {
    pub store: Store,
    pub geocoder: Arc<dyn Geocoder>,
    pub storage: Arc<dyn ObjectStorage>,
    pub progress_events_tx: broadcast::Sender<ProgressEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        storage: Arc<dyn ObjectStorage>,
        event_buffer_size: usize,
    ) -> Self {
        let (progress_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            store: Store::new(),
            geocoder,
            storage,
            progress_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// State with an empty geocoder table and in-memory evidence storage.
    pub fn in_memory(event_buffer_size: usize) -> Self {
        Self::new(
            Arc::new(StaticGeocoder::new(Vec::new(), 25.0)),
            Arc::new(MemoryObjectStorage::new("memory://evidence")),
            event_buffer_size,
        )
    }

    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.progress_events_tx.send(event);
    }
}
