use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::burst::BurstBuffer;
use crate::catalogue::Catalogue;
use crate::config::Config;
use crate::listener::{ListenerQueue, ListenerRegistry};
use crate::prefetch::PrefetchQueue;
use crate::selector::Selector;

/// Everything the HTTP surface needs, bundled behind one `Arc` and
/// constructed once at startup. Replaces the module-level globals
/// (`CLIENTS`, `BURST_BUFFER`, `CURRENT_TRACK_INFO`, `READY_TRACKS`,
/// `SHUFFLE_BAG`) the original implementation kept as process globals.
#[derive(Clone)]
pub struct AppState {
    pub catalogue: Arc<Catalogue>,
    pub burst: Arc<BurstBuffer>,
    pub registry: Arc<ListenerRegistry>,
    pub prefetch: Arc<PrefetchQueue>,
    pub broadcaster: Arc<crate::broadcaster::Broadcaster>,
    pub listener_queue_cap: usize,
    pub source_base: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &Config, catalogue: Catalogue) -> (Self, Arc<Mutex<Selector>>) {
        let catalogue = Arc::new(catalogue);
        let burst = Arc::new(BurstBuffer::new(config.burst_cap));
        let registry = Arc::new(ListenerRegistry::new());
        let prefetch = Arc::new(PrefetchQueue::new(config.prefetch_cap));

        let broadcaster = Arc::new(crate::broadcaster::Broadcaster::new(
            prefetch.clone(),
            burst.clone(),
            registry.clone(),
            config.encoder_bin.clone(),
            config.chunk_size,
        ));

        let selector = Arc::new(Mutex::new(Selector::new(
            (*catalogue).clone(),
            config.history_window,
        )));

        (
            AppState {
                catalogue,
                burst,
                registry,
                prefetch,
                broadcaster,
                listener_queue_cap: config.listener_queue_cap,
                source_base: config.source_base.clone(),
                started_at: Instant::now(),
            },
            selector,
        )
    }

    /// Registers a new listener, prefilling its queue from the burst
    /// snapshot before adding it to the registry — the "snapshot then
    /// register" ordering fixed by the design so no live chunk is ever
    /// skipped between a listener's snapshot and its first dispatch.
    pub fn admit_listener(&self) -> (Uuid, Arc<ListenerQueue>) {
        let id = Uuid::new_v4();
        let queue = Arc::new(ListenerQueue::new(self.listener_queue_cap));

        queue.prefill(self.burst.snapshot());
        self.registry.add(id, queue.clone());

        (id, queue)
    }
}
