use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalogue::Track;
use crate::fetcher::Fetcher;
use crate::selector::Selector;

/// A fetched-and-validated (descriptor, local path) pair, ready for the
/// broadcaster to encode.
#[derive(Debug, Clone)]
pub struct ReadyTrack {
    pub track: Track,
    pub path: PathBuf,
}

/// Bounded lookahead buffer of ready tracks, shared between the prefetch
/// worker (producer) and the broadcaster (sole consumer).
pub struct PrefetchQueue {
    inner: Mutex<VecDeque<ReadyTrack>>,
    capacity: usize,
    not_empty: Notify,
}

impl PrefetchQueue {
    pub fn new(capacity: usize) -> Self {
        PrefetchQueue {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Notify::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub(crate) fn push(&self, item: ReadyTrack) {
        self.inner.lock().push_back(item);
        self.not_empty.notify_one();
    }

    /// Blocks (asynchronously) until a ready track is available.
    pub async fn pop(&self) -> ReadyTrack {
        loop {
            if let Some(item) = self.inner.lock().pop_front() {
                return item;
            }
            self.not_empty.notified().await;
        }
    }
}

/// Drives `Selector` + `Fetcher` to keep `queue` topped up. Runs for the
/// lifetime of the process; never returns. A fetch failure drops that
/// cycle's selection (the next bag refill will eventually offer the
/// track again) rather than retrying the same track in a hot loop.
pub async fn run(selector: Arc<Mutex<Selector>>, fetcher: Arc<Fetcher>, queue: Arc<PrefetchQueue>) {
    loop {
        if queue.is_full() {
            sleep(Duration::from_secs(1)).await;
            continue;
        }

        let track = selector.lock().next();

        match fetcher.ensure(&track.filename).await {
            Ok(path) => {
                info!(id = %track.id, title = %track.title, "prefetched track");
                queue.push(ReadyTrack { track, path });
            }
            Err(e) => {
                warn!(id = %track.id, error = %e, "prefetch failed, skipping this cycle");
                sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
