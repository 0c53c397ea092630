use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use uuid::Uuid;

/// One listener's bounded backlog of chunks awaiting network write.
///
/// This is the primitive spec.md §9 calls out as not existing ready-made
/// in a standard library: a bounded queue that, on overflow, evicts the
/// single oldest element rather than blocking the producer or rejecting
/// the new element. The broadcaster must never stall on a slow listener.
pub struct ListenerQueue {
    inner: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl ListenerQueue {
    pub fn new(capacity: usize) -> Self {
        ListenerQueue {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Broadcaster-side dispatch: enqueue if there's room, else drop the
    /// oldest chunk and enqueue. Never blocks.
    pub fn push_or_drop_oldest(&self, chunk: Bytes) {
        {
            let mut queue = self.inner.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
            }
            queue.push_back(chunk);
        }
        self.notify.notify_one();
    }

    /// Listener-join-side prefill from the burst snapshot: pushes chunks
    /// in order until the queue is full or the snapshot is exhausted.
    /// Does not evict — a brand new queue is empty, so there is nothing
    /// stale to preserve recency over.
    pub fn prefill(&self, chunks: impl IntoIterator<Item = Bytes>) {
        let mut queue = self.inner.lock();
        for chunk in chunks {
            if queue.len() >= self.capacity {
                break;
            }
            queue.push_back(chunk);
        }
    }

    /// Blocks (asynchronously) until a chunk is available or the queue
    /// has been closed and drained.
    pub async fn pop(&self) -> Option<Bytes> {
        loop {
            {
                let mut queue = self.inner.lock();
                if let Some(chunk) = queue.pop_front() {
                    return Some(chunk);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Marks the queue as closed. Called by the listener task itself on
    /// teardown (client disconnect, or process shutdown) — the
    /// broadcaster never inspects this flag directly; it only stops
    /// dispatching to a queue once it has been removed from the
    /// registry (see `ListenerRegistry::remove`).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct ListenerEntry {
    queue: Arc<ListenerQueue>,
    joined_at: Instant,
}

/// Set of live listener queues. `dispatch` iterates a lock-free snapshot
/// view (`DashMap::iter`) so it is safe against concurrent `add`/`remove`
/// without the broadcaster ever blocking on registry mutation.
pub struct ListenerRegistry {
    listeners: DashMap<Uuid, ListenerEntry>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        ListenerRegistry {
            listeners: DashMap::new(),
        }
    }

    pub fn add(&self, id: Uuid, queue: Arc<ListenerQueue>) {
        self.listeners.insert(
            id,
            ListenerEntry {
                queue,
                joined_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: &Uuid) {
        self.listeners.remove(id);
    }

    pub fn dispatch(&self, chunk: Bytes) {
        for entry in self.listeners.iter() {
            entry.value().queue.push_or_drop_oldest(chunk.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn close_all(&self) {
        for entry in self.listeners.iter() {
            entry.value().queue.close();
        }
    }

    /// Connection age of every currently-registered listener, for the
    /// operational stats endpoint. Order is unspecified.
    pub fn connection_ages(&self) -> Vec<Duration> {
        self.listeners
            .iter()
            .map(|entry| entry.value().joined_at.elapsed())
            .collect()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
