use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

/// Bounded ring of the most recently broadcast chunks, replayed to each
/// new listener at join time so playback starts without waiting for the
/// next live chunk. `append` (broadcaster-only) and `snapshot`
/// (listener-join-only) are each O(capacity) and mutually atomic.
pub struct BurstBuffer {
    chunks: Mutex<VecDeque<Bytes>>,
    capacity: usize,
}

impl BurstBuffer {
    pub fn new(capacity: usize) -> Self {
        BurstBuffer {
            chunks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn append(&self, chunk: Bytes) {
        let mut chunks = self.chunks.lock();
        if chunks.len() >= self.capacity {
            chunks.pop_front();
        }
        chunks.push_back(chunk);
    }

    pub fn snapshot(&self) -> Vec<Bytes> {
        self.chunks.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(n: u8) -> Bytes {
        Bytes::from(vec![n])
    }

    #[test]
    fn snapshot_reflects_insertion_order() {
        let buffer = BurstBuffer::new(10);
        for i in 0..5 {
            buffer.append(chunk(i));
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot, vec![chunk(0), chunk(1), chunk(2), chunk(3), chunk(4)]);
    }

    #[test]
    fn ring_evicts_oldest_once_full() {
        let buffer = BurstBuffer::new(3);
        for i in 0..5 {
            buffer.append(chunk(i));
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot, vec![chunk(2), chunk(3), chunk(4)]);
    }

    #[test]
    fn empty_buffer_snapshots_empty() {
        let buffer = BurstBuffer::new(5);
        assert!(buffer.snapshot().is_empty());
    }
}
