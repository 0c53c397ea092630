use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::burst::BurstBuffer;
use crate::catalogue::Track;
use crate::encoder::EncoderHandle;
use crate::listener::ListenerRegistry;
use crate::prefetch::PrefetchQueue;

/// The single never-failing task that drives the encoder and fans its
/// output out to every connected listener. No error encountered inside
/// the loop is allowed to stop it; the only planned exit is a shutdown
/// signal sent from `main.rs` on process termination.
pub struct Broadcaster {
    queue: Arc<PrefetchQueue>,
    burst: Arc<BurstBuffer>,
    registry: Arc<ListenerRegistry>,
    current_track: ArcSwap<Option<Track>>,
    total_bytes_sent: AtomicU64,
    encoder_bin: String,
    chunk_size: usize,
    shutdown_tx: broadcast::Sender<()>,
}

impl Broadcaster {
    pub fn new(
        queue: Arc<PrefetchQueue>,
        burst: Arc<BurstBuffer>,
        registry: Arc<ListenerRegistry>,
        encoder_bin: String,
        chunk_size: usize,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Broadcaster {
            queue,
            burst,
            registry,
            current_track: ArcSwap::from_pointee(None),
            total_bytes_sent: AtomicU64::new(0),
            encoder_bin,
            chunk_size,
            shutdown_tx,
        }
    }

    /// Signals the running broadcaster loop to stop after the current
    /// chunk, kill its encoder child, and close every listener queue so
    /// their stream tasks unwind instead of hanging forever.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.registry.close_all();
    }

    pub fn current_track(&self) -> Option<Track> {
        (**self.current_track.load()).clone()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.total_bytes_sent.load(Ordering::Relaxed)
    }

    /// Runs until a shutdown signal arrives. Intended to be spawned once
    /// at startup and left to run for process lifetime.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();

        loop {
            let ready = tokio::select! {
                ready = self.queue.pop() => ready,
                _ = shutdown.recv() => {
                    info!("broadcaster received shutdown signal, stopping");
                    return;
                }
            };

            self.current_track.store(Arc::new(Some(ready.track.clone())));
            info!(id = %ready.track.id, title = %ready.track.title, "now playing");

            match EncoderHandle::spawn(&self.encoder_bin, &ready.path) {
                Ok(mut encoder) => {
                    let mut bytes_sent = 0u64;
                    let shut_down = loop {
                        tokio::select! {
                            chunk = encoder.read_chunk(self.chunk_size) => {
                                match chunk {
                                    Ok(Some(bytes)) => {
                                        bytes_sent += bytes.len() as u64;
                                        self.total_bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                                        let chunk = Bytes::from(bytes);
                                        self.burst.append(chunk.clone());
                                        self.registry.dispatch(chunk);
                                    }
                                    Ok(None) => break false,
                                    Err(e) => {
                                        warn!(error = %e, "error reading encoder stdout, ending track early");
                                        break false;
                                    }
                                }
                            }
                            _ = shutdown.recv() => break true,
                        }
                    };

                    if shut_down {
                        info!("broadcaster received shutdown signal, killing encoder");
                        encoder.kill().await;
                        return;
                    }

                    encoder.reap().await;

                    if bytes_sent == 0 {
                        warn!(id = %ready.track.id, "encoder produced no bytes");
                        sleep(Duration::from_secs(1)).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, id = %ready.track.id, "failed to spawn encoder");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
