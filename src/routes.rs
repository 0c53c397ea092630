use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde_json::json;

use crate::listener::ListenerRegistry;
use crate::state::AppState;
use uuid::Uuid;

/// Guarantees `registry.remove(&id)` runs whether the `/stream` body's
/// generator finishes normally or is dropped mid-poll. Hyper/axum drop
/// a response body's stream future outright when a client disconnects
/// — they never poll it to completion — so cleanup that only runs after
/// the generator's loop exits would never fire on a real disconnect.
struct ListenerGuard {
    id: Uuid,
    registry: Arc<ListenerRegistry>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/stream", get(stream_mp3))
        .route("/api/offline-queue", get(offline_queue))
        .route("/api/stats", get(stats))
        .fallback(not_found)
        .with_state(Arc::new(state))
}

/// `GET /` — overall station status, polled by the player UI.
async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let now_playing = state.broadcaster.current_track();

    Json(json!({
        "status": "radio_active",
        "quality": "192kbps",
        "listeners": state.broadcaster.listener_count(),
        "now_playing": now_playing,
        "queue": state.broadcaster.queue_depth(),
    }))
}

/// `GET /stream` — the infinite MP3 body. Registration order is fixed:
/// take the burst snapshot into the new listener's queue, then register
/// it, so no live chunk dispatched after this point can be missed.
async fn stream_mp3(State(state): State<Arc<AppState>>) -> Response {
    let (id, queue) = state.admit_listener();
    let guard = ListenerGuard {
        id,
        registry: state.registry.clone(),
    };

    let body = Body::from_stream(stream! {
        let _guard = guard;
        loop {
            match queue.pop().await {
                Some(chunk) => yield Ok::<_, std::io::Error>(chunk),
                None => break,
            }
        }
    });

    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}

/// `GET /api/offline-queue` — up to 15 tracks sampled without
/// replacement, each enriched with a direct download URL for a client
/// that wants to cache tracks locally instead of streaming live.
async fn offline_queue(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut tracks: Vec<_> = state.catalogue.tracks().to_vec();
    tracks.shuffle(&mut thread_rng());
    tracks.truncate(15);

    let queue: Vec<_> = tracks
        .into_iter()
        .map(|track| {
            let download_url = format!("{}{}", state.source_base, track.filename);
            json!({
                "id": track.id,
                "title": track.title,
                "artist": track.artist,
                "url": track.url,
                "filename": track.filename,
                "weight": track.weight,
                "download_url": download_url,
            })
        })
        .collect();

    Json(json!({ "queue": queue }))
}

/// `GET /api/stats` — operational counters, not part of the playback
/// contract: uptime, cumulative bytes broadcast, and each listener's
/// connection age.
async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let ages: Vec<f64> = state
        .registry
        .connection_ages()
        .into_iter()
        .map(|d| d.as_secs_f64())
        .collect();

    Json(json!({
        "uptime_secs": state.started_at.elapsed().as_secs_f64(),
        "total_bytes_sent": state.broadcaster.total_bytes_sent(),
        "listeners": ages.len(),
        "listener_connection_ages_secs": ages,
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}
