//! End-to-end HTTP surface tests: the axum router wired to a live
//! broadcaster, driven with `cat` as a deterministic stand-in encoder.

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use hopradio::catalogue::{Catalogue, Track};
use hopradio::config::Config;
use hopradio::routes;
use hopradio::state::AppState;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn track(id: &str, filename: &str) -> Track {
    Track {
        id: id.into(),
        title: format!("Title {id}"),
        artist: "Artist".into(),
        url: String::new(),
        filename: filename.into(),
        weight: 1,
    }
}

fn config(cache_dir: PathBuf) -> Config {
    Config {
        cache_dir,
        source_base: "https://example.invalid/tracks/".to_string(),
        catalogue_path: None,
        chunk_size: 4,
        burst_cap: 4,
        listener_queue_cap: 100,
        prefetch_cap: 2,
        min_valid_bytes: 1,
        history_window: 1,
        bind_addr: "0.0.0.0".into(),
        bind_port: 0,
        encoder_bin: "cat".into(),
        fetch_timeout_secs: 5,
    }
}

#[tokio::test]
async fn status_endpoint_reflects_the_live_broadcaster() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.bin"), vec![0u8; 40]).await.unwrap();

    let catalogue = Catalogue::from_tracks(vec![track("a", "a.bin")]).unwrap();
    let cfg = config(dir.path().to_path_buf());
    let (state, selector) = AppState::new(&cfg, catalogue);

    let fetcher = std::sync::Arc::new(hopradio::fetcher::Fetcher::new(
        cfg.cache_dir.clone(),
        cfg.source_base.clone(),
        cfg.min_valid_bytes,
        cfg.fetch_timeout_secs,
    ));
    tokio::spawn(hopradio::prefetch::run(selector, fetcher, state.prefetch.clone()));
    tokio::spawn(state.broadcaster.clone().run());

    // Give the pipeline a moment to pick up and start playing the track.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let app = routes::router(state);
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "radio_active");
    assert_eq!(value["now_playing"]["id"], "a");
}

#[tokio::test]
async fn late_joiner_receives_the_burst_prefix_before_live_chunks() {
    let dir = tempfile::tempdir().unwrap();
    // Long enough that the encoder is still mid-track when the second
    // listener joins.
    tokio::fs::write(dir.path().join("a.bin"), vec![7u8; 4000])
        .await
        .unwrap();

    let catalogue = Catalogue::from_tracks(vec![track("a", "a.bin")]).unwrap();
    let cfg = config(dir.path().to_path_buf());
    let (state, selector) = AppState::new(&cfg, catalogue);

    let fetcher = std::sync::Arc::new(hopradio::fetcher::Fetcher::new(
        cfg.cache_dir.clone(),
        cfg.source_base.clone(),
        cfg.min_valid_bytes,
        cfg.fetch_timeout_secs,
    ));
    tokio::spawn(hopradio::prefetch::run(selector, fetcher, state.prefetch.clone()));
    tokio::spawn(state.broadcaster.clone().run());

    // Let a handful of chunks accumulate in the burst buffer first.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (_id, late_joiner_queue) = state.admit_listener();
    assert!(
        late_joiner_queue.len() > 0,
        "a listener joining mid-track must be pre-filled from the burst buffer"
    );
}

#[tokio::test]
async fn offline_queue_endpoint_attaches_download_urls() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue = Catalogue::from_tracks(vec![
        track("a", "a.bin"),
        track("b", "b.bin"),
        track("c", "c.bin"),
    ])
    .unwrap();
    let cfg = config(dir.path().to_path_buf());
    let (state, _selector) = AppState::new(&cfg, catalogue);

    let app = routes::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/offline-queue")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let queue = value["queue"].as_array().unwrap();
    assert_eq!(queue.len(), 3);
    for entry in queue {
        let url = entry["download_url"].as_str().unwrap();
        assert!(url.starts_with("https://example.invalid/tracks/"));
    }
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue = Catalogue::from_tracks(vec![track("a", "a.bin")]).unwrap();
    let cfg = config(dir.path().to_path_buf());
    let (state, _selector) = AppState::new(&cfg, catalogue);

    let app = routes::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/does-not-exist")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disconnecting_mid_stream_removes_the_listener_from_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    // Long enough that the stream is still mid-track when we disconnect.
    tokio::fs::write(dir.path().join("a.bin"), vec![7u8; 4000])
        .await
        .unwrap();

    let catalogue = Catalogue::from_tracks(vec![track("a", "a.bin")]).unwrap();
    let cfg = config(dir.path().to_path_buf());
    let (state, selector) = AppState::new(&cfg, catalogue);
    let registry = state.registry.clone();

    let fetcher = std::sync::Arc::new(hopradio::fetcher::Fetcher::new(
        cfg.cache_dir.clone(),
        cfg.source_base.clone(),
        cfg.min_valid_bytes,
        cfg.fetch_timeout_secs,
    ));
    tokio::spawn(hopradio::prefetch::run(selector, fetcher, state.prefetch.clone()));
    tokio::spawn(state.broadcaster.clone().run());

    // Let the broadcaster start producing chunks before the listener joins.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let app = routes::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        registry.len(),
        1,
        "the stream handler registers the listener before any bytes are read"
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("first chunk should arrive promptly")
        .expect("body should yield at least one frame before disconnect")
        .expect("frame should not be an error");
    assert!(frame.is_data(), "listener should have received live audio bytes");
    assert_eq!(registry.len(), 1, "listener stays registered mid-stream");

    // Simulate a client disconnecting mid-stream: hyper/axum drop the
    // body's stream future outright rather than polling it to
    // completion, so this is the realistic teardown path.
    drop(body);

    tokio::time::timeout(Duration::from_secs(1), async {
        while registry.len() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listener should be deregistered soon after the stream body is dropped");
}
