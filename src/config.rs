use std::env;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Runtime configuration, loaded once at startup from the environment.
///
/// Every knob here corresponds to a configuration option named in the
/// broadcast pipeline design: cache directory, source base URL, catalogue
/// location, and the tunables governing chunking, burst depth, listener
/// backlog, prefetch lookahead, cache validation, and no-repeat history.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub source_base: String,
    pub catalogue_path: Option<PathBuf>,

    pub chunk_size: usize,
    pub burst_cap: usize,
    pub listener_queue_cap: usize,
    pub prefetch_cap: usize,
    pub min_valid_bytes: u64,
    pub history_window: usize,

    pub bind_addr: String,
    pub bind_port: u16,

    pub encoder_bin: String,
    pub fetch_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let source_base = env::var("SOURCE_BASE")
            .map_err(|_| AppError::Config("SOURCE_BASE environment variable must be set".into()))?;

        Ok(Config {
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("tracks")),
            source_base,
            catalogue_path: env::var("CATALOGUE_PATH").ok().map(PathBuf::from),

            chunk_size: parse_env_or("CHUNK_SIZE", 16 * 1024),
            burst_cap: parse_env_or("BURST_CAP", 10),
            listener_queue_cap: parse_env_or("LISTENER_QUEUE_CAP", 500),
            prefetch_cap: parse_env_or("PREFETCH_CAP", 3),
            min_valid_bytes: parse_env_or("MIN_VALID_BYTES", 100_000),
            history_window: parse_env_or("HISTORY_WINDOW", 5),

            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: parse_env_or("BIND_PORT", 8000),

            encoder_bin: env::var("ENCODER_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
            fetch_timeout_secs: parse_env_or("FETCH_TIMEOUT_SECS", 30),
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
