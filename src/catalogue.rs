use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Immutable descriptor for one track in the catalogue.
///
/// `weight` is reserved for a future weighted-selection policy; the
/// shuffle-bag selector in `selector.rs` treats every track as equally
/// likely and does not read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub url: String,
    pub filename: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone)]
pub struct Catalogue {
    tracks: Vec<Track>,
}

impl Catalogue {
    /// Loads the catalogue from `path` if given, else falls back to the
    /// small built-in default. Fails if the loaded set is empty or
    /// contains a duplicate id — both are fatal startup conditions.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let tracks = match path {
            Some(path) => {
                let data = tokio::fs::read_to_string(path).await?;
                serde_json::from_str(&data)?
            }
            None => default_catalogue(),
        };

        Self::from_tracks(tracks)
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(AppError::Catalogue("catalogue is empty".into()));
        }

        let mut seen = HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.id.as_str()) {
                return Err(AppError::Catalogue(format!(
                    "duplicate track id: {}",
                    track.id
                )));
            }
        }

        Ok(Catalogue { tracks })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }
}

fn default_catalogue() -> Vec<Track> {
    vec![
        Track {
            id: "t1".into(),
            title: "Can't Believe It".into(),
            artist: "T-Pain".into(),
            url: String::new(),
            filename: "CantBelieveItTPain.mp3".into(),
            weight: 8,
        },
        Track {
            id: "t2".into(),
            title: "Dior".into(),
            artist: "Pop Smoke".into(),
            url: String::new(),
            filename: "POPSMOKEDIOR.mp3".into(),
            weight: 9,
        },
        Track {
            id: "t3".into(),
            title: "Typa".into(),
            artist: "GloRilla".into(),
            url: String::new(),
            filename: "GloRillaTypa.mp3".into(),
            weight: 7,
        },
        Track {
            id: "t4".into(),
            title: "Just Wanna Rock".into(),
            artist: "Lil Uzi Vert".into(),
            url: String::new(),
            filename: "JustWannaR.mp3".into(),
            weight: 8,
        },
        Track {
            id: "t5".into(),
            title: "30 For 30".into(),
            artist: "SZA".into(),
            url: String::new(),
            filename: "30For30.mp3".into(),
            weight: 6,
        },
    ]
}
