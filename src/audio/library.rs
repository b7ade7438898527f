//! Process-wide catalogue of ambient beds plus the defaults that seed every
//! new session's mixer.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    audio::{AmbientMixer, AmbientTrack, Levels, TrackSummary},
    configs::AmbientConfig,
};

#[derive(Debug, Clone, Copy)]
struct Defaults {
    track: usize,
    levels: Levels,
}

/// Snapshot of the defaults, as reported over HTTP.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStatus {
    pub is_loaded: bool,
    pub current: Option<TrackSummary>,
    pub levels: Levels,
}

pub struct AmbientLibrary {
    tracks: Vec<Arc<AmbientTrack>>,
    defaults: RwLock<Defaults>,
}

impl AmbientLibrary {
    pub fn new(tracks: Vec<Arc<AmbientTrack>>, levels: Levels) -> Self {
        Self {
            tracks,
            defaults: RwLock::new(Defaults { track: 0, levels }),
        }
    }

    /// Loads every configured track. Tracks that fail are logged and skipped;
    /// an empty library is valid and leaves every mixer unloaded.
    pub fn load(config: &AmbientConfig) -> Self {
        let mut tracks = Vec::with_capacity(config.tracks.len());

        for entry in &config.tracks {
            let path = config.track_path(entry);
            match AmbientTrack::load(&path, &entry.name, &entry.description) {
                Ok(track) => {
                    info!(
                        "Loaded ambient track '{}' ({} samples, {:.1}s)",
                        track.name,
                        track.len(),
                        track.len() as f64 / config.sample_rate.max(1) as f64
                    );
                    tracks.push(Arc::new(track));
                }
                Err(e) => warn!("Skipping ambient track '{}': {}", entry.name, e),
            }
        }

        if tracks.is_empty() {
            warn!("No ambient tracks loaded; mixing is disabled");
        }

        Self::new(
            tracks,
            Levels::new(config.ambient_volume, config.voice_volume),
        )
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<AmbientTrack>> {
        self.tracks.get(index)
    }

    /// Index following `current`, wrapping. `None` for an empty library.
    pub fn next_index(&self, current: usize) -> Option<usize> {
        (!self.tracks.is_empty()).then(|| (current + 1) % self.tracks.len())
    }

    /// A fresh mixer positioned at the default track with the default levels.
    pub fn new_mixer(&self) -> AmbientMixer {
        let defaults = *self.defaults.read();
        match self.tracks.get(defaults.track) {
            Some(track) => AmbientMixer::with_track(track.clone(), defaults.levels),
            None => AmbientMixer::new(defaults.levels),
        }
    }

    pub fn default_levels(&self) -> Levels {
        self.defaults.read().levels
    }

    pub fn default_index(&self) -> usize {
        self.defaults.read().track
    }

    /// Advances the default track. Returns the new default, or `None` when
    /// there is nothing to switch to.
    pub fn switch_default(&self) -> Option<TrackSummary> {
        let mut defaults = self.defaults.write();
        let next = self.next_index(defaults.track)?;
        defaults.track = next;
        self.tracks.get(next).map(|t| t.summary())
    }

    pub fn set_default_levels(&self, ambient_pct: Option<f64>, voice_pct: Option<f64>) -> Levels {
        let mut defaults = self.defaults.write();
        defaults.levels = defaults.levels.with_percent(ambient_pct, voice_pct);
        defaults.levels
    }

    pub fn status(&self) -> LibraryStatus {
        let defaults = *self.defaults.read();
        LibraryStatus {
            is_loaded: !self.tracks.is_empty(),
            current: self.tracks.get(defaults.track).map(|t| t.summary()),
            levels: defaults.levels,
        }
    }
}
