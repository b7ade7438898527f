use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AmbientConfig {
    /// Directory holding the PCM assets and any WAV sources to convert.
    pub dir: PathBuf,
    pub sample_rate: u32,
    /// Initial ambient gain, 0.0..=1.0.
    pub ambient_volume: f64,
    /// Initial voice gain, 0.0..=1.0.
    pub voice_volume: f64,
    pub tracks: Vec<TrackConfig>,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("ambient"),
            sample_rate: 24_000,
            ambient_volume: 0.50,
            voice_volume: 0.95,
            tracks: vec![TrackConfig {
                name: "office".to_string(),
                file: "office-ambient.pcm".to_string(),
                description: "Office ambience".to_string(),
            }],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackConfig {
    pub name: String,
    /// PCM16 LE mono file, relative to `dir`.
    pub file: String,
    #[serde(default)]
    pub description: String,
}

impl AmbientConfig {
    pub fn track_path(&self, track: &TrackConfig) -> PathBuf {
        self.dir.join(&track.file)
    }
}
