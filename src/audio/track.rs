//! One looped background bed, fully resident in memory.

use std::{path::Path, sync::Arc};

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::{
    audio::constants::BYTES_PER_SAMPLE,
    common::{RelayError, RelayResult},
};

/// Immutable PCM16 mono samples plus catalogue metadata. Shared between
/// sessions through `Arc`; every session keeps its own read cursor.
#[derive(Debug)]
pub struct AmbientTrack {
    pub name: String,
    pub description: String,
    samples: Arc<[i16]>,
}

/// What clients see of a track.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackSummary {
    pub name: String,
    pub description: String,
}

impl AmbientTrack {
    pub fn new(name: impl Into<String>, description: impl Into<String>, samples: Vec<i16>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            samples: samples.into(),
        }
    }

    /// Reads a raw PCM16 little-endian file. Empty or odd-length files are
    /// rejected so a loaded track always has at least one whole sample.
    pub fn load(
        path: impl AsRef<Path>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> RelayResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| RelayError::asset(path.display(), e.to_string()))?;

        if bytes.is_empty() {
            return Err(RelayError::asset(path.display(), "file is empty"));
        }
        if bytes.len() % BYTES_PER_SAMPLE != 0 {
            return Err(RelayError::asset(
                path.display(),
                format!("odd byte length {}", bytes.len()),
            ));
        }

        let mut samples = vec![0i16; bytes.len() / BYTES_PER_SAMPLE];
        LittleEndian::read_i16_into(&bytes, &mut samples);

        Ok(Self::new(name, description, samples))
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_little_endian_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bed.pcm");
        std::fs::write(&path, [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]).unwrap();

        let track = AmbientTrack::load(&path, "bed", "").unwrap();
        assert_eq!(track.samples(), &[1, -1, i16::MIN]);
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn missing_file_is_asset_error() {
        let err = AmbientTrack::load("/nonexistent/bed.pcm", "bed", "").unwrap_err();
        assert!(matches!(err, RelayError::AssetLoad { .. }));
    }

    #[test]
    fn empty_and_odd_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pcm");
        let odd = dir.path().join("odd.pcm");
        std::fs::write(&empty, []).unwrap();
        std::fs::write(&odd, [1, 2, 3]).unwrap();

        assert!(AmbientTrack::load(&empty, "e", "").is_err());
        assert!(AmbientTrack::load(&odd, "o", "").is_err());
    }
}
