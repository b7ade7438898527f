//! Overlays a looped ambient bed onto a live PCM16 voice stream.
//!
//! One mixer exists per session. The sample buffer is shared (`Arc`) but the
//! cursor is owned here, so concurrent sessions never advance each other's
//! ambient phase. Mixing is linear with a hard clip at full scale: one ambient
//! sample is consumed per voice sample at the voice's native rate, nothing is
//! resampled or reordered.

use std::{path::Path, sync::Arc};

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use tracing::warn;

use crate::{
    audio::{
        AmbientTrack,
        constants::{BYTES_PER_SAMPLE, INT16_SCALE, MIX_CEIL, MIX_FLOOR},
    },
    common::{RelayError, RelayResult},
};

/// Gain pair applied by the mixer, both in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Levels {
    pub ambient: f64,
    pub voice: f64,
}

impl Levels {
    pub fn new(ambient: f64, voice: f64) -> Self {
        Self {
            ambient: clamp_unit(ambient),
            voice: clamp_unit(voice),
        }
    }

    /// Applies percentages in `[0, 100]`; a missing or non-finite value
    /// leaves that level unchanged.
    pub fn with_percent(self, ambient_pct: Option<f64>, voice_pct: Option<f64>) -> Self {
        Self {
            ambient: percent_to_level(ambient_pct).unwrap_or(self.ambient),
            voice: percent_to_level(voice_pct).unwrap_or(self.voice),
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

fn percent_to_level(pct: Option<f64>) -> Option<f64> {
    pct.filter(|p| p.is_finite()).map(|p| p.clamp(0.0, 100.0) / 100.0)
}

/// Clip to the mix bus and quantize back to i16.
#[inline]
fn quantize(m: f64) -> i16 {
    (m.clamp(MIX_FLOOR, MIX_CEIL) * INT16_SCALE).round() as i16
}

pub struct AmbientMixer {
    track: Option<Arc<AmbientTrack>>,
    cursor: usize,
    levels: Levels,
}

impl AmbientMixer {
    /// An unloaded mixer: `mix` is the identity until a track is attached.
    pub fn new(levels: Levels) -> Self {
        Self {
            track: None,
            cursor: 0,
            levels,
        }
    }

    pub fn with_track(track: Arc<AmbientTrack>, levels: Levels) -> Self {
        let mut mixer = Self::new(levels);
        mixer.set_track(track);
        mixer
    }

    /// Reads a PCM16 asset from disk and attaches it. On failure the mixer is
    /// left unloaded and `false` is returned.
    pub fn load_track(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match AmbientTrack::load(path, name, "") {
            Ok(track) => {
                self.set_track(Arc::new(track));
                true
            }
            Err(e) => {
                warn!("Ambient track not loaded: {}", e);
                self.track = None;
                self.cursor = 0;
                false
            }
        }
    }

    /// Attaches `track` and rewinds to its first sample. Empty tracks leave
    /// the mixer unloaded.
    pub fn set_track(&mut self, track: Arc<AmbientTrack>) {
        self.track = (!track.is_empty()).then_some(track);
        self.cursor = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.track.is_some()
    }

    fn track(&self) -> Option<&AmbientTrack> {
        self.track.as_deref()
    }

    pub fn track_name(&self) -> Option<&str> {
        self.track().map(|t| t.name.as_str())
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn levels(&self) -> Levels {
        self.levels
    }

    /// Updates the gains from percentages and returns the stored levels.
    pub fn set_levels(&mut self, ambient_pct: Option<f64>, voice_pct: Option<f64>) -> Levels {
        self.levels = self.levels.with_percent(ambient_pct, voice_pct);
        self.levels
    }

    /// Overlays the ambient bed onto `voice` (PCM16 LE). Returns the input
    /// unchanged when no track is loaded or the frame is empty; the output
    /// always has the input's byte length.
    pub fn mix(&mut self, voice: &[u8]) -> RelayResult<Vec<u8>> {
        let Some(track) = self.track.clone() else {
            return Ok(voice.to_vec());
        };
        if voice.is_empty() {
            return Ok(Vec::new());
        }
        if voice.len() % BYTES_PER_SAMPLE != 0 {
            return Err(RelayError::Mixing(format!(
                "voice frame has odd length {}",
                voice.len()
            )));
        }

        let ambient = track.samples();
        let Levels {
            ambient: ambient_gain,
            voice: voice_gain,
        } = self.levels;

        let mut out = vec![0u8; voice.len()];
        for (src, dst) in voice
            .chunks_exact(BYTES_PER_SAMPLE)
            .zip(out.chunks_exact_mut(BYTES_PER_SAMPLE))
        {
            let v = LittleEndian::read_i16(src) as f64 / INT16_SCALE * voice_gain;
            let a = self.next_ambient(ambient) as f64 / INT16_SCALE * ambient_gain;
            LittleEndian::write_i16(dst, quantize(v + a));
        }

        Ok(out)
    }

    /// Produces `sample_count` samples of the ambient bed alone, scaled by
    /// the ambient gain. `None` when no track is loaded.
    pub fn generate_ambient_only(&mut self, sample_count: usize) -> Option<Vec<u8>> {
        let track = self.track.clone()?;
        let ambient = track.samples();
        let gain = self.levels.ambient;

        let mut out = vec![0u8; sample_count * BYTES_PER_SAMPLE];
        for dst in out.chunks_exact_mut(BYTES_PER_SAMPLE) {
            let a = self.next_ambient(ambient) as f64 / INT16_SCALE * gain;
            LittleEndian::write_i16(dst, quantize(a));
        }
        Some(out)
    }

    #[inline]
    fn next_ambient(&mut self, ambient: &[i16]) -> i16 {
        let sample = ambient[self.cursor];
        self.cursor = (self.cursor + 1) % ambient.len();
        sample
    }
}
