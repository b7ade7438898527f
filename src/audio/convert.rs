//! Startup conversion of WAV sources into the raw PCM16 assets the mixer
//! reads.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, info, warn};

use crate::{
    audio::constants::BYTES_PER_SAMPLE,
    common::{RelayError, RelayResult},
    configs::AmbientConfig,
};

/// Decoded mono PCM plus the rate it was recorded at.
#[derive(Debug)]
pub struct DecodedPcm {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// Creates the ambient directory and converts a WAV source for every track
/// whose PCM file is missing. A `<stem>.wav` next to the missing
/// `<stem>.pcm` is preferred; otherwise the first WAV in the directory is
/// used. Returns the number of assets written. Per-track failures are
/// logged and skipped.
pub fn prepare_assets(config: &AmbientConfig) -> RelayResult<usize> {
    std::fs::create_dir_all(&config.dir)?;

    let missing: Vec<PathBuf> = config
        .tracks
        .iter()
        .map(|t| config.track_path(t))
        .filter(|p| !p.exists())
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let sources = wav_sources(&config.dir)?;
    if sources.is_empty() {
        warn!(
            "{} ambient asset(s) missing and no .wav source in {}",
            missing.len(),
            config.dir.display()
        );
        return Ok(0);
    }

    let mut written = 0;
    for target in missing {
        let stem = target.file_stem();
        let source = sources
            .iter()
            .find(|s| s.file_stem() == stem)
            .unwrap_or(&sources[0]);

        match convert_wav(source, &target, config.sample_rate) {
            Ok(samples) => {
                info!(
                    "Converted {} -> {} ({} samples)",
                    source.display(),
                    target.display(),
                    samples
                );
                written += 1;
            }
            Err(e) => warn!("Ambient conversion failed: {}", e),
        }
    }

    Ok(written)
}

/// `.wav` files in `dir`, sorted by name.
fn wav_sources(dir: &Path) -> RelayResult<Vec<PathBuf>> {
    let mut sources: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    sources.sort();
    Ok(sources)
}

/// Decodes `source`, checks its rate against `sample_rate` and writes mono
/// PCM16 LE to `target`. Returns the sample count written.
pub fn convert_wav(source: &Path, target: &Path, sample_rate: u32) -> RelayResult<usize> {
    let decoded = decode_wav(source)?;
    if decoded.sample_rate != sample_rate {
        return Err(RelayError::asset(
            source.display(),
            format!(
                "sample rate {} Hz does not match the configured {} Hz",
                decoded.sample_rate, sample_rate
            ),
        ));
    }
    if decoded.samples.is_empty() {
        return Err(RelayError::asset(source.display(), "no audio decoded"));
    }

    let mut bytes = vec![0u8; decoded.samples.len() * BYTES_PER_SAMPLE];
    LittleEndian::write_i16_into(&decoded.samples, &mut bytes);
    std::fs::write(target, bytes)?;

    Ok(decoded.samples.len())
}

/// Decodes every packet of a WAV file, down-mixing to mono by averaging the
/// channels of each frame.
pub fn decode_wav(path: &Path) -> RelayResult<DecodedPcm> {
    let asset_err = |e: Error| RelayError::asset(path.display(), e.to_string());

    let file = File::open(path).map_err(|e| RelayError::asset(path.display(), e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(asset_err)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| RelayError::asset(path.display(), "no audio track found"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| RelayError::asset(path.display(), "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(asset_err)?;

    debug!("Decoding {} at {} Hz", path.display(), sample_rate);

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<i16>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(asset_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(Error::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(asset_err(e)),
        };

        let spec = *audio_buf.spec();
        let channels = spec.channels.count().max(1);
        let frames = audio_buf.capacity();
        if sample_buf
            .as_ref()
            .is_none_or(|buf| buf.capacity() < frames * channels)
        {
            sample_buf = Some(SampleBuffer::new(frames as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(audio_buf);

        samples.extend(downmix(buf.samples(), channels));
    }

    Ok(DecodedPcm {
        sample_rate,
        samples,
    })
}

fn downmix(interleaved: &[i16], channels: usize) -> impl Iterator<Item = i16> + '_ {
    interleaved.chunks_exact(channels).map(move |frame| {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        (sum / channels as i32) as i16
    })
}
