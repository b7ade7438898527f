//! Central constants for the PCM path.

/// Bytes per PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Normalisation divisor for i16 samples. Using the positive peak keeps
/// `+1.0` mapping exactly onto `i16::MAX` on the way back.
pub const INT16_SCALE: f64 = 32_767.0;

/// Hard clip bounds of the normalised mix bus.
pub const MIX_FLOOR: f64 = -1.0;
pub const MIX_CEIL: f64 = 1.0;
