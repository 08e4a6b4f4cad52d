//! Input validation shared by the codec and the channel controller.
//!
//! Every function here returns [`crate::Error::Validation`] on failure and
//! never touches a socket — validation is always synchronous (§7).

use crate::{Error, Result};

pub const MAX_SSRC: u64 = u32::MAX as u64;
pub const MAX_FREQUENCY_HZ: f64 = 1e13;
pub const MAX_SAMPLE_RATE_HZ: u32 = 100_000_000;
pub const MIN_GAIN_DB: f32 = -100.0;
pub const MAX_GAIN_DB: f32 = 100.0;
pub const DEFAULT_MAX_PRESET_LEN: usize = 32;

/// `0 <= ssrc <= 2^32 - 1`.
pub fn validate_ssrc(ssrc: u64) -> Result<u32> {
    if ssrc > MAX_SSRC {
        return Err(Error::validation("ssrc", format!("{ssrc} exceeds u32::MAX")));
    }

    Ok(ssrc as u32)
}

/// `(0, 1e13)`, except the reserved `0.0` used by the *remove* operation.
pub fn validate_frequency(freq_hz: f64, allow_zero: bool) -> Result<f64> {
    if allow_zero && freq_hz == 0.0 {
        return Ok(freq_hz);
    }

    if !(freq_hz > 0.0 && freq_hz < MAX_FREQUENCY_HZ) {
        return Err(Error::validation(
            "radio_frequency",
            format!("{freq_hz} is outside (0, 1e13)"),
        ));
    }

    Ok(freq_hz)
}

/// `[1, 1e8]` integer Hz.
pub fn validate_sample_rate(rate: u32) -> Result<u32> {
    if rate == 0 || rate > MAX_SAMPLE_RATE_HZ {
        return Err(Error::validation(
            "sample_rate",
            format!("{rate} is outside [1, 1e8]"),
        ));
    }

    Ok(rate)
}

/// `[-100, 100]` dB.
pub fn validate_gain(gain_db: f32) -> Result<f32> {
    if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
        return Err(Error::validation(
            "gain",
            format!("{gain_db} is outside [-100, 100]"),
        ));
    }

    Ok(gain_db)
}

/// Strictly positive, finite.
pub fn validate_timeout(timeout_secs: f64) -> Result<f64> {
    if !(timeout_secs.is_finite() && timeout_secs > 0.0) {
        return Err(Error::validation(
            "timeout",
            format!("{timeout_secs} must be a positive finite number"),
        ));
    }

    Ok(timeout_secs)
}

/// Preset allowlist: `[A-Za-z0-9_-]`, non-empty, `<= max_len` (default 32).
pub fn validate_preset(preset: &str, max_len: usize) -> Result<&str> {
    validate_string_allowlist(preset, "preset", max_len, true)
}

/// The general string allowlist applied to preset and similar short
/// identifiers: non-empty (if `require_nonempty`), bounded length, no
/// ASCII control characters or NUL, and (for preset-like fields) no
/// character outside `[A-Za-z0-9_-]`.
pub fn validate_string_allowlist<'a>(
    value: &'a str,
    field: &'static str,
    max_len: usize,
    require_nonempty: bool,
) -> Result<&'a str> {
    if require_nonempty && value.is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }

    if value.len() > max_len {
        return Err(Error::validation(
            field,
            format!("length {} exceeds maximum {}", value.len(), max_len),
        ));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::validation(
            field,
            "contains a character outside [A-Za-z0-9_-]",
        ));
    }

    Ok(value)
}

/// A value declared unsigned must fit `[0, 2^64 - 1]`; since the argument
/// is already a `u64` this only rejects on the signed-field fast path
/// where callers pass a wider/negative-capable type before narrowing.
pub fn validate_unsigned(value: i128, field: &'static str) -> Result<u64> {
    if value < 0 || value > u64::MAX as i128 {
        return Err(Error::validation(
            field,
            format!("{value} is outside [0, 2^64 - 1]"),
        ));
    }

    Ok(value as u64)
}
