//! The wire type-code table (§6.1) and the small value enums the codec
//! needs to interpret specific fields.

use std::str::FromStr;

/// Packet-leading byte values.
pub const STATUS: u8 = 0;
pub const CMD: u8 = 1;

/// TLV record type codes actually encoded or decoded by this core, per
/// §6.1's table plus the supplemented setter-only codes from
/// SPEC_FULL.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCode {
    Eol = 0,
    CommandTag = 1,
    OutputSsrc = 18,
    OutputSamprate = 20,
    RadioFrequency = 33,
    /// `set_shift_frequency`: a signed LO/DSP shift, distinct from the
    /// absolute `RadioFrequency` retune. Not in spec.md's §6.1 table; code
    /// chosen adjacent to it per the daemon's schema (SPEC_FULL.md §3).
    ShiftFrequency = 34,
    LowEdge = 39,
    HighEdge = 40,
    BasebandPower = 46,
    NoiseDensity = 47,
    DemodType = 48,
    AgcEnable = 62,
    Gain = 68,
    /// `set_output_level`: output headroom/level, as distinct from RF
    /// `Gain`. Not in spec.md's §6.1 table; code chosen adjacent to it.
    OutputLevel = 69,
    Preset = 85,
    RfAtten = 97,
    RfGain = 98,
    RfAgc = 99,
    OutputEncoding = 107,
    OutputDataDestSocket = 17,
}

impl FieldCode {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// `DEMOD_TYPE` (code 48).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemodType {
    Linear = 0,
    Fm = 1,
    Wfm = 2,
    Spectrum = 3,
}

impl DemodType {
    pub fn from_u64(value: u64) -> Option<Self> {
        Some(match value {
            0 => Self::Linear,
            1 => Self::Fm,
            2 => Self::Wfm,
            3 => Self::Spectrum,
            _ => return None,
        })
    }
}

/// `OUTPUT_ENCODING` (code 107): `0=NONE, 1=S16BE, 2=S16LE, 3=F32, 4=F16,
/// 5=OPUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    None = 0,
    S16Be = 1,
    S16Le = 2,
    F32 = 3,
    F16 = 4,
    Opus = 5,
}

impl OutputEncoding {
    pub fn from_u64(value: u64) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::S16Be,
            2 => Self::S16Le,
            3 => Self::F32,
            4 => Self::F16,
            5 => Self::Opus,
            _ => return None,
        })
    }
}

impl ToString for OutputEncoding {
    fn to_string(&self) -> String {
        match self {
            Self::None => "none",
            Self::S16Be => "s16be",
            Self::S16Le => "s16le",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::Opus => "opus",
        }
        .to_string()
    }
}

impl FromStr for OutputEncoding {
    type Err = std::io::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "none" => Self::None,
            "s16be" => Self::S16Be,
            "s16le" => Self::S16Le,
            "f32" => Self::F32,
            "f16" => Self::F16,
            "opus" => Self::Opus,
            _ => return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, value)),
        })
    }
}
