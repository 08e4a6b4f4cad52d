//! The tune/correlate state machine (§4.6): a fresh 31-bit command tag is
//! allocated per call, the command is (re)transmitted with exponential
//! backoff, and the first status packet echoing both the tag and the SSRC
//! wins.

use std::net::SocketAddrV4;
use std::time::{Duration, Instant};

use radiod_codec::{CommandBuilder, OutputEncoding, StatusPacket};
use radiod_common::validate;
use radiod_common::{Error, Result};
use radiod_transport::RecvSocket;

const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const MAX_WAIT_STEP: Duration = Duration::from_millis(500);
pub const DEFAULT_TUNE_TIMEOUT: Duration = Duration::from_secs(5);

/// The subset of fields `tune` can carry in one correlated command. Absent
/// fields are not transmitted (§9 "Dynamic named parameters ... become a
/// configuration struct with the recognized options ENUMERATED").
#[derive(Debug, Clone)]
pub struct TuneOptions {
    pub frequency_hz: Option<f64>,
    pub preset: Option<String>,
    pub sample_rate: Option<u32>,
    pub low_edge: Option<f32>,
    pub high_edge: Option<f32>,
    pub gain: Option<f32>,
    pub agc_enable: Option<bool>,
    pub rf_gain: Option<f32>,
    pub rf_atten: Option<f32>,
    pub encoding: Option<OutputEncoding>,
    pub destination: Option<SocketAddrV4>,
    pub timeout: Duration,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            frequency_hz: None,
            preset: None,
            sample_rate: None,
            low_edge: None,
            high_edge: None,
            gain: None,
            agc_enable: None,
            rf_gain: None,
            rf_atten: None,
            encoding: None,
            destination: None,
            timeout: DEFAULT_TUNE_TIMEOUT,
        }
    }
}

impl TuneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self) -> Result<()> {
        validate::validate_timeout(self.timeout.as_secs_f64())?;

        if let Some(freq) = self.frequency_hz {
            validate::validate_frequency(freq, false)?;
        }
        if let Some(preset) = &self.preset {
            validate::validate_preset(preset, validate::DEFAULT_MAX_PRESET_LEN)?;
        }
        if let Some(rate) = self.sample_rate {
            validate::validate_sample_rate(rate)?;
        }
        if let Some(gain) = self.gain {
            validate::validate_gain(gain)?;
        }

        Ok(())
    }

    fn build_command(&self, ssrc: u32, command_tag: u32) -> Vec<u8> {
        let mut cmd = CommandBuilder::new();
        cmd.ssrc(ssrc).command_tag(command_tag);

        if let Some(freq) = self.frequency_hz {
            cmd.radio_frequency(freq);
        }
        if let Some(preset) = &self.preset {
            cmd.preset(preset);
        }
        if let Some(rate) = self.sample_rate {
            cmd.sample_rate(rate);
        }
        if let Some(low) = self.low_edge {
            cmd.low_edge(low);
        }
        if let Some(high) = self.high_edge {
            cmd.high_edge(high);
        }
        if let Some(gain) = self.gain {
            cmd.gain(gain);
        }
        if let Some(agc) = self.agc_enable {
            cmd.agc_enable(agc);
        }
        if let Some(rf_gain) = self.rf_gain {
            cmd.rf_gain(rf_gain);
        }
        if let Some(rf_atten) = self.rf_atten {
            cmd.rf_atten(rf_atten);
        }
        if let Some(encoding) = self.encoding {
            cmd.output_encoding(encoding);
        }
        if let Some(dest) = self.destination {
            cmd.output_destination(dest);
        }

        cmd.finish().to_vec()
    }
}

/// A 31-bit command tag drawn from a CSPRNG (`rand`'s default `ThreadRng`),
/// used only for reply correlation, never for authentication.
pub fn generate_command_tag() -> u32 {
    rand::random::<u32>() & 0x7FFF_FFFF
}

/// Runs the correlate loop described in §4.6 over an already-acquired
/// status socket. `send` is the caller's dispatch hook, so the caller's
/// send lock, rate limiter and metrics all stay owned by `Controller`.
///
/// States: `SENDING` -> `AWAITING` -> (`MATCHED` | `TIMED_OUT`). If the
/// daemon emits multiple matching packets the first one wins; a status
/// that matches the SSRC but carries a different (or absent) command tag
/// is dropped even though it is otherwise plausible, per §4.6's tie-break
/// rule protecting callers sharing a status stream.
pub fn correlate(
    socket: &RecvSocket,
    ssrc: u32,
    options: &TuneOptions,
    mut send: impl FnMut(&[u8]) -> Result<usize>,
) -> Result<StatusPacket> {
    options.validate()?;

    let command_tag = generate_command_tag();
    let buf = options.build_command(ssrc, command_tag);

    let deadline = Instant::now() + options.timeout;
    let mut retry_interval = INITIAL_RETRY_INTERVAL;
    let mut last_send: Option<Instant> = None;
    let mut attempts = 0u32;
    let mut recv_buf = [0u8; 2048];

    log::debug!("tune: ssrc={ssrc} command_tag={command_tag} entering SENDING");

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        if last_send.map_or(true, |t| now.duration_since(t) >= retry_interval) {
            send(&buf)?;
            last_send = Some(now);
            attempts += 1;
            // The initial SENDING-state transmission keeps the 100ms
            // interval for the gap that follows it; only retransmissions
            // after that double it, per §8 scenario 4's 100ms/300ms
            // boundaries.
            if attempts > 1 {
                retry_interval = (retry_interval * 2).min(MAX_RETRY_INTERVAL);
            }
            log::debug!(
                "tune: ssrc={ssrc} attempt {attempts}, next retry_interval={retry_interval:?} (AWAITING)"
            );
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = remaining.min(retry_interval).min(MAX_WAIT_STEP);

        match socket.recv_with_deadline(&mut recv_buf, wait) {
            Ok(None) => continue,
            Ok(Some(size)) => {
                let Some(status) = StatusPacket::decode(&recv_buf[..size]) else {
                    log::debug!("tune: dropping a non-status or malformed packet");
                    continue;
                };

                if status.ssrc != Some(ssrc) || status.command_tag != Some(command_tag) {
                    log::debug!(
                        "tune: ignoring status ssrc={:?} tag={:?}, wanted ssrc={ssrc} tag={command_tag}",
                        status.ssrc,
                        status.command_tag
                    );
                    continue;
                }

                log::debug!("tune: ssrc={ssrc} command_tag={command_tag} MATCHED");
                return Ok(status);
            }
            Err(e) => return Err(Error::Connection(e)),
        }
    }

    log::debug!("tune: ssrc={ssrc} command_tag={command_tag} deadline expired, TIMED_OUT");
    Err(Error::Timeout)
}
