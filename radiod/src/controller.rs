//! The channel controller (§4.5): the library's main entry point. Builds
//! command packets via [`radiod_codec`], gates them through the rate
//! limiter and dispatcher in [`radiod_transport`], and — for `tune` —
//! correlates the asynchronous status reply.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use radiod_codec::{CommandBuilder, DemodType, OutputEncoding, StatusPacket};
use radiod_common::validate::{self, DEFAULT_MAX_PRESET_LEN};
use radiod_common::{Error, Result};
use radiod_transport::dispatcher::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use radiod_transport::multicast::DEFAULT_TTL;
use radiod_transport::resolve::DEFAULT_STAGE_TIMEOUT;
use radiod_transport::{resolve_ipv4, Dispatcher, Metrics, MetricsSnapshot, RecvSocket, SendSocket};

use crate::tune::{self, TuneOptions};
use crate::verify::VERIFY_LISTEN_DURATION;

/// Constructor parameters, gathering the knobs named in §6.2 plus the
/// dispatcher's retry settings, mirroring the teacher's aggregate-options
/// pattern (`HylaranaSenderOptions` / `TransportOptions`).
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// A dotted-quad IPv4, a plain hostname, or a `.local` name (§4.2).
    pub status_addr: String,
    pub max_commands_per_sec: u32,
    /// The local interface IPv4 to bind/join on, for multi-homed hosts.
    /// `None` lets the kernel choose (`INADDR_ANY`).
    pub interface: Option<Ipv4Addr>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub multicast_loopback: bool,
    pub ttl: u32,
}

impl ControllerOptions {
    pub fn new(status_addr: impl Into<String>) -> Self {
        Self {
            status_addr: status_addr.into(),
            max_commands_per_sec: 100,
            interface: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            multicast_loopback: false,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Process-local handle to a daemon instance: a resolved status multicast
/// address, a sending socket, a lazily-created cached receiving socket, a
/// rate limiter, metrics, and the send/status locks guarding the sockets.
///
/// Construction resolves the address and opens the send socket; the
/// status socket is opened lazily on the first `tune` or `verify_channel`
/// call. `close` idempotently releases both sockets; `Controller` can also
/// simply be dropped, which does the same thing.
pub struct Controller {
    status_group: Ipv4Addr,
    interface: Option<Ipv4Addr>,
    dispatcher: Mutex<Option<Dispatcher>>,
    status_socket: Mutex<Option<RecvSocket>>,
    metrics: Arc<Metrics>,
    max_retries: u32,
    retry_delay: Duration,
    closed: AtomicBool,
}

impl Controller {
    /// Resolves `options.status_addr` and opens the send socket. Blocks up
    /// to the resolution cascade's per-stage timeout (§4.2).
    pub fn new(options: ControllerOptions) -> Result<Self> {
        let status_group = resolve_ipv4(&options.status_addr, DEFAULT_STAGE_TIMEOUT)?;
        log::info!(
            "controller connecting to status group {status_group} (interface={:?})",
            options.interface
        );

        let send_socket = SendSocket::new(
            status_group,
            options.interface,
            options.multicast_loopback,
            options.ttl,
        )?;

        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(send_socket, options.max_commands_per_sec, metrics.clone());

        Ok(Self {
            status_group,
            interface: options.interface,
            dispatcher: Mutex::new(Some(dispatcher)),
            status_socket: Mutex::new(None),
            metrics,
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
            closed: AtomicBool::new(false),
        })
    }

    fn send_command(&self, buf: &[u8]) -> Result<usize> {
        let guard = self.dispatcher.lock();
        let dispatcher = guard.as_ref().ok_or(Error::State)?;
        dispatcher.send(buf, self.max_retries, self.retry_delay)
    }

    // -- create / remove -----------------------------------------------

    /// Creates (or reconfigures, if the SSRC already exists) a channel.
    /// No reply is awaited; the daemon creates the channel on first sight
    /// of the SSRC.
    pub fn create_channel(
        &self,
        ssrc: u32,
        freq_hz: f64,
        preset: &str,
        sample_rate: Option<u32>,
        agc_enable: bool,
        gain: f32,
    ) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_frequency(freq_hz, false)?;
        validate::validate_preset(preset, DEFAULT_MAX_PRESET_LEN)?;
        validate::validate_gain(gain)?;
        if let Some(rate) = sample_rate {
            validate::validate_sample_rate(rate)?;
        }

        let mut cmd = CommandBuilder::new();
        cmd.radio_frequency(freq_hz)
            .preset(preset)
            .agc_enable(agc_enable)
            .gain(gain)
            .ssrc(ssrc);
        if let Some(rate) = sample_rate {
            cmd.sample_rate(rate);
        }

        self.send_command(&cmd.finish())?;
        Ok(())
    }

    /// Marks a channel for removal: sends `radio_frequency = 0.0` for its
    /// SSRC. Removal is asynchronous — the daemon sweeps it out on its
    /// next cycle, not synchronously with this call.
    pub fn remove_channel(&self, ssrc: u32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;

        let mut cmd = CommandBuilder::new();
        cmd.radio_frequency(0.0).ssrc(ssrc);
        self.send_command(&cmd.finish())?;
        Ok(())
    }

    // -- granular setters ------------------------------------------------
    // Each builds SSRC + the single affected field(s) + EOL, per §4.5. No
    // reply is awaited for any of these.

    pub fn set_frequency(&self, ssrc: u32, freq_hz: f64) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_frequency(freq_hz, false)?;
        self.send_field(|cmd| {
            cmd.radio_frequency(freq_hz);
        }, ssrc)
    }

    pub fn set_preset(&self, ssrc: u32, preset: &str) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_preset(preset, DEFAULT_MAX_PRESET_LEN)?;
        self.send_field(|cmd| {
            cmd.preset(preset);
        }, ssrc)
    }

    pub fn set_sample_rate(&self, ssrc: u32, rate_hz: u32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_sample_rate(rate_hz)?;
        self.send_field(|cmd| {
            cmd.sample_rate(rate_hz);
        }, ssrc)
    }

    pub fn set_gain(&self, ssrc: u32, gain_db: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_gain(gain_db)?;
        self.send_field(|cmd| {
            cmd.gain(gain_db);
        }, ssrc)
    }

    pub fn set_agc(&self, ssrc: u32, enabled: bool) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.agc_enable(enabled);
        }, ssrc)
    }

    /// Sets both filter edges in a single command (§4.5 `set_filter`).
    pub fn set_filter(&self, ssrc: u32, low_edge_hz: f32, high_edge_hz: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.low_edge(low_edge_hz).high_edge(high_edge_hz);
        }, ssrc)
    }

    pub fn set_low_edge(&self, ssrc: u32, hz: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.low_edge(hz);
        }, ssrc)
    }

    pub fn set_high_edge(&self, ssrc: u32, hz: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.high_edge(hz);
        }, ssrc)
    }

    /// DSP/LO shift, distinct from retuning the absolute radio frequency
    /// (see `radiod_codec::FieldCode::ShiftFrequency`).
    pub fn set_shift_frequency(&self, ssrc: u32, shift_hz: f64) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.shift_frequency(shift_hz);
        }, ssrc)
    }

    pub fn set_output_level(&self, ssrc: u32, level_db: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_gain(level_db)?;
        self.send_field(|cmd| {
            cmd.output_level(level_db);
        }, ssrc)
    }

    pub fn set_rf_gain(&self, ssrc: u32, gain_db: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_gain(gain_db)?;
        self.send_field(|cmd| {
            cmd.rf_gain(gain_db);
        }, ssrc)
    }

    pub fn set_rf_atten(&self, ssrc: u32, atten_db: f32) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        validate::validate_gain(atten_db)?;
        self.send_field(|cmd| {
            cmd.rf_atten(atten_db);
        }, ssrc)
    }

    pub fn set_rf_agc(&self, ssrc: u32, enabled: bool) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.rf_agc(enabled);
        }, ssrc)
    }

    pub fn set_demod_type(&self, ssrc: u32, demod: DemodType) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.demod_type(demod);
        }, ssrc)
    }

    pub fn set_output_encoding(&self, ssrc: u32, encoding: OutputEncoding) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.output_encoding(encoding);
        }, ssrc)
    }

    /// Sets both the data and status destination on the daemon side
    /// (§6.1, code 17 "sets both data and status dest").
    pub fn set_output_destination(&self, ssrc: u32, destination: SocketAddrV4) -> Result<()> {
        validate::validate_ssrc(ssrc as u64)?;
        self.send_field(|cmd| {
            cmd.output_destination(destination);
        }, ssrc)
    }

    fn send_field(&self, build: impl FnOnce(&mut CommandBuilder), ssrc: u32) -> Result<()> {
        let mut cmd = CommandBuilder::new();
        build(&mut cmd);
        cmd.ssrc(ssrc);
        self.send_command(&cmd.finish())?;
        Ok(())
    }

    // -- tune / verify ----------------------------------------------------

    /// The correlating operation (§4.6): sends a command tagged with a
    /// fresh command tag and retransmits with exponential backoff until a
    /// status packet echoing both the tag and the SSRC arrives, or
    /// `options.timeout` elapses.
    pub fn tune(&self, ssrc: u32, options: &TuneOptions) -> Result<StatusPacket> {
        validate::validate_ssrc(ssrc as u64)?;

        if self.closed.load(Ordering::Acquire) {
            return Err(Error::State);
        }

        // The status lock is held for the whole call, which is how
        // concurrent `tune` calls on one controller serialize (§4.6, §5).
        let mut guard = self.status_socket.lock();
        if guard.is_none() {
            log::debug!("controller: opening cached status socket");
            *guard = Some(RecvSocket::new(self.status_group, self.interface)?);
        }
        let socket = guard.as_ref().expect("just initialized above");

        let result = tune::correlate(socket, ssrc, options, |buf| self.send_command(buf));

        if let Err(Error::Timeout) = &result {
            self.metrics.record_failure(
                radiod_common::ErrorKind::Timeout,
                "tune timed out waiting for a matching status reply",
            );
        }

        result
    }

    /// Convenience: runs a short passive discovery and checks that `ssrc`
    /// is present, optionally also checking its frequency is within a
    /// small tolerance of `expected_freq_hz`.
    pub fn verify_channel(&self, ssrc: u32, expected_freq_hz: Option<f64>) -> Result<bool> {
        validate::validate_ssrc(ssrc as u64)?;
        crate::verify::verify_channel(
            self.status_group,
            self.interface,
            VERIFY_LISTEN_DURATION,
            ssrc,
            expected_freq_hz,
        )
    }

    // -- metrics / lifecycle ----------------------------------------------

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Idempotently releases both sockets. Safe to call more than once,
    /// and safe to skip — `Drop` does the same thing and never panics.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        log::info!("controller closing");
        self.dispatcher.lock().take();
        self.status_socket.lock().take();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.close();
    }
}
