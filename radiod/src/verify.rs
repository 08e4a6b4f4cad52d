//! `verify_channel` (§4.5): a convenience built on top of passive
//! discovery (§4.7) rather than the controller's own cached socket, since
//! discovery is specified to be independent of any controller instance.

use std::net::Ipv4Addr;
use std::time::Duration;

use radiod_common::Result;
use radiod_discovery::discover_channels;

/// Discovery window used by `verify_channel`: shorter than
/// [`radiod_discovery::DEFAULT_LISTEN_DURATION`] since a single positive
/// sighting is all the caller needs, not a full channel census.
pub const VERIFY_LISTEN_DURATION: Duration = Duration::from_secs(1);

/// A channel counts as matching `expected_freq_hz` if within this many Hz
/// of it. Not specified exactly by the protocol (§9 Open Questions); this
/// tolerates float rounding and the daemon's own frequency quantization
/// without being so loose it'd paper over a genuinely wrong channel.
pub const FREQUENCY_PROXIMITY_HZ: f64 = 10.0;

pub fn verify_channel(
    status_group: Ipv4Addr,
    interface: Option<Ipv4Addr>,
    listen_duration: Duration,
    ssrc: u32,
    expected_freq_hz: Option<f64>,
) -> Result<bool> {
    let channels = discover_channels(status_group, listen_duration, interface)?;

    let Some(channel) = channels.get(&ssrc) else {
        return Ok(false);
    };

    if let Some(expected) = expected_freq_hz {
        let Some(actual) = channel.frequency_hz else {
            return Ok(false);
        };

        return Ok((actual - expected).abs() <= FREQUENCY_PROXIMITY_HZ);
    }

    Ok(true)
}
