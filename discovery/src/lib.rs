//! Passive discovery (§4.7): join the status multicast group for a fixed
//! listening window and collect one record per observed SSRC.
//!
//! Discovery never sends a packet and therefore never disturbs channel
//! state. It uses a standalone socket, never a controller's cached one,
//! so a discovery call is independent of any [`radiod`]-facade
//! controller instance.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use radiod_codec::{OutputEncoding, StatusPacket};
use radiod_common::Error;
use radiod_transport::RecvSocket;

pub const DEFAULT_LISTEN_DURATION: Duration = Duration::from_secs(2);
const MAX_READ_STEP: Duration = Duration::from_millis(500);

/// The subset of decoded status fields needed to describe a channel,
/// observed passively.
#[derive(Debug, Clone, Default)]
pub struct ChannelInfo {
    pub ssrc: u32,
    pub frequency_hz: Option<f64>,
    pub preset: Option<String>,
    pub sample_rate: Option<u32>,
    pub output_encoding: Option<OutputEncoding>,
    pub destination: Option<SocketAddrV4>,
    pub snr_db: Option<f64>,
}

impl From<StatusPacket> for ChannelInfo {
    fn from(status: StatusPacket) -> Self {
        Self {
            ssrc: status.ssrc.unwrap_or(0),
            frequency_hz: status.radio_frequency,
            preset: status.preset.clone(),
            sample_rate: status.sample_rate,
            output_encoding: status.output_encoding,
            destination: status.output_destination,
            snr_db: status.snr_db(),
        }
    }
}

/// Listens for `listen_duration` and returns a map from SSRC to the
/// first observed [`ChannelInfo`] for that channel (keys unique, one
/// entry per distinct SSRC seen).
pub fn discover_channels(
    status_addr: Ipv4Addr,
    listen_duration: Duration,
    interface: Option<Ipv4Addr>,
) -> radiod_common::Result<HashMap<u32, ChannelInfo>> {
    let socket = RecvSocket::new(status_addr, interface)?;
    collect(&socket, listen_duration)
}

#[cfg(test)]
fn discover_on_port(
    status_addr: Ipv4Addr,
    listen_duration: Duration,
    interface: Option<Ipv4Addr>,
    port: u16,
) -> radiod_common::Result<HashMap<u32, ChannelInfo>> {
    let socket = RecvSocket::new_on_port(status_addr, interface, port)?;
    collect(&socket, listen_duration)
}

fn collect(
    socket: &RecvSocket,
    listen_duration: Duration,
) -> radiod_common::Result<HashMap<u32, ChannelInfo>> {
    let deadline = Instant::now() + listen_duration;
    let mut channels: HashMap<u32, ChannelInfo> = HashMap::new();
    let mut buf = [0u8; 2048];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let step = remaining.min(MAX_READ_STEP);
        match socket.recv_with_deadline(&mut buf, step) {
            Ok(Some(size)) => {
                let Some(status) = StatusPacket::decode(&buf[..size]) else {
                    log::debug!("discovery: received a non-status or malformed packet");
                    continue;
                };

                let Some(ssrc) = status.ssrc else {
                    log::debug!("discovery: status packet carried no SSRC, dropping");
                    continue;
                };

                channels.entry(ssrc).or_insert_with(|| status.into());
            }
            Ok(None) => continue,
            Err(e) => return Err(Error::Discovery(e)),
        }
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiod_codec::CommandBuilder;
    use radiod_transport::SendSocket;
    use std::thread;

    fn status_bytes(ssrc: u32) -> Vec<u8> {
        let mut cmd = CommandBuilder::new();
        cmd.ssrc(ssrc).radio_frequency(14_074_000.0).preset("usb");
        let mut bytes = cmd.finish().to_vec();
        bytes[0] = radiod_codec::STATUS;
        bytes
    }

    #[test]
    fn collects_one_entry_per_distinct_ssrc() {
        let group = Ipv4Addr::new(239, 211, 20, 4);
        let port = 54240;

        let sender = thread::spawn(move || {
            // Give the listener a moment to join the group before we
            // start sending.
            thread::sleep(Duration::from_millis(100));

            let send = SendSocket::new(group, None, true, radiod_transport::multicast::DEFAULT_TTL)
                .unwrap();
            send.send_to_test_port(group, port).unwrap();

            for ssrc in [111, 222, 111] {
                send.send(&status_bytes(ssrc)).unwrap();
                thread::sleep(Duration::from_millis(50));
            }
        });

        let channels =
            discover_on_port(group, Duration::from_millis(800), None, port).unwrap();

        sender.join().unwrap();

        assert_eq!(channels.len(), 2);
        assert!(channels.contains_key(&111));
        assert!(channels.contains_key(&222));
        assert_eq!(channels[&111].preset.as_deref(), Some("usb"));
    }
}
