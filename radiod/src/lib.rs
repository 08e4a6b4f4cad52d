//! Control-plane client for the `radiod` SDR demodulator daemon: channel
//! creation, reconfiguration and removal, the tune/correlate state
//! machine, and passive discovery, over its UDP-multicast TLV protocol.
//!
//! This crate is the public facade over [`radiod_codec`] (the wire
//! format), [`radiod_transport`] (sockets, rate limiting, dispatch) and
//! [`radiod_discovery`] (the passive listener). See [`Controller`] for
//! the main entry point.

mod controller;
mod tune;
mod verify;

pub use controller::{Controller, ControllerOptions};
pub use tune::{generate_command_tag, TuneOptions, DEFAULT_TUNE_TIMEOUT};
pub use verify::{FREQUENCY_PROXIMITY_HZ, VERIFY_LISTEN_DURATION};

pub use radiod_codec::{CommandBuilder, DemodType, FieldCode, OutputEncoding, StatusPacket};
pub use radiod_common::{Error, ErrorKind, Result};
pub use radiod_discovery::{discover_channels, ChannelInfo};
pub use radiod_transport::MetricsSnapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use radiod_codec::tlv;
    use radiod_transport::multicast::DEFAULT_TTL;
    use radiod_transport::{RecvSocket, SendSocket};
    use std::net::Ipv4Addr;
    use std::thread;
    use std::time::Duration;

    fn status_bytes(ssrc: u32, command_tag: u32, freq_hz: f64, preset: &str) -> Vec<u8> {
        let mut cmd = CommandBuilder::new();
        cmd.ssrc(ssrc)
            .command_tag(command_tag)
            .radio_frequency(freq_hz)
            .preset(preset);
        let mut bytes = cmd.finish().to_vec();
        bytes[0] = radiod_codec::STATUS;
        bytes
    }

    /// Reads the command the controller just sent and extracts its tag,
    /// so the harness can echo it back without the controller exposing
    /// its internally-generated command tag on its public surface.
    fn read_command_tag(recv: &RecvSocket) -> u32 {
        let mut buf = [0u8; 2048];
        let size = recv
            .recv_with_deadline(&mut buf, Duration::from_secs(2))
            .unwrap()
            .expect("expected a command datagram");

        assert_eq!(buf[0], radiod_codec::CMD);
        let records = tlv::decode_records(bytes::Bytes::copy_from_slice(&buf[1..size]));
        records
            .iter()
            .find(|r| r.ty == FieldCode::CommandTag.code())
            .map(|r| tlv::decode_uint(&r.value) as u32)
            .expect("command carried no command_tag")
    }

    /// End-to-end scenario 2 from the test plan: `tune` ignores a spurious
    /// status with a mismatched command tag, then matches the correct one.
    #[test]
    fn tune_ignores_spurious_reply_and_matches_correct_one() {
        let group = Ipv4Addr::new(239, 211, 22, 5);
        let mut options = ControllerOptions::new(group.to_string());
        options.multicast_loopback = true;
        let controller = Controller::new(options).unwrap();

        let harness_recv = RecvSocket::new(group, None).unwrap();
        let harness_send = SendSocket::new(group, None, true, DEFAULT_TTL).unwrap();

        let harness = thread::spawn(move || {
            let tag = read_command_tag(&harness_recv);

            harness_send
                .send(&status_bytes(14_074_000, tag.wrapping_add(1), 1.0, "usb"))
                .unwrap();
            thread::sleep(Duration::from_millis(50));
            harness_send
                .send(&status_bytes(14_074_000, tag, 14_074_000.0, "usb"))
                .unwrap();
        });

        let options = TuneOptions {
            frequency_hz: Some(14_074_000.0),
            preset: Some("usb".to_string()),
            timeout: Duration::from_secs(3),
            ..TuneOptions::new()
        };

        let status = controller.tune(14_074_000, &options).unwrap();
        harness.join().unwrap();

        assert_eq!(status.ssrc, Some(14_074_000));
        assert_eq!(status.radio_frequency, Some(14_074_000.0));
        assert_eq!(status.preset.as_deref(), Some("usb"));
    }

    /// End-to-end scenario 4: no reply arrives, `tune` raises `ErrTimeout`
    /// within the documented window and at least 3 datagrams go out.
    #[test]
    fn tune_times_out_and_retransmits_at_least_three_times() {
        let group = Ipv4Addr::new(239, 211, 22, 6);
        let mut options = ControllerOptions::new(group.to_string());
        options.multicast_loopback = true;
        let controller = Controller::new(options).unwrap();

        // A silent listener just to count retransmissions.
        let harness_recv = RecvSocket::new(group, None).unwrap();

        let counter = thread::spawn(move || {
            let mut count = 0u32;
            let mut buf = [0u8; 2048];
            let deadline = std::time::Instant::now() + Duration::from_millis(700);
            while std::time::Instant::now() < deadline {
                if harness_recv
                    .recv_with_deadline(&mut buf, Duration::from_millis(100))
                    .unwrap()
                    .is_some()
                {
                    count += 1;
                }
            }
            count
        });

        let options = TuneOptions {
            frequency_hz: Some(14_074_000.0),
            timeout: Duration::from_millis(500),
            ..TuneOptions::new()
        };

        let start = std::time::Instant::now();
        let result = controller.tune(14_074_000, &options);
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(Error::Timeout)));
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed <= Duration::from_millis(900));

        let retransmissions = counter.join().unwrap();
        assert!(retransmissions >= 3, "expected >= 3 datagrams, got {retransmissions}");

        let metrics = controller.get_metrics();
        assert_eq!(metrics.commands_succeeded + metrics.commands_failed, metrics.commands_sent);
        assert!(metrics.commands_failed >= 1);
    }

    #[test]
    fn verify_channel_tolerance() {
        assert!((14_074_000.0_f64 - 14_074_005.0).abs() <= FREQUENCY_PROXIMITY_HZ);
        assert!((14_074_000.0_f64 - 14_075_000.0).abs() > FREQUENCY_PROXIMITY_HZ);
    }
}
