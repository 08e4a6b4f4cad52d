//! Serializes a command buffer and transmits it with bounded retries and
//! exponential backoff on transient send failures (§4.4). Thread-safe:
//! the send lock serializes writes, and together with the rate limiter
//! bounds outbound traffic regardless of caller concurrency.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use radiod_common::{Error, ErrorKind, Result};

use crate::metrics::Metrics;
use crate::multicast::SendSocket;
use crate::rate_limiter::RateLimiter;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct Dispatcher {
    socket: Mutex<SendSocket>,
    limiter: RateLimiter,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(socket: SendSocket, max_commands_per_sec: u32, metrics: Arc<Metrics>) -> Self {
        Self {
            socket: Mutex::new(socket),
            limiter: RateLimiter::new(max_commands_per_sec),
            metrics,
        }
    }

    /// Sends `buf` as a single UDP datagram, retrying transient OS-level
    /// send failures up to `max_retries` times with exponential backoff
    /// starting at `retry_delay`. Blocks up to ~1s inside the rate
    /// limiter before the first attempt.
    pub fn send(&self, buf: &[u8], max_retries: u32, retry_delay: Duration) -> Result<usize> {
        self.limiter.acquire();

        let mut attempt = 0;
        loop {
            let result = {
                let socket = self.socket.lock();
                socket.send(buf)
            };

            match result {
                Ok(n) => {
                    self.metrics.record_success();
                    return Ok(n);
                }
                Err(e) if attempt < max_retries => {
                    let delay = retry_delay.saturating_mul(1 << attempt);
                    log::warn!(
                        "command send failed (attempt {}/{max_retries}): {e}, retrying in {delay:?}",
                        attempt + 1
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    self.metrics.record_failure(ErrorKind::Command, e.to_string());
                    return Err(Error::Command(e));
                }
            }
        }
    }

    /// Sends with the default retry budget (`3` retries, `100ms` base
    /// delay).
    pub fn send_default(&self, buf: &[u8]) -> Result<usize> {
        self.send(buf, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn successful_send_increments_metrics_once() {
        // A loopback-bound multicast pair stands in for the daemon.
        let group = Ipv4Addr::new(239, 211, 19, 9);
        let recv = crate::multicast::RecvSocket::new_on_port(group, None, 54230).unwrap();
        let send = SendSocket::new(group, None, true, crate::multicast::DEFAULT_TTL).unwrap();

        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(send, 100, metrics.clone());

        // Re-target at the test port instead of the well-known one.
        dispatcher
            .socket
            .lock()
            .send_to_test_port(group, 54230)
            .unwrap();

        dispatcher.send_default(b"ping").unwrap();

        let mut buf = [0u8; 16];
        let size = recv
            .recv_with_deadline(&mut buf, Duration::from_millis(500))
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..size], b"ping");

        let snap = metrics.snapshot();
        assert_eq!(snap.commands_sent, 1);
        assert_eq!(snap.commands_failed, 0);
    }
}
