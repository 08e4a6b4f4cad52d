//! A sliding one-second window bounding outbound command rate (§4.3).

use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Window {
    start: Instant,
    count: u32,
}

/// Never permits more than `max_per_sec` successful `send` attempts
/// inside any one-second window. Blocks the caller for the remainder of
/// the window once the budget is exhausted, rather than rejecting the
/// call.
pub struct RateLimiter {
    max_per_sec: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_per_sec: u32) -> Self {
        Self {
            max_per_sec,
            window: Mutex::new(Window {
                start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Blocks (if necessary) until a send is permitted under the rate
    /// limit, then reserves the slot.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock();
                let elapsed = window.start.elapsed();

                if elapsed >= Duration::from_secs(1) {
                    window.start = Instant::now();
                    window.count = 0;
                }

                if window.count < self.max_per_sec {
                    window.count += 1;
                    None
                } else {
                    Some(Duration::from_secs(1) - elapsed)
                }
            };

            match wait {
                None => return,
                Some(remaining) => {
                    log::debug!("rate limit reached, sleeping {remaining:?}");
                    std::thread::sleep(remaining);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_up_to_budget_without_blocking() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire();
        }

        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn blocks_once_budget_exhausted() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire();
        }

        // The third acquire must have waited out most of the window.
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
