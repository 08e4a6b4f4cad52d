pub mod dispatcher;
pub mod metrics;
pub mod multicast;
pub mod rate_limiter;
pub mod resolve;

pub use dispatcher::Dispatcher;
pub use metrics::{Metrics, MetricsSnapshot};
pub use multicast::{RecvSocket, SendSocket, STATUS_PORT};
pub use rate_limiter::RateLimiter;
pub use resolve::resolve_ipv4;
