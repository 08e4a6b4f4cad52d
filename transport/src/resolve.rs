//! Host-or-IP resolution cascade (§4.2): a literal IPv4 is used directly;
//! otherwise a Linux mDNS resolver command, then a macOS-style DNS-SD
//! browse, then the OS `getaddrinfo` fallback are tried in order, each
//! bounded by `stage_timeout`. The first stage that produces an IPv4
//! address wins.

use std::net::{Ipv4Addr, ToSocketAddrs};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::bounded;
use radiod_common::Error;

pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolves `host` (a dotted-quad IPv4, a plain hostname, or a `.local`
/// name) to an IPv4 address.
pub fn resolve_ipv4(host: &str, stage_timeout: Duration) -> radiod_common::Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    if let Some(addr) = linux_mdns_resolve(host, stage_timeout) {
        return Ok(addr);
    }

    if let Some(addr) = macos_dns_sd_resolve(host, stage_timeout) {
        return Ok(addr);
    }

    getaddrinfo_ipv4(host).map_err(Error::Connection)
}

fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Option<String> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::null());
    let mut child = cmd.spawn().ok()?;

    let (tx, rx) = bounded(1);
    let stdout = child.stdout.take();
    thread::spawn(move || {
        use std::io::Read;
        let mut out = String::new();
        if let Some(mut stdout) = stdout {
            let _ = stdout.read_to_string(&mut out);
        }
        let _ = tx.send(out);
    });

    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(Some(_)) = child.try_wait() {
            break;
        }

        if Instant::now() >= deadline {
            log::warn!("resolver command timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }

        thread::sleep(Duration::from_millis(20));
    }

    rx.recv_timeout(Duration::from_millis(200)).ok()
}

/// Resolution via `avahi-resolve-host-name`, when present on the host.
#[cfg(target_os = "linux")]
fn linux_mdns_resolve(host: &str, timeout: Duration) -> Option<Ipv4Addr> {
    if which::which("avahi-resolve-host-name").is_err() {
        return None;
    }

    let mut cmd = Command::new("avahi-resolve-host-name");
    cmd.args(["-4", host]);

    let output = run_with_timeout(cmd, timeout)?;
    output
        .split_whitespace()
        .nth(1)
        .and_then(|field| field.parse().ok())
}

#[cfg(not(target_os = "linux"))]
fn linux_mdns_resolve(_host: &str, _timeout: Duration) -> Option<Ipv4Addr> {
    None
}

/// Resolution via `dns-sd -G v4 <host>`, when present on the host.
#[cfg(target_os = "macos")]
fn macos_dns_sd_resolve(host: &str, timeout: Duration) -> Option<Ipv4Addr> {
    if which::which("dns-sd").is_err() {
        return None;
    }

    let mut cmd = Command::new("dns-sd");
    cmd.args(["-G", "v4", host]);

    let output = run_with_timeout(cmd, timeout)?;
    output
        .lines()
        .last()
        .and_then(|line| line.split_whitespace().last())
        .and_then(|field| field.parse().ok())
}

#[cfg(not(target_os = "macos"))]
fn macos_dns_sd_resolve(_host: &str, _timeout: Duration) -> Option<Ipv4Addr> {
    None
}

fn getaddrinfo_ipv4(host: &str) -> std::io::Result<Ipv4Addr> {
    (host, 0u16)
        .to_socket_addrs()?
        .find_map(|addr| match addr.ip() {
            std::net::IpAddr::V4(v4) => Some(v4),
            std::net::IpAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no IPv4 address found for {host}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_ipv4_short_circuits() {
        let addr = resolve_ipv4("239.1.2.3", Duration::from_millis(10)).unwrap();
        assert_eq!(addr, Ipv4Addr::new(239, 1, 2, 3));
    }

    #[test]
    fn getaddrinfo_resolves_localhost() {
        let addr = getaddrinfo_ipv4("localhost").unwrap();
        assert!(addr.is_loopback());
    }
}
