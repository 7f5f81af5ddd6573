//! Minimal fire-and-forget statsd publisher. Stats flow through the
//! [`StatsSink`] trait so any other backend can be swapped in; this one
//! exists so a plain host:port option is enough to get per-run counters
//! and timers out of the process.

use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;
use volley_core::{NoopSink, StatsSink};

struct StatsdSink {
    socket: UdpSocket,
    prefix: String,
}

impl StatsSink for StatsdSink {
    fn incr(&self, name: &str) {
        // Send failures are dropped; stats must never slow the hot loop.
        let _ = self
            .socket
            .send(format!("{}{name}:1|c", self.prefix).as_bytes());
    }

    fn timing(&self, name: &str, value: Duration) {
        let _ = self
            .socket
            .send(format!("{}{name}:{}|ms", self.prefix, value.as_millis()).as_bytes());
    }
}

/// Builds the base sink for a run. An unset or empty host:port yields a
/// no-op sink; a host that fails to resolve is an error the run treats as
/// fatal.
pub fn new_sink(
    host_port: Option<&str>,
    service: &str,
    method: &str,
) -> io::Result<Arc<dyn StatsSink>> {
    let Some(host_port) = host_port.filter(|hp| !hp.is_empty()) else {
        return Ok(Arc::new(NoopSink));
    };

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(host_port)?;
    socket.set_nonblocking(true)?;

    Ok(Arc::new(StatsdSink {
        socket,
        prefix: format!("volley.{}.{}.", clean(service), clean(method)),
    }))
}

// Statsd name segments: anything outside [a-zA-Z0-9_-] becomes '_'.
fn clean(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
