use std::sync::Arc;
use std::time::Duration;

/// Destination for per-call stats. Implementations must be safe to share
/// across workers.
pub trait StatsSink: Send + Sync {
    fn incr(&self, name: &str);
    fn timing(&self, name: &str, value: Duration);
}

/// Discards everything. Used when no stats endpoint is configured.
pub struct NoopSink;

impl StatsSink for NoopSink {
    fn incr(&self, _name: &str) {}
    fn timing(&self, _name: &str, _value: Duration) {}
}

/// Prepends a fixed prefix to every stat name, e.g. `peer.<addr>.`.
pub struct PrefixedSink {
    inner: Arc<dyn StatsSink>,
    prefix: String,
}

impl PrefixedSink {
    pub fn new(inner: Arc<dyn StatsSink>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl StatsSink for PrefixedSink {
    fn incr(&self, name: &str) {
        self.inner.incr(&format!("{}{name}", self.prefix));
    }

    fn timing(&self, name: &str, value: Duration) {
        self.inner.timing(&format!("{}{name}", self.prefix), value);
    }
}

/// Fans every stat out to each wrapped sink, which is how per-peer stats
/// dual-emit under both the bare and the prefixed name.
pub struct MultiSink {
    sinks: Vec<Arc<dyn StatsSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn StatsSink>>) -> Self {
        Self { sinks }
    }
}

impl StatsSink for MultiSink {
    fn incr(&self, name: &str) {
        for sink in &self.sinks {
            sink.incr(name);
        }
    }

    fn timing(&self, name: &str, value: Duration) {
        for sink in &self.sinks {
            sink.timing(name, value);
        }
    }
}
