use async_trait::async_trait;
use volley_core::{CallError, CallReport, MethodType};

/// Connection inputs handed through to the caller when opening transports.
/// Everything beyond the peer list is opaque to the engine.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub service_name: String,
    pub caller_name: String,
    /// Reachable endpoints for the target service. Warm-up balances the
    /// opened transports across these.
    pub peers: Vec<String>,
}

/// An opened transport paired with the peer it is connected to. The peer
/// string doubles as the stable id used for per-peer stat prefixes.
#[derive(Debug)]
pub struct PeerTransport<T> {
    pub transport: T,
    pub peer: String,
}

/// The unit of work executed by each worker: one call on an opened
/// transport, producing a latency (and stream counters for streaming
/// methods) or an error.
///
/// Implementations own all encoding and decoding, apply the per-request
/// timeout, and surface timeouts and cancellation as [`CallError`]s. The
/// engine never inspects the transport; it only opens transports through
/// [`connect`](Caller::connect) and hands them back to
/// [`call`](Caller::call).
#[async_trait]
pub trait Caller: Send + Sync {
    type Transport: Send + Sync + 'static;

    /// The procedure name, used to label published stats.
    fn method(&self) -> &str;

    fn method_type(&self) -> MethodType {
        MethodType::Unary
    }

    /// Opens one reusable transport to the given peer. Called once per
    /// connection during warm-up.
    async fn connect(
        &self,
        peer: &str,
        opts: &TransportOptions,
    ) -> Result<Self::Transport, CallError>;

    /// Issues one call and measures its round-trip latency. For streaming
    /// methods this opens a stream, drives the client message sequence,
    /// drains the server's, and reports both counts.
    async fn call(&self, transport: &Self::Transport) -> Result<CallReport, CallError>;
}
