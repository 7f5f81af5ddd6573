//! Closed-loop benchmark engine for RPC callers.
//!
//! The engine drives `connections × concurrency` workers against a caller
//! implementation, each worker looping on a shared [`Run`] limiter, and
//! reports merged latency quantiles, throughput, and an error histogram in
//! text or JSON form. Transports, encodings, and flag parsing live behind
//! the [`Caller`](caller::Caller) trait; the engine only ever sees opened
//! transports and per-call reports.

pub mod caller;
pub mod progress;
pub mod reporter;
pub mod runner;
pub mod statsd;
pub mod warmup;

pub use caller::{Caller, PeerTransport, TransportOptions};
pub use reporter::{BufferOutput, ConsoleOutput, Output, OutputFormat};
pub use runner::{run_benchmark, BenchmarkError, Options};

pub use volley_core::{
    format_duration, parse_duration, parse_max_duration, BenchmarkOptions, BenchmarkOutput,
    BenchmarkParameters, BenchmarkState, CallError, CallReport, ErrorSummary, LatencyMap,
    MethodType, MultiSink, NoopSink, OptionsError, PrefixedSink, Run, StatsSink, StreamCounts,
    StreamSummary, Summary, QUANTILES,
};
