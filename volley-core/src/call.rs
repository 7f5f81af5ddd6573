use std::time::Duration;
use thiserror::Error;

/// The call shape a caller implements. Streaming variants only differ in
/// which side drives a message sequence; the engine branches on this when
/// assembling the stream summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodType {
    Unary,
    ClientStream,
    ServerStream,
    BidiStream,
}

impl MethodType {
    pub fn is_streaming(self) -> bool {
        !matches!(self, MethodType::Unary)
    }
}

/// Message counters for one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamCounts {
    pub sent: u64,
    pub received: u64,
}

/// The result of one successful call: the round-trip latency measured
/// inside the caller, plus stream counters when the call was streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallReport {
    pub latency: Duration,
    pub stream: Option<StreamCounts>,
}

impl CallReport {
    pub fn unary(latency: Duration) -> Self {
        Self {
            latency,
            stream: None,
        }
    }

    pub fn streaming(latency: Duration, sent: u64, received: u64) -> Self {
        Self {
            latency,
            stream: Some(StreamCounts { sent, received }),
        }
    }
}

/// A failed call. Callers surface timeouts and cancellation explicitly so
/// the error histogram groups them under stable categories.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("call timed out")]
    Timeout,

    #[error("call canceled")]
    Canceled,

    /// A protocol-level error status from the remote.
    #[error("remote error {code}: {message}")]
    Status { code: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything the caller could not classify, e.g. bad input for a
    /// streaming request body.
    #[error("{0}")]
    Other(String),
}

impl CallError {
    /// A short, stable string identifying the error class. This is the key
    /// under which errors are counted and reported.
    pub fn category(&self) -> String {
        match self {
            CallError::Timeout => "timeout".to_string(),
            CallError::Canceled => "canceled".to_string(),
            CallError::Status { code, .. } => code.clone(),
            CallError::Io(err) => err.kind().to_string(),
            CallError::Other(message) => {
                message.lines().next().unwrap_or_default().trim().to_string()
            }
        }
    }
}
