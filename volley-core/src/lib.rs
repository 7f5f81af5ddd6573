//! Core types for the volley benchmark engine: run options, the shared run
//! limiter, per-worker sample state, and the report data model.

mod call;
mod config;
mod constants;
mod duration;
mod limiter;
mod report;
mod sink;
mod state;

pub use call::*;
pub use config::*;
pub use constants::*;
pub use duration::*;
pub use limiter::*;
pub use report::*;
pub use sink::*;
pub use state::*;
