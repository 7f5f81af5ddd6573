//! Runs the benchmark engine against an in-process caller that sleeps for
//! a couple of milliseconds per call. Useful for eyeballing both report
//! formats without a server:
//!
//! ```text
//! cargo run --example mock_bench
//! cargo run --example mock_bench -- json
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use volley::{
    run_benchmark, BenchmarkOptions, CallError, CallReport, Caller, ConsoleOutput, Options,
    TransportOptions,
};

struct SleepingCaller;

#[async_trait]
impl Caller for SleepingCaller {
    type Transport = ();

    fn method(&self) -> &str {
        "Echo::echo"
    }

    async fn connect(&self, _peer: &str, _opts: &TransportOptions) -> Result<(), CallError> {
        Ok(())
    }

    async fn call(&self, _transport: &()) -> Result<CallReport, CallError> {
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(CallReport::unary(started.elapsed()))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volley=info".into()),
        )
        .init();

    let opts = Options {
        bench: BenchmarkOptions {
            max_requests: 500,
            max_duration: Duration::from_secs(10),
            connections: 4,
            concurrency: 2,
            warmup_requests: 5,
            format: std::env::args().nth(1).unwrap_or_default(),
            progress_bar: true,
            ..Default::default()
        },
        transport: TransportOptions {
            service_name: "echo".to_string(),
            caller_name: "mock-bench".to_string(),
            peers: vec!["in-process".to_string()],
        },
    };

    // The runtime carries the worker parallelism; size it from the
    // resolved CPU count so the reported value matches reality.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(opts.bench.resolve_cpus())
        .enable_all()
        .build()
        .expect("runtime construction");

    let result = runtime.block_on(run_benchmark(
        Arc::new(ConsoleOutput),
        opts,
        Arc::new(SleepingCaller),
    ));
    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
