//! The run controller: validates options, warms the connection matrix,
//! fans `connections × concurrency` workers out over one shared limiter,
//! then merges worker samples and reports.

use crate::caller::{Caller, TransportOptions};
use crate::progress::{self, ProgressBar};
use crate::reporter::{self, Output, OutputFormat};
use crate::statsd;
use crate::warmup::{self, WarmupError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::{
    BenchmarkOptions, BenchmarkOutput, BenchmarkParameters, BenchmarkState, LatencyMap, MultiSink,
    OptionsError, PrefixedSink, Run, StatsSink, StreamSummary, Summary,
};

/// Inputs to one run: the benchmark knobs plus the transport inputs that
/// are handed through to the caller untouched.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub bench: BenchmarkOptions,
    pub transport: TransportOptions,
}

/// Conditions that terminate a run before any worker starts. Per-call
/// failures are never fatal; they are recorded into worker state and
/// summarized at the end.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("invalid benchmarking options: {0}")]
    InvalidOptions(#[from] OptionsError),

    #[error("failed to warm up connections for benchmark: {0}")]
    Warmup(#[from] WarmupError),

    #[error("failed to create statsd client for benchmark: {0}")]
    Statsd(#[from] std::io::Error),

    #[error("failed to marshal benchmark output: {0}")]
    Marshal(#[from] serde_json::Error),
}

/// Runs one benchmark to completion and reports through `out`.
///
/// Returns `Ok(None)` without side effects when benchmarking is disabled
/// (no request and no duration bound). A `SIGINT` during the run stops the
/// limiter and lets in-flight calls drain; the partial results are
/// reported normally.
pub async fn run_benchmark<C>(
    out: Arc<dyn Output>,
    opts: Options,
    caller: Arc<C>,
) -> Result<Option<BenchmarkOutput>, BenchmarkError>
where
    C: Caller + 'static,
{
    let Options {
        bench: bopts,
        transport: topts,
    } = opts;

    bopts.validate()?;
    if !bopts.enabled() {
        return Ok(None);
    }

    let max_requests = bopts.effective_max_requests();
    let cpus = bopts.resolve_cpus();
    let connections = bopts.num_connections(cpus);
    let concurrency = bopts.concurrency.max(1);

    let parameters = BenchmarkParameters {
        cpus,
        connections,
        concurrency,
        max_requests,
        max_duration: volley_core::format_duration(bopts.max_duration),
        max_rps: bopts.rps,
    };

    let (format, warning) = OutputFormat::resolve(&bopts.format);
    if let Some(warning) = warning {
        out.warnf(&warning);
    }
    // In JSON mode the parameters are deferred into the single result
    // object printed after the run.
    if format == OutputFormat::Text {
        reporter::print_parameters(&*out, &parameters);
    }

    debug!(connections, "warming up connections");
    let transports =
        warmup::warm_transports(Arc::clone(&caller), connections, &topts, bopts.warmup_requests)
            .await?;

    let base_sink = statsd::new_sink(
        bopts.statsd_host_port.as_deref(),
        &topts.service_name,
        caller.method(),
    )?;

    // Worker states are laid out connection-major: states[i * concurrency + j]
    // belongs to the j-th worker on connection i.
    let mut shared_transports = Vec::with_capacity(transports.len());
    let mut states = Vec::with_capacity(transports.len() * concurrency);
    for peer_transport in transports {
        let sink: Arc<dyn StatsSink> = if bopts.per_peer_stats {
            let prefixed: Arc<dyn StatsSink> = Arc::new(PrefixedSink::new(
                Arc::clone(&base_sink),
                format!("peer.{}.", peer_transport.peer),
            ));
            Arc::new(MultiSink::new(vec![Arc::clone(&base_sink), prefixed]))
        } else {
            Arc::clone(&base_sink)
        };
        for _ in 0..concurrency {
            states.push(BenchmarkState::new(Arc::clone(&sink)));
        }
        shared_transports.push(Arc::new(peer_transport.transport));
    }

    let run = Arc::new(Run::new(max_requests, bopts.rps, bopts.max_duration));
    let interrupt = stop_on_interrupt(Arc::clone(&out), Arc::clone(&run));

    let bar = bopts
        .progress_bar
        .then(|| progress::plan(max_requests, bopts.max_duration))
        .flatten()
        .map(|plan| Arc::new(ProgressBar::new(plan)));
    let redraw = bar
        .as_ref()
        .map(|bar| tokio::spawn(progress::redraw_loop(Arc::clone(bar))));

    info!(
        max_requests,
        rps = bopts.rps,
        max_duration = ?bopts.max_duration,
        connections,
        concurrency,
        "benchmark starting"
    );
    let start = Instant::now();

    let mut workers = Vec::with_capacity(states.len());
    let mut states = states.into_iter();
    for transport in &shared_transports {
        for _ in 0..concurrency {
            let state = states.next().expect("one state per worker");
            workers.push(tokio::spawn(run_worker(
                Arc::clone(&caller),
                Arc::clone(transport),
                state,
                Arc::clone(&run),
                bar.clone(),
            )));
        }
    }

    let mut overall: Option<BenchmarkState> = None;
    for worker in workers {
        let state = worker.await.expect("worker task panicked");
        match &mut overall {
            None => overall = Some(state),
            Some(overall) => overall.merge(state),
        }
    }
    let elapsed = start.elapsed();

    interrupt.abort();
    if let Some(redraw) = redraw {
        redraw.abort();
    }
    if let Some(bar) = &bar {
        bar.finish();
    }

    let overall = overall.expect("at least one worker ran");
    info!(
        total_requests = overall.total_requests(),
        elapsed = ?elapsed,
        "benchmark complete"
    );

    let output = assemble_output(parameters, &overall, elapsed, caller.method_type().is_streaming());
    match format {
        OutputFormat::Text => reporter::print_text_results(&*out, &output),
        OutputFormat::Json => reporter::print_json(&*out, &output)?,
    }
    Ok(Some(output))
}

fn assemble_output(
    parameters: BenchmarkParameters,
    overall: &BenchmarkState,
    elapsed: Duration,
    streaming: bool,
) -> BenchmarkOutput {
    // Elapsed time is reported at millisecond granularity; the raw value
    // still feeds the RPS computation so sub-millisecond runs stay sane.
    let snapped = Duration::from_millis(elapsed.as_millis() as u64);
    let raw_secs = elapsed.as_secs_f64();
    let total_requests = overall.total_requests();
    let rps = if raw_secs > 0.0 {
        (total_requests as f64 / raw_secs * 100.0).round() / 100.0
    } else {
        0.0
    };

    let (sent, received) = overall.stream_messages();
    BenchmarkOutput {
        benchmark_parameters: parameters,
        latencies: LatencyMap::from_quantiles(&overall.latencies()),
        summary: Summary {
            elapsed_time_seconds: snapped.as_secs_f64(),
            total_requests,
            rps,
        },
        error_summary: overall.error_summary(),
        stream_summary: streaming.then_some(StreamSummary {
            total_stream_messages_sent: sent,
            total_stream_messages_received: received,
        }),
    }
}

async fn run_worker<C: Caller>(
    caller: Arc<C>,
    transport: Arc<C::Transport>,
    mut state: BenchmarkState,
    run: Arc<Run>,
    bar: Option<Arc<ProgressBar>>,
) -> BenchmarkState {
    while run.more().await {
        match caller.call(&transport).await {
            Ok(report) => {
                state.record_latency(report.latency);
                if let Some(stream) = report.stream {
                    state.record_stream_messages(stream.sent, stream.received);
                }
            }
            Err(err) => {
                debug!(error = %err, "call failed during benchmark");
                state.record_error(&err);
            }
        }
        if let Some(bar) = &bar {
            bar.inc();
        }
    }
    state
}

/// Translates SIGINT into a limiter stop. Workers observe the limiter
/// refusing further grants rather than any cancellation of their own.
fn stop_on_interrupt(out: Arc<dyn Output>, run: Arc<Run>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            // Preceding newline since Ctrl-C is echoed inline.
            out.printf("\n!!Benchmark interrupted!!\n");
            run.stop();
        }
    })
}
