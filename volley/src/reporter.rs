//! Report rendering: the parameters header, the post-run latency and
//! error blocks, and the single-object JSON form.

use std::io::Write;
use std::sync::Mutex;
use volley_core::{BenchmarkOutput, BenchmarkParameters, ErrorSummary, StreamSummary, Summary};

/// Where user-facing report lines go. Warnings are kept separate so JSON
/// output stays a single parseable object on the primary stream.
pub trait Output: Send + Sync {
    fn printf(&self, message: &str);
    fn warnf(&self, message: &str);
}

/// Stdout/stderr-backed output used by real runs.
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn printf(&self, message: &str) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(message.as_bytes());
        let _ = stdout.flush();
    }

    fn warnf(&self, message: &str) {
        eprint!("{message}");
    }
}

/// Captures output in memory. Intended for tests.
#[derive(Default)]
pub struct BufferOutput {
    printed: Mutex<String>,
    warned: Mutex<String>,
}

impl BufferOutput {
    pub fn printed(&self) -> String {
        self.printed.lock().unwrap().clone()
    }

    pub fn warned(&self) -> String {
        self.warned.lock().unwrap().clone()
    }
}

impl Output for BufferOutput {
    fn printf(&self, message: &str) {
        self.printed.lock().unwrap().push_str(message);
    }

    fn warnf(&self, message: &str) {
        self.warned.lock().unwrap().push_str(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Maps the format option to a renderer. Unrecognized values warn and
    /// fall back to text.
    pub fn resolve(format: &str) -> (Self, Option<String>) {
        match format {
            "" | "text" => (OutputFormat::Text, None),
            "json" | "JSON" => (OutputFormat::Json, None),
            other => (
                OutputFormat::Text,
                Some(format!(
                    "unrecognized format {other:?}, expected \"text\" or \"json\"; \
                     printing text output\n"
                )),
            ),
        }
    }
}

pub(crate) fn print_parameters(out: &dyn Output, params: &BenchmarkParameters) {
    out.printf("Benchmark parameters:\n");
    out.printf(&format!("  CPUs:            {}\n", params.cpus));
    out.printf(&format!("  Connections:     {}\n", params.connections));
    out.printf(&format!("  Concurrency:     {}\n", params.concurrency));
    out.printf(&format!("  Max requests:    {}\n", params.max_requests));
    out.printf(&format!("  Max duration:    {}\n", params.max_duration));
    out.printf(&format!("  Max RPS:         {}\n", params.max_rps));
}

pub(crate) fn print_text_results(out: &dyn Output, output: &BenchmarkOutput) {
    if let Some(errors) = &output.error_summary {
        print_errors(out, errors);
    }
    print_latencies(out, output);
    print_summary(out, &output.summary, output.stream_summary.as_ref());
}

fn print_errors(out: &dyn Output, errors: &ErrorSummary) {
    out.printf("Errors:\n");
    for (category, count) in &errors.errors_count {
        out.printf(&format!("  {category}: {count}\n"));
    }
    out.printf(&format!("Total errors: {}\n", errors.total_errors));
    out.printf(&format!("Error rate: {:.2}%\n", errors.error_rate * 100.0));
}

fn print_latencies(out: &dyn Output, output: &BenchmarkOutput) {
    out.printf("Latencies:\n");
    for (quantile, latency) in output.latencies.entries() {
        out.printf(&format!("  {quantile}: {latency}\n"));
    }
}

fn print_summary(out: &dyn Output, summary: &Summary, stream: Option<&StreamSummary>) {
    out.printf(&format!(
        "Elapsed time (seconds):   {:.2}\n",
        summary.elapsed_time_seconds
    ));
    out.printf(&format!(
        "Total requests:           {}\n",
        summary.total_requests
    ));
    out.printf(&format!("RPS:                      {:.2}\n", summary.rps));
    if let Some(stream) = stream {
        out.printf(&format!(
            "Total stream messages sent:     {}\n",
            stream.total_stream_messages_sent
        ));
        out.printf(&format!(
            "Total stream messages received: {}\n",
            stream.total_stream_messages_received
        ));
    }
}

pub(crate) fn print_json(out: &dyn Output, output: &BenchmarkOutput) -> serde_json::Result<()> {
    let encoded = serde_json::to_string_pretty(output)?;
    out.printf(&format!("{encoded}\n\n"));
    Ok(())
}
