use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid duration {0:?}")]
pub struct ParseDurationError(pub String);

/// Renders a duration in the compact form used throughout the report:
/// `450ns`, `12.5µs`, `1.234ms`, `2.5s`, `1m40s`, `1h0m1s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return with_unit(nanos, 1_000, "µs");
    }
    if nanos < 1_000_000_000 {
        return with_unit(nanos, 1_000_000, "ms");
    }

    let total_secs = nanos / 1_000_000_000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = with_unit(nanos % 60_000_000_000, 1_000_000_000, "s");
    match (hours, mins) {
        (0, 0) => secs,
        (0, m) => format!("{m}m{secs}"),
        (h, m) => format!("{h}h{m}m{secs}"),
    }
}

fn with_unit(nanos: u128, unit_nanos: u128, unit: &str) -> String {
    let whole = nanos / unit_nanos;
    let frac = nanos % unit_nanos;
    if frac == 0 {
        return format!("{whole}{unit}");
    }
    let digits = unit_nanos.ilog10() as usize;
    let mut frac = format!("{frac:0digits$}");
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{whole}.{frac}{unit}")
}

/// Parses the formats produced by [`format_duration`]: one or more
/// `<number><unit>` terms with units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
/// A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(ParseDurationError(input.to_string()));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| ParseDurationError(input.to_string()))?;
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| ParseDurationError(input.to_string()))?;
        let tail = &rest[num_end..];

        let (unit_len, secs_per_unit) = if tail.starts_with("ns") {
            (2, 1e-9)
        } else if tail.starts_with("µs") {
            ("µs".len(), 1e-6)
        } else if tail.starts_with("us") {
            (2, 1e-6)
        } else if tail.starts_with("ms") {
            (2, 1e-3)
        } else if tail.starts_with('s') {
            (1, 1.0)
        } else if tail.starts_with('m') {
            (1, 60.0)
        } else if tail.starts_with('h') {
            (1, 3600.0)
        } else {
            return Err(ParseDurationError(input.to_string()));
        };

        total += Duration::from_secs_f64(value * secs_per_unit);
        rest = &tail[unit_len..];
    }
    Ok(total)
}
