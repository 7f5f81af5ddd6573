use crate::constants::quantile_key;
use crate::duration::format_duration;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The resolved inputs of a run, echoed verbatim in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkParameters {
    pub cpus: usize,
    pub connections: usize,
    pub concurrency: usize,
    pub max_requests: u64,
    pub max_duration: String,
    #[serde(rename = "maxRPS")]
    pub max_rps: u32,
}

/// Quantile → latency pairs in fixed quantile order. Serialized as a JSON
/// object whose keys keep that order, which a plain map would not.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LatencyMap(Vec<(String, String)>);

impl LatencyMap {
    pub fn from_quantiles(values: &[(f64, Duration)]) -> Self {
        Self(
            values
                .iter()
                .map(|&(q, latency)| (quantile_key(q), format_duration(latency)))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.0
    }
}

impl Serialize for LatencyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (quantile, latency) in &self.0 {
            map.serialize_entry(quantile, latency)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LatencyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LatencyMapVisitor;

        impl<'de> Visitor<'de> for LatencyMapVisitor {
            type Value = LatencyMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of quantile keys to latency strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, String>()? {
                    entries.push(entry);
                }
                Ok(LatencyMap(entries))
            }
        }

        deserializer.deserialize_map(LatencyMapVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub elapsed_time_seconds: f64,
    pub total_requests: u64,
    pub rps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total_errors: u64,
    pub error_rate: f64,
    pub errors_count: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub total_stream_messages_sent: u64,
    pub total_stream_messages_received: u64,
}

/// The final record of a run. Serialized field order follows declaration
/// order; the optional summaries disappear from the output entirely when
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkOutput {
    pub benchmark_parameters: BenchmarkParameters,
    pub latencies: LatencyMap,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_summary: Option<ErrorSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stream_summary: Option<StreamSummary>,
}
