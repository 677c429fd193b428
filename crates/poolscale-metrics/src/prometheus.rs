//! PromQL expressions and Prometheus HTTP API decoding.
//!
//! The scrape collector only needs two instant queries per instance. The
//! decoder is for `ScrapeApi` implementations that talk to the
//! `/api/v1/query` endpoint and need to turn its JSON into samples.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::scrape::Sample;

/// CPU busy percentage: 100 minus the idle rate over the last five minutes.
pub fn cpu_utilization_query(target: &str) -> String {
    format!(
        "100 - (avg by (instance) (rate(node_cpu_seconds_total{{mode=\"idle\", instance=\"{target}\"}}[5m])) * 100)"
    )
}

/// Memory percentage: active bytes over total bytes.
pub fn memory_utilization_query(target: &str) -> String {
    format!(
        "(node_memory_Active_bytes{{instance=\"{target}\"}} / node_memory_MemTotal_bytes{{instance=\"{target}\"}}) * 100"
    )
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<VectorSeries>,
}

#[derive(Debug, Deserialize)]
struct VectorSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    /// `[unix_timestamp, "value"]`.
    value: (f64, String),
}

/// Decode an instant-vector response body into samples.
///
/// Errors on a non-success status, a non-vector result, or a value that
/// is not a number. An empty result vector decodes to no samples.
pub fn parse_vector_response(body: &str) -> anyhow::Result<Vec<Sample>> {
    let response: QueryResponse =
        serde_json::from_str(body).context("malformed query response")?;

    if response.status != "success" {
        bail!(
            "query failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    let Some(data) = response.data else {
        bail!("query response has no data");
    };

    if data.result_type != "vector" {
        bail!("expected a vector result, got {}", data.result_type);
    }

    data.result
        .into_iter()
        .map(|series| {
            let value = series
                .value
                .1
                .parse::<f64>()
                .with_context(|| format!("sample value `{}` is not a number", series.value.1))?;
            Ok(Sample {
                labels: series.metric,
                value,
            })
        })
        .collect()
}
