use chrono::NaiveTime;
use serde::Serialize;

use poolscale_core::{AutoscalerConfig, PoolLimits, Thresholds, ValidatedPool};

/// Validation result for one configured pool.
#[derive(Debug, Serialize)]
pub struct PoolReport {
    pub pool_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PoolSummary>,
}

#[derive(Debug, Serialize)]
pub struct PoolSummary {
    pub region: String,
    pub compartment_id: String,
    pub method: &'static str,
    pub limits: PoolLimits,
    pub thresholds: Thresholds,
    pub windows: Vec<String>,
    /// Index of the window containing the check time.
    pub active_window: Option<usize>,
}

impl PoolReport {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

fn summarize(pool: &ValidatedPool, now: NaiveTime) -> PoolSummary {
    PoolSummary {
        region: pool.pool.region.clone(),
        compartment_id: pool.pool.compartment_id.clone(),
        method: pool.monitoring.method.as_str(),
        limits: pool.limits,
        thresholds: pool.thresholds,
        windows: pool.windows.iter().map(ToString::to_string).collect(),
        active_window: pool.windows.iter().position(|w| w.contains(now)),
    }
}

/// Validate every pool, each independently of the others.
pub fn build_reports(config: &AutoscalerConfig, now: NaiveTime) -> Vec<PoolReport> {
    config
        .validate_all()
        .into_iter()
        .map(|(pool_id, result)| match result {
            Ok(pool) => PoolReport {
                pool_id,
                error: None,
                summary: Some(summarize(&pool, now)),
            },
            Err(e) => PoolReport {
                pool_id,
                error: Some(e.to_string()),
                summary: None,
            },
        })
        .collect()
}

pub fn format_reports(reports: &[PoolReport]) -> String {
    let mut out = String::new();
    let invalid = reports.iter().filter(|r| !r.is_valid()).count();

    out.push_str(&format!(
        "{} pool(s) configured, {} valid, {} invalid\n\n",
        reports.len(),
        reports.len() - invalid,
        invalid
    ));

    for report in reports {
        match (&report.error, &report.summary) {
            (Some(error), _) => {
                out.push_str(&format!("✗ {}\n", report.pool_id));
                out.push_str(&format!("    error:      {error}\n"));
            }
            (None, Some(s)) => {
                out.push_str(&format!("✓ {}\n", report.pool_id));
                out.push_str(&format!("    region:     {}\n", s.region));
                out.push_str(&format!("    collector:  {}\n", s.method));
                out.push_str(&format!("    limits:     {}..{}\n", s.limits.min, s.limits.max));
                out.push_str(&format!("    thresholds: {}\n", s.thresholds));
                if s.windows.is_empty() {
                    out.push_str("    schedule:   none\n");
                }
                for (i, window) in s.windows.iter().enumerate() {
                    let marker = if s.active_window == Some(i) { "  (active now)" } else { "" };
                    out.push_str(&format!("    schedule:   {window}{marker}\n"));
                }
            }
            (None, None) => {}
        }
        out.push('\n');
    }

    out
}

pub fn check(config: &AutoscalerConfig, now: NaiveTime, format: &str) -> anyhow::Result<()> {
    let reports = build_reports(config, now);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => print!("{}", format_reports(&reports)),
    }

    let invalid = reports.iter().filter(|r| !r.is_valid()).count();
    if invalid > 0 {
        anyhow::bail!("{invalid} pool(s) failed validation");
    }
    Ok(())
}
