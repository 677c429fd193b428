use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use poolscale_autoscale::{Decision, decide};
use poolscale_core::{AutoscalerConfig, MemoryPool, MetricsSnapshot};
use poolscale_pool::{InstancePoolController, ResizeOutcome};

/// A hypothetical reading to plan against.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput {
    pub cpu: f64,
    pub ram: f64,
    pub size: u32,
    pub scheduler_active: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub pool_id: String,
    pub metrics: MetricsSnapshot,
    pub size: u32,
    pub scheduler_active: bool,
    pub decision: Decision,
    /// What the pool controller would do with the action.
    pub outcome: String,
    pub resulting_size: u32,
}

fn describe(outcome: &ResizeOutcome) -> String {
    match outcome {
        ResizeOutcome::Resized { from, to } => format!("resize {from} -> {to}"),
        ResizeOutcome::Rejected { current, delta } => {
            format!("rejected at size {current} (requested {delta:+})")
        }
        ResizeOutcome::Unchanged { .. } => "unchanged".to_string(),
    }
}

/// Decide for `input` and replay the action on an in-memory pool.
pub async fn build_plan(
    config: &AutoscalerConfig,
    pool_id: &str,
    input: PlanInput,
) -> anyhow::Result<PlanReport> {
    let entry = config
        .pool(pool_id)
        .with_context(|| format!("pool {pool_id} is not in the config"))?;
    let pool = config.validate_pool(entry)?;

    let metrics = MetricsSnapshot::new(input.cpu, input.ram);
    let decision = decide(
        &metrics,
        &pool.thresholds,
        pool.limits,
        input.size,
        input.scheduler_active,
    );

    let dry_run = MemoryPool::new(input.size);
    let controller = InstancePoolController::new(pool.pool.clone(), Arc::new(dry_run.clone()), pool.limits);
    let outcome = controller.apply(decision.action).await?;

    Ok(PlanReport {
        pool_id: pool_id.to_string(),
        metrics,
        size: input.size,
        scheduler_active: input.scheduler_active,
        decision,
        outcome: describe(&outcome),
        resulting_size: dry_run.size(),
    })
}

pub fn format_plan(report: &PlanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("pool:      {}\n", report.pool_id));
    out.push_str(&format!("reading:   {}\n", report.metrics));
    out.push_str(&format!(
        "size:      {}{}\n",
        report.size,
        if report.scheduler_active { " (schedule active)" } else { "" }
    ));
    out.push_str(&format!("decision:  {}\n", report.decision));
    out.push_str(&format!("outcome:   {}\n", report.outcome));
    out.push_str(&format!("new size:  {}\n", report.resulting_size));
    out
}

pub async fn plan(
    config: &AutoscalerConfig,
    pool_id: &str,
    input: PlanInput,
    format: &str,
) -> anyhow::Result<()> {
    let report = build_plan(config, pool_id, input).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", format_plan(&report)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolscale_autoscale::DecisionReason;
    use poolscale_core::Action;

    const CONFIG: &str = r#"
[[pools]]
pool_id = "pool-a"
compartment_id = "compartment-1"
region = "eu-frankfurt-1"
[pools.monitoring]
method = "provider"
[pools.thresholds]
cpu = { min = 20.0, max = 80.0 }
ram = { min = 20.0, max = 80.0 }
[pools.limits]
min = 2
max = 6
"#;

    fn config() -> AutoscalerConfig {
        AutoscalerConfig::from_toml_str(CONFIG).unwrap()
    }

    fn input(cpu: f64, ram: f64, size: u32, scheduler_active: bool) -> PlanInput {
        PlanInput {
            cpu,
            ram,
            size,
            scheduler_active,
        }
    }

    #[tokio::test]
    async fn high_load_plans_one_more_instance() {
        let report = build_plan(&config(), "pool-a", input(91.0, 40.0, 3, false)).await.unwrap();
        assert_eq!(report.decision.action, Action::ScaleUp);
        assert_eq!(report.outcome, "resize 3 -> 4");
        assert_eq!(report.resulting_size, 4);
    }

    #[tokio::test]
    async fn low_load_at_minimum_is_rejected() {
        let report = build_plan(&config(), "pool-a", input(5.0, 5.0, 2, false)).await.unwrap();
        assert_eq!(report.decision.reason, DecisionReason::LoadLow);
        assert_eq!(report.outcome, "rejected at size 2 (requested -1)");
        assert_eq!(report.resulting_size, 2);
    }

    #[tokio::test]
    async fn schedule_defers_scale_down() {
        let report = build_plan(&config(), "pool-a", input(5.0, 5.0, 4, true)).await.unwrap();
        assert_eq!(report.decision.reason, DecisionReason::LoadLowDeferred);
        assert_eq!(report.outcome, "unchanged");
        assert!(format_plan(&report).contains("(schedule active)"));
    }

    #[tokio::test]
    async fn unknown_pool_is_an_error() {
        let err = build_plan(&config(), "pool-z", input(50.0, 50.0, 3, false)).await.unwrap_err();
        assert!(err.to_string().contains("pool-z"));
    }

    #[tokio::test]
    async fn json_report_names_the_rule() {
        let report = build_plan(&config(), "pool-a", input(-1.0, 5.0, 3, false)).await.unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["decision"]["action"], "no_action");
        assert_eq!(value["decision"]["reason"], "invalid_reading");
    }
}
