//! poolscale.toml configuration parser.
//!
//! The file holds loop timing, an optional region alias map, and one
//! `[[pools]]` table per managed pool. Parsing is all-or-nothing; validation
//! is per pool so a bad entry only takes its own pool out of service.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::PoolRef;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{PoolLimits, ScheduleWindow, Thresholds};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscalerConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    /// Region alias → provider region identifier.
    #[serde(default)]
    pub regions: HashMap<String, String>,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// Loop periods. Values use the compact duration form ("30s", "5m").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_decision_interval")]
    pub decision_interval: String,
    #[serde(default = "default_schedule_tick")]
    pub schedule_tick: String,
    /// Wait after a threshold-driven resize before the next decision.
    #[serde(default = "default_cooldown")]
    pub cooldown: String,
}

fn default_decision_interval() -> String {
    "5m".to_string()
}

fn default_schedule_tick() -> String {
    "60s".to_string()
}

fn default_cooldown() -> String {
    "900s".to_string()
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            decision_interval: default_decision_interval(),
            schedule_tick: default_schedule_tick(),
            cooldown: default_cooldown(),
        }
    }
}

/// Parsed loop periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub decision_interval: Duration,
    pub schedule_tick: Duration,
    pub cooldown: Duration,
}

impl TimingConfig {
    pub fn parse(&self) -> ConfigResult<Timing> {
        Ok(Timing {
            decision_interval: parse_duration(&self.decision_interval)?,
            schedule_tick: parse_duration(&self.schedule_tick)?,
            cooldown: parse_duration(&self.cooldown)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool_id: String,
    pub compartment_id: Option<String>,
    pub region: Option<String>,
    pub monitoring: MonitoringConfig,
    pub thresholds: Thresholds,
    pub limits: PoolLimits,
    /// Default `target_instances` for schedules that omit it.
    pub scheduler_instances: Option<u32>,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub method: MonitoringMethod,
    /// Scrape endpoint URL; required for `scrape`.
    pub endpoint: Option<String>,
    /// Appended to a member's display name to form its scrape target.
    pub instance_suffix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringMethod {
    /// Provider monitoring service, per-instance aggregated windows.
    #[serde(alias = "oci")]
    Provider,
    /// Metrics-scrape endpoint, instant queries.
    #[serde(alias = "prometheus")]
    Scrape,
}

impl MonitoringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringMethod::Provider => "provider",
            MonitoringMethod::Scrape => "scrape",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub start_time: String,
    pub end_time: String,
    pub target_instances: Option<u32>,
}

/// A pool entry that passed validation, with every reference resolved.
#[derive(Debug, Clone)]
pub struct ValidatedPool {
    pub pool: PoolRef,
    pub monitoring: MonitoringConfig,
    pub thresholds: Thresholds,
    pub limits: PoolLimits,
    pub windows: Vec<ScheduleWindow>,
}

impl AutoscalerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Look up a pool entry by id.
    pub fn pool(&self, pool_id: &str) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.pool_id == pool_id)
    }

    /// Validate one pool entry and resolve its region and schedule.
    pub fn validate_pool(&self, pool: &PoolConfig) -> ConfigResult<ValidatedPool> {
        let id = pool.pool_id.clone();

        let region_alias = pool
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                pool: id.clone(),
                field: "region",
            })?;
        let region = self.resolve_region(&id, region_alias)?;

        let compartment_id = pool
            .compartment_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                pool: id.clone(),
                field: "compartment_id",
            })?;

        if pool.limits.min > pool.limits.max {
            return Err(ConfigError::InvalidLimits {
                pool: id,
                min: pool.limits.min,
                max: pool.limits.max,
            });
        }

        if pool.monitoring.method == MonitoringMethod::Scrape
            && pool.monitoring.endpoint.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::MissingField {
                pool: id,
                field: "monitoring.endpoint",
            });
        }

        for (name, band) in [("cpu", pool.thresholds.cpu), ("ram", pool.thresholds.ram)] {
            if !band.is_well_formed() {
                warn!(
                    pool = %id,
                    resource = name,
                    min = band.min,
                    max = band.max,
                    "threshold min is not below max; the pool will oscillate"
                );
            }
        }

        let windows = pool
            .schedules
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let target_instances = entry
                    .target_instances
                    .or(pool.scheduler_instances)
                    .ok_or_else(|| ConfigError::MissingScheduleTarget {
                        pool: id.clone(),
                        index,
                    })?;
                Ok(ScheduleWindow {
                    start_time: parse_time(&entry.start_time)?,
                    end_time: parse_time(&entry.end_time)?,
                    target_instances,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(ValidatedPool {
            pool: PoolRef {
                pool_id: id,
                compartment_id,
                region,
            },
            monitoring: pool.monitoring.clone(),
            thresholds: pool.thresholds,
            limits: pool.limits,
            windows,
        })
    }

    /// Validate every pool independently.
    pub fn validate_all(&self) -> Vec<(String, ConfigResult<ValidatedPool>)> {
        self.pools
            .iter()
            .map(|p| (p.pool_id.clone(), self.validate_pool(p)))
            .collect()
    }

    /// Map a region alias through `[regions]`. Without a map the value is
    /// used as-is.
    fn resolve_region(&self, pool: &str, alias: &str) -> ConfigResult<String> {
        if self.regions.is_empty() {
            return Ok(alias.to_string());
        }
        self.regions
            .get(alias)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownRegion {
                pool: pool.to_string(),
                region: alias.to_string(),
            })
    }
}

/// Parse a time of day, `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> ConfigResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidTime(s.to_string()))
}

/// Parse a duration string like "5s", "500ms", "2m", or plain seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let trimmed = s.trim();
    let parsed = if let Some(ms) = trimmed.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = trimmed.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = trimmed.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = trimmed.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        trimmed.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[timing]
decision_interval = "5m"
schedule_tick = "30s"

[regions]
frankfurt = "eu-frankfurt-1"

[[pools]]
pool_id = "pool-a"
compartment_id = "compartment-1"
region = "frankfurt"
scheduler_instances = 5

[pools.monitoring]
method = "scrape"
endpoint = "http://prometheus:9090"
instance_suffix = ":9100"

[pools.thresholds]
cpu = { min = 20.0, max = 80.0 }
ram = { min = 25.0, max = 85.0 }

[pools.limits]
min = 2
max = 10

[[pools.schedules]]
start_time = "09:00"
end_time = "17:00"

[[pools.schedules]]
start_time = "22:00"
end_time = "23:30:00"
target_instances = 2
"#;

    fn sample() -> AutoscalerConfig {
        AutoscalerConfig::from_toml_str(SAMPLE).unwrap()
    }

    #[test]
    fn parse_full_config() {
        let config = sample();
        assert_eq!(config.pools.len(), 1);
        let pool = &config.pools[0];
        assert_eq!(pool.monitoring.method, MonitoringMethod::Scrape);
        assert_eq!(pool.limits, PoolLimits { min: 2, max: 10 });
        assert_eq!(pool.thresholds.ram.max, 85.0);
        assert_eq!(pool.schedules.len(), 2);
    }

    #[test]
    fn timing_defaults_and_overrides() {
        let timing = sample().timing.parse().unwrap();
        assert_eq!(timing.decision_interval, Duration::from_secs(300));
        assert_eq!(timing.schedule_tick, Duration::from_secs(30));
        // Not set in the file; falls back to the default.
        assert_eq!(timing.cooldown, Duration::from_secs(900));
    }

    #[test]
    fn validate_resolves_region_and_windows() {
        let config = sample();
        let validated = config.validate_pool(&config.pools[0]).unwrap();
        assert_eq!(validated.pool.region, "eu-frankfurt-1");
        assert_eq!(validated.pool.compartment_id, "compartment-1");
        assert_eq!(validated.windows.len(), 2);
        assert_eq!(validated.windows[0].target_instances, 5);
        assert_eq!(validated.windows[1].target_instances, 2);
        assert_eq!(
            validated.windows[1].end_time,
            NaiveTime::from_hms_opt(23, 30, 0).unwrap()
        );
    }

    #[test]
    fn missing_region_is_rejected() {
        let mut config = sample();
        config.pools[0].region = None;
        let err = config.validate_pool(&config.pools[0]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "region", .. }));
    }

    #[test]
    fn unknown_region_alias_is_rejected() {
        let mut config = sample();
        config.pools[0].region = Some("tokyo".to_string());
        let err = config.validate_pool(&config.pools[0]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegion { .. }));
    }

    #[test]
    fn region_used_verbatim_without_map() {
        let mut config = sample();
        config.regions.clear();
        let validated = config.validate_pool(&config.pools[0]).unwrap();
        assert_eq!(validated.pool.region, "frankfurt");
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let mut config = sample();
        config.pools[0].limits = PoolLimits { min: 5, max: 3 };
        let err = config.validate_pool(&config.pools[0]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLimits { min: 5, max: 3, .. }));
    }

    #[test]
    fn scrape_without_endpoint_is_rejected() {
        let mut config = sample();
        config.pools[0].monitoring.endpoint = None;
        let err = config.validate_pool(&config.pools[0]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "monitoring.endpoint", .. }
        ));
    }

    #[test]
    fn schedule_without_target_is_rejected() {
        let mut config = sample();
        config.pools[0].scheduler_instances = None;
        let err = config.validate_pool(&config.pools[0]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingScheduleTarget { index: 0, .. }));
    }

    #[test]
    fn inverted_thresholds_only_warn() {
        let mut config = sample();
        config.pools[0].thresholds.cpu.min = 90.0;
        assert!(config.validate_pool(&config.pools[0]).is_ok());
    }

    #[test]
    fn one_bad_pool_does_not_hide_others() {
        let mut config = sample();
        let mut broken = config.pools[0].clone();
        broken.pool_id = "pool-b".to_string();
        broken.compartment_id = None;
        config.pools.push(broken);

        let results = config.validate_all();
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }

    #[test]
    fn method_aliases() {
        let method: MonitoringConfig =
            toml::from_str("method = \"oci\"").unwrap();
        assert_eq!(method.method, MonitoringMethod::Provider);
        let method: MonitoringConfig =
            toml::from_str("method = \"prometheus\"\nendpoint = \"http://p\"").unwrap();
        assert_eq!(method.method, MonitoringMethod::Scrape);
    }

    #[test]
    fn from_file_reads_and_reports_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = AutoscalerConfig::from_file(file.path()).unwrap();
        assert!(config.pool("pool-a").is_some());
        assert!(config.pool("pool-z").is_none());

        let err = AutoscalerConfig::from_file(Path::new("/nonexistent/poolscale.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn parse_time_formats() {
        assert_eq!(parse_time("09:00").unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(
            parse_time(" 17:30:15 ").unwrap(),
            NaiveTime::from_hms_opt(17, 30, 15).unwrap()
        );
        assert!(matches!(parse_time("25:00"), Err(ConfigError::InvalidTime(_))));
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("900").unwrap(), Duration::from_secs(900));
        assert!(matches!(
            parse_duration("soon"),
            Err(ConfigError::InvalidDuration(_))
        ));
    }
}
