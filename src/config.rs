use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::{fs, io};
use tokio::time::Duration;

pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

/// SimConfig holds every knob of a simulation run. Any field missing from the TOML file keeps its
/// default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Wall clock time between two ticks when the control plane is embedded.
    pub sim_tick_interval_ms: u64,
    /// Simulated time covered by one tick. Transfer speeds are computed against it, and ticks
    /// against an external control plane are paced by it.
    pub norm_tick_interval_ms: u64,
    pub store_io_mb_per_second: u64,
    pub store_capacity_gb: u64,
    pub store_heartbeat_interval_ticks: u64,
    pub region_heartbeat_interval_ticks: u64,
    pub max_heartbeats_per_tick: usize,
    pub task_queue_capacity: usize,
    pub rpc_timeout_ms: u64,
    pub max_ticks: Option<u64>,
    pub seed: u64,
    /// Ids reserved above the seeded layout for splits and new stores.
    pub id_budget: u64,
    pub control_plane: ControlPlaneConfig,
    pub cases: BTreeMap<String, CaseOverrides>,
}

/// Knobs of the embedded control plane's scheduler. Ignored when running against an external one.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ControlPlaneConfig {
    pub max_replicas: usize,
    pub enable_merge: bool,
    pub max_merge_region_size_mb: u64,
    pub max_merge_region_keys: u64,
    /// 0 disables control plane issued splits.
    pub max_region_size_mb: u64,
    pub balance_tolerance: u64,
    pub region_schedule_limit: usize,
    pub store_schedule_limit: usize,
    /// Region heartbeats an operator may go without a step landing before it is dropped.
    pub operator_timeout_heartbeats: u64,
}

/// Per case scalars, all optional. Each case decides its own defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaseOverrides {
    pub store_count: Option<u64>,
    pub region_count: Option<u64>,
    pub region_size_mb: Option<u64>,
    pub replicas: Option<usize>,
    pub target_store_count: Option<u64>,
    pub interval_ticks: Option<u64>,
    pub flow_bytes: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            sim_tick_interval_ms: 100,
            norm_tick_interval_ms: 1000,
            store_io_mb_per_second: 40,
            store_capacity_gb: 1024,
            store_heartbeat_interval_ticks: 10,
            region_heartbeat_interval_ticks: 10,
            max_heartbeats_per_tick: 256,
            task_queue_capacity: 1024,
            rpc_timeout_ms: 3000,
            max_ticks: None,
            seed: 42,
            id_budget: 1 << 20,
            control_plane: ControlPlaneConfig::default(),
            cases: BTreeMap::new(),
        }
    }
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        ControlPlaneConfig {
            max_replicas: 3,
            enable_merge: false,
            max_merge_region_size_mb: 20,
            max_merge_region_keys: 200_000,
            max_region_size_mb: 0,
            balance_tolerance: 2,
            region_schedule_limit: 64,
            store_schedule_limit: 8,
            operator_timeout_heartbeats: 60,
        }
    }
}

impl SimConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_tick_interval_ms == 0 || self.norm_tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("Tick intervals must be greater than 0"));
        }
        if self.store_io_mb_per_second == 0 {
            return Err(ConfigError::Invalid("Store IO rate must be greater than 0"));
        }
        if self.max_heartbeats_per_tick == 0 {
            return Err(ConfigError::Invalid("Heartbeat cap per tick must be greater than 0"));
        }
        if self.store_heartbeat_interval_ticks == 0 || self.region_heartbeat_interval_ticks == 0 {
            return Err(ConfigError::Invalid("Heartbeat intervals must be greater than 0"));
        }
        if self.task_queue_capacity == 0 {
            return Err(ConfigError::Invalid("Task queue capacity must be greater than 0"));
        }
        self.control_plane.validate()
    }

    pub fn sim_tick_interval(&self) -> Duration {
        Duration::from_millis(self.sim_tick_interval_ms)
    }

    pub fn norm_tick_interval(&self) -> Duration {
        Duration::from_millis(self.norm_tick_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn store_capacity_bytes(&self) -> u64 {
        self.store_capacity_gb.saturating_mul(GIB)
    }

    /// Bytes a peer change transfers per tick.
    pub fn task_speed_bytes(&self) -> u64 {
        let per_second = self.store_io_mb_per_second.saturating_mul(MIB);
        let speed = per_second.saturating_mul(self.norm_tick_interval_ms) / 1000;
        speed.max(1)
    }

    pub fn case(&self, name: &str) -> CaseOverrides {
        self.cases.get(name).cloned().unwrap_or_default()
    }
}

impl ControlPlaneConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_replicas == 0 {
            return Err(ConfigError::Invalid("Control plane max replicas must be greater than 0"));
        }
        if self.balance_tolerance == 0 {
            return Err(ConfigError::Invalid("Balance tolerance must be greater than 0"));
        }
        if self.operator_timeout_heartbeats == 0 {
            return Err(ConfigError::Invalid("Operator timeout must be greater than 0"));
        }
        Ok(())
    }

    pub fn apply(&mut self, overrides: &ControlPlaneOverrides) {
        if let Some(max_replicas) = overrides.max_replicas {
            self.max_replicas = max_replicas;
        }
        if let Some(enable_merge) = overrides.enable_merge {
            self.enable_merge = enable_merge;
        }
        if let Some(size) = overrides.max_merge_region_size_mb {
            self.max_merge_region_size_mb = size;
        }
        if let Some(size) = overrides.max_region_size_mb {
            self.max_region_size_mb = size;
        }
        if let Some(limit) = overrides.region_schedule_limit {
            self.region_schedule_limit = limit;
        }
    }
}

/// Adjustments a scenario makes to the embedded control plane.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlPlaneOverrides {
    pub max_replicas: Option<usize>,
    pub enable_merge: Option<bool>,
    pub max_merge_region_size_mb: Option<u64>,
    pub max_region_size_mb: Option<u64>,
    pub region_schedule_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = SimConfig::parse("").unwrap();

        assert_eq!(100, config.sim_tick_interval_ms);
        assert_eq!(40 * MIB, config.task_speed_bytes());
        assert_eq!(ControlPlaneConfig::default(), config.control_plane);
        assert!(config.max_ticks.is_none());
    }

    #[test]
    fn parses_nested_tables() {
        let text = r#"
            sim_tick_interval_ms = 10
            max_ticks = 500

            [control_plane]
            enable_merge = true

            [cases.delete-nodes]
            store_count = 9
        "#;

        let config = SimConfig::parse(text).unwrap();

        assert_eq!(10, config.sim_tick_interval_ms);
        assert_eq!(Some(500), config.max_ticks);
        assert!(config.control_plane.enable_merge);
        assert_eq!(3, config.control_plane.max_replicas);
        assert_eq!(Some(9), config.case("delete-nodes").store_count);
        assert_eq!(None, config.case("hot-read").store_count);
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let result = SimConfig::parse("norm_tick_interval_ms = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(SimConfig::parse("tick = 1"), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn speed_scales_with_simulated_tick() {
        let config = SimConfig {
            norm_tick_interval_ms: 100,
            store_io_mb_per_second: 10,
            ..SimConfig::default()
        };

        assert_eq!(MIB, config.task_speed_bytes());
    }

    #[test]
    fn overrides_only_touch_given_fields() {
        let mut config = ControlPlaneConfig::default();
        config.apply(&ControlPlaneOverrides {
            enable_merge: Some(true),
            ..ControlPlaneOverrides::default()
        });

        assert!(config.enable_merge);
        assert_eq!(ControlPlaneConfig::default().max_replicas, config.max_replicas);
        assert_eq!(
            ControlPlaneConfig::default().region_schedule_limit,
            config.region_schedule_limit
        );
    }

    #[test]
    fn rejects_zero_operator_timeout() {
        let result = SimConfig::parse(
            r#"
            [control_plane]
            operator_timeout_heartbeats = 0
            "#,
        );

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
