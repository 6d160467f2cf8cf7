use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Business rules the engine runs under. Defaults match the hostel's policy:
/// two hours to pay for a held bed, swept every five minutes.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineRules {
    #[serde(default = "default_hold_duration_minutes")]
    pub hold_duration_minutes: i64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_hold_duration_minutes() -> i64 {
    120
}

fn default_sweep_interval_seconds() -> u64 {
    300
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            hold_duration_minutes: default_hold_duration_minutes(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `ALBERGUE_ENGINE__HOLD_DURATION_MINUTES=30`
            .add_source(config::Environment::with_prefix("ALBERGUE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
