use std::collections::HashMap;
use std::env;
use std::str::FromStr as _;

use config_rs::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::environment::Environment;

const ENVIRONMENT_VARIABLE: &str = "APP_ENVIRONMENT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_days: u64,
}

/// Permission rules that can be changed without recompiling.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PermissionsConfig {
    /// Full permission name, e.g. `Orders.Read`, to the roles it requires
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

/// The environment named by `APP_ENVIRONMENT`, `development` when unset or
/// unknown.
#[must_use]
pub fn read_environment() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// Load `config/{environment}` overlaid with `APP_`-prefixed environment
/// variables.
///
/// # Errors
/// Returns `ConfigError` if the file is missing or does not deserialize.
pub fn read_config(environment: &Environment) -> Result<Config, ConfigError> {
    let config_file_name = format!("config/{environment}");

    trace!("Reading configuration from: {}", config_file_name);

    build(
        config_rs::Config::builder()
            .add_source(config_rs::File::with_name(&config_file_name))
            .add_source(config_rs::Environment::with_prefix("APP")),
    )
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<Config, ConfigError> {
    builder.build()?.try_deserialize()
}
