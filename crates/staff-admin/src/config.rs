use crate::{backfill, roster};
use anyhow::Context;
use std::io::Read;

const DEFAULT_PATH: &str = "./app-config.toml";

#[derive(Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub store: staff_db::Config,
    #[serde(default)]
    pub backfill: backfill::Config,
    #[serde(default)]
    pub roster: roster::Config,
    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TracingConfig {
    #[serde(default)]
    pub console: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            console: false,
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_owned()
}

/// Reads `./app-config.toml` (or the file named by `STAFF_ADMIN_CONFIG`) and
/// applies environment overrides.
pub fn load() -> anyhow::Result<Config> {
    let path = std::env::var("STAFF_ADMIN_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_owned());
    let mut configuration = String::with_capacity(4096);
    std::fs::File::open(&path)
        .with_context(|| format!("unable to open configuration file {path}"))?
        .read_to_string(&mut configuration)
        .with_context(|| format!("unable to read configuration file {path}"))?;
    let mut config =
        parse(&configuration).with_context(|| format!("unable to parse configuration file {path}"))?;
    if let Ok(seed_file) = std::env::var("STAFF_ADMIN_SEED_FILE") {
        config.store.seed_file = Some(seed_file.into());
    }
    if let Ok(filter) = std::env::var("STAFF_ADMIN_LOG") {
        config.tracing.filter = filter;
    }
    Ok(config)
}

pub fn parse(configuration: &str) -> anyhow::Result<Config> {
    let config = toml::from_str::<Config>(configuration)?;
    anyhow::ensure!(
        config.backfill.batch_size > 0
            && config.backfill.batch_size < config.store.max_batch_operations,
        "backfill batch-size {} must be between 1 and {}",
        config.backfill.batch_size,
        config.store.max_batch_operations.saturating_sub(1),
    );
    Ok(config)
}
