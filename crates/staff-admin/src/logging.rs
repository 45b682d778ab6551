use crate::config::TracingConfig;
use tracing_subscriber::EnvFilter;

pub fn init(config: &TracingConfig) -> anyhow::Result<()> {
    if config.console {
        console_subscriber::init();
        return Ok(());
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.filter)?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing tracing subscriber: {err}"))
}
