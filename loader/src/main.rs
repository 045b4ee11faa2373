use config::{LoaderConfig, Vars};
use dotenvy::dotenv;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use loader::load::run_load;
use loader::warehouse::PgWarehouse;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter_layer = EnvFilter::from_default_env();
    let fmt_layer = fmt::layer().with_target(false).with_line_number(true);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // Everything required is checked here, before any connection is opened.
    let loader_config = LoaderConfig::load(&Vars::from_env())?;

    let mut warehouse = PgWarehouse::connect(&loader_config).await?;

    if let Err(load_error) = run_load(&loader_config, &mut warehouse).await {
        // A non-zero exit is the contract with the owning pipeline step.
        error!("load failed: {load_error}");
        return Err(load_error.into());
    }

    Ok(())
}
