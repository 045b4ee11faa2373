use config::LoaderConfig;
use tracing::info;

use crate::statements;
use crate::warehouse::{LoadError, Warehouse};

/// Create the staging table if needed and throw away whatever a previous run
/// left in it. Last run wins; there is no historical accumulation.
pub async fn ensure_table<W: Warehouse>(warehouse: &mut W) -> Result<(), LoadError> {
    warehouse.execute(statements::CREATE_SCHEMA).await?;
    warehouse.execute(statements::CREATE_TABLE).await?;
    warehouse.execute(statements::TRUNCATE).await?;
    Ok(())
}

pub async fn run_load<W: Warehouse>(
    loader_config: &LoaderConfig,
    warehouse: &mut W,
) -> Result<(), LoadError> {
    let path = loader_config.s3_path();
    info!("starting copy from {path} into raw.spacex_launches");

    ensure_table(warehouse).await?;
    warehouse
        .execute(&statements::copy_from(
            &path,
            &loader_config.region,
            &loader_config.iam_role_arn,
        ))
        .await?;

    info!("copy completed");
    Ok(())
}
