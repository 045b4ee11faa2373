use config::{PipelineConfig, Vars};
use dotenvy::dotenv;
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use clock::SystemClock;
use runner::{ExecStatus, RetryPolicy, Runner, Step};
use steps::{ContainerTask, RawDataSensor, S3Store, SyncTrigger};

mod clock;
mod error;
mod runner;
mod steps;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing()?;

    let pipeline_config = PipelineConfig::load(&Vars::from_env())?;
    info!(
        "driving partition {} from s3://{}/{}",
        pipeline_config.partition, pipeline_config.raw_bucket, pipeline_config.raw_prefix,
    );

    let aws_config = aws_config::load_from_env().await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let ecs_client = aws_sdk_ecs::Client::new(&aws_config);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if ctrl_c().await.is_ok() {
            warn!("interrupt received, aborting the run");
            signal_cancel.cancel();
        }
    });

    let chain = build_chain(&pipeline_config, s3_client, ecs_client);
    let runner = Runner::new(SystemClock, cancel);
    let report = runner.run(&pipeline_config.partition, chain).await;

    info!("run report: {}", serde_json::to_string(&report)?);

    if report.status != ExecStatus::Completed {
        anyhow::bail!("run {} for partition {} failed", report.id, report.partition);
    }

    Ok(())
}

fn build_chain(
    pipeline_config: &PipelineConfig,
    s3_client: aws_sdk_s3::Client,
    ecs_client: aws_sdk_ecs::Client,
) -> Vec<Step> {
    let retry = RetryPolicy::default();

    vec![
        Step::marker("start"),
        Step::new(
            "trigger-sync",
            SyncTrigger::new(
                &pipeline_config.airbyte_api_url,
                &pipeline_config.airbyte_connection_id,
            ),
            retry,
        ),
        Step::new(
            "wait-for-data",
            {
                let sensor = RawDataSensor::new(
                    S3Store::new(s3_client),
                    SystemClock,
                    &pipeline_config.raw_bucket,
                    pipeline_config.raw_data_prefix(),
                );
                if pipeline_config.wait_soft_fail {
                    sensor.soft_fail()
                } else {
                    sensor
                }
            },
            retry,
        ),
        Step::new(
            "load-to-warehouse",
            ContainerTask::loader(
                ecs_client.clone(),
                SystemClock,
                pipeline_config.ecs.clone(),
                &pipeline_config.partition,
            ),
            retry,
        ),
        Step::new(
            "run-transform",
            ContainerTask::dbt_run(ecs_client.clone(), SystemClock, pipeline_config.ecs.clone()),
            retry,
        ),
        Step::new(
            "run-tests",
            ContainerTask::dbt_test(ecs_client, SystemClock, pipeline_config.ecs.clone()),
            retry,
        ),
        Step::marker("end"),
    ]
}

fn init_tracing() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::from_default_env();
    let fmt_layer = fmt::layer().with_target(false).with_line_number(true);

    let registry = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer);

    // Loki shipping is opt-in; the driver also runs from plain cron boxes
    // without a Loki endpoint in reach.
    if let Ok(loki_url) = std::env::var("LOKI_URL") {
        let (loki_layer, loki_task) = tracing_loki::builder()
            .label("service", "pipeline")?
            .extra_field("pid", format!("{}", std::process::id()))?
            .build_url(loki_url.parse()?)?;

        tokio::spawn(loki_task);
        registry.with(loki_layer).init();
    } else {
        registry.init();
    }

    Ok(())
}
