use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, KeyValuePair, LaunchType,
    NetworkConfiguration, PropagateTags, TaskOverride,
};
use config::EcsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::StepError;
use crate::runner::{StepAction, StepOutcome};

pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(15);

const LOADER_COMMAND: &[&str] = &["/app/loader"];
const DBT_RUN_COMMAND: &[&str] = &["bash", "-lc", "cd /app/dbt_project && dbt run"];
const DBT_TEST_COMMAND: &[&str] = &["bash", "-lc", "cd /app/dbt_project && dbt test"];

/// Runs one Fargate task with the step's command overriding the container's
/// default, then watches it until it stops. A non-zero container exit code
/// fails the step.
pub struct ContainerTask<C> {
    client: aws_sdk_ecs::Client,
    clock: C,
    config: EcsConfig,
    command: Vec<String>,
    env: Vec<(String, String)>,
}

impl<C> ContainerTask<C> {
    pub fn loader(
        client: aws_sdk_ecs::Client,
        clock: C,
        config: EcsConfig,
        partition: &str,
    ) -> Self {
        Self::with_command(
            client,
            clock,
            config,
            LOADER_COMMAND,
            vec![("EXEC_DATE".to_string(), partition.to_string())],
        )
    }

    pub fn dbt_run(client: aws_sdk_ecs::Client, clock: C, config: EcsConfig) -> Self {
        Self::with_command(client, clock, config, DBT_RUN_COMMAND, Vec::new())
    }

    pub fn dbt_test(client: aws_sdk_ecs::Client, clock: C, config: EcsConfig) -> Self {
        Self::with_command(client, clock, config, DBT_TEST_COMMAND, Vec::new())
    }

    fn with_command(
        client: aws_sdk_ecs::Client,
        clock: C,
        config: EcsConfig,
        command: &[&str],
        env: Vec<(String, String)>,
    ) -> Self {
        Self {
            client,
            clock,
            config,
            command: command.iter().map(|part| (*part).to_string()).collect(),
            env,
        }
    }

    fn overrides(&self) -> TaskOverride {
        let mut container = ContainerOverride::builder()
            .name(&self.config.container_name)
            .set_command(Some(self.command.clone()));

        for (name, value) in &self.env {
            container = container.environment(
                KeyValuePair::builder().name(name).value(value).build(),
            );
        }

        TaskOverride::builder()
            .container_overrides(container.build())
            .build()
    }

    fn network_configuration(config: &EcsConfig) -> Result<NetworkConfiguration, StepError> {
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(config.subnets.clone()))
            .set_security_groups(Some(config.security_groups.clone()))
            .assign_public_ip(AssignPublicIp::Disabled)
            .build()
            .map_err(|error| StepError::Task(error.to_string()))?;

        Ok(NetworkConfiguration::builder()
            .awsvpc_configuration(vpc)
            .build())
    }
}

#[async_trait]
impl<C: Clock> StepAction for ContainerTask<C> {
    async fn run(&self, cancel: &CancellationToken) -> Result<StepOutcome, StepError> {
        let started = self
            .client
            .run_task()
            .cluster(&self.config.cluster)
            .task_definition(&self.config.task_definition)
            .launch_type(LaunchType::Fargate)
            .platform_version("LATEST")
            .network_configuration(Self::network_configuration(&self.config)?)
            .propagate_tags(PropagateTags::TaskDefinition)
            .overrides(self.overrides())
            .send()
            .await
            .map_err(|error| StepError::Task(error.to_string()))?;

        if let Some(failure) = started.failures().first() {
            return Err(StepError::Task(format!("run_task failure: {failure:?}")));
        }

        let Some(task_arn) = started
            .tasks()
            .first()
            .and_then(|task| task.task_arn())
            .map(ToString::to_string)
        else {
            return Err(StepError::Task("run_task returned no task".to_string()));
        };

        info!("started task {task_arn} with command {:?}", self.command);

        loop {
            if cancel.is_cancelled() {
                return Err(StepError::Cancelled);
            }

            self.clock.sleep(STATUS_POLL_INTERVAL).await;

            let described = self
                .client
                .describe_tasks()
                .cluster(&self.config.cluster)
                .tasks(&task_arn)
                .send()
                .await
                .map_err(|error| StepError::Task(error.to_string()))?;

            let Some(task) = described.tasks().first() else {
                return Err(StepError::Task(format!("task {task_arn} disappeared")));
            };

            if task.last_status() != Some("STOPPED") {
                debug!("task {task_arn} is {:?}", task.last_status());
                continue;
            }

            let exit_code = task
                .containers()
                .iter()
                .find(|container| container.name() == Some(self.config.container_name.as_str()))
                .and_then(|container| container.exit_code());

            return match exit_code {
                Some(0) => {
                    info!("task {task_arn} stopped cleanly");
                    Ok(StepOutcome::Completed)
                }
                Some(code) => Err(StepError::TaskExit(code)),
                None => Err(StepError::Task(format!(
                    "task {task_arn} stopped without an exit code: {:?}",
                    task.stopped_reason(),
                ))),
            };
        }
    }
}
