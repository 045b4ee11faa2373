use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::StepError;
use crate::runner::{StepAction, StepOutcome};

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether at least one object exists under the prefix.
    async fn key_exists(&self, bucket: &str, prefix: &str) -> Result<bool, StepError>;
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn key_exists(&self, bucket: &str, prefix: &str) -> Result<bool, StepError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|error| StepError::ObjectStore(error.to_string()))?;

        Ok(response.key_count().unwrap_or(0) > 0)
    }
}

/// Polls object storage until the run's partition shows up. The wait budget is
/// consumed in whole poll intervals; on exhaustion the step fails the run
/// unless `soft_fail` turns the timeout into a skip.
pub struct RawDataSensor<S, C> {
    store: S,
    clock: C,
    bucket: String,
    prefix: String,
    poll_interval: Duration,
    timeout: Duration,
    soft_fail: bool,
}

impl<S, C> RawDataSensor<S, C> {
    pub fn new(store: S, clock: C, bucket: &str, prefix: String) -> Self {
        Self {
            store,
            clock,
            bucket: bucket.to_string(),
            prefix,
            poll_interval: POLL_INTERVAL,
            timeout: TIMEOUT,
            soft_fail: false,
        }
    }

    pub fn soft_fail(mut self) -> Self {
        self.soft_fail = true;
        self
    }

    #[cfg(test)]
    fn with_timings(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<S: ObjectStore, C: Clock> StepAction for RawDataSensor<S, C> {
    async fn run(&self, cancel: &CancellationToken) -> Result<StepOutcome, StepError> {
        let mut waited = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(StepError::Cancelled);
            }

            if self.store.key_exists(&self.bucket, &self.prefix).await? {
                info!("raw data found under s3://{}/{}", self.bucket, self.prefix);
                return Ok(StepOutcome::Completed);
            }

            waited += self.poll_interval;
            if waited >= self.timeout {
                if self.soft_fail {
                    warn!(
                        "no raw data under s3://{}/{} after {:?}, skipping",
                        self.bucket, self.prefix, self.timeout,
                    );
                    return Ok(StepOutcome::Skipped);
                }

                return Err(StepError::Timeout(self.timeout));
            }

            debug!(
                "no raw data under s3://{}/{} yet, next poll in {:?}",
                self.bucket, self.prefix, self.poll_interval,
            );
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
