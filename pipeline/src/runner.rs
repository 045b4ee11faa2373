use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::StepError;

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Pending,
    Running,
    Completed,
    Skipped,
    Failed,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum StepOutcome {
    Completed,
    /// The step decided the run can proceed without it (sensor soft-fail).
    Skipped,
}

#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, cancel: &CancellationToken) -> Result<StepOutcome, StepError>;
}

/// Marker steps at both ends of the chain.
pub struct NoOp;

#[async_trait]
impl StepAction for NoOp {
    async fn run(&self, _cancel: &CancellationToken) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Completed)
    }
}

#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(5 * 60),
        }
    }
}

pub struct Step {
    pub name: &'static str,
    pub action: Box<dyn StepAction>,
    pub retry: RetryPolicy,
}

impl Step {
    pub fn new(
        name: &'static str,
        action: impl StepAction + 'static,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            name,
            action: Box::new(action),
            retry,
        }
    }

    pub fn marker(name: &'static str) -> Self {
        Self::new(name, NoOp, RetryPolicy::default())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub name: String,
    pub status: ExecStatus,
    pub attempts: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub id: Uuid,
    pub partition: String,
    pub status: ExecStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    fn new(partition: &str, steps: &[Step]) -> Self {
        Self {
            id: Uuid::new_v4(),
            partition: partition.to_string(),
            status: ExecStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            steps: steps
                .iter()
                .map(|step| StepReport {
                    name: step.name.to_string(),
                    status: ExecStatus::Pending,
                    attempts: 0,
                })
                .collect(),
        }
    }

    fn finish(&mut self, status: ExecStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Drives one run through its steps, strictly in order. A step that fails
/// after its retries halts the run; nothing downstream executes.
pub struct Runner<C> {
    clock: C,
    cancel: CancellationToken,
}

impl<C: Clock> Runner<C> {
    pub fn new(clock: C, cancel: CancellationToken) -> Self {
        Self { clock, cancel }
    }

    pub async fn run(&self, partition: &str, steps: Vec<Step>) -> RunReport {
        let mut report = RunReport::new(partition, &steps);
        info!("run {} started for partition {partition}", report.id);

        for (index, step) in steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("run {} cancelled before step {}", report.id, step.name);
                report.finish(ExecStatus::Failed);
                return report;
            }

            report.steps[index].status = ExecStatus::Running;

            let mut attempts = 0;
            let outcome = loop {
                attempts += 1;
                match step.action.run(&self.cancel).await {
                    Ok(outcome) => break Ok(outcome),
                    Err(step_error) => {
                        if attempts > step.retry.retries {
                            break Err(step_error);
                        }

                        warn!(
                            "step {} failed on attempt {attempts}, retrying in {:?}: {step_error}",
                            step.name, step.retry.delay,
                        );
                        self.clock.sleep(step.retry.delay).await;

                        if self.cancel.is_cancelled() {
                            break Err(StepError::Cancelled);
                        }
                    }
                }
            };

            report.steps[index].attempts = attempts;

            match outcome {
                Ok(StepOutcome::Completed) => {
                    info!("step {} completed", step.name);
                    report.steps[index].status = ExecStatus::Completed;
                }
                Ok(StepOutcome::Skipped) => {
                    warn!("step {} skipped", step.name);
                    report.steps[index].status = ExecStatus::Skipped;
                }
                Err(step_error) => {
                    error!("step {} failed, halting the run: {step_error}", step.name);
                    report.steps[index].status = ExecStatus::Failed;
                    report.finish(ExecStatus::Failed);
                    return report;
                }
            }
        }

        report.finish(ExecStatus::Completed);
        info!("run {} completed", report.id);
        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::clock::testing::MockClock;

    struct FakeAction {
        name: &'static str,
        results: Mutex<VecDeque<Result<StepOutcome, StepError>>>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FakeAction {
        fn new(
            name: &'static str,
            results: Vec<Result<StepOutcome, StepError>>,
            calls: &Arc<Mutex<Vec<&'static str>>>,
        ) -> Self {
            Self {
                name,
                results: Mutex::new(results.into()),
                calls: Arc::clone(calls),
            }
        }
    }

    #[async_trait]
    impl StepAction for FakeAction {
        async fn run(&self, _cancel: &CancellationToken) -> Result<StepOutcome, StepError> {
            self.calls.lock().unwrap().push(self.name);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(StepOutcome::Completed))
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            retries: 1,
            delay: Duration::from_secs(5 * 60),
        }
    }

    fn failure() -> Result<StepOutcome, StepError> {
        Err(StepError::Task("boom".to_string()))
    }

    #[tokio::test]
    async fn runs_every_step_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            Step::marker("start"),
            Step::new("first", FakeAction::new("first", vec![], &calls), quick_retry()),
            Step::new("second", FakeAction::new("second", vec![], &calls), quick_retry()),
            Step::marker("end"),
        ];

        let runner = Runner::new(MockClock::default(), CancellationToken::new());
        let report = runner.run("20250101", steps).await;

        assert_eq!(report.status, ExecStatus::Completed);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
        assert!(report
            .steps
            .iter()
            .all(|step| step.status == ExecStatus::Completed));
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn retries_once_after_the_configured_delay() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![Step::new(
            "flaky",
            FakeAction::new("flaky", vec![failure(), Ok(StepOutcome::Completed)], &calls),
            quick_retry(),
        )];

        let clock = MockClock::default();
        let runner = Runner::new(clock.clone(), CancellationToken::new());
        let report = runner.run("20250101", steps).await;

        assert_eq!(report.status, ExecStatus::Completed);
        assert_eq!(report.steps[0].attempts, 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(300)]);
    }

    #[tokio::test]
    async fn exhausted_retries_halt_the_run_before_downstream_steps() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            Step::new(
                "broken",
                FakeAction::new("broken", vec![failure(), failure()], &calls),
                quick_retry(),
            ),
            Step::new("never", FakeAction::new("never", vec![], &calls), quick_retry()),
        ];

        let runner = Runner::new(MockClock::default(), CancellationToken::new());
        let report = runner.run("20250101", steps).await;

        assert_eq!(report.status, ExecStatus::Failed);
        assert_eq!(report.steps[0].status, ExecStatus::Failed);
        assert_eq!(report.steps[0].attempts, 2);
        assert_eq!(report.steps[1].status, ExecStatus::Pending);
        assert_eq!(*calls.lock().unwrap(), vec!["broken", "broken"]);
    }

    #[tokio::test]
    async fn skipped_step_does_not_halt_the_run() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            Step::new(
                "sensor",
                FakeAction::new("sensor", vec![Ok(StepOutcome::Skipped)], &calls),
                quick_retry(),
            ),
            Step::new("after", FakeAction::new("after", vec![], &calls), quick_retry()),
        ];

        let runner = Runner::new(MockClock::default(), CancellationToken::new());
        let report = runner.run("20250101", steps).await;

        assert_eq!(report.status, ExecStatus::Completed);
        assert_eq!(report.steps[0].status, ExecStatus::Skipped);
        assert_eq!(report.steps[1].status, ExecStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_stops_the_chain() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![Step::new(
            "never",
            FakeAction::new("never", vec![], &calls),
            quick_retry(),
        )];

        let cancel = CancellationToken::new();
        cancel.cancel();

        let runner = Runner::new(MockClock::default(), cancel);
        let report = runner.run("20250101", steps).await;

        assert_eq!(report.status, ExecStatus::Failed);
        assert!(calls.lock().unwrap().is_empty());
    }
}
