use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ProviderError};
use crate::models::{Listing, ProviderInfo, Query};
use crate::normalize::normalize_listings;
use crate::pool::WorkerPool;
use crate::traits::{Provider, ProviderRequest};

/// Lifecycle state of one provider task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::TimedOut
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress milestones reported before a task's terminal outcome.
///
/// Used for user feedback only, never for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Waiting for a worker pool slot.
    Queued,
    /// Admitted by the pool; the provider call is starting.
    Started,
    Navigating,
    Parsing,
}

/// Terminal result of one provider task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Succeeded(Vec<Listing>),
    Failed(ProviderError),
    TimedOut,
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Succeeded(_) => TaskState::Succeeded,
            TaskOutcome::Failed(_) => TaskState::Failed,
            TaskOutcome::TimedOut => TaskState::TimedOut,
        }
    }
}

/// The single terminal event a task runner emits.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub provider_id: String,
    pub outcome: TaskOutcome,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
    /// When the runner produced this report, checked against the session deadline.
    pub finished_at: tokio::time::Instant,
}

/// Messages flowing from task runners to the session driver.
#[derive(Debug, Clone)]
pub enum TaskMessage {
    Progress { provider_id: String, stage: Stage },
    Finished(TaskReport),
}

/// Handle providers use to report progress stages.
#[derive(Clone)]
pub struct ProgressReporter {
    provider_id: Arc<str>,
    tx: mpsc::UnboundedSender<TaskMessage>,
}

impl ProgressReporter {
    pub fn new(provider_id: &str, tx: mpsc::UnboundedSender<TaskMessage>) -> Self {
        Self {
            provider_id: Arc::from(provider_id),
            tx,
        }
    }

    /// A reporter whose messages go nowhere, for calling providers outside a session.
    pub fn detached(provider_id: &str) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self::new(provider_id, tx)
    }

    pub fn report(&self, stage: Stage) {
        let _ = self.tx.send(TaskMessage::Progress {
            provider_id: self.provider_id.to_string(),
            stage,
        });
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("provider_id", &self.provider_id)
            .finish()
    }
}

/// One provider's task, owned by the runner executing it.
#[derive(Debug, Clone)]
pub struct ProviderTask {
    pub provider: ProviderInfo,
    pub state: TaskState,
    pub started_at: Option<DateTime<Utc>>,
    created: Instant,
}

impl ProviderTask {
    pub fn new(provider: ProviderInfo) -> Self {
        Self {
            provider,
            state: TaskState::Pending,
            started_at: None,
            created: Instant::now(),
        }
    }

    fn start(&mut self) {
        self.state = TaskState::Running;
        self.started_at = Some(Utc::now());
    }
}

/// Events emitted by the task runner for monitoring/logging.
#[derive(Debug, Clone)]
pub enum TaskEvent<'a> {
    Queued {
        provider: &'a str,
    },
    Started {
        provider: &'a str,
        budget: Duration,
    },
    Succeeded {
        provider: &'a str,
        found: usize,
        elapsed: Duration,
    },
    Failed {
        provider: &'a str,
        error: &'a ProviderError,
        elapsed: Duration,
    },
    TimedOut {
        provider: &'a str,
        elapsed: Duration,
        cancelled: bool,
    },
}

/// Trait for receiving task events (decoupled logging).
pub trait TaskReporter: Send + Sync {
    fn report(&self, event: TaskEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTaskReporter;

impl TaskReporter for TracingTaskReporter {
    fn report(&self, event: TaskEvent<'_>) {
        match event {
            TaskEvent::Queued { provider } => {
                tracing::debug!(%provider, "Provider queued");
            }
            TaskEvent::Started { provider, budget } => {
                tracing::info!(%provider, budget_ms = %budget.as_millis(), "Provider started");
            }
            TaskEvent::Succeeded {
                provider,
                found,
                elapsed,
            } => {
                tracing::info!(%provider, %found, elapsed_ms = %elapsed.as_millis(), "Provider succeeded");
            }
            TaskEvent::Failed {
                provider,
                error,
                elapsed,
            } => {
                tracing::warn!(%provider, kind = error.kind(), %error, elapsed_ms = %elapsed.as_millis(), "Provider failed");
            }
            TaskEvent::TimedOut {
                provider,
                elapsed,
                cancelled,
            } => {
                tracing::warn!(%provider, %cancelled, elapsed_ms = %elapsed.as_millis(), "Provider timed out");
            }
        }
    }
}

/// Runs provider calls under the pool, a hard deadline and error containment.
#[derive(Clone)]
pub struct TaskRunner {
    pool: WorkerPool,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<TaskMessage>,
    reporter: Arc<dyn TaskReporter>,
}

impl TaskRunner {
    pub fn new(
        pool: WorkerPool,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<TaskMessage>,
        reporter: Arc<dyn TaskReporter>,
    ) -> Self {
        Self {
            pool,
            cancel,
            tx,
            reporter,
        }
    }

    /// Execute one provider call and emit exactly one terminal [`TaskReport`].
    ///
    /// Provider errors and panics become `Failed`; exceeding the query's task
    /// budget or observing session cancellation becomes `TimedOut`.
    pub async fn run<P: Provider>(self, provider: P, query: Arc<Query>) -> TaskState {
        let mut task = ProviderTask::new(provider.info().clone());
        let progress = ProgressReporter::new(&task.provider.id, self.tx.clone());

        progress.report(Stage::Queued);
        self.reporter.report(TaskEvent::Queued {
            provider: &task.provider.id,
        });

        let slot = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AppError::PoolClosed),
            slot = self.pool.acquire() => slot,
        };
        let slot = match slot {
            Ok(slot) => slot,
            Err(_) => {
                // A closed pool only happens when the session is shutting down.
                let outcome = if self.cancel.is_cancelled() {
                    TaskOutcome::TimedOut
                } else {
                    TaskOutcome::Failed(ProviderError::Cancelled)
                };
                return self.finish(task, outcome);
            }
        };

        let budget = query.task_budget();
        task.start();
        progress.report(Stage::Started);
        self.reporter.report(TaskEvent::Started {
            provider: &task.provider.id,
            budget,
        });

        let request = ProviderRequest {
            query: Arc::clone(&query),
            max_items: query.max_items(),
            budget,
            progress,
        };
        let mut call = tokio::spawn(async move { provider.search(request).await });

        let joined = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            () = tokio::time::sleep(budget) => None,
            joined = &mut call => Some(joined),
        };
        let outcome = match joined {
            None => {
                // Wait for the aborted call to be dropped before the terminal
                // event goes out. Async cleanup it schedules may finish later.
                call.abort();
                let _ = call.await;
                TaskOutcome::TimedOut
            }
            Some(joined) => match joined {
                Ok(Ok(raw)) => TaskOutcome::Succeeded(normalize_listings(&task.provider, &query, raw)),
                Ok(Err(error)) => TaskOutcome::Failed(error),
                Err(join_err) if join_err.is_panic() => {
                    let message = panic_message(join_err.into_panic());
                    tracing::error!(provider = %task.provider.id, %message, "Provider panicked");
                    TaskOutcome::Failed(ProviderError::Panicked(message))
                }
                Err(_) => TaskOutcome::Failed(ProviderError::Cancelled),
            },
        };
        slot.release();

        self.finish(task, outcome)
    }

    fn finish(&self, mut task: ProviderTask, outcome: TaskOutcome) -> TaskState {
        let elapsed = task.created.elapsed();
        task.state = outcome.state();

        match &outcome {
            TaskOutcome::Succeeded(listings) => self.reporter.report(TaskEvent::Succeeded {
                provider: &task.provider.id,
                found: listings.len(),
                elapsed,
            }),
            TaskOutcome::Failed(error) => self.reporter.report(TaskEvent::Failed {
                provider: &task.provider.id,
                error,
                elapsed,
            }),
            TaskOutcome::TimedOut => self.reporter.report(TaskEvent::TimedOut {
                provider: &task.provider.id,
                elapsed,
                cancelled: self.cancel.is_cancelled(),
            }),
        }

        let _ = self.tx.send(TaskMessage::Finished(TaskReport {
            provider_id: task.provider.id.clone(),
            outcome,
            started_at: task.started_at,
            elapsed,
            finished_at: tokio::time::Instant::now(),
        }));

        task.state
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::QueryOptions;
    use crate::testutil::{ConcurrencyGauge, MockProvider, raw, test_config};

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl TaskReporter for RecordingReporter {
        fn report(&self, event: TaskEvent<'_>) {
            let name = match event {
                TaskEvent::Queued { .. } => "queued",
                TaskEvent::Started { .. } => "started",
                TaskEvent::Succeeded { .. } => "succeeded",
                TaskEvent::Failed { .. } => "failed",
                TaskEvent::TimedOut { .. } => "timed_out",
            };
            self.events.lock().unwrap().push(name.to_string());
        }
    }

    struct Harness {
        runner: TaskRunner,
        rx: mpsc::UnboundedReceiver<TaskMessage>,
        cancel: CancellationToken,
        reporter: Arc<RecordingReporter>,
    }

    fn harness(capacity: usize) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reporter = Arc::new(RecordingReporter::default());
        let runner = TaskRunner::new(
            WorkerPool::new(capacity).unwrap(),
            cancel.clone(),
            tx,
            reporter.clone(),
        );
        Harness {
            runner,
            rx,
            cancel,
            reporter,
        }
    }

    fn query() -> Arc<Query> {
        Arc::new(Query::new("ps5", QueryOptions::default(), &test_config()).unwrap())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TaskMessage>) -> (Vec<Stage>, Vec<TaskReport>) {
        let mut stages = Vec::new();
        let mut reports = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match msg {
                TaskMessage::Progress { stage, .. } => stages.push(stage),
                TaskMessage::Finished(report) => reports.push(report),
            }
        }
        (stages, reports)
    }

    #[tokio::test]
    async fn success_emits_progress_then_one_terminal() {
        let mut h = harness(1);
        let provider = MockProvider::responding("a", vec![raw("PS5 Console", 499.0)]);

        let state = h.runner.clone().run(provider, query()).await;
        assert_eq!(state, TaskState::Succeeded);

        let (stages, reports) = drain(&mut h.rx);
        assert_eq!(stages[..2], [Stage::Queued, Stage::Started]);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].started_at.is_some());
        match &reports[0].outcome {
            TaskOutcome::Succeeded(listings) => assert_eq!(listings[0].title, "PS5 Console"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            *h.reporter.events.lock().unwrap(),
            vec!["queued", "started", "succeeded"]
        );
    }

    #[tokio::test]
    async fn provider_error_is_contained() {
        let mut h = harness(1);
        let provider =
            MockProvider::failing("b", ProviderError::Blocked("captcha wall".into()));

        let state = h.runner.clone().run(provider, query()).await;
        assert_eq!(state, TaskState::Failed);

        let (_, reports) = drain(&mut h.rx);
        assert_eq!(
            reports[0].outcome,
            TaskOutcome::Failed(ProviderError::Blocked("captcha wall".into()))
        );
    }

    #[tokio::test]
    async fn panic_becomes_failed() {
        let mut h = harness(1);
        let provider = MockProvider::panicking("c", "selector exploded");

        let state = h.runner.clone().run(provider, query()).await;
        assert_eq!(state, TaskState::Failed);

        let (_, reports) = drain(&mut h.rx);
        assert!(matches!(
            &reports[0].outcome,
            TaskOutcome::Failed(ProviderError::Panicked(msg)) if msg.contains("selector exploded")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_times_out_within_budget() {
        let mut h = harness(1);
        let gauge = ConcurrencyGauge::default();
        let provider = MockProvider::hanging("d").with_gauge(gauge.clone());
        let query = query();
        let budget = query.task_budget();

        let start = tokio::time::Instant::now();
        let state = h.runner.clone().run(provider, query).await;
        let waited = start.elapsed();

        assert_eq!(state, TaskState::TimedOut);
        assert!(waited >= budget);
        assert!(waited < budget + Duration::from_millis(50));

        // The aborted call must have released its resources.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gauge.active(), 0);

        let (_, reports) = drain(&mut h.rx);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, TaskOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_times_out_running_task_promptly() {
        let mut h = harness(1);
        let provider = MockProvider::hanging("e");

        let cancel = h.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let start = tokio::time::Instant::now();
        let state = h.runner.clone().run(provider, query()).await;
        assert_eq!(state, TaskState::TimedOut);
        assert!(start.elapsed() < Duration::from_millis(200));

        let (_, reports) = drain(&mut h.rx);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            *h.reporter.events.lock().unwrap(),
            vec!["queued", "started", "timed_out"]
        );
    }

    #[tokio::test]
    async fn cancellation_while_queued_skips_the_provider() {
        let mut h = harness(1);
        let held = h.runner.pool.acquire().await.unwrap();
        let provider = MockProvider::responding("f", vec![raw("PS5 Console", 499.0)]);

        let task = tokio::spawn(h.runner.clone().run(provider.clone(), query()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.cancel.cancel();

        assert_eq!(task.await.unwrap(), TaskState::TimedOut);
        assert_eq!(provider.calls(), 0);
        drop(held);

        let (stages, reports) = drain(&mut h.rx);
        assert_eq!(stages, vec![Stage::Queued]);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].started_at.is_none());
    }
}
