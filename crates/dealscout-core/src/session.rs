//! Search sessions: fan a query out to every provider, fold completions into
//! the aggregator and stream ordered events to one consumer.
//!
//! Each session runs a single driver task that owns the [`Aggregator`] and the
//! [`EventEmitter`]. Task runners only talk to it through a channel, so every
//! aggregator mutation, re-rank and emission happens as one step on one task.

use std::collections::HashSet;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::aggregator::{Aggregator, SessionSummary};
use crate::config::SessionConfig;
use crate::error::AppError;
use crate::event::{CloseReason, EventEmitter, EventKind, EventPayload, SessionEvent};
use crate::models::{ProviderInfo, Query, QueryOptions};
use crate::pool::WorkerPool;
use crate::ranker::{RankedResult, rank};
use crate::task::{
    Stage, TaskMessage, TaskReport, TaskReporter, TaskRunner, TracingTaskReporter,
};
use crate::traits::Provider;

const DEFAULT_EVENT_BUFFER: usize = 64;

/// Entry point: a provider registry plus session configuration.
#[derive(Clone)]
pub struct SearchEngine<P: Provider> {
    providers: Arc<Vec<P>>,
    config: SessionConfig,
    reporter: Arc<dyn TaskReporter>,
    event_buffer: usize,
}

/// Final ranked results and per-provider status of one session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchOutcome {
    pub results: RankedResult,
    pub summary: SessionSummary,
}

impl<P: Provider> SearchEngine<P> {
    pub fn new(providers: Vec<P>, config: SessionConfig) -> Self {
        Self {
            providers: Arc::new(providers),
            config,
            reporter: Arc::new(TracingTaskReporter),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Replace the task lifecycle reporter (tracing by default).
    pub fn with_reporter(mut self, reporter: Arc<dyn TaskReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Capacity of each session's event buffer.
    pub fn with_event_buffer(mut self, buffer: usize) -> Self {
        self.event_buffer = buffer.max(1);
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderInfo> {
        self.providers.iter().map(Provider::info)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session and return the handle its events are read from.
    ///
    /// Configuration problems (zero worker capacity, duplicate provider ids)
    /// and unusable queries fail here, before any provider runs. Must be
    /// called from within a Tokio runtime.
    pub fn start_session(
        &self,
        raw_query: &str,
        options: QueryOptions,
    ) -> Result<SessionHandle, AppError> {
        self.config.validate()?;
        let mut ids = HashSet::new();
        for info in self.providers() {
            if !ids.insert(info.id.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "duplicate provider id '{}'",
                    info.id
                )));
            }
        }
        let pool = WorkerPool::new(self.config.max_concurrent_providers)?;
        let query = Arc::new(Query::new(raw_query, options, &self.config)?);

        let id = Uuid::new_v4();
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let (emitter, events) = EventEmitter::channel(self.event_buffer);
        let (task_tx, task_rx) = mpsc::unbounded_channel();

        tracing::info!(
            session_id = %id,
            query = %query.text(),
            providers = self.providers.len(),
            "Starting search session"
        );

        let tracker = TaskTracker::new();
        let runner = TaskRunner::new(
            pool.clone(),
            cancel.clone(),
            task_tx,
            Arc::clone(&self.reporter),
        );
        for provider in self.providers.iter() {
            tracker.spawn(runner.clone().run(provider.clone(), Arc::clone(&query)));
        }
        tracker.close();
        drop(runner);

        let driver = Driver {
            id,
            query: Arc::clone(&query),
            aggregator: Aggregator::new(self.providers()),
            emitter,
            task_rx,
            pool,
            cancel: cancel.clone(),
            tracker,
            started,
            deadline: started + self.config.session_deadline,
        };
        tokio::spawn(driver.run());

        Ok(SessionHandle {
            id,
            query,
            events,
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        })
    }

    /// Run a session to completion (the non-streaming path).
    pub async fn search(
        &self,
        raw_query: &str,
        options: QueryOptions,
    ) -> Result<SearchOutcome, AppError> {
        self.start_session(raw_query, options)?.collect().await
    }
}

/// Consumer side of a session. Dropping it cancels the session.
pub struct SessionHandle {
    id: Uuid,
    query: Arc<Query>,
    events: mpsc::Receiver<SessionEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Next event in sequence order; `None` once the session has closed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Stop all running providers and finalize with what has arrived so far.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The session's events as a stream, ending after `session-closed`.
    pub fn into_stream(self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        futures::stream::unfold(self, |mut handle| async move {
            handle.next_event().await.map(|event| (event, handle))
        })
    }

    /// Drain the session and return its final results.
    pub async fn collect(mut self) -> Result<SearchOutcome, AppError> {
        let mut outcome = None;
        while let Some(event) = self.next_event().await {
            match (event.kind, event.payload) {
                (EventKind::FinalResults, Some(EventPayload::Final { results, summary })) => {
                    outcome = Some(SearchOutcome { results, summary });
                }
                (EventKind::SessionClosed, _) => break,
                _ => {}
            }
        }
        outcome.ok_or(AppError::SessionClosed)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("query", &self.query.text())
            .finish()
    }
}

struct Driver {
    id: Uuid,
    query: Arc<Query>,
    aggregator: Aggregator,
    emitter: EventEmitter,
    task_rx: mpsc::UnboundedReceiver<TaskMessage>,
    pool: WorkerPool,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: Instant,
    deadline: Instant,
}

impl Driver {
    async fn run(mut self) {
        let reason = match self.collect().await {
            Ok(reason) => reason,
            Err(_) => {
                tracing::info!(session_id = %self.id, "Consumer went away, abandoning session");
                self.shutdown().await;
                return;
            }
        };

        self.shutdown().await;

        if let Err(e) = self.finalize(reason).await {
            tracing::debug!(session_id = %self.id, error = %e, "Consumer gone before session close");
        }
    }

    /// Fold task messages into the aggregator until every provider is
    /// terminal, the deadline fires or the session is cancelled.
    async fn collect(&mut self) -> Result<CloseReason, AppError> {
        let deadline = tokio::time::sleep_until(self.deadline);
        tokio::pin!(deadline);

        loop {
            if self.aggregator.remaining() == 0 {
                return Ok(CloseReason::Completed);
            }

            let message = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::info!(session_id = %self.id, "Session cancelled");
                    return self.cut_off(CloseReason::Cancelled, Instant::now()).await;
                }
                () = &mut deadline => {
                    tracing::warn!(
                        session_id = %self.id,
                        remaining = self.aggregator.remaining(),
                        "Session deadline exceeded"
                    );
                    return self.cut_off(CloseReason::DeadlineExceeded, self.deadline).await;
                }
                message = self.task_rx.recv() => message,
            };

            match message {
                Some(TaskMessage::Progress { provider_id, stage }) => {
                    if stage == Stage::Started {
                        self.aggregator.mark_running(&provider_id);
                    }
                    let payload = EventPayload::Progress {
                        stage,
                        completed: self.aggregator.completed(),
                        total: self.aggregator.total(),
                    };
                    self.emitter.progress(&provider_id, payload)?;
                }
                Some(TaskMessage::Finished(report)) => self.on_finished(report, true).await?,
                None => {
                    // Every runner is gone yet some provider never reported.
                    tracing::error!(session_id = %self.id, "Task channel closed early");
                    return self.cut_off(CloseReason::Cancelled, Instant::now()).await;
                }
            }
        }
    }

    /// Fold one terminal report in and announce it.
    async fn on_finished(&mut self, report: TaskReport, partial: bool) -> Result<(), AppError> {
        let Some(applied) = self.aggregator.apply(report) else {
            return Ok(());
        };
        let provider_id = applied.provider.provider_id.clone();
        self.emitter
            .emit(
                EventKind::ProviderDone,
                Some(provider_id),
                Some(EventPayload::Provider {
                    summary: applied.provider,
                    completed: self.aggregator.completed(),
                    total: self.aggregator.total(),
                }),
            )
            .await?;
        if partial && applied.remaining > 0 {
            let results = self.ranked();
            self.emitter
                .emit(
                    EventKind::PartialResults,
                    None,
                    Some(EventPayload::Results { results }),
                )
                .await?;
        }
        Ok(())
    }

    /// Stop the session. Reports already queued that finished by `cutoff`
    /// still count; only providers with nothing in hand are expired.
    async fn cut_off(
        &mut self,
        reason: CloseReason,
        cutoff: Instant,
    ) -> Result<CloseReason, AppError> {
        self.cancel.cancel();
        while let Ok(message) = self.task_rx.try_recv() {
            if let TaskMessage::Finished(report) = message {
                if report.finished_at <= cutoff {
                    self.on_finished(report, false).await?;
                }
            }
        }
        let expired = self
            .aggregator
            .cut_off(reason == CloseReason::DeadlineExceeded);
        let total = self.aggregator.total();
        for summary in expired {
            let provider_id = summary.provider_id.clone();
            self.emitter
                .emit(
                    EventKind::ProviderDone,
                    Some(provider_id),
                    Some(EventPayload::Provider {
                        summary,
                        completed: total,
                        total,
                    }),
                )
                .await?;
        }
        Ok(reason)
    }

    /// Stop runners, close the pool and wait for every runner to exit.
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.pool.shutdown();
        self.tracker.wait().await;
    }

    async fn finalize(&mut self, reason: CloseReason) -> Result<(), AppError> {
        let results = self.ranked();
        let summary = self
            .aggregator
            .finish(self.id, self.query.text(), self.started.elapsed());

        tracing::info!(
            session_id = %self.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            listings = summary.total_listings,
            elapsed_ms = summary.elapsed_ms,
            "Search session finished"
        );

        self.emitter
            .emit(
                EventKind::FinalResults,
                None,
                Some(EventPayload::Final { results, summary }),
            )
            .await?;
        self.emitter
            .emit(
                EventKind::SessionClosed,
                None,
                Some(EventPayload::Closed { reason }),
            )
            .await?;
        Ok(())
    }

    fn ranked(&self) -> RankedResult {
        rank(
            self.aggregator.listings(),
            self.query.intent(),
            self.query.sort(),
        )
    }
}
