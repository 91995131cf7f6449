use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DedupKey, Listing, ProviderInfo};
use crate::task::{TaskOutcome, TaskReport, TaskState};

/// Aggregation session state machine: `Collecting → Finalizing → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Collecting,
    Finalizing,
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Collecting => write!(f, "collecting"),
            SessionState::Finalizing => write!(f, "finalizing"),
            SessionState::Done => write!(f, "done"),
        }
    }
}

/// Per-provider status metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub provider_id: String,
    pub name: String,
    pub status: TaskState,
    /// Listings the provider contributed after normalization.
    pub found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl ProviderSummary {
    fn pending(info: &ProviderInfo) -> Self {
        Self {
            provider_id: info.id.clone(),
            name: info.name.clone(),
            status: TaskState::Pending,
            found: 0,
            error_kind: None,
            error: None,
            elapsed_ms: None,
        }
    }
}

/// Terminal summary of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub query: String,
    pub providers: Vec<ProviderSummary>,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub total_listings: usize,
    pub deadline_exceeded: bool,
    pub elapsed_ms: u64,
}

/// What applying one terminal task event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub provider: ProviderSummary,
    pub added: usize,
    pub replaced: usize,
    /// Providers still without a terminal outcome.
    pub remaining: usize,
}

enum Merge {
    Added,
    Replaced,
    Kept,
}

/// Accumulates deduplicated listings and per-provider status for one session.
///
/// Not thread-safe by itself; the session driver is its single owner.
#[derive(Debug)]
pub struct Aggregator {
    providers: Vec<ProviderSummary>,
    listings: Vec<Listing>,
    index: HashMap<DedupKey, usize>,
    state: SessionState,
    deadline_exceeded: bool,
}

impl Aggregator {
    pub fn new<'a>(providers: impl IntoIterator<Item = &'a ProviderInfo>) -> Self {
        let providers: Vec<_> = providers.into_iter().map(ProviderSummary::pending).collect();
        let state = if providers.is_empty() {
            SessionState::Finalizing
        } else {
            SessionState::Collecting
        };
        Self {
            providers,
            listings: Vec::new(),
            index: HashMap::new(),
            state,
            deadline_exceeded: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Accumulated listings in first-seen order.
    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn providers(&self) -> &[ProviderSummary] {
        &self.providers
    }

    pub fn total(&self) -> usize {
        self.providers.len()
    }

    /// Providers that have reached a terminal state.
    pub fn completed(&self) -> usize {
        self.providers
            .iter()
            .filter(|p| p.status.is_terminal())
            .count()
    }

    pub fn remaining(&self) -> usize {
        self.total() - self.completed()
    }

    /// Record that a provider was admitted by the worker pool.
    pub fn mark_running(&mut self, provider_id: &str) {
        if self.state != SessionState::Collecting {
            return;
        }
        if let Some(slot) = self
            .providers
            .iter_mut()
            .find(|p| p.provider_id == provider_id && p.status == TaskState::Pending)
        {
            slot.status = TaskState::Running;
        }
    }

    /// Apply one terminal task event.
    ///
    /// Returns `None` (and changes nothing) when the session is no longer
    /// collecting, or the provider is unknown or already terminal.
    pub fn apply(&mut self, report: TaskReport) -> Option<Applied> {
        if self.state != SessionState::Collecting {
            tracing::debug!(provider = %report.provider_id, state = %self.state, "Discarding late task event");
            return None;
        }

        let Some(pos) = self
            .providers
            .iter()
            .position(|p| p.provider_id == report.provider_id)
        else {
            tracing::warn!(provider = %report.provider_id, "Task event for unknown provider");
            return None;
        };
        if self.providers[pos].status.is_terminal() {
            tracing::warn!(provider = %report.provider_id, "Duplicate terminal task event");
            return None;
        }

        let mut added = 0;
        let mut replaced = 0;
        {
            let slot = &mut self.providers[pos];
            slot.status = report.outcome.state();
            slot.elapsed_ms = Some(millis(report.elapsed));
        }

        match report.outcome {
            TaskOutcome::Succeeded(listings) => {
                self.providers[pos].found = listings.len();
                for listing in listings {
                    match self.merge(listing) {
                        Merge::Added => added += 1,
                        Merge::Replaced => replaced += 1,
                        Merge::Kept => {}
                    }
                }
            }
            TaskOutcome::Failed(error) => {
                let slot = &mut self.providers[pos];
                slot.error_kind = Some(error.kind().to_string());
                slot.error = Some(error.to_string());
            }
            TaskOutcome::TimedOut => {
                self.providers[pos].error_kind = Some("timeout".to_string());
            }
        }

        let remaining = self.remaining();
        if remaining == 0 {
            self.state = SessionState::Finalizing;
        }

        Some(Applied {
            provider: self.providers[pos].clone(),
            added,
            replaced,
            remaining,
        })
    }

    /// Stop collecting early (deadline or cancellation).
    ///
    /// Every provider without a terminal outcome becomes `TimedOut`; their
    /// summaries are returned in registry order.
    pub fn cut_off(&mut self, deadline_exceeded: bool) -> Vec<ProviderSummary> {
        if self.state != SessionState::Collecting {
            return Vec::new();
        }
        self.state = SessionState::Finalizing;
        self.deadline_exceeded = deadline_exceeded;

        self.providers
            .iter_mut()
            .filter(|p| !p.status.is_terminal())
            .map(|p| {
                p.status = TaskState::TimedOut;
                p.error_kind = Some(if deadline_exceeded {
                    "session_deadline".to_string()
                } else {
                    "cancelled".to_string()
                });
                p.clone()
            })
            .collect()
    }

    /// Assemble the terminal summary and move to `Done`.
    pub fn finish(&mut self, session_id: Uuid, query: &str, elapsed: Duration) -> SessionSummary {
        self.state = SessionState::Done;
        let count = |state: TaskState| {
            self.providers
                .iter()
                .filter(|p| p.status == state)
                .count()
        };
        SessionSummary {
            session_id,
            query: query.to_string(),
            providers: self.providers.clone(),
            succeeded: count(TaskState::Succeeded),
            failed: count(TaskState::Failed),
            timed_out: count(TaskState::TimedOut),
            total_listings: self.listings.len(),
            deadline_exceeded: self.deadline_exceeded,
            elapsed_ms: millis(elapsed),
        }
    }

    /// Dedup-merge: on a key collision the higher relevance score wins,
    /// ties keep the first-seen listing.
    fn merge(&mut self, listing: Listing) -> Merge {
        let key = listing.dedup_key();
        match self.index.get(&key) {
            None => {
                self.index.insert(key, self.listings.len());
                self.listings.push(listing);
                Merge::Added
            }
            Some(&pos) => {
                if listing.relevance_score() > self.listings[pos].relevance_score() {
                    self.listings[pos] = listing;
                    Merge::Replaced
                } else {
                    Merge::Kept
                }
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
