//! Ordered, externally observable session events.
//!
//! Every event carries a strictly increasing sequence number. Result-class
//! events are never dropped: [`EventEmitter::emit`] waits for buffer room.
//! Progress events are best effort and are dropped when the consumer falls
//! behind, without consuming a sequence number.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::aggregator::{ProviderSummary, SessionSummary};
use crate::error::AppError;
use crate::ranker::RankedResult;
use crate::task::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ProviderProgress,
    ProviderDone,
    PartialResults,
    FinalResults,
    SessionClosed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProviderProgress => "provider-progress",
            EventKind::ProviderDone => "provider-done",
            EventKind::PartialResults => "partial-results",
            EventKind::FinalResults => "final-results",
            EventKind::SessionClosed => "session-closed",
        }
    }

    /// Progress events may be dropped under backpressure; everything else
    /// must reach the consumer.
    pub fn is_droppable(&self) -> bool {
        matches!(self, EventKind::ProviderProgress)
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Every provider reached a terminal state.
    Completed,
    DeadlineExceeded,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Progress {
        stage: Stage,
        completed: usize,
        total: usize,
    },
    Provider {
        summary: ProviderSummary,
        completed: usize,
        total: usize,
    },
    Results {
        results: RankedResult,
    },
    Final {
        results: RankedResult,
        summary: SessionSummary,
    },
    Closed {
        reason: CloseReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub seq: u64,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

/// Producer side of a session's event stream. Owned by the session driver.
#[derive(Debug)]
pub struct EventEmitter {
    tx: mpsc::Sender<SessionEvent>,
    next_seq: u64,
}

impl EventEmitter {
    /// Create an emitter and the receiver its single consumer reads from.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx, next_seq: 1 }, rx)
    }

    /// Sequence number the next delivered event will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Deliver an event, waiting for buffer room.
    ///
    /// Fails with [`AppError::SessionClosed`] once the consumer is gone.
    pub async fn emit(
        &mut self,
        kind: EventKind,
        provider: Option<String>,
        payload: Option<EventPayload>,
    ) -> Result<u64, AppError> {
        let event = self.build(kind, provider, payload);
        let seq = event.seq;
        self.tx
            .send(event)
            .await
            .map_err(|_| AppError::SessionClosed)?;
        self.next_seq += 1;
        Ok(seq)
    }

    /// Deliver a progress event if the buffer has room.
    ///
    /// Returns `Ok(None)` when the event was dropped because the consumer is
    /// behind.
    pub fn progress(
        &mut self,
        provider: &str,
        payload: EventPayload,
    ) -> Result<Option<u64>, AppError> {
        let event = self.build(
            EventKind::ProviderProgress,
            Some(provider.to_string()),
            Some(payload),
        );
        let seq = event.seq;
        match self.tx.try_send(event) {
            Ok(()) => {
                self.next_seq += 1;
                Ok(Some(seq))
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(%provider, "Dropping progress event, consumer is behind");
                Ok(None)
            }
            Err(TrySendError::Closed(_)) => Err(AppError::SessionClosed),
        }
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn build(
        &self,
        kind: EventKind,
        provider: Option<String>,
        payload: Option<EventPayload>,
    ) -> SessionEvent {
        SessionEvent {
            seq: self.next_seq,
            kind,
            provider,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_payload() -> EventPayload {
        EventPayload::Progress {
            stage: Stage::Navigating,
            completed: 0,
            total: 3,
        }
    }

    #[tokio::test]
    async fn sequence_numbers_increase_from_one() {
        let (mut emitter, mut rx) = EventEmitter::channel(8);
        emitter.progress("a", progress_payload()).unwrap();
        emitter
            .emit(EventKind::SessionClosed, None, None)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        let closed = rx.recv().await.unwrap();
        assert_eq!(closed.seq, 2);
        assert_eq!(closed.kind, EventKind::SessionClosed);
    }

    #[tokio::test]
    async fn progress_is_dropped_when_full_without_gaps() {
        let (mut emitter, mut rx) = EventEmitter::channel(1);
        assert_eq!(emitter.progress("a", progress_payload()).unwrap(), Some(1));
        assert_eq!(emitter.progress("a", progress_payload()).unwrap(), None);
        assert_eq!(emitter.next_seq(), 2);

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        let seq = emitter
            .emit(EventKind::PartialResults, None, None)
            .await
            .unwrap();
        assert_eq!(seq, 2);
    }

    #[tokio::test]
    async fn emit_waits_for_room_instead_of_dropping() {
        let (mut emitter, mut rx) = EventEmitter::channel(1);
        emitter
            .emit(EventKind::ProviderDone, Some("a".into()), None)
            .await
            .unwrap();

        let producer = tokio::spawn(async move {
            emitter
                .emit(EventKind::FinalResults, None, None)
                .await
                .unwrap();
            emitter
        });

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ProviderDone);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::FinalResults);
        assert_eq!(producer.await.unwrap().next_seq(), 3);
    }

    #[tokio::test]
    async fn closed_consumer_is_reported() {
        let (mut emitter, rx) = EventEmitter::channel(4);
        drop(rx);
        assert!(emitter.is_closed());
        assert!(matches!(
            emitter.progress("a", progress_payload()),
            Err(AppError::SessionClosed)
        ));
        assert!(matches!(
            emitter.emit(EventKind::FinalResults, None, None).await,
            Err(AppError::SessionClosed)
        ));
    }

    #[test]
    fn serializes_with_kebab_kind_and_tagged_payload() {
        let event = SessionEvent {
            seq: 7,
            kind: EventKind::SessionClosed,
            provider: None,
            payload: Some(EventPayload::Closed {
                reason: CloseReason::DeadlineExceeded,
            }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "session-closed");
        assert_eq!(json["payload"]["type"], "closed");
        assert_eq!(json["payload"]["reason"], "deadline_exceeded");
        assert!(json.get("provider").is_none());
    }
}
