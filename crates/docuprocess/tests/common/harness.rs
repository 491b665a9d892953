//! Recording collaborators and a ready-wired upload session for tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use docuprocess::broadcast::{
    drain_notifications, Notification, NotificationKind, UploadEvent,
};
use docuprocess::config::MIB;
use docuprocess::error::{PersistenceError, ProcessingError};
use docuprocess::history::{
    HistoryQuery, HistoryRecord, HistoryStore, MemoryHistoryStore, NewHistoryRecord,
};
use docuprocess::processing::{
    DocumentClassifier, NonSensitiveMetadata, ProcessingResult, ResultStatus,
};
use docuprocess::session::{Identity, SessionProvider, StaticIdentityProvider};
use docuprocess::upload::{FileRef, UploadSessionManager};

/// History store that records every insert attempt and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryHistoryStore,
    attempted: Mutex<Vec<NewHistoryRecord>>,
    fail_inserts: AtomicBool,
    fail_queries: AtomicBool,
    query_delays: Mutex<VecDeque<Duration>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<HistoryRecord>) -> Self {
        Self {
            inner: MemoryHistoryStore::with_records(records),
            ..Self::default()
        }
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    /// Delays the next query calls, one entry per call.
    pub fn delay_queries(&self, delays: impl IntoIterator<Item = Duration>) {
        self.query_delays.lock().unwrap().extend(delays);
    }

    pub fn attempted(&self) -> Vec<NewHistoryRecord> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<HistoryRecord> {
        self.inner.records().unwrap()
    }
}

#[async_trait]
impl HistoryStore for RecordingStore {
    async fn insert(&self, record: NewHistoryRecord) -> Result<(), PersistenceError> {
        self.attempted.lock().unwrap().push(record.clone());
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(PersistenceError::Http {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.inner.insert(record).await
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let delay = self.query_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(PersistenceError::Http {
                status: 500,
                body: "query failed".to_string(),
            });
        }
        self.inner.query(query).await
    }
}

/// Classifier with a fixed answer.
pub struct ScriptedClassifier {
    outcome: Result<ProcessingResult, String>,
}

impl ScriptedClassifier {
    pub fn completed() -> Self {
        Self {
            outcome: Ok(result(ResultStatus::Completed, "Medical Bill")),
        }
    }

    pub fn error_result() -> Self {
        Self {
            outcome: Ok(result(ResultStatus::Error, "Lab Report")),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl DocumentClassifier for ScriptedClassifier {
    async fn classify(&self, _file: &FileRef) -> Result<ProcessingResult, ProcessingError> {
        self.outcome
            .clone()
            .map_err(ProcessingError::Classification)
    }
}

pub fn result(status: ResultStatus, document_type: &str) -> ProcessingResult {
    ProcessingResult {
        document_type: document_type.to_string(),
        status,
        non_sensitive_metadata: NonSensitiveMetadata {
            validation_status: if status == ResultStatus::Completed {
                "valid".to_string()
            } else {
                "unreadable".to_string()
            },
            anomaly: status == ResultStatus::Error,
            anomaly_reason: None,
        },
    }
}

pub fn pdf(name: &str, size: usize) -> FileRef {
    FileRef::in_memory(name, "application/pdf", vec![0u8; size])
}

pub fn jpeg(name: &str, size: usize) -> FileRef {
    FileRef::in_memory(name, "image/jpeg", vec![0u8; size])
}

pub fn mib(n: usize) -> usize {
    n * MIB as usize
}

/// An upload manager wired to a [`RecordingStore`], subscribed from the start.
pub struct SessionHarness {
    pub manager: UploadSessionManager,
    pub store: Arc<RecordingStore>,
    pub session: SessionProvider,
    pub events: broadcast::Receiver<UploadEvent>,
    pub notifications: broadcast::Receiver<Notification>,
}

impl SessionHarness {
    pub fn new(classifier: impl DocumentClassifier + 'static) -> Self {
        let store = Arc::new(RecordingStore::new());
        let session = SessionProvider::new(Arc::new(StaticIdentityProvider::new(
            Identity::new("static-user"),
        )));
        let manager = UploadSessionManager::builder(
            Arc::new(classifier),
            store.clone(),
            session.clone(),
        )
        .build();

        Self {
            events: manager.subscribe(),
            notifications: manager.notifications(),
            manager,
            store,
            session,
        }
    }

    pub fn signed_in(user_id: &str, classifier: impl DocumentClassifier + 'static) -> Self {
        let harness = Self::new(classifier);
        harness.session.complete_sign_in(Identity::new(user_id));
        harness
    }

    pub fn drain_events(&mut self) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        drain_notifications(&mut self.notifications)
    }

    pub fn notifications_of(&mut self, kind: NotificationKind) -> Vec<Notification> {
        self.drain_notifications()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }
}
