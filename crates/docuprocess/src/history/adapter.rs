//! Read path for the history tab.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{HistoryQuery, HistoryRecord, HistoryStore};
use crate::session::{Identity, SessionProvider};

/// What the history tab renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub records: Vec<HistoryRecord>,
    pub loading: bool,
    pub sign_in_required: bool,
    /// Set when the last query failed; `records` is empty in that case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryView {
    pub fn sign_in_required() -> Self {
        Self {
            records: Vec::new(),
            loading: false,
            sign_in_required: true,
            error: None,
        }
    }

    pub fn loaded(records: Vec<HistoryRecord>) -> Self {
        Self {
            records,
            loading: false,
            sign_in_required: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            loading: false,
            sign_in_required: false,
            error: Some(error.into()),
        }
    }
}

impl Default for HistoryView {
    fn default() -> Self {
        Self::sign_in_required()
    }
}

/// Loads a user's history and publishes the resulting [`HistoryView`].
///
/// Each load bumps a generation counter. A load that finishes after a newer one
/// has started still returns its view to the caller but does not publish it.
#[derive(Clone)]
pub struct HistoryViewAdapter {
    store: Arc<dyn HistoryStore>,
    state: Arc<watch::Sender<HistoryView>>,
    generation: Arc<AtomicU64>,
}

impl HistoryViewAdapter {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        let (state, _) = watch::channel(HistoryView::default());
        Self {
            store,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn load_history(&self, identity: Option<&Identity>) -> HistoryView {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(identity) = identity else {
            let view = HistoryView::sign_in_required();
            self.publish(generation, view.clone());
            return view;
        };

        // Previous records stay visible while the new query is outstanding,
        // but only those belonging to the identity being loaded.
        self.publish_with(generation, |view| {
            view.records.retain(|r| r.user_id == identity.user_id);
            view.loading = true;
            view.sign_in_required = false;
            view.error = None;
        });

        let query = HistoryQuery::for_identity(identity);
        let view = match self.store.query(&query).await {
            Ok(records) => {
                debug!(user_id = %identity.user_id, count = records.len(), "History loaded");
                HistoryView::loaded(records)
            }
            Err(e) => {
                warn!(user_id = %identity.user_id, "Failed to load history: {}", e);
                HistoryView::failed(e.to_string())
            }
        };

        self.publish(generation, view.clone());
        view
    }

    /// Reloads whenever the session's identity changes, until `cancel` fires.
    pub fn follow_session(
        &self,
        session: &SessionProvider,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let adapter = self.clone();
        let mut rx = session.subscribe();

        tokio::spawn(async move {
            let mut last: Option<Option<Identity>> = None;
            loop {
                let identity = rx.borrow_and_update().identity().cloned();
                if last.as_ref() != Some(&identity) {
                    adapter.load_history(identity.as_ref()).await;
                    last = Some(identity);
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn snapshot(&self) -> HistoryView {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HistoryView> {
        self.state.subscribe()
    }

    fn publish(&self, generation: u64, view: HistoryView) {
        self.publish_with(generation, move |current| *current = view);
    }

    fn publish_with(&self, generation: u64, update: impl FnOnce(&mut HistoryView)) {
        let published = self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(current);
            true
        });
        if !published {
            debug!(generation, "Discarding stale history load");
        }
    }
}
