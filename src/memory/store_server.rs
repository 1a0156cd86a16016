// src/memory/store_server.rs — Async message passing for Store
//
// The SQLite connection lives on one task. Request handlers talk to it
// through a cloneable StoreHandle.

use crate::memory::store::{FeedbackRow, RequestRecord, Store};
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<anyhow::Result<T>>;

#[derive(Debug)]
pub enum StoreCommand {
    UpsertSession {
        id: String,
        resp: Reply<()>,
    },
    InsertRequest {
        record: Box<RequestRecord>,
        resp: Reply<()>,
    },
    GetRequest {
        id: String,
        resp: Reply<Option<RequestRecord>>,
    },
    ListSessionRequests {
        session_id: String,
        limit: u32,
        resp: Reply<Vec<RequestRecord>>,
    },
    ListRecentRequests {
        limit: u32,
        resp: Reply<Vec<RequestRecord>>,
    },
    ListGradableRequests {
        limit: u32,
        resp: Reply<Vec<RequestRecord>>,
    },
    InsertFeedback {
        id: String,
        request_id: String,
        is_thumbs_up: bool,
        feedback_text: Option<String>,
        resp: Reply<()>,
    },
    UpdateFeedback {
        id: String,
        is_thumbs_up: bool,
        feedback_text: Option<String>,
        resp: Reply<bool>,
    },
    GetFeedback {
        id: String,
        resp: Reply<Option<FeedbackRow>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> StoreCommand) -> anyhow::Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(make(resp_tx))
            .await
            .map_err(|_| anyhow::anyhow!("store server has shut down"))?;
        resp_rx.await?
    }

    pub async fn upsert_session(&self, id: String) -> anyhow::Result<()> {
        self.call(|resp| StoreCommand::UpsertSession { id, resp }).await
    }

    pub async fn insert_request(&self, record: RequestRecord) -> anyhow::Result<()> {
        self.call(|resp| StoreCommand::InsertRequest {
            record: Box::new(record),
            resp,
        })
        .await
    }

    pub async fn get_request(&self, id: String) -> anyhow::Result<Option<RequestRecord>> {
        self.call(|resp| StoreCommand::GetRequest { id, resp }).await
    }

    pub async fn list_session_requests(
        &self,
        session_id: String,
        limit: u32,
    ) -> anyhow::Result<Vec<RequestRecord>> {
        self.call(|resp| StoreCommand::ListSessionRequests {
            session_id,
            limit,
            resp,
        })
        .await
    }

    pub async fn list_recent_requests(&self, limit: u32) -> anyhow::Result<Vec<RequestRecord>> {
        self.call(|resp| StoreCommand::ListRecentRequests { limit, resp })
            .await
    }

    pub async fn list_gradable_requests(&self, limit: u32) -> anyhow::Result<Vec<RequestRecord>> {
        self.call(|resp| StoreCommand::ListGradableRequests { limit, resp })
            .await
    }

    pub async fn insert_feedback(
        &self,
        id: String,
        request_id: String,
        is_thumbs_up: bool,
        feedback_text: Option<String>,
    ) -> anyhow::Result<()> {
        self.call(|resp| StoreCommand::InsertFeedback {
            id,
            request_id,
            is_thumbs_up,
            feedback_text,
            resp,
        })
        .await
    }

    pub async fn update_feedback(
        &self,
        id: String,
        is_thumbs_up: bool,
        feedback_text: Option<String>,
    ) -> anyhow::Result<bool> {
        self.call(|resp| StoreCommand::UpdateFeedback {
            id,
            is_thumbs_up,
            feedback_text,
            resp,
        })
        .await
    }

    pub async fn get_feedback(&self, id: String) -> anyhow::Result<Option<FeedbackRow>> {
        self.call(|resp| StoreCommand::GetFeedback { id, resp }).await
    }
}

/// Spawn the store server task. Returns a handle and the task's join handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store. Exits once every handle is dropped.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::UpsertSession { id, resp } => {
                let _ = resp.send(store.upsert_session(&id));
            }
            StoreCommand::InsertRequest { record, resp } => {
                let _ = resp.send(store.insert_request(&record));
            }
            StoreCommand::GetRequest { id, resp } => {
                let _ = resp.send(store.get_request(&id));
            }
            StoreCommand::ListSessionRequests {
                session_id,
                limit,
                resp,
            } => {
                let _ = resp.send(store.list_requests_for_session(&session_id, limit));
            }
            StoreCommand::ListRecentRequests { limit, resp } => {
                let _ = resp.send(store.list_recent_requests(limit));
            }
            StoreCommand::ListGradableRequests { limit, resp } => {
                let _ = resp.send(store.list_gradable_requests(limit));
            }
            StoreCommand::InsertFeedback {
                id,
                request_id,
                is_thumbs_up,
                feedback_text,
                resp,
            } => {
                let res =
                    store.insert_feedback(&id, &request_id, is_thumbs_up, feedback_text.as_deref());
                let _ = resp.send(res);
            }
            StoreCommand::UpdateFeedback {
                id,
                is_thumbs_up,
                feedback_text,
                resp,
            } => {
                let res = store.update_feedback(&id, is_thumbs_up, feedback_text.as_deref());
                let _ = resp.send(res);
            }
            StoreCommand::GetFeedback { id, resp } => {
                let _ = resp.send(store.get_feedback(&id));
            }
        }
    }
    tracing::debug!("Store server stopped");
}
