//! Request dispatch for a ready session.
//!
//! [`Router::dispatch`] never waits on I/O. Each file operation runs as its
//! own task; operations on the same path are chained in receipt order so a
//! read issued after a write observes it, while different paths proceed
//! concurrently. Replies go to the connection's outbound queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use codebox_common::WorkspaceError;
use codebox_terminal::PtyError;
use codebox_workspace::paths;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::protocol::{Inbound, Outbound, Request, ServerMessage};
use crate::registry::Session;

#[derive(Default)]
struct ChainMap {
    next_ticket: u64,
    /// Completion signal of the last operation queued per path.
    tails: HashMap<String, (u64, oneshot::Receiver<()>)>,
}

/// Per-path FIFO ordering for file operations.
#[derive(Default)]
pub struct PathChains {
    inner: Mutex<ChainMap>,
}

impl PathChains {
    fn lock(&self) -> MutexGuard<'_, ChainMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an operation on `key`. Must be called in receipt order.
    fn enqueue(self: &Arc<Self>, key: String) -> Link {
        let (done, rx) = oneshot::channel();
        let mut map = self.lock();
        map.next_ticket += 1;
        let ticket = map.next_ticket;
        let prev = map.tails.insert(key.clone(), (ticket, rx)).map(|(_, prev)| prev);
        Link {
            chains: Arc::clone(self),
            key,
            ticket,
            prev,
            _done: done,
        }
    }

    /// Paths with an operation queued or running.
    pub fn pending(&self) -> usize {
        self.lock().tails.len()
    }
}

/// A queued operation's place in its path chain. Dropping it releases the
/// next operation on the same path.
struct Link {
    chains: Arc<PathChains>,
    key: String,
    ticket: u64,
    prev: Option<oneshot::Receiver<()>>,
    _done: oneshot::Sender<()>,
}

impl Link {
    async fn ready(&mut self) {
        if let Some(prev) = self.prev.take() {
            // Either outcome means the previous operation is finished.
            let _ = prev.await;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        let mut map = self.chains.lock();
        if matches!(map.tails.get(&self.key), Some((ticket, _)) if *ticket == self.ticket) {
            map.tails.remove(&self.key);
        }
    }
}

/// Dispatches the requests of one session.
pub struct Router {
    session: Arc<Session>,
    out: mpsc::Sender<Outbound>,
    chains: Arc<PathChains>,
}

impl Router {
    pub fn new(session: Arc<Session>, out: mpsc::Sender<Outbound>) -> Self {
        Self {
            session,
            out,
            chains: Arc::new(PathChains::default()),
        }
    }

    pub fn chains(&self) -> &PathChains {
        &self.chains
    }

    pub fn dispatch(&self, msg: Inbound) {
        let Inbound {
            callback_id,
            request,
        } = msg;

        match request {
            Request::TerminalData { ref data } => {
                let result = self.session.terminal.write(data.as_bytes());
                self.reply_terminal(&request, callback_id, result);
            }
            Request::Resize { cols, rows } => {
                let result = self.session.terminal.resize(cols, rows);
                self.reply_terminal(&request, callback_id, result);
            }
            Request::FetchDir { .. } | Request::FetchContent { .. } | Request::UpdateContent { .. } => {
                self.spawn_file_op(request, callback_id);
            }
        }
    }

    fn spawn_file_op(&self, request: Request, callback_id: Option<String>) {
        let raw = request.path().unwrap_or_default();
        let key = paths::normalize(raw).unwrap_or_else(|_| raw.to_string());
        let mut link = self.chains.enqueue(key);

        let session = Arc::clone(&self.session);
        let out = self.out.clone();
        let cancel = session.cancel_token();

        tokio::spawn(async move {
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                reply = async {
                    link.ready().await;
                    file_op(&session, &request, callback_id).await
                } => reply,
            };
            drop(link);
            if let Some(reply) = reply {
                let _ = out.send(reply).await;
            }
        });
    }

    fn reply_terminal(
        &self,
        request: &Request,
        callback_id: Option<String>,
        result: Result<(), PtyError>,
    ) {
        let reply = match result {
            Ok(()) => callback_id.map(|id| Outbound::reply(ServerMessage::bare_result(request), Some(id))),
            Err(e) => {
                debug!(session = %self.session.id, kind = request.kind(), error = %e, "terminal request failed");
                Some(failure(request, callback_id, e.to_string()))
            }
        };
        if let Some(reply) = reply {
            let out = self.out.clone();
            tokio::spawn(async move {
                let _ = out.send(reply).await;
            });
        }
    }
}

fn failure(request: &Request, callback_id: Option<String>, message: String) -> Outbound {
    match callback_id {
        Some(_) => Outbound::failure(request, callback_id, message),
        None => Outbound::error(format!("{}: {message}", request.kind())),
    }
}

async fn file_op(session: &Session, request: &Request, callback_id: Option<String>) -> Option<Outbound> {
    let result: Result<Option<ServerMessage>, WorkspaceError> = match request {
        Request::FetchDir { path } => session
            .workspace
            .list_dir(path)
            .await
            .map(|nodes| Some(ServerMessage::FetchDirResult(Some(nodes)))),
        Request::FetchContent { path } => session
            .workspace
            .read_file(path)
            .await
            .map(|content| Some(ServerMessage::FetchContentResult(Some(content)))),
        Request::UpdateContent { path, content } => session
            .workspace
            .write_file(path, content.clone())
            .await
            // Acknowledged only when the client asked for it.
            .map(|()| callback_id.as_ref().map(|_| ServerMessage::UpdateContentResult(()))),
        Request::TerminalData { .. } | Request::Resize { .. } => return None,
    };

    match result {
        Ok(Some(message)) => Some(Outbound::reply(message, callback_id)),
        Ok(None) => None,
        Err(e) => {
            match &e {
                WorkspaceError::NotFound(_) | WorkspaceError::InvalidPath(_) | WorkspaceError::NotADirectory(_) => {
                    debug!(session = %session.id, kind = request.kind(), error = %e, "request failed")
                }
                WorkspaceError::Io(_) => {
                    warn!(session = %session.id, kind = request.kind(), error = %e, "request failed")
                }
            }
            Some(failure(request, callback_id, e.to_string()))
        }
    }
}
