//! Bridges host lifecycle events to a [`LifecycleHandler`].
//!
//! Events arrive on an mpsc channel and answers go back on oneshot channels.
//! Install, activate and sync run one at a time in arrival order. Each fetch
//! gets its own task so one slow request never holds up another.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{ActivateReport, FetchOutcome, InstallReport, LifecycleHandler};
use taskcache_core::{CacheRequest, Error};

type Reply<T> = oneshot::Sender<Result<T, Error>>;

/// A lifecycle event delivered by the host.
#[derive(Debug)]
pub enum HostEvent {
    Install { reply: Reply<InstallReport> },
    Activate { reply: Reply<ActivateReport> },
    Fetch { request: CacheRequest, reply: Reply<FetchOutcome> },
    Sync { tag: String, reply: Reply<bool> },
}

/// Sending side of the event channel.
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostEvent>,
}

impl HostHandle {
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.dispatch(|reply| HostEvent::Install { reply }).await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.dispatch(|reply| HostEvent::Activate { reply }).await
    }

    pub async fn fetch(&self, request: CacheRequest) -> Result<FetchOutcome, Error> {
        self.dispatch(|reply| HostEvent::Fetch { request, reply }).await
    }

    pub async fn sync(&self, tag: impl Into<String>) -> Result<bool, Error> {
        let tag = tag.into();
        self.dispatch(|reply| HostEvent::Sync { tag, reply }).await
    }

    async fn dispatch<T>(&self, event: impl FnOnce(Reply<T>) -> HostEvent) -> Result<T, Error> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(event(reply))
            .await
            .map_err(|_| Error::HostClosed("event loop stopped".into()))?;
        response
            .await
            .map_err(|_| Error::HostClosed("handler dropped the reply".into()))?
    }
}

/// Start the event loop for `handler`.
///
/// The loop ends once every [`HostHandle`] clone has been dropped.
pub fn spawn<H>(handler: Arc<H>, buffer: usize) -> (HostHandle, JoinHandle<()>)
where
    H: LifecycleHandler + 'static,
{
    let (tx, rx) = mpsc::channel(buffer);
    let task = tokio::spawn(run(handler, rx));
    (HostHandle { tx }, task)
}

async fn run<H>(handler: Arc<H>, mut rx: mpsc::Receiver<HostEvent>)
where
    H: LifecycleHandler + 'static,
{
    while let Some(event) = rx.recv().await {
        match event {
            HostEvent::Install { reply } => {
                let _ = reply.send(handler.on_install().await);
            }
            HostEvent::Activate { reply } => {
                let _ = reply.send(handler.on_activate().await);
            }
            HostEvent::Sync { tag, reply } => {
                let _ = reply.send(handler.on_sync_signal(&tag).await);
            }
            HostEvent::Fetch { request, reply } => {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let _ = reply.send(handler.on_fetch(request).await);
                });
            }
        }
    }

    tracing::debug!("host event loop finished");
}
