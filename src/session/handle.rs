// Session actor
//
// The session runs in its own task. User commands arrive on a serialized
// queue and are answered over oneshot channels; transport events are
// interleaved between commands while the session is capturing.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::info;

use super::artifact::Artifact;
use super::session::RecordingSession;
use super::stats::{SessionEvent, SessionStats};
use crate::error::{RecorderError, Result};

enum Request {
    Start(oneshot::Sender<Result<()>>),
    Pause(oneshot::Sender<Result<()>>),
    Resume(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<Artifact>>),
    Abort(oneshot::Sender<Result<()>>),
    Stats(oneshot::Sender<Result<SessionStats>>),
}

/// Cloneable handle to a running session task
///
/// Dropping the last handle aborts a session that has not finished.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Move `session` into a task and return its handle
    pub fn spawn(session: RecordingSession) -> Self {
        let (requests, requests_rx) = mpsc::channel(32);
        let handle = Self {
            session_id: session.id().to_string(),
            requests,
            events: session.notifier(),
        };

        tokio::spawn(run(session, requests_rx));
        handle
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn start(&self) -> Result<()> {
        self.call(Request::Start).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(Request::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.call(Request::Resume).await
    }

    pub async fn stop(&self) -> Result<Artifact> {
        self.call(Request::Stop).await
    }

    pub async fn abort(&self) -> Result<()> {
        self.call(Request::Abort).await
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        self.call(Request::Stats).await
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(request(reply_tx))
            .await
            .map_err(|_| RecorderError::SessionClosed)?;
        reply_rx.await.map_err(|_| RecorderError::SessionClosed)?
    }
}

async fn run(mut session: RecordingSession, mut requests: mpsc::Receiver<Request>) {
    loop {
        let capturing = session.is_capturing();

        tokio::select! {
            request = requests.recv() => match request {
                Some(request) => dispatch(&mut session, request).await,
                None => break,
            },
            event = session.next_transport_event(), if capturing => {
                // Failures are published on the event channel and move the
                // session to Aborted; nobody is waiting on a reply here.
                let _ = match event {
                    Some(event) => session.on_transport_event(event).await,
                    None => session.transport_closed().await,
                };
            }
        }
    }

    if !session.state().is_terminal() {
        info!(
            "All handles to session {} dropped while {}, aborting",
            session.id(),
            session.state()
        );
        let _ = session.abort().await;
    }
}

async fn dispatch(session: &mut RecordingSession, request: Request) {
    // A dropped reply receiver only means the caller stopped waiting
    match request {
        Request::Start(reply) => {
            let _ = reply.send(session.start().await);
        }
        Request::Pause(reply) => {
            let _ = reply.send(session.pause().await);
        }
        Request::Resume(reply) => {
            let _ = reply.send(session.resume().await);
        }
        Request::Stop(reply) => {
            let _ = reply.send(session.stop().await);
        }
        Request::Abort(reply) => {
            let _ = reply.send(session.abort().await);
        }
        Request::Stats(reply) => {
            let _ = reply.send(Ok(session.stats()));
        }
    }
}
