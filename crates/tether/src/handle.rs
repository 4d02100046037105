//! Caller-facing handle to a running connection.

use crate::actor::Envelope;
use crate::event::{ConnectOptions, Event, CLOSE_NORMAL};
use crate::events::ConnectionEvent;
use crate::guards;
use crate::status::ConnectionStatus;
use bytes::Bytes;
use futures::future::{self, Ready};
use futures::stream::{self, Stream};
use std::fmt;
use std::sync::Arc;
use std::task::Poll;
use tether_core::LinkError;
use tether_queue::Priority;
use tokio::sync::{broadcast, mpsc, watch};
use tower::Service;

/// Errors returned by [`ConnectionHandle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    /// The command was refused before reaching the connection.
    #[error("invalid command: {0}")]
    Validation(String),
    /// The connection has terminated.
    #[error("connection terminated")]
    Closed,
}

impl From<HandleError> for LinkError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::Validation(message) => LinkError::Validation(message),
            HandleError::Closed => LinkError::Connection("connection terminated".to_string()),
        }
    }
}

/// A caller command, as accepted by the [`Service`] impl.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a connection.
    Connect {
        /// Target URL.
        url: String,
        /// Requested sub-protocols.
        protocols: Vec<String>,
        /// Session overrides.
        options: ConnectOptions,
    },
    /// Close gracefully.
    Disconnect {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Queue a message.
    Send {
        /// Message bytes.
        payload: Bytes,
        /// Drain lane.
        priority: Priority,
    },
    /// Shut down for good.
    Terminate,
}

/// Cheaply cloneable handle to a connection actor.
///
/// Commands are fire-and-forget: they return once the actor has accepted them, and
/// their outcome is observed through [`status`](Self::status) or notifications.
pub struct ConnectionHandle {
    inbox: mpsc::UnboundedSender<Envelope>,
    status: watch::Receiver<ConnectionStatus>,
    events: broadcast::Receiver<ConnectionEvent>,
    schemes: Arc<[String]>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        inbox: mpsc::UnboundedSender<Envelope>,
        status: watch::Receiver<ConnectionStatus>,
        events: broadcast::Receiver<ConnectionEvent>,
        schemes: Arc<[String]>,
    ) -> Self {
        Self {
            inbox,
            status,
            events,
            schemes,
        }
    }

    fn submit(&self, event: Event) -> Result<(), HandleError> {
        self.inbox
            .send(Envelope::Command(event))
            .map_err(|_| HandleError::Closed)
    }

    /// Connects to `url` with no sub-protocols and the configured retry settings.
    pub fn connect(&self, url: impl Into<String>) -> Result<(), HandleError> {
        self.connect_with(url, Vec::new(), ConnectOptions::default())
    }

    /// Connects with sub-protocols and per-session retry overrides.
    ///
    /// Returns [`HandleError::Validation`] for a malformed URL or a scheme the
    /// connection does not accept. The command then never reaches the actor.
    pub fn connect_with(
        &self,
        url: impl Into<String>,
        protocols: Vec<String>,
        options: ConnectOptions,
    ) -> Result<(), HandleError> {
        let url = url.into();
        if !guards::valid_url(&url, &self.schemes) {
            return Err(HandleError::Validation(format!("invalid url: {url:?}")));
        }
        self.submit(Event::Connect {
            url,
            protocols,
            options,
        })
    }

    /// Closes the connection with a normal close code.
    pub fn disconnect(&self) -> Result<(), HandleError> {
        self.disconnect_with(CLOSE_NORMAL, "")
    }

    /// Closes the connection with a specific code and reason.
    pub fn disconnect_with(&self, code: u16, reason: impl Into<String>) -> Result<(), HandleError> {
        self.submit(Event::Disconnect {
            code,
            reason: reason.into(),
        })
    }

    /// Queues a normal-priority message.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<(), HandleError> {
        self.submit(Event::send(payload))
    }

    /// Queues a high-priority message. High-priority messages drain first and are
    /// never evicted.
    pub fn send_high(&self, payload: impl Into<Bytes>) -> Result<(), HandleError> {
        self.submit(Event::send_high(payload))
    }

    /// Cancels every timer, releases the socket and stops the actor.
    pub fn terminate(&self) -> Result<(), HandleError> {
        self.submit(Event::Terminate)
    }

    /// Latest status published by the actor.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Waits until the published status equals `status`.
    ///
    /// Only the latest status is observed, so a status the connection passed through
    /// within one burst of events may be missed. Use [`subscribe`](Self::subscribe)
    /// to see every transition.
    pub async fn wait_for(&self, status: ConnectionStatus) -> Result<(), HandleError> {
        let mut receiver = self.status.clone();
        receiver
            .wait_for(|current| *current == status)
            .await
            .map(|_| ())
            .map_err(|_| HandleError::Closed)
    }

    /// Subscribes to notifications emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.resubscribe()
    }

    /// Notifications as a stream. Ends when the actor stops. A subscriber that falls
    /// behind skips the notifications it missed.
    pub fn events(&self) -> impl Stream<Item = ConnectionEvent> + Send + 'static {
        stream::unfold(self.subscribe(), |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

impl Clone for ConnectionHandle {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
            status: self.status.clone(),
            events: self.events.resubscribe(),
            schemes: Arc::clone(&self.schemes),
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Service<Command> for ConnectionHandle {
    type Response = ();
    type Error = HandleError;
    type Future = Ready<Result<(), HandleError>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.is_closed() {
            Poll::Ready(Err(HandleError::Closed))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, command: Command) -> Self::Future {
        future::ready(match command {
            Command::Connect {
                url,
                protocols,
                options,
            } => self.connect_with(url, protocols, options),
            Command::Disconnect { code, reason } => self.disconnect_with(code, reason),
            Command::Send { payload, priority } => self.submit(Event::Send { payload, priority }),
            Command::Terminate => self.terminate(),
        })
    }
}
