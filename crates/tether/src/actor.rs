//! The single-task runtime that drives a [`Machine`].
//!
//! All input (caller commands, socket callbacks and timer expiries) is serialized
//! through one inbox and applied one event at a time. Effects are executed right
//! after the step that produced them. Follow-up events, including the outcome of a
//! transmit, are applied before the next inbox item is read, so a drain never
//! interleaves with unrelated input.

use crate::config::LinkConfig;
use crate::context::{Context, MessageMetrics};
use crate::effect::{Effect, Timer};
use crate::event::{ErrorCause, Event};
use crate::events::ConnectionEvent;
use crate::handle::ConnectionHandle;
use crate::machine::Machine;
use crate::socket::{
    SocketAdapter, SocketError, SocketErrorKind, SocketEvent, SocketEvents, SocketHandle, SocketId,
};
use crate::status::ConnectionStatus;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};

/// Capacity of the notification broadcast. Slow subscribers skip ahead.
const EVENT_CAPACITY: usize = 256;

/// Stand-in deadline for durations too long to represent, about 30 years out.
const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(after: std::time::Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// An item in the actor's inbox.
#[derive(Debug)]
pub(crate) enum Envelope {
    /// A caller command.
    Command(Event),
    /// A callback from a socket.
    Socket(SocketId, SocketEvent),
}

enum Wake {
    Inbox(Option<Envelope>),
    Deadline,
}

/// What the actor remembers about the context before a step.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
struct Before {
    event: &'static str,
    status: ConnectionStatus,
    metrics: MessageMetrics,
    errors: u64,
}

/// A connection actor.
///
/// Usually started with [`Connection::spawn`]. [`Connection::new`] plus
/// [`Connection::run`] gives control over where the task runs.
pub struct Connection<A: SocketAdapter> {
    machine: Machine,
    adapter: A,
    socket: Option<(SocketId, A::Handle)>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    sink: mpsc::WeakUnboundedSender<Envelope>,
    timers: [Option<(Instant, Event)>; Timer::ALL.len()],
    follow_ups: VecDeque<Event>,
    status: watch::Sender<ConnectionStatus>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl<A: SocketAdapter> Connection<A> {
    /// Creates an actor and a handle to it. Nothing runs until [`run`](Self::run)
    /// is polled.
    pub fn new(config: LinkConfig, adapter: A) -> (Self, ConnectionHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);

        let sink = inbox_tx.downgrade();
        let handle = ConnectionHandle::new(
            inbox_tx,
            status_rx,
            events_rx,
            Arc::from(config.accepted_schemes.as_slice()),
        );
        let connection = Self {
            machine: Machine::new(config),
            adapter,
            socket: None,
            inbox: inbox_rx,
            sink,
            timers: Default::default(),
            follow_ups: VecDeque::new(),
            status: status_tx,
            events: events_tx,
        };
        (connection, handle)
    }

    /// Starts the actor on the current tokio runtime.
    pub fn spawn(config: LinkConfig, adapter: A) -> ConnectionHandle {
        let (connection, handle) = Self::new(config, adapter);
        tokio::spawn(connection.run());
        handle
    }

    /// Processes events until the connection terminates. Returns the final context.
    ///
    /// Dropping every [`ConnectionHandle`] terminates the connection.
    pub async fn run(self) -> Context {
        let context = self.machine.initial_context();
        self.run_with(context).await
    }

    /// Like [`run`](Self::run), but starts from an existing context, typically one
    /// rebuilt with [`Context::restore_session`]. The context should not hold a socket.
    pub async fn run_with(mut self, mut context: Context) -> Context {
        #[cfg(feature = "tracing")]
        tracing::debug!(connection = %self.machine.config().name(), "connection actor started");

        while !context.status().is_terminal() {
            let next = self.next_timer();
            let deadline = next.map_or_else(Instant::now, |(_, at)| at);

            let wake = tokio::select! {
                biased;
                received = self.inbox.recv() => Wake::Inbox(received),
                () = time::sleep_until(deadline), if next.is_some() => Wake::Deadline,
            };

            context = match wake {
                Wake::Inbox(Some(Envelope::Command(event))) => self.dispatch(context, event),
                Wake::Inbox(Some(Envelope::Socket(socket, event))) => {
                    self.on_socket(context, socket, event)
                }
                Wake::Inbox(None) => self.dispatch(context, Event::Terminate),
                Wake::Deadline => {
                    match next.and_then(|(timer, _)| self.timers[timer.index()].take()) {
                        Some((_, event)) => self.dispatch(context, event),
                        None => context,
                    }
                }
            };
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(connection = %self.machine.config().name(), "connection actor stopped");

        context
    }

    fn clock() -> std::time::Instant {
        Instant::now().into_std()
    }

    fn next_timer(&self) -> Option<(Timer, Instant)> {
        Timer::ALL
            .into_iter()
            .filter_map(|timer| {
                self.timers[timer.index()]
                    .as_ref()
                    .map(|(at, _)| (timer, *at))
            })
            .min_by_key(|(_, at)| *at)
    }

    fn on_socket(&mut self, ctx: Context, socket: SocketId, event: SocketEvent) -> Context {
        let current = self.socket.as_ref().map(|(id, _)| *id);
        if ctx.socket() != Some(socket) || current != Some(socket) {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                connection = %self.machine.config().name(),
                socket = %socket,
                event = ?event,
                "dropping event from stale socket"
            );
            return ctx;
        }

        let event = match event {
            SocketEvent::Open => Event::Open,
            SocketEvent::Message(payload) => Event::Message(payload),
            SocketEvent::Error(error) => Event::Error(ErrorCause::Socket(error)),
            SocketEvent::Close {
                code,
                reason,
                clean,
            } => Event::Close {
                code,
                reason,
                clean,
            },
            SocketEvent::Pong => match ctx.health().latency_since_probe(Self::clock()) {
                Some(latency) => Event::Pong { latency },
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        connection = %self.machine.config().name(),
                        "dropping unsolicited pong"
                    );
                    return ctx;
                }
            },
        };
        self.dispatch(ctx, event)
    }

    fn dispatch(&mut self, mut ctx: Context, event: Event) -> Context {
        self.follow_ups.push_back(event);
        while let Some(event) = self.follow_ups.pop_front() {
            ctx = self.apply(ctx, event);
        }
        ctx
    }

    fn apply(&mut self, ctx: Context, event: Event) -> Context {
        let before = Before {
            event: event.name(),
            status: ctx.status(),
            metrics: *ctx.metrics(),
            errors: ctx.errors().total(),
        };

        let step = self.machine.step(ctx, event, Self::clock());
        if !step.handled {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                connection = %self.machine.config().name(),
                event = before.event,
                status = %before.status,
                "event ignored"
            );
            return step.context;
        }

        self.observe(&before, &step.context);
        for effect in step.effects {
            self.execute(effect);
        }
        self.status.send_if_modified(|status| {
            let changed = *status != step.context.status();
            *status = step.context.status();
            changed
        });
        step.context
    }

    fn handle_for(&mut self, socket: SocketId) -> Option<&mut A::Handle> {
        match &mut self.socket {
            Some((id, handle)) if *id == socket => Some(handle),
            _ => None,
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Connect {
                socket,
                url,
                protocols,
            } => {
                let events = SocketEvents::new(socket, self.sink.clone());
                match self.adapter.connect(&url, &protocols, events) {
                    Ok(handle) => self.socket = Some((socket, handle)),
                    Err(error) => self
                        .follow_ups
                        .push_back(Event::Error(ErrorCause::ConnectFailed(error))),
                }
            }
            Effect::Transmit {
                socket,
                id,
                payload,
            } => {
                let outcome = match self.handle_for(socket) {
                    Some(handle) => handle.send(&payload),
                    None => Err(SocketError::new(SocketErrorKind::Closed, "socket released")),
                };
                self.follow_ups.push_back(match outcome {
                    Ok(()) => Event::SendSucceeded { id },
                    Err(error) => Event::SendFailed { id, error },
                });
            }
            Effect::Probe { socket, payload } => {
                if let Some(handle) = self.handle_for(socket) {
                    if let Err(error) = handle.ping(&payload) {
                        self.follow_ups
                            .push_back(Event::Error(ErrorCause::Transport(error)));
                    }
                }
            }
            Effect::Close {
                socket,
                code,
                reason,
            } => {
                if let Some(handle) = self.handle_for(socket) {
                    handle.close(code, &reason);
                }
            }
            Effect::Release { socket, close } => {
                if self.handle_for(socket).is_some() {
                    if let Some((_, mut handle)) = self.socket.take() {
                        if let Some(frame) = close {
                            handle.close(frame.code, &frame.reason);
                        }
                    }
                }
            }
            Effect::Schedule {
                timer,
                after,
                event,
            } => self.timers[timer.index()] = Some((deadline_after(after), event)),
            Effect::Cancel(timer) => self.timers[timer.index()] = None,
            Effect::CancelAll => self.timers = Default::default(),
            Effect::Raise(event) => self.follow_ups.push_back(event),
            Effect::Notify(event) => self.notify(event),
        }
    }

    fn notify(&self, event: ConnectionEvent) {
        #[cfg(feature = "tracing")]
        match &event {
            ConnectionEvent::MaxRetries { attempts, .. } => tracing::error!(
                connection = %self.machine.config().name(),
                attempts,
                "reconnection attempts exhausted"
            ),
            ConnectionEvent::FatalError { error, .. } => tracing::error!(
                connection = %self.machine.config().name(),
                %error,
                "unrecoverable connection failure"
            ),
            _ => {}
        }

        self.machine.config().event_listeners.emit(&event);
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    #[cfg_attr(
        not(any(feature = "tracing", feature = "metrics")),
        allow(unused_variables)
    )]
    fn observe(&self, before: &Before, ctx: &Context) {
        let name = self.machine.config().name();
        let to = ctx.status();
        let fresh_errors = ctx.errors().total().saturating_sub(before.errors) as usize;

        #[cfg(feature = "tracing")]
        {
            if before.status != to {
                tracing::info!(
                    connection = %name,
                    from = %before.status,
                    to = %to,
                    event = before.event,
                    "connection state transition"
                );
            }
            for record in ctx.errors().iter().rev().take(fresh_errors) {
                tracing::warn!(
                    connection = %name,
                    kind = %record.kind,
                    note = %record.note,
                    error = %record.message,
                    "connection error recorded"
                );
            }
        }

        #[cfg(feature = "metrics")]
        {
            let after = ctx.metrics();
            let delta = |now: u64, then: u64| now.saturating_sub(then);

            if before.status != to {
                counter!(
                    "tether_transitions_total",
                    "connection" => name.to_string(),
                    "from" => before.status.as_str(),
                    "to" => to.as_str()
                )
                .increment(1);
                gauge!("tether_state", "connection" => name.to_string()).set(f64::from(to as u8));
                if to == ConnectionStatus::Reconnecting {
                    counter!("tether_reconnect_attempts_total", "connection" => name.to_string())
                        .increment(1);
                }
            }

            for (direction, messages, bytes) in [
                (
                    "outbound",
                    delta(after.sent, before.metrics.sent),
                    delta(after.bytes_sent, before.metrics.bytes_sent),
                ),
                (
                    "inbound",
                    delta(after.received, before.metrics.received),
                    delta(after.bytes_received, before.metrics.bytes_received),
                ),
            ] {
                if messages > 0 {
                    counter!(
                        "tether_messages_total",
                        "connection" => name.to_string(),
                        "direction" => direction
                    )
                    .increment(messages);
                    counter!(
                        "tether_bytes_total",
                        "connection" => name.to_string(),
                        "direction" => direction
                    )
                    .increment(bytes);
                }
            }

            if delta(after.pongs_received, before.metrics.pongs_received) > 0 {
                if let Some(latency) = ctx.health().last_latency() {
                    histogram!("tether_ping_latency_seconds", "connection" => name.to_string())
                        .record(latency.as_secs_f64());
                }
            }

            let deferred = delta(after.deferred, before.metrics.deferred);
            if deferred > 0 {
                counter!("tether_send_deferred_total", "connection" => name.to_string())
                    .increment(deferred);
            }

            let evicted = delta(after.evicted, before.metrics.evicted);
            if evicted > 0 {
                counter!("tether_queue_evictions_total", "connection" => name.to_string())
                    .increment(evicted);
            }

            for record in ctx.errors().iter().rev().take(fresh_errors) {
                counter!(
                    "tether_errors_total",
                    "connection" => name.to_string(),
                    "kind" => record.kind.as_str()
                )
                .increment(1);
            }

            gauge!("tether_queue_depth", "connection" => name.to_string())
                .set(ctx.queue().len() as f64);
        }
    }
}
