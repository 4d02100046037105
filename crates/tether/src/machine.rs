//! The connection state machine.
//!
//! [`Machine::step`] is a pure reducer: it takes the current [`Context`], one
//! [`Event`] and the current time, and returns the replacement context together with
//! the [`Effect`]s the actor must carry out. It performs no I/O, reads no clock, and
//! never fails. Every failure it sees becomes a context field, a follow-up event, or
//! a notification.
//!
//! Transitions, by status:
//!
//! | From | Event | To |
//! |---|---|---|
//! | disconnected | CONNECT (valid url) | connecting |
//! | connecting | OPEN | connected |
//! | connecting, connected | ERROR, abnormal CLOSE | reconnecting if retryable, else disconnected |
//! | connecting | CLOSE | disconnected |
//! | connecting, connected | DISCONNECT | disconnecting |
//! | connected | MESSAGE, SEND, PING, PONG | connected |
//! | reconnecting | RETRY (within limit) | connecting |
//! | reconnecting | MAX_RETRIES | disconnected, context reset |
//! | reconnecting | DISCONNECT | disconnected |
//! | disconnecting | CLOSE, ERROR | disconnected |
//! | any | TERMINATE | terminated |

use crate::config::LinkConfig;
use crate::context::{Context, ErrorRecord, RetryState};
use crate::effect::{Effect, Timer};
use crate::event::{
    classify_close, CloseFrame, ConnectOptions, ErrorCause, Event, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
use crate::events::ConnectionEvent;
use crate::guards;
use crate::status::ConnectionStatus;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tether_core::LinkError;
use tether_queue::{Enqueued, MessageId, Priority};
use tether_ratelimiter::Admission;

/// Result of one reducer step.
#[derive(Debug, Clone)]
pub struct Step {
    /// Replacement context.
    pub context: Context,
    /// Work for the actor, in order.
    pub effects: Vec<Effect>,
    /// `false` if the event is not accepted in the current status. The context is
    /// then returned unchanged and there are no effects.
    pub handled: bool,
}

impl Step {
    /// Status after the step.
    pub fn status(&self) -> ConnectionStatus {
        self.context.status()
    }

    /// Effects that touch the socket.
    pub fn socket_calls(&self) -> impl Iterator<Item = &Effect> + '_ {
        self.effects.iter().filter(|e| e.is_socket_call())
    }

    /// Notifications produced by the step.
    pub fn notifications(&self) -> impl Iterator<Item = &ConnectionEvent> + '_ {
        self.effects.iter().filter_map(|e| match e {
            Effect::Notify(event) => Some(event),
            _ => None,
        })
    }

    /// Follow-up events produced by the step.
    pub fn raised(&self) -> impl Iterator<Item = &Event> + '_ {
        self.effects.iter().filter_map(|e| match e {
            Effect::Raise(event) => Some(event),
            _ => None,
        })
    }
}

/// The transition function for one connection.
#[derive(Debug, Clone)]
pub struct Machine {
    config: LinkConfig,
}

impl Machine {
    /// Creates a machine for a validated configuration.
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// A fresh context for this configuration.
    pub fn initial_context(&self) -> Context {
        Context::new(&self.config)
    }

    /// Applies one event.
    pub fn step(&self, ctx: Context, event: Event, now: Instant) -> Step {
        let from = ctx.status();
        if from.is_terminal() {
            return Step {
                context: ctx,
                effects: Vec::new(),
                handled: false,
            };
        }

        let mut transition = Transition {
            config: &self.config,
            ctx,
            now,
            effects: Vec::new(),
        };

        // TERMINATE wins over every other transition
        if matches!(event, Event::Terminate) {
            transition.terminate();
            return transition.finish(from, true);
        }

        // Unhandled events never reach an action, so the context is untouched
        let handled = transition.dispatch(from, event);
        transition.finish(from, handled)
    }
}

struct Transition<'a> {
    config: &'a LinkConfig,
    ctx: Context,
    now: Instant,
    effects: Vec<Effect>,
}

impl Transition<'_> {
    fn dispatch(&mut self, from: ConnectionStatus, event: Event) -> bool {
        use ConnectionStatus::*;

        match (from, event) {
            (
                Disconnected,
                Event::Connect {
                    url,
                    protocols,
                    options,
                },
            ) => self.connect(url, protocols, options),
            (Connecting, Event::Open) => self.open(),
            (Connecting | Connected, Event::Error(cause)) => {
                self.fail(cause.to_link_error(), cause.note())
            }
            (
                Connecting,
                Event::Close {
                    code,
                    reason,
                    clean,
                },
            ) => self.closed_while_connecting(code, &reason, clean),
            (
                Connected,
                Event::Close {
                    code,
                    reason,
                    clean,
                },
            ) => self.peer_closed(code, &reason, clean),
            (Connecting | Connected, Event::Disconnect { code, reason }) => {
                self.begin_close(code, reason)
            }
            (Connected, Event::Message(payload)) => self.inbound(payload),
            (Connected, Event::Send { payload, priority }) => {
                if self.enqueue(payload, priority) {
                    self.drain();
                }
            }
            (Connecting | Reconnecting, Event::Send { payload, priority }) => {
                self.enqueue(payload, priority);
            }
            (Disconnected | Disconnecting, Event::Send { .. }) => {
                self.reject(format!("cannot send while {from}"));
            }
            (Connected, Event::Ping) => self.probe(),
            (Connected, Event::Pong { latency }) if self.ctx.health.is_awaiting_response() => {
                self.ctx.health.record_response(self.now, latency);
                self.ctx.metrics.pongs_received += 1;
                self.effects.push(Effect::Cancel(Timer::PongTimeout));
            }
            (Connected, Event::Flush) => self.drain(),
            (_, Event::SendSucceeded { id }) => self.sent(id),
            (_, Event::SendFailed { id, error }) => {
                self.send_failed(id, LinkError::Connection(error.to_string()))
            }
            (Reconnecting, Event::Retry { .. }) if guards::within_limit(&self.ctx) => {
                self.establish()
            }
            (Reconnecting, Event::MaxRetries) => self.give_up(),
            (Reconnecting, Event::Disconnect { .. }) => self.set_status(Disconnected),
            (Disconnecting, Event::Close { .. }) => {
                self.release(None);
                self.set_status(Disconnected);
            }
            (Disconnecting, Event::Error(cause)) => {
                self.record(&cause.to_link_error(), cause.note());
                self.release(None);
                self.set_status(Disconnected);
            }
            _ => return false,
        }
        true
    }

    fn finish(mut self, from: ConnectionStatus, handled: bool) -> Step {
        let to = self.ctx.status();
        if to != from {
            if from == ConnectionStatus::Connected {
                self.ctx.queue.abandon_in_flight();
            }
            if !to.is_terminal() {
                let cancels: Vec<Effect> = Timer::owned_by(from).map(Effect::Cancel).collect();
                self.effects.splice(0..0, cancels);
            }
            let changed = ConnectionEvent::StateChanged {
                connection_name: self.config.name.clone(),
                timestamp: self.now,
                from,
                to,
                snapshot: Arc::new(self.ctx.clone()),
            };
            let at = self
                .effects
                .iter()
                .position(|e| matches!(e, Effect::Notify(_)))
                .unwrap_or(self.effects.len());
            self.effects.insert(at, Effect::Notify(changed));
        }
        Step {
            context: self.ctx,
            effects: self.effects,
            handled,
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.ctx.connection.status = status;
        self.ctx.connection.ready_state = status.ready_state();
    }

    fn notify(&mut self, event: ConnectionEvent) {
        self.effects.push(Effect::Notify(event));
    }

    fn record(&mut self, error: &LinkError, note: impl Into<String>) {
        self.ctx
            .errors
            .push(ErrorRecord::new(self.now, error, note));
    }

    fn reject(&mut self, reason: String) {
        self.record(&LinkError::Validation(reason.clone()), "command rejected");
        self.notify(ConnectionEvent::Rejected {
            connection_name: self.config.name.clone(),
            timestamp: self.now,
            reason,
        });
    }

    fn release(&mut self, close: Option<CloseFrame>) {
        if let Some(socket) = self.ctx.connection.socket.take() {
            self.effects.push(Effect::Release { socket, close });
        }
    }

    fn connect(&mut self, url: String, protocols: Vec<String>, options: ConnectOptions) {
        if !guards::valid_url(&url, &self.config.accepted_schemes) {
            self.reject(format!("invalid url: {url:?}"));
            return;
        }

        let mut retry = RetryState::from_config(self.config);
        if let Some(max_attempts) = options.max_attempts {
            retry.max_attempts = max_attempts;
        }
        if let Some(base_interval) = options.base_interval {
            retry.base_interval = base_interval;
        }
        if let Some(rate) = options.backoff_rate {
            retry.backoff_rate = if rate.is_nan() { 1.0 } else { rate.max(1.0) };
        }
        self.ctx.retry = retry;
        self.ctx.connection.url = Some(url);
        self.ctx.connection.protocols = protocols;
        self.establish();
    }

    fn establish(&mut self) {
        let socket = self.ctx.allocate_socket();
        self.ctx.connection.socket = Some(socket);
        self.set_status(ConnectionStatus::Connecting);
        self.effects.push(Effect::Connect {
            socket,
            url: self.ctx.connection.url.clone().unwrap_or_default(),
            protocols: self.ctx.connection.protocols.clone(),
        });
    }

    fn open(&mut self) {
        self.ctx.retry.attempts = 0;
        self.ctx.retry.last_attempt = None;
        self.ctx.health.reset();
        self.set_status(ConnectionStatus::Connected);

        let health = &self.config.health;
        if health.is_enabled() {
            self.effects.push(Effect::Schedule {
                timer: Timer::Ping,
                after: health.ping_interval(),
                event: Event::Ping,
            });
        }
        self.drain();
    }

    fn fail(&mut self, error: LinkError, note: &str) {
        self.record(&error, note);
        self.release(None);

        if guards::can_retry(&self.ctx, self.config, &error) {
            self.ctx.retry.attempts += 1;
            self.ctx.retry.last_attempt = Some(self.now);
            self.set_status(ConnectionStatus::Reconnecting);
            self.schedule_retry();
        } else {
            self.set_status(ConnectionStatus::Disconnected);
            self.notify(ConnectionEvent::FatalError {
                connection_name: self.config.name.clone(),
                timestamp: self.now,
                error,
            });
        }
    }

    fn schedule_retry(&mut self) {
        let attempt = self.ctx.retry.attempts;
        if attempt >= self.ctx.retry.max_attempts {
            self.effects.push(Effect::Raise(Event::MaxRetries));
            return;
        }
        let delay = self
            .ctx
            .policy(self.config)
            .jittered_delay(attempt.saturating_sub(1));
        self.effects.push(Effect::Schedule {
            timer: Timer::Retry,
            after: delay,
            event: Event::Retry { attempt, delay },
        });
    }

    fn give_up(&mut self) {
        let attempts = self.ctx.retry.attempts;
        let last_error = self.ctx.errors.last().cloned();
        self.ctx = self.ctx.reset(self.config);
        self.set_status(ConnectionStatus::Disconnected);
        self.notify(ConnectionEvent::MaxRetries {
            connection_name: self.config.name.clone(),
            timestamp: self.now,
            attempts,
            last_error,
        });
    }

    fn closed_while_connecting(&mut self, code: u16, reason: &str, clean: bool) {
        self.release(None);
        self.set_status(ConnectionStatus::Disconnected);
        if let Some(error) = classify_close(code, reason, clean) {
            self.record(&error, "closed while connecting");
            self.notify(ConnectionEvent::FatalError {
                connection_name: self.config.name.clone(),
                timestamp: self.now,
                error,
            });
        }
    }

    fn peer_closed(&mut self, code: u16, reason: &str, clean: bool) {
        match classify_close(code, reason, clean) {
            Some(error) => self.fail(error, "socket closed"),
            None => {
                self.release(None);
                self.set_status(ConnectionStatus::Disconnected);
            }
        }
    }

    fn begin_close(&mut self, code: u16, reason: String) {
        let Some(socket) = self.ctx.connection.socket else {
            return;
        };
        self.effects.push(Effect::Close {
            socket,
            code,
            reason,
        });
        self.set_status(ConnectionStatus::Disconnecting);
        self.effects.push(Effect::Schedule {
            timer: Timer::CloseTimeout,
            after: self.config.close_timeout,
            event: Event::Close {
                code: CLOSE_ABNORMAL,
                reason: "close handshake timed out".to_string(),
                clean: false,
            },
        });
    }

    fn inbound(&mut self, payload: Bytes) {
        self.ctx.metrics.received += 1;
        self.ctx.metrics.bytes_received += payload.len() as u64;
        self.notify(ConnectionEvent::Message {
            connection_name: self.config.name.clone(),
            timestamp: self.now,
            payload,
        });
    }

    fn queue_full(&mut self) {
        let capacity = self.ctx.queue.capacity();
        self.record(&LinkError::QueueFull { capacity }, "enqueue");
        self.notify(ConnectionEvent::QueueFull {
            connection_name: self.config.name.clone(),
            timestamp: self.now,
            capacity,
        });
    }

    fn enqueue(&mut self, payload: Bytes, priority: Priority) -> bool {
        if !guards::has_queue_space(&self.ctx, priority) {
            self.queue_full();
            return false;
        }
        match self.ctx.queue.enqueue(payload, priority, self.now) {
            Ok(Enqueued { evicted, .. }) => {
                if let Some(evicted) = evicted {
                    self.ctx.metrics.evicted += 1;
                    self.notify(ConnectionEvent::MessageEvicted {
                        connection_name: self.config.name.clone(),
                        timestamp: self.now,
                        id: evicted.id,
                    });
                }
                true
            }
            Err(_) => {
                self.queue_full();
                false
            }
        }
    }

    /// Starts transmitting the next queued message, one at a time.
    fn drain(&mut self) {
        let Some(socket) = self.ctx.connection.socket else {
            return;
        };
        if self.ctx.status() != ConnectionStatus::Connected
            || self.ctx.queue.is_in_flight()
            || self.ctx.queue.is_empty()
        {
            return;
        }

        if !guards::can_send(&self.ctx, self.now) {
            if let Admission::Deferred { retry_after } = self.ctx.rate_limit.check(self.now) {
                self.ctx.metrics.deferred += 1;
                self.effects.push(Effect::Schedule {
                    timer: Timer::Drain,
                    after: retry_after,
                    event: Event::Flush,
                });
                self.notify(ConnectionEvent::SendDeferred {
                    connection_name: self.config.name.clone(),
                    timestamp: self.now,
                    retry_after,
                });
            }
            return;
        }

        self.ctx.rate_limit.try_acquire(self.now);
        if let Some(message) = self.ctx.queue.begin_send() {
            self.effects.push(Effect::Transmit {
                socket,
                id: message.id,
                payload: message.payload,
            });
        }
    }

    fn sent(&mut self, id: MessageId) {
        if let Some(message) = self.ctx.queue.complete(id) {
            self.ctx.metrics.sent += 1;
            self.ctx.metrics.bytes_sent += message.len() as u64;
        }
        self.drain();
    }

    fn send_failed(&mut self, id: MessageId, error: LinkError) {
        self.ctx.queue.fail(id);
        self.ctx.metrics.send_failures += 1;
        self.record(&error, format!("send {id} failed"));
    }

    fn probe(&mut self) {
        let Some(socket) = self.ctx.connection.socket else {
            return;
        };
        let health = &self.config.health;

        // An outstanding probe keeps its deadline
        if !self.ctx.health.is_awaiting_response() {
            self.ctx.health.record_probe(self.now);
            self.ctx.metrics.probes_sent += 1;
            self.effects.push(Effect::Probe {
                socket,
                payload: health.probe_payload().clone(),
            });
            self.effects.push(Effect::Schedule {
                timer: Timer::PongTimeout,
                after: health.pong_timeout(),
                event: Event::Error(ErrorCause::PongTimeout {
                    waited: health.pong_timeout(),
                }),
            });
        }
        if health.is_enabled() {
            self.effects.push(Effect::Schedule {
                timer: Timer::Ping,
                after: health.ping_interval(),
                event: Event::Ping,
            });
        }
    }

    fn terminate(&mut self) {
        self.effects.push(Effect::CancelAll);
        self.release(Some(CloseFrame::new(CLOSE_NORMAL, "terminated")));
        self.set_status(ConnectionStatus::Terminated);
    }
}
