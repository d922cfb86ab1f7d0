//! # Connection Manager
//!
//! Owns the lifecycle of the single push channel: handshake with timeout,
//! heartbeat, exponential reconnect, topic subscriptions, and the status
//! stream.
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!                     |             |
//!                     v   (failure) v
//!                Reconnecting <-----+
//!                     |
//!                     v (budget exhausted)
//!                   Error
//! ```
//!
//! The manager never spawns tasks. The owner drives it with [`run_once`]
//! (or [`run`]), which waits for the next inbound frame or timer and
//! handles it. Tests using a [`ManualClock`] call [`fire_due_timers`]
//! after advancing the clock instead.
//!
//! [`run_once`]: ConnectionManager::run_once
//! [`run`]: ConnectionManager::run
//! [`fire_due_timers`]: ConnectionManager::fire_due_timers
//! [`ManualClock`]: crate::client::sync::ManualClock

pub mod retry;
pub mod scripted;
pub mod state;
pub mod transport;

pub use retry::{BackoffPolicy, RetryDecision};
pub use scripted::ScriptedTransport;
pub use state::{ConnectionState, StatusChange};
pub use transport::{Frame, Transport, TransportError, WsTransport};

use crate::client::subscription::{Subscribers, SubscriptionToken};
use crate::client::sync::scheduler::{Clock, Scheduler, SystemClock};
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use crate::shared::event::{PushEventType, PushMessage};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionTimer {
    Reconnect,
    Heartbeat,
}

/// What a call to [`ConnectionManager::run_once`] handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// An inbound frame was processed
    Frame,
    /// This many timers fired
    Timers(usize),
    /// An undecodable frame was skipped; the channel is still up
    Rejected,
    /// The channel failed while waiting
    ChannelLost,
    /// Nothing to wait for: not connected and no timer pending
    Idle,
}

enum Wake {
    Inbound(Result<Frame, TransportError>),
    Timer,
}

/// Delivered to topic handlers: the topic plus the pushed message
type Delivery = (String, PushMessage);

pub struct ConnectionManager<T: Transport> {
    transport: T,
    url: String,
    policy: BackoffPolicy,
    handshake_timeout: Duration,
    heartbeat_interval: Duration,
    state: ConnectionState,
    attempts: u32,
    awaiting_pong: bool,
    scheduler: Scheduler<ConnectionTimer>,
    /// Topic of every live subscription token
    topics: BTreeMap<SubscriptionToken, String>,
    handlers: Subscribers<Delivery>,
    status: Subscribers<StatusChange>,
}

impl<T: Transport> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("topics", &self.active_topics())
            .finish()
    }
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: &SyncConfig) -> Self {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    pub fn with_clock(transport: T, config: &SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            url: config.push_channel_url.clone(),
            policy: BackoffPolicy::new(config.reconnect_base_delay(), config.max_reconnect_attempts),
            handshake_timeout: config.handshake_timeout(),
            heartbeat_interval: config.heartbeat_interval(),
            state: ConnectionState::Disconnected,
            attempts: 0,
            awaiting_pong: false,
            scheduler: Scheduler::new(clock),
            topics: BTreeMap::new(),
            handlers: Subscribers::new(),
            status: Subscribers::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Reconnect attempts spent since the last successful handshake
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn active_topics(&self) -> BTreeSet<String> {
        self.topics.values().cloned().collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.scheduler
            .is_scheduled(|timer| *timer == ConnectionTimer::Reconnect)
    }

    /// Register a status listener; it sees every transition in order
    pub fn on_status(&mut self, handler: impl FnMut(&StatusChange) + 'static) -> SubscriptionToken {
        self.status.subscribe(handler)
    }

    pub fn remove_status_listener(&mut self, token: SubscriptionToken) -> bool {
        self.status.unsubscribe(token)
    }

    /// Open the channel.
    ///
    /// A no-op when already connected. From `Disconnected` or `Error` the
    /// retry budget starts over. A failed handshake is returned to the
    /// caller and also hands the channel to the reconnect logic.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        match self.state {
            ConnectionState::Connected => {
                tracing::debug!("[Connection] connect() while connected, nothing to do");
                return Ok(());
            }
            ConnectionState::Disconnected | ConnectionState::Error => {
                self.attempts = 0;
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
        }
        self.scheduler
            .cancel_where(|timer| *timer == ConnectionTimer::Reconnect);
        self.open_channel().await
    }

    /// Tear down the channel, cancel every timer and drop all subscriptions.
    pub async fn disconnect(&mut self) {
        self.scheduler.cancel_all();
        self.awaiting_pong = false;
        self.attempts = 0;
        if !self.topics.is_empty() {
            tracing::info!("[Connection] Dropping {} subscription(s)", self.topics.len());
        }
        self.topics.clear();
        self.handlers.clear();
        self.transport.close().await;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Subscribe `handler` to messages of `event_type` on `topic`.
    ///
    /// Subscriptions survive reconnects; the topic is re-announced to the
    /// server after every successful handshake.
    pub async fn subscribe(
        &mut self,
        topic: &str,
        event_type: PushEventType,
        mut handler: impl FnMut(&PushMessage) + 'static,
    ) -> Result<SubscriptionToken, SyncError> {
        if !self.state.is_connected() {
            return Err(SyncError::not_connected(format!("subscribe to '{}'", topic)));
        }
        let announced = self.topics.values().any(|t| t == topic);
        if !announced {
            self.send_frame(Frame::Subscribe {
                topic: topic.to_string(),
            })
            .await?;
        }

        let wanted = topic.to_string();
        let token = self.handlers.subscribe(move |(topic, message): &Delivery| {
            if *topic == wanted && message.event_type == event_type {
                handler(message);
            }
        });
        self.topics.insert(token, topic.to_string());
        tracing::info!("[Connection] Subscribed to {} on '{}'", event_type, topic);
        Ok(token)
    }

    /// Remove a subscription; the server is told once a topic has no handlers left.
    pub async fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let Some(topic) = self.topics.remove(&token) else {
            return false;
        };
        self.handlers.unsubscribe(token);
        let still_used = self.topics.values().any(|t| *t == topic);
        if !still_used && self.state.is_connected() {
            if let Err(e) = self.send_frame(Frame::Unsubscribe { topic }).await {
                tracing::warn!("[Connection] Unsubscribe not delivered: {}", e);
            }
        }
        true
    }

    /// Wait for the next inbound frame or timer and handle it
    pub async fn run_once(&mut self) -> Activity {
        let deadline = self.scheduler.next_deadline();
        if !self.state.is_connected() && deadline.is_none() {
            return Activity::Idle;
        }

        let wake = if self.state.is_connected() {
            tokio::select! {
                frame = self.transport.recv() => Wake::Inbound(frame),
                _ = sleep_until(deadline) => Wake::Timer,
            }
        } else {
            sleep_until(deadline).await;
            Wake::Timer
        };

        match wake {
            Wake::Inbound(Ok(frame)) => {
                self.handle_frame(frame).await;
                Activity::Frame
            }
            Wake::Inbound(Err(e)) if !e.is_fatal() => {
                tracing::warn!("[Connection] Skipping malformed frame: {}", e);
                Activity::Rejected
            }
            Wake::Inbound(Err(e)) => {
                self.fail(&e.to_string()).await;
                Activity::ChannelLost
            }
            Wake::Timer => Activity::Timers(self.fire_due_timers().await),
        }
    }

    /// Drive the channel until there is nothing left to wait for
    pub async fn run(&mut self) {
        while self.run_once().await != Activity::Idle {}
    }

    /// Fire every timer due on the manager's clock; returns how many fired
    pub async fn fire_due_timers(&mut self) -> usize {
        let due = self.scheduler.fire_due();
        let count = due.len();
        for timer in due {
            match timer {
                ConnectionTimer::Reconnect => {
                    tracing::info!("[Connection] Reconnect attempt {}", self.attempts);
                    if let Err(e) = self.open_channel().await {
                        tracing::debug!("[Connection] Reconnect attempt failed: {}", e);
                    }
                }
                ConnectionTimer::Heartbeat => self.heartbeat().await,
            }
        }
        count
    }

    async fn open_channel(&mut self) -> Result<(), SyncError> {
        self.set_state(ConnectionState::Connecting);
        let opened = tokio::time::timeout(self.handshake_timeout, self.transport.open(&self.url)).await;
        let result = match opened {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::timeout("push channel handshake", self.handshake_timeout)),
        };

        match result {
            Ok(()) => {
                self.attempts = 0;
                self.awaiting_pong = false;
                self.set_state(ConnectionState::Connected);
                self.resubscribe().await?;
                self.scheduler
                    .schedule(self.heartbeat_interval, ConnectionTimer::Heartbeat);
                Ok(())
            }
            Err(e) => {
                self.fail(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn resubscribe(&mut self) -> Result<(), SyncError> {
        for topic in self.active_topics() {
            tracing::debug!("[Connection] Re-subscribing to '{}'", topic);
            self.send_frame(Frame::Subscribe { topic }).await?;
        }
        Ok(())
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), SyncError> {
        match self.transport.send(frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = SyncError::from(e);
                self.fail(&error.to_string()).await;
                Err(error)
            }
        }
    }

    async fn heartbeat(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        if self.awaiting_pong {
            self.fail("heartbeat not acknowledged").await;
            return;
        }
        if self.send_frame(Frame::Ping).await.is_ok() {
            self.awaiting_pong = true;
            self.scheduler
                .schedule(self.heartbeat_interval, ConnectionTimer::Heartbeat);
        }
    }

    async fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Pong => self.awaiting_pong = false,
            Frame::Ping => {
                let _ = self.send_frame(Frame::Pong).await;
            }
            Frame::Message { topic, message } => {
                tracing::debug!("[Connection] {} on '{}' ({})", message.event_type, topic, message.id);
                self.handlers.emit(&(topic, message));
            }
            Frame::Subscribe { topic } | Frame::Unsubscribe { topic } => {
                tracing::debug!("[Connection] Ignoring control frame for '{}'", topic);
            }
        }
    }

    /// Transport failure: retry with backoff or give up
    async fn fail(&mut self, reason: &str) {
        self.scheduler.cancel_all();
        self.awaiting_pong = false;
        self.transport.close().await;

        match self.policy.decide(self.attempts) {
            RetryDecision::RetryAfter { attempt, delay } => {
                self.attempts = attempt;
                tracing::warn!(
                    "[Connection] Channel failed ({}), retry {}/{} in {:?}",
                    reason,
                    attempt,
                    self.policy.max_attempts,
                    delay
                );
                self.set_state(ConnectionState::Reconnecting);
                self.scheduler.schedule(delay, ConnectionTimer::Reconnect);
            }
            RetryDecision::GiveUp => {
                tracing::error!(
                    "[Connection] Giving up after {} attempts: {}",
                    self.attempts,
                    reason
                );
                self.set_state(ConnectionState::Error);
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        let change = StatusChange {
            from: self.state,
            to: next,
            attempt: self.attempts,
        };
        tracing::info!("[Connection] {} -> {}", change.from, change.to);
        self.state = next;
        self.status.emit(&change);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
