//! Message-bus client manager: one broker session, kept alive by an
//! interval-gated reconnect check and serviced on every tick.

mod client_id;
mod session;

use alloc::{boxed::Box, vec::Vec};

use log::{debug, info, warn};

pub use client_id::{expand_client_id, ClientId};
pub use session::{BrokerSession, ConnectRequest, SessionError, Transport, WireSession};

use crate::firmware::{
    config::BrokerSettings,
    logging::Severity,
    runtime::{Clock, Component, RandomSource, StatusSlot},
    types::{BrokerState, InboundMessage, QoS},
};

pub const STATUS_CONNECTED: i32 = 0;
pub const STATUS_NOT_CONFIGURED: i32 = 1;

/// Publishing capability handed to collaborators.
pub trait Publish {
    fn is_connected(&mut self) -> bool;

    /// Fire-and-forget: a failure is logged and the message dropped.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool;

    fn subscribe(&mut self, topic: &str) -> bool;
}

pub type ConnectedCallback = Box<dyn FnMut(&mut dyn Publish)>;
pub type MessageCallback = Box<dyn FnMut(&mut dyn Publish, &InboundMessage)>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub connect_attempts: u32,
    pub connect_failures: u32,
    pub published: u32,
    pub publish_failures: u32,
    pub received: u32,
    /// Status code of the last connect attempt, `0` on success.
    pub last_status: i8,
}

/// The session as seen from inside a callback.
pub struct SessionHandle<'a, S: BrokerSession> {
    session: &'a mut S,
    stats: &'a mut BrokerStats,
}

impl<S: BrokerSession> Publish for SessionHandle<'_, S> {
    fn is_connected(&mut self) -> bool {
        self.session.is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        publish_on(self.session, self.stats, topic, payload, retain)
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        subscribe_on(self.session, topic)
    }
}

fn publish_on<S: BrokerSession>(
    session: &mut S,
    stats: &mut BrokerStats,
    topic: &str,
    payload: &[u8],
    retain: bool,
) -> bool {
    if !session.is_connected() {
        stats.publish_failures = stats.publish_failures.saturating_add(1);
        warn!("broker: not connected, dropped publish to {}", topic);
        return false;
    }
    match session.publish(topic, payload, retain) {
        Ok(()) => {
            stats.published = stats.published.saturating_add(1);
            true
        }
        Err(err) => {
            stats.publish_failures = stats.publish_failures.saturating_add(1);
            warn!(
                "broker: publish to {} failed: {} ({})",
                topic,
                err.as_str(),
                err.status_code()
            );
            false
        }
    }
}

fn subscribe_on<S: BrokerSession>(session: &mut S, topic: &str) -> bool {
    match session.subscribe(topic, QoS::AtMostOnce) {
        Ok(()) => {
            debug!("broker: subscribed to {}", topic);
            true
        }
        Err(err) => {
            warn!("broker: subscribe to {} failed: {}", topic, err.as_str());
            false
        }
    }
}

pub struct BrokerManager<S: BrokerSession, G: RandomSource, C: Clock> {
    settings: BrokerSettings,
    session: S,
    random: G,
    clock: C,
    client_id: ClientId,
    state: BrokerState,
    last_check_ms: u64,
    on_connected: Vec<ConnectedCallback>,
    on_message: Vec<MessageCallback>,
    stats: BrokerStats,
}

impl<S: BrokerSession, G: RandomSource, C: Clock> BrokerManager<S, G, C> {
    pub fn new(settings: BrokerSettings, session: S, random: G, clock: C) -> Self {
        Self {
            settings: settings.sanitized(),
            session,
            random,
            clock,
            client_id: ClientId::new(),
            state: BrokerState::Disconnected,
            last_check_ms: 0,
            on_connected: Vec::new(),
            on_message: Vec::new(),
            stats: BrokerStats::default(),
        }
    }

    /// Runs after every successful connect, before anything else is sent.
    pub fn on_connected(&mut self, callback: impl FnMut(&mut dyn Publish) + 'static) {
        self.on_connected.push(Box::new(callback));
    }

    pub fn on_message(
        &mut self,
        callback: impl FnMut(&mut dyn Publish, &InboundMessage) + 'static,
    ) {
        self.on_message.push(Box::new(callback));
    }

    /// State as of the last check.
    pub fn state(&self) -> BrokerState {
        self.state
    }

    /// Client id used by the most recent connect attempt.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn stats(&self) -> BrokerStats {
        self.stats
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn disconnect(&mut self) {
        if self.session.is_connected() {
            info!("broker: disconnecting");
        }
        self.session.disconnect();
        self.state = BrokerState::Disconnected;
    }

    fn reconnect(&mut self, status: &mut StatusSlot) -> bool {
        if self.session.is_connected() {
            self.state = BrokerState::Connected;
            return true;
        }
        if !self.settings.is_configured() {
            status.set(STATUS_NOT_CONFIGURED, Severity::Warning, "no broker configured");
            return false;
        }

        self.client_id = expand_client_id(&self.settings.identity.client_id_template, &mut self.random);
        self.stats.connect_attempts = self.stats.connect_attempts.saturating_add(1);

        let identity = &self.settings.identity;
        let request = ConnectRequest {
            client_id: &self.client_id,
            username: (!identity.username.is_empty()).then_some(identity.username.as_str()),
            password: (!identity.password.is_empty()).then_some(identity.password.as_str()),
            will: identity.will.as_ref(),
            keep_alive_secs: self.settings.keep_alive_secs,
        };
        debug!(
            "broker: connecting to {}:{}",
            self.settings.endpoint.host, self.settings.endpoint.port
        );

        match self.session.connect(&self.settings.endpoint, &request) {
            Ok(()) => {
                self.state = BrokerState::Connected;
                self.stats.last_status = 0;
                info!("broker: connected as {}", self.client_id);
                for callback in self.on_connected.iter_mut() {
                    let mut handle = SessionHandle {
                        session: &mut self.session,
                        stats: &mut self.stats,
                    };
                    callback(&mut handle);
                }
                status.set(STATUS_CONNECTED, Severity::Information, "connected");
                true
            }
            Err(err) => {
                self.state = BrokerState::Disconnected;
                self.stats.connect_failures = self.stats.connect_failures.saturating_add(1);
                self.stats.last_status = err.status_code();
                warn!(
                    "broker: connect to {} failed: {}, status {}",
                    self.settings.endpoint.host,
                    err.as_str(),
                    err.status_code()
                );
                status.set(i32::from(err.status_code()), Severity::Warning, err.as_str());
                false
            }
        }
    }

    /// Delivers what the transport has received, bounded per call.
    fn service(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        for _ in 0..self.settings.max_inbound_per_tick {
            let message = match self.session.poll() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(err) => {
                    warn!("broker: session error: {} ({})", err.as_str(), err.status_code());
                    break;
                }
            };
            self.stats.received = self.stats.received.saturating_add(1);
            debug!("broker: message on {}", message.topic);
            for callback in self.on_message.iter_mut() {
                let mut handle = SessionHandle {
                    session: &mut self.session,
                    stats: &mut self.stats,
                };
                callback(&mut handle, &message);
            }
        }
    }
}

impl<S: BrokerSession, G: RandomSource, C: Clock> Publish for BrokerManager<S, G, C> {
    fn is_connected(&mut self) -> bool {
        self.session.is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        publish_on(&mut self.session, &mut self.stats, topic, payload, retain)
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        subscribe_on(&mut self.session, topic)
    }
}

impl<S: BrokerSession, G: RandomSource, C: Clock> Component for BrokerManager<S, G, C> {
    fn name(&self) -> &'static str {
        "broker"
    }

    fn init(&mut self, status: &mut StatusSlot) {
        if !self.settings.is_configured() {
            warn!("broker: no server configured");
        }
        let _ = self.reconnect(status);
        self.last_check_ms = self.clock.now_ms();
    }

    fn tick(&mut self, status: &mut StatusSlot) {
        let now_ms = self.clock.now_ms();
        let interval_ms = u64::from(self.settings.reconnect_interval_ms);
        if now_ms.saturating_sub(self.last_check_ms) >= interval_ms {
            self.last_check_ms = now_ms;
            if !self.session.is_connected() {
                if self.state == BrokerState::Connected {
                    warn!("broker: connection lost");
                    self.state = BrokerState::Disconnected;
                }
                let _ = self.reconnect(status);
            }
        }
        self.service();
    }
}

#[cfg(test)]
mod tests;
