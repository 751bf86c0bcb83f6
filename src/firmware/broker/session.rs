use embedded_io::{Read, ReadReady, Write};
use mqttwire::{ConnectOptions, Session, Will};

use crate::firmware::{
    runtime::Clock,
    types::{BrokerEndpoint, InboundMessage, LastWill, QoS},
};

/// Why a broker operation failed, with the numeric status code the device
/// reports for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// No CONNACK or PINGRESP in time.
    ConnectionTimeout,
    ConnectionLost,
    /// The transport could not be opened.
    ConnectFailed,
    NotConnected,
    /// The request could not be encoded (topic or payload too large).
    Invalid,
    /// CONNACK return code 1..=5.
    Refused(u8),
}

impl SessionError {
    pub const fn status_code(self) -> i8 {
        match self {
            Self::ConnectionTimeout => -4,
            Self::ConnectionLost => -3,
            Self::ConnectFailed => -2,
            Self::NotConnected => -1,
            Self::Invalid => -5,
            Self::Refused(code) => code as i8,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionTimeout => "connection timeout",
            Self::ConnectionLost => "connection lost",
            Self::ConnectFailed => "connect failed",
            Self::NotConnected => "not connected",
            Self::Invalid => "invalid request",
            Self::Refused(_) => "refused",
        }
    }
}

impl<E> From<mqttwire::SessionError<E>> for SessionError {
    fn from(value: mqttwire::SessionError<E>) -> Self {
        match value {
            mqttwire::SessionError::Refused(code) => Self::Refused(code as u8),
            mqttwire::SessionError::NotConnected => Self::NotConnected,
            mqttwire::SessionError::ConnackTimeout
            | mqttwire::SessionError::KeepAliveTimeout => Self::ConnectionTimeout,
            mqttwire::SessionError::Encode(_) => Self::Invalid,
            mqttwire::SessionError::Io(_)
            | mqttwire::SessionError::Closed
            | mqttwire::SessionError::Parse(_)
            | mqttwire::SessionError::UnexpectedPacket
            | mqttwire::SessionError::Oversized => Self::ConnectionLost,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectRequest<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub will: Option<&'a LastWill>,
    pub keep_alive_secs: u16,
}

/// One publish/subscribe connection as the client manager drives it. Every
/// call completes or fails before returning.
pub trait BrokerSession {
    fn connect(
        &mut self,
        endpoint: &BrokerEndpoint,
        request: &ConnectRequest<'_>,
    ) -> Result<(), SessionError>;

    /// Derived from the transport on every call.
    fn is_connected(&mut self) -> bool;

    /// Services socket I/O and returns at most one received message.
    fn poll(&mut self) -> Result<Option<InboundMessage>, SessionError>;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError>;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), SessionError>;

    fn disconnect(&mut self);
}

/// Byte stream to the broker, opened and closed by [`WireSession`].
pub trait Transport {
    type Stream: Read + Write + ReadReady;

    fn open(&mut self, endpoint: &BrokerEndpoint) -> Result<(), SessionError>;

    fn is_open(&self) -> bool;

    fn stream(&mut self) -> Option<&mut Self::Stream>;

    fn close(&mut self);
}

/// [`BrokerSession`] speaking MQTT 3.1.1 over a [`Transport`].
pub struct WireSession<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    session: Session,
}

impl<T: Transport, C: Clock> WireSession<T, C> {
    pub fn new(transport: T, clock: C, rx_capacity: usize) -> Self {
        Self {
            transport,
            clock,
            session: Session::new(rx_capacity),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn closed<V>(&mut self, err: SessionError) -> Result<V, SessionError> {
        if !self.session.is_connected() {
            self.transport.close();
        }
        Err(err)
    }
}

impl<T: Transport, C: Clock> BrokerSession for WireSession<T, C> {
    fn connect(
        &mut self,
        endpoint: &BrokerEndpoint,
        request: &ConnectRequest<'_>,
    ) -> Result<(), SessionError> {
        self.transport.close();
        self.transport.open(endpoint)?;

        let options = ConnectOptions {
            client_id: request.client_id,
            username: request.username,
            password: request.password.map(str::as_bytes),
            will: request.will.map(|will| Will {
                topic: &will.topic,
                payload: will.payload.as_bytes(),
                qos: will.qos,
                retain: will.retain,
            }),
            keep_alive_secs: request.keep_alive_secs,
            clean_session: true,
        };
        let clock = &self.clock;
        let Some(stream) = self.transport.stream() else {
            return Err(SessionError::ConnectFailed);
        };
        match self.session.connect(stream, &options, || clock.now_ms()) {
            Ok(_session_present) => Ok(()),
            Err(err) => {
                let err = SessionError::from(err);
                self.closed(err)
            }
        }
    }

    fn is_connected(&mut self) -> bool {
        self.session.is_connected() && self.transport.is_open()
    }

    fn poll(&mut self) -> Result<Option<InboundMessage>, SessionError> {
        let now_ms = self.clock.now_ms();
        let Some(stream) = self.transport.stream() else {
            return Err(SessionError::NotConnected);
        };
        match self.session.poll(stream, now_ms) {
            Ok(message) => Ok(message.map(|message| InboundMessage {
                topic: message.topic,
                payload: message.payload,
                retained: message.retain,
            })),
            Err(err) => {
                let err = SessionError::from(err);
                self.closed(err)
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        let now_ms = self.clock.now_ms();
        let Some(stream) = self.transport.stream() else {
            return Err(SessionError::NotConnected);
        };
        match self.session.publish(stream, topic, payload, retain, now_ms) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = SessionError::from(err);
                self.closed(err)
            }
        }
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), SessionError> {
        let now_ms = self.clock.now_ms();
        let Some(stream) = self.transport.stream() else {
            return Err(SessionError::NotConnected);
        };
        match self.session.subscribe(stream, topic, qos, now_ms) {
            Ok(_packet_id) => Ok(()),
            Err(err) => {
                let err = SessionError::from(err);
                self.closed(err)
            }
        }
    }

    fn disconnect(&mut self) {
        let now_ms = self.clock.now_ms();
        if let Some(stream) = self.transport.stream() {
            self.session.disconnect(stream, now_ms);
        }
        self.transport.close();
    }
}
