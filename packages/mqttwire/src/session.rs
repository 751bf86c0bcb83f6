use alloc::{string::String, vec::Vec};

use embedded_io::{Read, ReadReady, Write};
use log::debug;

use crate::packet::{
    decode_packet, encode_connect, encode_disconnect, encode_pingreq, encode_puback,
    encode_publish, encode_subscribe, ConnackCode, ConnectOptions, EncodeError, Packet,
    ParseError, QoS,
};

pub const DEFAULT_RX_CAPACITY: usize = 1024;
/// How long a CONNECT may wait for its CONNACK.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;
const READ_CHUNK: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError<E> {
    Io(E),
    /// The peer closed the stream (a read returned zero bytes).
    Closed,
    Parse(ParseError),
    Encode(EncodeError),
    Refused(ConnackCode),
    UnexpectedPacket,
    NotConnected,
    /// No CONNACK within the connect timeout.
    ConnackTimeout,
    KeepAliveTimeout,
    /// A single inbound packet does not fit the receive buffer.
    Oversized,
}

impl<E> From<ParseError> for SessionError<E> {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

impl<E> From<EncodeError> for SessionError<E> {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Protocol state of one MQTT connection.
///
/// The session never owns the stream: every call borrows it, so the caller
/// decides how the socket is opened, reused and torn down.
pub struct Session {
    rx: Vec<u8>,
    rx_capacity: usize,
    tx: Vec<u8>,
    next_packet_id: u16,
    keep_alive_ms: u64,
    connect_timeout_ms: u64,
    last_tx_ms: u64,
    ping_sent_ms: Option<u64>,
    connect_sent: Option<(u64, u64)>,
    connected: bool,
}

impl Session {
    pub fn new(rx_capacity: usize) -> Self {
        Self {
            rx: Vec::new(),
            rx_capacity: rx_capacity.max(READ_CHUNK),
            tx: Vec::new(),
            next_packet_id: 1,
            keep_alive_ms: 0,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            last_tx_ms: 0,
            ping_sent_ms: None,
            connect_sent: None,
            connected: false,
        }
    }

    pub fn with_connect_timeout(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Sends CONNECT and polls the stream until the CONNACK arrives or the
    /// connect timeout passes on the `now` clock.
    ///
    /// Returns the broker's session-present flag.
    pub fn connect<T: Read + Write + ReadReady>(
        &mut self,
        io: &mut T,
        options: &ConnectOptions<'_>,
        mut now: impl FnMut() -> u64,
    ) -> Result<bool, SessionError<T::Error>> {
        self.begin_connect(io, options, now())?;
        loop {
            if let Some(session_present) = self.poll_connack(io, now())? {
                return Ok(session_present);
            }
        }
    }

    /// Sends CONNECT. The CONNACK is collected by [`Session::poll_connack`].
    pub fn begin_connect<T: Write>(
        &mut self,
        io: &mut T,
        options: &ConnectOptions<'_>,
        now_ms: u64,
    ) -> Result<(), SessionError<T::Error>> {
        self.reset();
        encode_connect(&mut self.tx, options)?;
        if let Err(err) = self.send(io, now_ms) {
            return Err(self.fail(err));
        }
        let keep_alive_ms = u64::from(options.keep_alive_secs) * 1_000;
        self.connect_sent = Some((now_ms, keep_alive_ms));
        Ok(())
    }

    /// Consumes whatever the stream has ready. Returns the session-present
    /// flag once the CONNACK is in, `None` while still waiting.
    pub fn poll_connack<T: Read + ReadReady>(
        &mut self,
        io: &mut T,
        now_ms: u64,
    ) -> Result<Option<bool>, SessionError<T::Error>> {
        let Some((sent_ms, keep_alive_ms)) = self.connect_sent else {
            return Err(SessionError::NotConnected);
        };
        match self.await_connack(io, now_ms, sent_ms) {
            Ok(None) => Ok(None),
            Ok(Some(session_present)) => {
                self.connect_sent = None;
                self.connected = true;
                self.keep_alive_ms = keep_alive_ms;
                Ok(Some(session_present))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn publish<T: Write>(
        &mut self,
        io: &mut T,
        topic: &str,
        payload: &[u8],
        retain: bool,
        now_ms: u64,
    ) -> Result<(), SessionError<T::Error>> {
        self.ensure_connected()?;
        encode_publish(&mut self.tx, topic, payload, retain)?;
        match self.send(io, now_ms) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Subscribes to `filter`. QoS 2 is downgraded to QoS 1; the session does
    /// not run the four-step exactly-once handshake.
    pub fn subscribe<T: Write>(
        &mut self,
        io: &mut T,
        filter: &str,
        qos: QoS,
        now_ms: u64,
    ) -> Result<u16, SessionError<T::Error>> {
        self.ensure_connected()?;
        let qos = if qos == QoS::ExactlyOnce {
            QoS::AtLeastOnce
        } else {
            qos
        };
        let packet_id = self.allocate_packet_id();
        encode_subscribe(&mut self.tx, packet_id, filter, qos)?;
        match self.send(io, now_ms) {
            Ok(()) => Ok(packet_id),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Services the connection without blocking: consumes whatever the stream
    /// has ready, answers QoS 1 deliveries, keeps the connection alive and
    /// returns at most one inbound message.
    pub fn poll<T: Read + Write + ReadReady>(
        &mut self,
        io: &mut T,
        now_ms: u64,
    ) -> Result<Option<Inbound>, SessionError<T::Error>> {
        self.ensure_connected()?;
        match self.poll_inner(io, now_ms) {
            Ok(message) => Ok(message),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Best-effort DISCONNECT. The session is closed afterwards regardless of
    /// whether the packet made it out.
    pub fn disconnect<T: Write>(&mut self, io: &mut T, now_ms: u64) {
        if self.connected {
            encode_disconnect(&mut self.tx);
            let _ = self.send(io, now_ms);
        }
        self.reset();
    }

    fn poll_inner<T: Read + Write + ReadReady>(
        &mut self,
        io: &mut T,
        now_ms: u64,
    ) -> Result<Option<Inbound>, SessionError<T::Error>> {
        if let Some(message) = self.next_buffered(io, now_ms)? {
            return Ok(Some(message));
        }
        while io.read_ready().map_err(SessionError::Io)? {
            self.fill(io)?;
            if let Some(message) = self.next_buffered(io, now_ms)? {
                return Ok(Some(message));
            }
        }
        self.keep_alive(io, now_ms)?;
        Ok(None)
    }

    fn next_buffered<T: Write>(
        &mut self,
        io: &mut T,
        now_ms: u64,
    ) -> Result<Option<Inbound>, SessionError<T::Error>> {
        loop {
            let Some((packet, used)) = decode_packet(&self.rx)? else {
                if self.rx.len() >= self.rx_capacity {
                    return Err(SessionError::Oversized);
                }
                return Ok(None);
            };
            self.rx.drain(..used);

            match packet {
                Packet::Publish {
                    topic,
                    payload,
                    qos,
                    packet_id,
                    retain,
                    ..
                } => {
                    if let (QoS::AtLeastOnce, Some(packet_id)) = (qos, packet_id) {
                        encode_puback(&mut self.tx, packet_id);
                        self.send(io, now_ms)?;
                    }
                    return Ok(Some(Inbound {
                        topic,
                        payload,
                        retain,
                    }));
                }
                Packet::Pingresp => self.ping_sent_ms = None,
                Packet::Suback {
                    packet_id,
                    return_codes,
                } => {
                    debug!("mqttwire: suback id={} codes={:?}", packet_id, return_codes);
                }
                Packet::Puback { .. } => {}
                Packet::Connack { .. } => return Err(SessionError::UnexpectedPacket),
            }
        }
    }

    fn keep_alive<T: Write>(&mut self, io: &mut T, now_ms: u64) -> Result<(), SessionError<T::Error>> {
        if self.keep_alive_ms == 0 {
            return Ok(());
        }
        if let Some(sent_ms) = self.ping_sent_ms {
            if now_ms.saturating_sub(sent_ms) >= self.keep_alive_ms {
                return Err(SessionError::KeepAliveTimeout);
            }
            return Ok(());
        }
        if now_ms.saturating_sub(self.last_tx_ms) >= self.keep_alive_ms {
            encode_pingreq(&mut self.tx);
            self.send(io, now_ms)?;
            self.ping_sent_ms = Some(now_ms);
        }
        Ok(())
    }

    fn await_connack<T: Read + ReadReady>(
        &mut self,
        io: &mut T,
        now_ms: u64,
        sent_ms: u64,
    ) -> Result<Option<bool>, SessionError<T::Error>> {
        loop {
            if let Some((packet, used)) = decode_packet(&self.rx)? {
                self.rx.drain(..used);
                return match packet {
                    Packet::Connack {
                        session_present,
                        code: ConnackCode::Accepted,
                    } => Ok(Some(session_present)),
                    Packet::Connack { code, .. } => Err(SessionError::Refused(code)),
                    _ => Err(SessionError::UnexpectedPacket),
                };
            }
            if self.rx.len() >= self.rx_capacity {
                return Err(SessionError::Oversized);
            }
            if !io.read_ready().map_err(SessionError::Io)? {
                break;
            }
            self.fill(io)?;
        }
        if now_ms.saturating_sub(sent_ms) >= self.connect_timeout_ms {
            return Err(SessionError::ConnackTimeout);
        }
        Ok(None)
    }

    fn fill<T: Read>(&mut self, io: &mut T) -> Result<(), SessionError<T::Error>> {
        let mut chunk = [0u8; READ_CHUNK];
        let room = (self.rx_capacity - self.rx.len().min(self.rx_capacity)).clamp(1, READ_CHUNK);
        let read = io.read(&mut chunk[..room]).map_err(SessionError::Io)?;
        if read == 0 {
            return Err(SessionError::Closed);
        }
        self.rx.extend_from_slice(&chunk[..read]);
        Ok(())
    }

    fn send<T: Write>(&mut self, io: &mut T, now_ms: u64) -> Result<(), SessionError<T::Error>> {
        io.write_all(&self.tx).map_err(SessionError::Io)?;
        io.flush().map_err(SessionError::Io)?;
        self.last_tx_ms = now_ms;
        Ok(())
    }

    fn ensure_connected<E>(&self) -> Result<(), SessionError<E>> {
        if self.connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    fn fail<E>(&mut self, err: SessionError<E>) -> SessionError<E> {
        self.reset();
        err
    }

    fn reset(&mut self) {
        self.rx.clear();
        self.connected = false;
        self.keep_alive_ms = 0;
        self.ping_sent_ms = None;
        self.connect_sent = None;
    }
}
