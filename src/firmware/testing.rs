//! Host stand-ins for the platform seams.

use alloc::{
    collections::VecDeque,
    rc::Rc,
    string::{String, ToString},
    vec::Vec,
};
use core::{cell::Cell, net::Ipv4Addr};

use crate::firmware::{
    broker::{BrokerSession, ConnectRequest, SessionError},
    link::{Radio, RadioError, RadioMode},
    runtime::{Clock, Delay, RandomSource},
    types::{
        Bssid, BrokerEndpoint, FallbackAccessPoint, InboundMessage, LastWill, LinkCredentials, QoS,
        ScanRecord,
    },
};

/// Shared millisecond counter. Its [`Delay`] advances the same counter, so
/// blocking loops finish instantly in tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn set(&self, now_ms: u64) {
        self.0.set(now_ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now()
    }
}

impl Delay for ManualClock {
    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

/// Returns the scripted values in order, then repeats the last one.
pub struct SeqRandom {
    values: Vec<u32>,
    next: usize,
}

impl SeqRandom {
    pub fn new(values: &[u32]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
        }
    }
}

impl RandomSource for SeqRandom {
    fn next_u32(&mut self) -> u32 {
        let value = self
            .values
            .get(self.next)
            .or(self.values.last())
            .copied()
            .unwrap_or(0);
        self.next += 1;
        value
    }
}

pub fn record(ssid: &str, last: u8, channel: u8, rssi: i8) -> ScanRecord {
    ScanRecord {
        ssid: ssid.to_string(),
        bssid: [0x02, 0, 0, 0, 0, last],
        channel,
        rssi,
    }
}

#[derive(Debug, Default)]
pub struct FakeRadio {
    /// Everything on the air; `scan` filters nothing, like a radio that
    /// ignores the directed-scan hint.
    pub networks: Vec<ScanRecord>,
    /// Polls of `is_connected` after `connect` before association succeeds.
    /// `None` never associates.
    pub associate_after_polls: Option<u32>,
    pub fail_scan: bool,
    pub fail_disconnect: bool,
    pub disconnects: u32,
    pub mode: Option<RadioMode>,
    pub hostname: String,
    pub scans: Vec<String>,
    pub connects: Vec<(Bssid, u8)>,
    pub access_point: Option<String>,
    pub access_point_starts: u32,
    pub connected: bool,
    pending: bool,
    polls: u32,
}

impl FakeRadio {
    pub fn with_networks(networks: Vec<ScanRecord>, associate_after_polls: Option<u32>) -> Self {
        Self {
            networks,
            associate_after_polls,
            ..Self::default()
        }
    }

    pub fn drop_link(&mut self) {
        self.connected = false;
        self.pending = false;
        self.polls = 0;
    }
}

impl Radio for FakeRadio {
    fn configure(&mut self, hostname: &str, mode: RadioMode) -> Result<(), RadioError> {
        self.hostname = hostname.to_string();
        self.mode = Some(mode);
        Ok(())
    }

    fn scan(&mut self, ssid: &str) -> Result<Vec<ScanRecord>, RadioError> {
        self.scans.push(ssid.to_string());
        if self.fail_scan {
            return Err(RadioError::ScanFailed);
        }
        Ok(self.networks.clone())
    }

    fn connect(
        &mut self,
        _credentials: &LinkCredentials,
        target: &ScanRecord,
    ) -> Result<(), RadioError> {
        self.connects.push((target.bssid, target.channel));
        self.pending = true;
        self.polls = 0;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        if self.connected {
            return true;
        }
        let Some(after) = self.associate_after_polls else {
            return false;
        };
        if !self.pending {
            return false;
        }
        self.polls += 1;
        if self.polls > after {
            self.connected = true;
        }
        self.connected
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.disconnects += 1;
        if self.fail_disconnect {
            return Err(RadioError::Driver);
        }
        self.connected = false;
        self.pending = false;
        Ok(())
    }

    fn start_access_point(&mut self, access_point: &FallbackAccessPoint) -> Result<(), RadioError> {
        self.access_point = Some(access_point.ssid.clone());
        self.access_point_starts += 1;
        Ok(())
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        self.access_point = None;
        Ok(())
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        self.connected.then_some(Ipv4Addr::new(192, 168, 1, 50))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeenConnect {
    pub client_id: String,
    pub username: Option<String>,
    pub will: Option<LastWill>,
}

#[derive(Debug)]
pub struct FakeSession {
    pub broker_up: bool,
    pub refuse: Option<u8>,
    pub connected: bool,
    pub connects: Vec<SeenConnect>,
    pub inbound: VecDeque<InboundMessage>,
    pub published: Vec<(String, String, bool)>,
    pub subscriptions: Vec<String>,
    pub disconnects: u32,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            broker_up: true,
            refuse: None,
            connected: false,
            connects: Vec::new(),
            inbound: VecDeque::new(),
            published: Vec::new(),
            subscriptions: Vec::new(),
            disconnects: 0,
        }
    }
}

impl FakeSession {
    pub fn broker_down(&mut self) {
        self.broker_up = false;
        self.connected = false;
    }

    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
            retained: false,
        });
    }

    pub fn published_on(&self, topic: &str) -> Vec<(String, bool)> {
        self.published
            .iter()
            .filter(|(published, _, _)| published == topic)
            .map(|(_, payload, retain)| (payload.clone(), *retain))
            .collect()
    }
}

impl BrokerSession for FakeSession {
    fn connect(
        &mut self,
        _endpoint: &BrokerEndpoint,
        request: &ConnectRequest<'_>,
    ) -> Result<(), SessionError> {
        self.connects.push(SeenConnect {
            client_id: request.client_id.to_string(),
            username: request.username.map(str::to_string),
            will: request.will.cloned(),
        });
        if !self.broker_up {
            return Err(SessionError::ConnectFailed);
        }
        if let Some(code) = self.refuse {
            return Err(SessionError::Refused(code));
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected && self.broker_up
    }

    fn poll(&mut self) -> Result<Option<InboundMessage>, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        Ok(self.inbound.pop_front())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.published.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
            retain,
        ));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.disconnects += 1;
    }
}
