use alloc::{string::String, vec::Vec};

pub use mqttwire::QoS;

pub const CLIENT_ID_MAX: usize = 64;
pub const CLIENT_ID_RANDOM_TOKEN: &str = "#RANDOM#";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub qos: QoS,
}

/// Who the device claims to be on the broker. Only the expanded client id
/// changes after construction, once per connection attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrokerIdentity {
    pub client_id_template: String,
    pub username: String,
    pub password: String,
    pub will: Option<LastWill>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerState {
    Disconnected,
    Connected,
}

impl BrokerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retained: bool,
}

impl InboundMessage {
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}
