mod broker;
mod link;

pub use broker::{
    BrokerEndpoint, BrokerIdentity, BrokerState, InboundMessage, LastWill, QoS, CLIENT_ID_MAX,
    CLIENT_ID_RANDOM_TOKEN,
};
pub use link::{
    Bssid, BssidDisplay, FallbackAccessPoint, LinkCredentials, LinkState, ScanRecord,
    LINK_PASSPHRASE_MAX, LINK_SSID_MAX,
};
