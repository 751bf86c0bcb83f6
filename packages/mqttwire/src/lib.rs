#![cfg_attr(not(test), no_std)]

//! MQTT 3.1.1 client codec and a blocking session that runs over any
//! `embedded-io` byte stream.

extern crate alloc;

pub mod packet;
pub mod session;

pub use packet::{
    decode_packet, encode_connect, encode_disconnect, encode_pingreq, encode_puback,
    encode_publish, encode_subscribe, ConnackCode, ConnectOptions, EncodeError, Packet,
    PacketType, ParseError, QoS, Will,
};
pub use session::{
    Inbound, Session, SessionError, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RX_CAPACITY,
};
