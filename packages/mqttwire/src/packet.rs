use alloc::{string::String, vec::Vec};

pub const PROTOCOL_LEVEL: u8 = 4;
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;
const MAX_STRING_LEN: usize = u16::MAX as usize;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Subscribe = 8,
    Suback = 9,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl PacketType {
    pub const fn from_header(byte: u8) -> Option<Self> {
        match byte >> 4 {
            1 => Some(Self::Connect),
            2 => Some(Self::Connack),
            3 => Some(Self::Publish),
            4 => Some(Self::Puback),
            8 => Some(Self::Subscribe),
            9 => Some(Self::Suback),
            12 => Some(Self::Pingreq),
            13 => Some(Self::Pingresp),
            14 => Some(Self::Disconnect),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// CONNACK return code (MQTT 3.1.1 section 3.2.2.3).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnackCode {
    Accepted = 0,
    UnacceptableProtocol = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadCredentials = 4,
    NotAuthorized = 5,
}

impl ConnackCode {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Accepted),
            1 => Some(Self::UnacceptableProtocol),
            2 => Some(Self::IdentifierRejected),
            3 => Some(Self::ServerUnavailable),
            4 => Some(Self::BadCredentials),
            5 => Some(Self::NotAuthorized),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::UnacceptableProtocol => "unacceptable_protocol",
            Self::IdentifierRejected => "identifier_rejected",
            Self::ServerUnavailable => "server_unavailable",
            Self::BadCredentials => "bad_credentials",
            Self::NotAuthorized => "not_authorized",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    /// The password is only sent together with a username; MQTT 3.1.1 forbids
    /// the password flag without the username flag.
    pub username: Option<&'a str>,
    pub password: Option<&'a [u8]>,
    pub will: Option<Will<'a>>,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
}

impl<'a> ConnectOptions<'a> {
    pub const fn new(client_id: &'a str) -> Self {
        Self {
            client_id,
            username: None,
            password: None,
            will: None,
            keep_alive_secs: 15,
            clean_session: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Connack {
        session_present: bool,
        code: ConnackCode,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        packet_id: Option<u16>,
        retain: bool,
        dup: bool,
    },
    Puback {
        packet_id: u16,
    },
    Suback {
        packet_id: u16,
        return_codes: Vec<u8>,
    },
    Pingresp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    Malformed,
    UnsupportedType(u8),
    InvalidUtf8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeError {
    StringTooLong,
    PacketTooLarge,
}

pub fn encode_connect(out: &mut Vec<u8>, options: &ConnectOptions<'_>) -> Result<(), EncodeError> {
    let password = options.username.and(options.password);

    let mut remaining = 10 + string_len(options.client_id)?;
    if let Some(will) = options.will {
        remaining += string_len(will.topic)? + bytes_len(will.payload)?;
    }
    if let Some(username) = options.username {
        remaining += string_len(username)?;
    }
    if let Some(password) = password {
        remaining += bytes_len(password)?;
    }

    let mut flags = 0u8;
    if options.clean_session {
        flags |= 0x02;
    }
    if let Some(will) = options.will {
        flags |= 0x04 | (will.qos.as_u8() << 3);
        if will.retain {
            flags |= 0x20;
        }
    }
    if password.is_some() {
        flags |= 0x40;
    }
    if options.username.is_some() {
        flags |= 0x80;
    }

    out.clear();
    write_fixed_header(out, (PacketType::Connect as u8) << 4, remaining)?;
    write_string(out, "MQTT");
    out.push(PROTOCOL_LEVEL);
    out.push(flags);
    out.extend_from_slice(&options.keep_alive_secs.to_be_bytes());
    write_string(out, options.client_id);
    if let Some(will) = options.will {
        write_string(out, will.topic);
        write_bytes(out, will.payload);
    }
    if let Some(username) = options.username {
        write_string(out, username);
    }
    if let Some(password) = password {
        write_bytes(out, password);
    }
    Ok(())
}

/// Encodes a QoS 0 PUBLISH.
pub fn encode_publish(
    out: &mut Vec<u8>,
    topic: &str,
    payload: &[u8],
    retain: bool,
) -> Result<(), EncodeError> {
    let remaining = string_len(topic)? + payload.len();
    let mut header = (PacketType::Publish as u8) << 4;
    if retain {
        header |= 0x01;
    }

    out.clear();
    write_fixed_header(out, header, remaining)?;
    write_string(out, topic);
    out.extend_from_slice(payload);
    Ok(())
}

pub fn encode_subscribe(
    out: &mut Vec<u8>,
    packet_id: u16,
    filter: &str,
    qos: QoS,
) -> Result<(), EncodeError> {
    let remaining = 2 + string_len(filter)? + 1;

    out.clear();
    write_fixed_header(out, ((PacketType::Subscribe as u8) << 4) | 0x02, remaining)?;
    out.extend_from_slice(&packet_id.to_be_bytes());
    write_string(out, filter);
    out.push(qos.as_u8());
    Ok(())
}

pub fn encode_puback(out: &mut Vec<u8>, packet_id: u16) {
    out.clear();
    out.push((PacketType::Puback as u8) << 4);
    out.push(0x02);
    out.extend_from_slice(&packet_id.to_be_bytes());
}

pub fn encode_pingreq(out: &mut Vec<u8>) {
    out.clear();
    out.push((PacketType::Pingreq as u8) << 4);
    out.push(0x00);
}

pub fn encode_disconnect(out: &mut Vec<u8>) {
    out.clear();
    out.push((PacketType::Disconnect as u8) << 4);
    out.push(0x00);
}

/// Decodes one packet from the front of `data`.
///
/// Returns `Ok(None)` while the buffer holds only part of a packet, otherwise
/// the packet and the number of bytes it occupied.
pub fn decode_packet(data: &[u8]) -> Result<Option<(Packet, usize)>, ParseError> {
    let Some(&header) = data.first() else {
        return Ok(None);
    };
    let Some((remaining, length_bytes)) = decode_remaining_length(&data[1..])? else {
        return Ok(None);
    };
    let start = 1 + length_bytes;
    let end = start + remaining;
    if data.len() < end {
        return Ok(None);
    }
    let body = &data[start..end];

    let packet = match PacketType::from_header(header) {
        Some(PacketType::Connack) => decode_connack(body)?,
        Some(PacketType::Publish) => decode_publish(header, body)?,
        Some(PacketType::Puback) => Packet::Puback {
            packet_id: read_u16(body, 0)?,
        },
        Some(PacketType::Suback) => {
            if body.len() < 3 {
                return Err(ParseError::Malformed);
            }
            Packet::Suback {
                packet_id: read_u16(body, 0)?,
                return_codes: body[2..].to_vec(),
            }
        }
        Some(PacketType::Pingresp) => Packet::Pingresp,
        _ => return Err(ParseError::UnsupportedType(header >> 4)),
    };
    Ok(Some((packet, end)))
}

fn decode_connack(body: &[u8]) -> Result<Packet, ParseError> {
    if body.len() != 2 {
        return Err(ParseError::Malformed);
    }
    let code = ConnackCode::from_byte(body[1]).ok_or(ParseError::Malformed)?;
    Ok(Packet::Connack {
        session_present: body[0] & 0x01 != 0,
        code,
    })
}

fn decode_publish(header: u8, body: &[u8]) -> Result<Packet, ParseError> {
    let qos = QoS::from_bits((header >> 1) & 0x03).ok_or(ParseError::Malformed)?;
    let topic_len = usize::from(read_u16(body, 0)?);
    let topic_end = 2 + topic_len;
    if body.len() < topic_end {
        return Err(ParseError::Malformed);
    }
    let topic = core::str::from_utf8(&body[2..topic_end]).map_err(|_| ParseError::InvalidUtf8)?;

    let (packet_id, payload_start) = if qos == QoS::AtMostOnce {
        (None, topic_end)
    } else {
        (Some(read_u16(body, topic_end)?), topic_end + 2)
    };

    Ok(Packet::Publish {
        topic: String::from(topic),
        payload: body[payload_start..].to_vec(),
        qos,
        packet_id,
        retain: header & 0x01 != 0,
        dup: header & 0x08 != 0,
    })
}

fn decode_remaining_length(data: &[u8]) -> Result<Option<(usize, usize)>, ParseError> {
    let mut value = 0usize;
    for (index, &byte) in data.iter().enumerate() {
        if index == 4 {
            return Err(ParseError::Malformed);
        }
        value |= usize::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some((value, index + 1)));
        }
    }
    if data.len() >= 4 {
        return Err(ParseError::Malformed);
    }
    Ok(None)
}

fn write_fixed_header(out: &mut Vec<u8>, header: u8, remaining: usize) -> Result<(), EncodeError> {
    if remaining > MAX_REMAINING_LENGTH {
        return Err(EncodeError::PacketTooLarge);
    }
    out.reserve(remaining + 5);
    out.push(header);
    let mut len = remaining;
    loop {
        let mut byte = (len & 0x7F) as u8;
        len >>= 7;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

fn string_len(value: &str) -> Result<usize, EncodeError> {
    bytes_len(value.as_bytes())
}

fn bytes_len(value: &[u8]) -> Result<usize, EncodeError> {
    if value.len() > MAX_STRING_LEN {
        return Err(EncodeError::StringTooLong);
    }
    Ok(2 + value.len())
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_bytes(out, value.as_bytes());
}

fn write_bytes(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, ParseError> {
    match data.get(at..at + 2) {
        Some(bytes) => Ok(u16::from_be_bytes([bytes[0], bytes[1]])),
        None => Err(ParseError::Malformed),
    }
}
