use core::fmt::Write as _;

use log::warn;

use crate::firmware::{
    runtime::RandomSource,
    types::{CLIENT_ID_MAX, CLIENT_ID_RANDOM_TOKEN},
};

pub type ClientId = heapless::String<CLIENT_ID_MAX>;

/// Replaces every `#RANDOM#` in `template` with four fresh upper-case hex
/// digits. Output beyond [`CLIENT_ID_MAX`] bytes is cut.
pub fn expand_client_id<G: RandomSource + ?Sized>(template: &str, random: &mut G) -> ClientId {
    let mut id = ClientId::new();
    let mut truncated = false;
    let mut pieces = template.split(CLIENT_ID_RANDOM_TOKEN).peekable();

    while let Some(piece) = pieces.next() {
        for ch in piece.chars() {
            if id.push(ch).is_err() {
                truncated = true;
                break;
            }
        }
        if pieces.peek().is_some() {
            let value = random.next_u32() & 0xFFFF;
            truncated |= write!(id, "{:04X}", value).is_err();
        }
    }

    if truncated {
        warn!("broker: client id '{}' cut to {} bytes", template, CLIENT_ID_MAX);
    }
    id
}
