//! Marker decoder - recognises framed `*<hex>;` codes in a frame

use tracing::trace;

use super::{Decode, Payload};
use crate::device::Frame;

/// Default upper bound on decoded payload size in bytes
pub const DEFAULT_MAX_PAYLOAD: usize = 4096;

/// Decodes frames carrying a hex-encoded code between `*` and `;`
///
/// Anything else (no marker, odd-length or non-hex body, oversized body,
/// non UTF-8 text) is a miss.
#[derive(Debug, Clone)]
pub struct MarkerDecoder {
    max_payload: usize,
}

impl MarkerDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for MarkerDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decode for MarkerDecoder {
    fn decode(&self, frame: &Frame) -> Option<Payload> {
        let payload = parse_marker(&frame.data, self.max_payload);
        if payload.is_none() {
            trace!("No code in frame {} ({} bytes)", frame.sequence, frame.len());
        }
        payload
    }
}

/// Extract the first `*<hex>;` body and decode it as UTF-8 text
fn parse_marker(data: &[u8], max_payload: usize) -> Option<Payload> {
    let start = data.iter().position(|&b| b == b'*')? + 1;
    let len = data[start..].iter().position(|&b| b == b';')?;
    let hex_str = &data[start..start + len];

    if hex_str.is_empty() || hex_str.len() % 2 != 0 || hex_str.len() / 2 > max_payload {
        return None;
    }

    let bytes = hex::decode(hex_str).ok()?;
    String::from_utf8(bytes).ok().map(Payload::from)
}
