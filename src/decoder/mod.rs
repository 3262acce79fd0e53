//! Decode capability - turns a frame into an optional payload

mod marker;

use std::fmt;

use crate::device::Frame;

pub use marker::{MarkerDecoder, DEFAULT_MAX_PAYLOAD};

/// Text decoded from a frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload(String);

impl Payload {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Synchronous, side-effect free frame decoder
///
/// `None` is a normal miss ("nothing in this frame"), not an error.
pub trait Decode {
    fn decode(&self, frame: &Frame) -> Option<Payload>;
}

impl<F> Decode for F
where
    F: Fn(&Frame) -> Option<Payload>,
{
    fn decode(&self, frame: &Frame) -> Option<Payload> {
        self(frame)
    }
}
