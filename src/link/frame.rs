//! Frame model for the optical link.
//!
//! Wire format (the bytes handed to the optical codec):
//! `tag:ascii digit | body`, where body is either the base64 of the payload
//! (filename or data chunk) or the single byte `!` for end of transmission.
//!
//! Acknowledgments carry no framing at all: the decimal string of the tag.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of the tag space. Tags cycle `0..=9`.
pub const TAG_MODULUS: u8 = 10;

/// Body of an end-of-transmission frame.
pub const END_MARKER: u8 = b'!';

// =============================================================================
// Tag
// =============================================================================

/// Position of a frame in the mod-10 sequence window.
///
/// A tag identifies the "current expected frame", not a message: the sender
/// reuses a tag only after the frame that last carried it was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(u8);

impl Tag {
    /// Tag of the filename frame.
    pub const FIRST: Tag = Tag(0);

    pub fn new(value: u8) -> Option<Self> {
        (value < TAG_MODULUS).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The following tag, wrapping 9 -> 0.
    pub fn next(self) -> Self {
        Self((self.0 + 1) % TAG_MODULUS)
    }

    pub fn to_ascii(self) -> u8 {
        b'0' + self.0
    }

    pub fn from_ascii(b: u8) -> Option<Self> {
        b.is_ascii_digit().then(|| Self(b - b'0'))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Frame
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Filename,
    Data,
    EndOfTransmission,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Filename => "FILENAME",
            FrameKind::Data => "DATA",
            FrameKind::EndOfTransmission => "EOT",
        }
    }
}

/// One optically transmitted unit, as built by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: Tag,
    pub kind: FrameKind,
    /// Raw filename or chunk bytes. Empty for end of transmission.
    pub payload: Bytes,
}

impl Frame {
    pub fn filename(tag: Tag, name: impl Into<String>) -> Self {
        Self {
            tag,
            kind: FrameKind::Filename,
            payload: Bytes::from(name.into()),
        }
    }

    pub fn data(tag: Tag, chunk: Bytes) -> Self {
        Self {
            tag,
            kind: FrameKind::Data,
            payload: chunk,
        }
    }

    pub fn end(tag: Tag) -> Self {
        Self {
            tag,
            kind: FrameKind::EndOfTransmission,
            payload: Bytes::new(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.kind == FrameKind::EndOfTransmission
    }

    pub fn encode(&self) -> Bytes {
        match self.kind {
            FrameKind::EndOfTransmission => {
                let mut buf = BytesMut::with_capacity(2);
                buf.put_u8(self.tag.to_ascii());
                buf.put_u8(END_MARKER);
                buf.freeze()
            }
            FrameKind::Filename | FrameKind::Data => {
                let body = STANDARD.encode(&self.payload);
                let mut buf = BytesMut::with_capacity(1 + body.len());
                buf.put_u8(self.tag.to_ascii());
                buf.put_slice(body.as_bytes());
                buf.freeze()
            }
        }
    }

    /// Length of the encoded frame for a payload of `len` bytes.
    pub fn encoded_len(len: usize) -> usize {
        1 + len.div_ceil(3) * 4
    }
}

// =============================================================================
// Inbound (receiver view)
// =============================================================================

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty frame")]
    Empty,

    #[error("Invalid tag byte 0x{0:02x}")]
    BadTag(u8),

    #[error("Invalid base64 payload: {0}")]
    BadPayload(String),
}

/// A decoded frame as the receiver sees it.
///
/// The wire carries no filename/data discriminator; which payload frame is the
/// filename is decided by the receiver from its position in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Payload { tag: Tag, bytes: Bytes },
    End { tag: Tag },
}

impl Inbound {
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        let (&first, body) = raw.split_first().ok_or(FrameError::Empty)?;
        let tag = Tag::from_ascii(first).ok_or(FrameError::BadTag(first))?;

        if body == [END_MARKER] {
            return Ok(Inbound::End { tag });
        }

        let bytes = STANDARD
            .decode(body)
            .map_err(|e| FrameError::BadPayload(e.to_string()))?;
        Ok(Inbound::Payload {
            tag,
            bytes: Bytes::from(bytes),
        })
    }

    pub fn tag(&self) -> Tag {
        match self {
            Inbound::Payload { tag, .. } | Inbound::End { tag } => *tag,
        }
    }
}

// =============================================================================
// Acknowledgment
// =============================================================================

pub struct Ack;

impl Ack {
    pub fn encode(tag: Tag) -> Bytes {
        Bytes::from(tag.to_string())
    }

    /// Whether a decoded code reads as the integer `tag`.
    ///
    /// Anything that is not an integer (a stray data frame, our own frame seen
    /// in a reflection) is simply not a match.
    pub fn matches(raw: &[u8], tag: Tag) -> bool {
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .is_some_and(|n| n == u32::from(tag.value()))
    }
}
