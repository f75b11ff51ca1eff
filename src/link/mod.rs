//! Stop-and-wait file transfer over an optical channel.
//!
//! Two peers each own a screen and a camera pointed at the other's screen.
//! The transmitter shows one frame at a time and waits until the receiver's
//! screen shows the matching tag.
//!
//! # Architecture
//!
//! ```text
//! +-------------+     +-------------+   frames   +-------------+     +-------------+
//! |  Sequencer  | --> | Transmitter | =========> |  Receiver   | --> |  Resolver   |
//! | (file->frm) |     | (show/wait) | <========= | (write/ack) |     | (dest path) |
//! +-------------+     +-------------+    acks    +-------------+     +-------------+
//! ```
//!
//! # Frames
//!
//! `<tag><base64 payload>` for FILENAME and DATA, `<tag>!` for EOT, where the
//! tag is one ASCII digit that advances mod 10 per frame. An ack is the tag
//! rendered as decimal text.

pub mod device;
pub mod frame;
pub mod receiver;
pub mod resolver;
pub mod sequencer;
pub mod transmitter;

pub use device::{DisplayGuard, FrameSink, FrameSource, OpticalCodec};
pub use frame::{Ack, Frame, FrameError, FrameKind, Inbound, Tag, END_MARKER, TAG_MODULUS};
pub use receiver::{ReceiveReport, Receiver, ReceiverConfig, DEFAULT_GRACE_PERIOD};
pub use resolver::{resolve_destination, sanitize, FALLBACK_NAME};
pub use sequencer::{frame_count, Sequencer, DEFAULT_CHUNK_SIZE};
pub use transmitter::{Progress, Transmitter, TransmitterConfig};

use std::sync::atomic::{AtomicBool, Ordering};

/// Counters for one side of a session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferStats {
    /// Frames acknowledged (transmitter) or accepted (receiver)
    pub frames: u64,
    /// File bytes acknowledged or written
    pub bytes: u64,
    /// Frames decoded but not written because their tag was not expected
    pub duplicates: u64,
    /// Captures that did not carry the awaited ack
    pub unmatched_polls: u64,
    /// Codes read off the camera that were not well-formed frames
    pub undecoded: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn abort_requested(flag: Option<&AtomicBool>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::SeqCst))
}
