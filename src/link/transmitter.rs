//! Transmitter engine: stop-and-wait over the optical link.
//!
//! ```text
//!             next frame                 matching ack
//!   Encoding ------------> AwaitingAck ----------------> Encoding
//!      |                     |    ^
//!      | no frames left      +----+ show, capture, decode (no match)
//!      v
//!    Done
//! ```
//!
//! At most one frame is outstanding. There is no retransmit timer: the frame
//! stays on screen until its ack is seen, so the receiver can re-read it on
//! every one of its own polls. There is no ack timeout either; a peer that
//! never answers keeps the session waiting until the abort flag is raised or
//! the camera reports closure.

use crate::error::{LinkError, Result};
use crate::link::device::{DisplayGuard, FrameSink, FrameSource, OpticalCodec};
use crate::link::frame::{Ack, FrameKind, Tag};
use crate::link::sequencer::{Sequencer, DEFAULT_CHUNK_SIZE};
use crate::link::{abort_requested, TransferStats};
use crate::optical::Image;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Transmitter configuration
#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    /// Bytes of file data per frame
    pub chunk_size: usize,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Reported once per acknowledged frame.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub tag: Tag,
    pub kind: FrameKind,
    /// Frames acknowledged so far, including this one.
    pub frames_acked: u64,
    /// File bytes acknowledged so far.
    pub bytes_acked: u64,
    /// Captures spent waiting for this frame's ack.
    pub polls: u64,
}

enum State {
    Encoding,
    AwaitingAck {
        tag: Tag,
        kind: FrameKind,
        payload_len: usize,
        image: Image,
        polls: u64,
    },
    Done,
}

pub struct Transmitter<C, S, K> {
    config: TransmitterConfig,
    codec: C,
    camera: S,
    display: K,
    abort: Option<Arc<AtomicBool>>,
}

impl<C, S, K> Transmitter<C, S, K>
where
    C: OpticalCodec,
    S: FrameSource,
    K: FrameSink,
{
    pub fn new(config: TransmitterConfig, codec: C, camera: S, display: K) -> Self {
        Self {
            config,
            codec,
            camera,
            display,
            abort: None,
        }
    }

    /// Check `flag` once per poll; when set the session ends with
    /// [`LinkError::Interrupted`].
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn transmit(&mut self, path: &Path) -> Result<TransferStats> {
        self.transmit_with(path, |_| {})
    }

    /// Send `path`, calling `on_progress` after each acknowledged frame.
    pub fn transmit_with<F>(&mut self, path: &Path, mut on_progress: F) -> Result<TransferStats>
    where
        F: FnMut(&Progress),
    {
        let mut frames = Sequencer::open(path, self.config.chunk_size)?;
        tracing::info!("Transmitting {}", path.display());

        let abort = self.abort.clone();
        let mut display = DisplayGuard::new(&mut self.display);
        let mut stats = TransferStats::new();
        let mut state = State::Encoding;

        loop {
            state = match state {
                State::Encoding => match frames.next() {
                    Some(frame) => {
                        let frame = frame?;
                        let image = self.codec.encode(&frame.encode())?;
                        display.show(&image)?;
                        tracing::debug!(
                            "Showing {} frame tag={} ({} bytes)",
                            frame.kind.as_str(),
                            frame.tag,
                            frame.payload.len()
                        );
                        State::AwaitingAck {
                            tag: frame.tag,
                            kind: frame.kind,
                            payload_len: frame.payload.len(),
                            image,
                            polls: 0,
                        }
                    }
                    None => State::Done,
                },

                State::AwaitingAck {
                    tag,
                    kind,
                    payload_len,
                    image,
                    polls,
                } => {
                    if abort_requested(abort.as_deref()) {
                        return Err(LinkError::Interrupted);
                    }

                    display.show(&image)?;
                    let captured = self.camera.capture()?;
                    let acked = self
                        .codec
                        .decode(&captured)
                        .is_some_and(|raw| Ack::matches(&raw, tag));

                    if acked {
                        stats.frames += 1;
                        if kind == FrameKind::Data {
                            stats.bytes += payload_len as u64;
                        }
                        tracing::debug!("Ack for tag={} after {} polls", tag, polls + 1);
                        on_progress(&Progress {
                            tag,
                            kind,
                            frames_acked: stats.frames,
                            bytes_acked: stats.bytes,
                            polls: polls + 1,
                        });
                        State::Encoding
                    } else {
                        stats.unmatched_polls += 1;
                        tracing::trace!("No ack for tag={} yet", tag);
                        State::AwaitingAck {
                            tag,
                            kind,
                            payload_len,
                            image,
                            polls: polls + 1,
                        }
                    }
                }

                State::Done => break,
            };
        }

        display.release()?;
        tracing::info!(
            "Transmission complete: {} frames, {} bytes",
            stats.frames,
            stats.bytes
        );
        Ok(stats)
    }

    pub fn into_parts(self) -> (C, S, K) {
        (self.codec, self.camera, self.display)
    }
}
