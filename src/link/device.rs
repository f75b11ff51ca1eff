//! Boundaries between the protocol engines and the optical hardware.
//!
//! The engines only ever see these traits; concrete cameras, screens and
//! codecs live in [`crate::optical`].

use crate::error::{LinkError, Result};
use crate::optical::Image;

/// Converts opaque payload bytes to and from a scannable image.
pub trait OpticalCodec {
    /// Render `payload` as an image. Payloads over capacity must be rejected
    /// with [`LinkError::CapacityExceeded`], never truncated.
    fn encode(&self, payload: &[u8]) -> Result<Image>;

    /// Find a code in `image` and return its bytes, or `None` when nothing
    /// readable is visible.
    fn decode(&self, image: &Image) -> Option<Vec<u8>>;
}

/// Blocking source of captured frames (the camera).
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// An empty frame is a normal outcome. An error means the source can
    /// produce no further frames and is fatal for the session.
    fn capture(&mut self) -> Result<Image>;
}

/// Display surface (the screen).
pub trait FrameSink {
    fn show(&mut self, image: &Image) -> Result<()>;

    /// Tear down whatever the sink holds open. Called once per session.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: OpticalCodec + ?Sized> OpticalCodec for &T {
    fn encode(&self, payload: &[u8]) -> Result<Image> {
        (**self).encode(payload)
    }

    fn decode(&self, image: &Image) -> Option<Vec<u8>> {
        (**self).decode(image)
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self) -> Result<Image> {
        (**self).capture()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn show(&mut self, image: &Image) -> Result<()> {
        (**self).show(image)
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

/// Session-scoped display handle.
///
/// Releases the sink when dropped, so every exit path of a session (success,
/// fatal error, interrupt) tears the display down exactly once.
pub struct DisplayGuard<'a, K: FrameSink + ?Sized> {
    sink: &'a mut K,
    released: bool,
}

impl<'a, K: FrameSink + ?Sized> DisplayGuard<'a, K> {
    pub fn new(sink: &'a mut K) -> Self {
        Self {
            sink,
            released: false,
        }
    }

    pub fn show(&mut self, image: &Image) -> Result<()> {
        self.sink.show(image)
    }

    /// Release now and report the outcome instead of logging it on drop.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.sink.release()
    }
}

impl<K: FrameSink + ?Sized> Drop for DisplayGuard<'_, K> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.sink.release() {
                tracing::warn!("Failed to release display: {}", e);
            }
        }
    }
}

/// Map a channel-level failure into the fatal error engines propagate.
pub fn channel_closed(what: impl Into<String>) -> LinkError {
    LinkError::ChannelClosed(what.into())
}
