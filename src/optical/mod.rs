//! Optical adapters: images, codecs, cameras and screens.
//!
//! ```text
//!   Transmitter                                 Receiver
//! +-------------+   frame.png / QR on screen  +-------------+
//! | FrameSink   | --------------------------> | FrameSource |
//! | FrameSource | <-------------------------- | FrameSink   |
//! +-------------+      ack.png / QR ack       +-------------+
//! ```
//!
//! - [`qr`]: real QR encode/decode
//! - [`spool`]: virtual screen/camera pair through a shared directory
//! - [`replay`]: offline playback of recorded captures
//! - [`loopback`]: in-memory medium for simulations
//! - [`scripted`]: capture scripts and recording screens for tests

pub mod loopback;
pub mod qr;
pub mod replay;
pub mod scripted;
pub mod spool;

pub use loopback::{Loopback, LoopbackCamera, LoopbackConfig, LoopbackScreen};
pub use qr::QrCodec;
pub use replay::ReplayCamera;
pub use scripted::{RecordingDisplay, ScriptedCamera};
pub use spool::{SpoolCamera, SpoolDisplay, SpoolRole};

use crate::error::Result;
use crate::link::device::{FrameSink, OpticalCodec};

/// Owned 8-bit greyscale bitmap, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    /// A frame with nothing in view.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from raw pixels; `None` if the buffer does not match the size.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A `width` x `height` frame filled with `luma`.
    pub fn filled(width: u32, height: u32, luma: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![luma; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Paint an axis-aligned block, clipped to the image.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, luma: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for row in y..y_end {
            let start = row as usize * self.width as usize;
            self.pixels[start + x as usize..start + x_end as usize].fill(luma);
        }
    }
}

/// Lossless identity codec: payload bytes become a single pixel row.
///
/// Used wherever the protocol should be exercised without image processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl OpticalCodec for PassthroughCodec {
    fn encode(&self, payload: &[u8]) -> Result<Image> {
        Ok(Image {
            width: payload.len() as u32,
            height: u32::from(!payload.is_empty()),
            pixels: payload.to_vec(),
        })
    }

    fn decode(&self, image: &Image) -> Option<Vec<u8>> {
        (!image.is_empty()).then(|| image.pixels.clone())
    }
}

/// Screen that discards everything, for sessions with no peer watching.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl FrameSink for NullDisplay {
    fn show(&mut self, _image: &Image) -> Result<()> {
        Ok(())
    }
}
