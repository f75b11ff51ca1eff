//! qrlink: one-way file transfer over a screen-to-camera optical channel.
//!
//! Each peer shows QR codes on its screen and reads the other's with its
//! camera. The transmitter sends one frame at a time and waits for the
//! receiver to show the matching acknowledgement before moving on.
//!
//! - [`link`]: frame format, sequencing and the two protocol engines
//! - [`optical`]: images, the QR codec and the camera/screen adapters
//! - [`config`]: TOML session configuration

pub mod config;
pub mod error;
pub mod link;
pub mod optical;

pub use error::{LinkError, Result};
