//! Virtual screen/camera pair through a shared spool directory.
//!
//! Each end "displays" by writing a PNG into the spool and "films" the peer by
//! reading the peer's PNG. The transmitter shows `frame.png` and watches
//! `ack.png`; the receiver does the opposite. Writes go through a temp file
//! and a rename so a capture never sees a half-written image.

use crate::error::{LinkError, Result};
use crate::link::device::{channel_closed, FrameSink, FrameSource};
use crate::optical::Image;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const FRAME_FILE: &str = "frame.png";
pub const ACK_FILE: &str = "ack.png";

/// Which end of the link a spool device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolRole {
    Transmitter,
    Receiver,
}

impl SpoolRole {
    fn own_file(self) -> &'static str {
        match self {
            SpoolRole::Transmitter => FRAME_FILE,
            SpoolRole::Receiver => ACK_FILE,
        }
    }

    fn peer_file(self) -> &'static str {
        match self {
            SpoolRole::Transmitter => ACK_FILE,
            SpoolRole::Receiver => FRAME_FILE,
        }
    }
}

/// Open both devices for `role`, creating the spool directory if needed.
pub fn open(
    dir: &Path,
    role: SpoolRole,
    poll_interval: Duration,
) -> Result<(SpoolCamera, SpoolDisplay)> {
    fs::create_dir_all(dir)?;
    Ok((
        SpoolCamera::new(dir, role, poll_interval),
        SpoolDisplay::new(dir, role),
    ))
}

// =============================================================================
// Display
// =============================================================================

pub struct SpoolDisplay {
    path: PathBuf,
    temp_path: PathBuf,
}

impl SpoolDisplay {
    pub fn new(dir: &Path, role: SpoolRole) -> Self {
        let path = dir.join(role.own_file());
        let temp_path = dir.join(format!(".{}.tmp.png", role.own_file()));
        Self { path, temp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for SpoolDisplay {
    fn show(&mut self, image: &Image) -> Result<()> {
        save_png(image, &self.temp_path)?;
        fs::rename(&self.temp_path, &self.path)?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        for path in [&self.path, &self.temp_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

// =============================================================================
// Camera
// =============================================================================

pub struct SpoolCamera {
    dir: PathBuf,
    path: PathBuf,
    poll_interval: Duration,
}

impl SpoolCamera {
    pub fn new(dir: &Path, role: SpoolRole, poll_interval: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            path: dir.join(role.peer_file()),
            poll_interval,
        }
    }
}

impl FrameSource for SpoolCamera {
    fn capture(&mut self) -> Result<Image> {
        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }

        if !self.dir.is_dir() {
            return Err(channel_closed(format!(
                "spool directory {} is gone",
                self.dir.display()
            )));
        }

        if !self.path.exists() {
            return Ok(Image::empty());
        }

        // The peer may replace the file between the check and the read; that
        // is just a frame with nothing readable in it.
        match load_image(&self.path) {
            Ok(image) => Ok(image),
            Err(e) => {
                tracing::trace!("Spool capture unreadable: {}", e);
                Ok(Image::empty())
            }
        }
    }
}

// =============================================================================
// Image file helpers
// =============================================================================

pub fn save_png(image: &Image, path: &Path) -> Result<()> {
    let buf = image::GrayImage::from_raw(image.width(), image.height(), image.pixels().to_vec())
        .ok_or_else(|| LinkError::Display("image buffer does not match its size".into()))?;
    buf.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| LinkError::Display(format!("{}: {}", path.display(), e)))
}

pub fn load_image(path: &Path) -> Result<Image> {
    let decoded = image::open(path)
        .map_err(|e| LinkError::Codec(format!("{}: {}", path.display(), e)))?
        .to_luma8();
    let (w, h) = decoded.dimensions();
    Image::from_raw(w, h, decoded.into_raw())
        .ok_or_else(|| LinkError::Codec(format!("{}: inconsistent image size", path.display())))
}
