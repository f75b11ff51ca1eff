//! Offline playback of recorded captures.
//!
//! Plays every image in a directory in filename order (`cap_000.png`,
//! `cap_001.png`, ...) and then reports the source as closed, the way a video
//! file runs out of frames.

use crate::error::Result;
use crate::link::device::{channel_closed, FrameSource};
use crate::optical::spool::load_image;
use crate::optical::Image;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct ReplayCamera {
    frames: VecDeque<PathBuf>,
    played: usize,
}

impl ReplayCamera {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        frames.sort();

        tracing::debug!("Replaying {} captures from {}", frames.len(), dir.display());
        Ok(Self {
            frames: frames.into(),
            played: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

impl FrameSource for ReplayCamera {
    fn capture(&mut self) -> Result<Image> {
        let path = self.frames.pop_front().ok_or_else(|| {
            channel_closed(format!("replay exhausted after {} frames", self.played))
        })?;
        self.played += 1;

        // A corrupt recording is a frame with nothing readable, not a dead camera.
        Ok(load_image(&path).unwrap_or_else(|e| {
            tracing::warn!("Skipping unreadable capture: {}", e);
            Image::empty()
        }))
    }
}
