//! Scripted camera and recording screen.
//!
//! The camera plays back a fixed list of captures and then reports the source
//! closed; the screen keeps everything it was asked to show. Together they let
//! a single engine be driven step by step without a peer.

use crate::error::Result;
use crate::link::device::{channel_closed, FrameSink, FrameSource, OpticalCodec};
use crate::optical::Image;
use std::collections::VecDeque;

#[derive(Default)]
pub struct ScriptedCamera {
    script: VecDeque<Image>,
}

impl ScriptedCamera {
    pub fn new(script: Vec<Image>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Script a capture of each payload as rendered by `codec`; `None`
    /// entries are frames with nothing in view.
    pub fn from_payloads<C: OpticalCodec>(codec: &C, payloads: &[Option<&[u8]>]) -> Result<Self> {
        let script = payloads
            .iter()
            .map(|p| match p {
                Some(bytes) => codec.encode(bytes),
                None => Ok(Image::empty()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(script))
    }

    pub fn push(&mut self, image: Image) {
        self.script.push_back(image);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameSource for ScriptedCamera {
    fn capture(&mut self) -> Result<Image> {
        self.script
            .pop_front()
            .ok_or_else(|| channel_closed("capture script exhausted"))
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    shown: Vec<Image>,
    releases: usize,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> &[Image] {
        &self.shown
    }

    /// Everything shown, decoded back through `codec`.
    pub fn decoded<C: OpticalCodec>(&self, codec: &C) -> Vec<Vec<u8>> {
        self.shown.iter().filter_map(|img| codec.decode(img)).collect()
    }

    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl FrameSink for RecordingDisplay {
    fn show(&mut self, image: &Image) -> Result<()> {
        self.shown.push(image.clone());
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.releases += 1;
        Ok(())
    }
}
