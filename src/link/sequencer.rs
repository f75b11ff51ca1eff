//! Sequencer: turns a file into the ordered frame stream.
//!
//! One FILENAME frame (tag 0), then DATA frames of `chunk_size` bytes (the
//! last may be shorter, none is empty), then one EOT frame. Every frame takes
//! the next tag mod 10.

use crate::error::{LinkError, Result};
use crate::link::frame::{Frame, Tag};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Default bytes per DATA frame; fits a QR code at low density.
pub const DEFAULT_CHUNK_SIZE: usize = 45;

/// Total frames produced for a file of `len` bytes.
pub fn frame_count(len: u64, chunk_size: usize) -> u64 {
    2 + len.div_ceil(chunk_size.max(1) as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Filename,
    Data,
    End,
    Finished,
}

pub struct Sequencer<R = BufReader<File>> {
    name: String,
    reader: R,
    chunk_size: usize,
    next_tag: Tag,
    stage: Stage,
}

impl Sequencer<BufReader<File>> {
    /// Open `path` for sequencing. Fails before any frame exists if the file
    /// cannot be opened.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| LinkError::SourceAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_reader(name, BufReader::new(file), chunk_size))
    }
}

impl<R: Read> Sequencer<R> {
    pub fn from_reader(name: impl Into<String>, reader: R, chunk_size: usize) -> Self {
        Self {
            name: name.into(),
            reader,
            chunk_size: chunk_size.max(1),
            next_tag: Tag::FIRST,
            stage: Stage::Filename,
        }
    }

    fn take_tag(&mut self) -> Tag {
        let tag = self.next_tag;
        self.next_tag = tag.next();
        tag
    }

    /// Fill one chunk, looping over short reads until full or EOF.
    fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut chunk)?;
        Ok(chunk)
    }
}

impl<R: Read> Iterator for Sequencer<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Filename => {
                self.stage = Stage::Data;
                let tag = self.take_tag();
                Some(Ok(Frame::filename(tag, self.name.clone())))
            }
            Stage::Data => match self.read_chunk() {
                Ok(chunk) if chunk.is_empty() => {
                    self.stage = Stage::Finished;
                    let tag = self.take_tag();
                    Some(Ok(Frame::end(tag)))
                }
                Ok(chunk) => {
                    if chunk.len() < self.chunk_size {
                        self.stage = Stage::End;
                    }
                    let tag = self.take_tag();
                    Some(Ok(Frame::data(tag, Bytes::from(chunk))))
                }
                Err(e) => {
                    self.stage = Stage::Finished;
                    Some(Err(e.into()))
                }
            },
            Stage::End => {
                self.stage = Stage::Finished;
                let tag = self.take_tag();
                Some(Ok(Frame::end(tag)))
            }
            Stage::Finished => None,
        }
    }
}
