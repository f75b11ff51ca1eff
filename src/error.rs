//! Error types shared by the link engines and optical adapters.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    /// The file to transmit could not be resolved or opened.
    #[error("Cannot access source file {path}: {source}")]
    SourceAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The frame source can produce no further frames (camera gone, spool removed).
    #[error("Frame source closed: {0}")]
    ChannelClosed(String),

    /// Opening or writing the reception output failed.
    #[error("Destination file error at {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Payload of {len} bytes exceeds the codec capacity")]
    CapacityExceeded { len: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The session was aborted by the operator before the end-of-transmission handshake.
    #[error("Session interrupted before end of transmission")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LinkError {
    /// Whether this error means the optical channel itself is gone.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, LinkError::ChannelClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
