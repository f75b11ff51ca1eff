//! Session configuration loaded from TOML.
//!
//! Default location is `<config_dir>/qrlink/config.toml`. Every field is
//! optional in the file; command-line flags override what it sets.

use crate::error::{LinkError, Result};
use crate::link::frame::Frame;
use crate::link::{DEFAULT_CHUNK_SIZE, DEFAULT_GRACE_PERIOD};
use crate::optical::qr::{max_payload, parse_ec_level};
use crate::optical::QrCodec;
use qrcode::EcLevel;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "qrlink";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// File bytes per DATA frame
    pub chunk_size: usize,
    /// Receiver delay after the final ack, in milliseconds
    pub grace_period_ms: u64,
    /// Pixels per QR module
    pub module_size: u32,
    /// Quiet zone around the QR symbol, in modules
    pub quiet_zone: u32,
    /// QR error correction level: L, M, Q or H
    pub error_correction: String,
    /// Spool camera frame interval, in milliseconds
    pub poll_interval_ms: u64,
    /// Shared directory for the spool screen/camera pair
    pub spool_dir: PathBuf,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            grace_period_ms: DEFAULT_GRACE_PERIOD.as_millis() as u64,
            module_size: 10,
            quiet_zone: 5,
            error_correction: "L".to_string(),
            poll_interval_ms: 30,
            spool_dir: std::env::temp_dir().join(CONFIG_DIR_NAME),
        }
    }
}

impl LinkConfig {
    /// `<config_dir>/qrlink/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            LinkError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&raw)
            .map_err(|e| LinkError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| LinkError::Config(e.message().to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let ec = self.ec_level()?;
        if self.chunk_size == 0 {
            return Err(LinkError::Config("chunk_size must be at least 1".into()));
        }
        let frame_len = Frame::encoded_len(self.chunk_size);
        if frame_len > max_payload(ec) {
            return Err(LinkError::Config(format!(
                "chunk_size {} encodes to {} bytes, over the {} byte QR capacity at level {}",
                self.chunk_size,
                frame_len,
                max_payload(ec),
                self.error_correction
            )));
        }
        if self.module_size == 0 {
            return Err(LinkError::Config("module_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn ec_level(&self) -> Result<EcLevel> {
        parse_ec_level(&self.error_correction).ok_or_else(|| {
            LinkError::Config(format!(
                "Unknown error_correction {:?} (expected L, M, Q or H)",
                self.error_correction
            ))
        })
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn qr_codec(&self) -> Result<QrCodec> {
        Ok(QrCodec::new(self.ec_level()?, self.module_size, self.quiet_zone))
    }
}
