//! QR code codec.
//!
//! Encoding goes through `qrcode` and is rendered into our own [`Image`] so the
//! module size and quiet zone stay under our control. Decoding uses `rqrr`
//! straight from the greyscale buffer.

use crate::error::{LinkError, Result};
use crate::link::device::OpticalCodec;
use crate::optical::Image;
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};

/// Byte-mode capacity of the largest QR symbol (version 40) per EC level.
pub fn max_payload(ec: EcLevel) -> usize {
    match ec {
        EcLevel::L => 2953,
        EcLevel::M => 2331,
        EcLevel::Q => 1663,
        EcLevel::H => 1273,
    }
}

/// Parse an error correction level name (`L`, `M`, `Q`, `H`).
pub fn parse_ec_level(s: &str) -> Option<EcLevel> {
    match s.trim().to_ascii_uppercase().as_str() {
        "L" => Some(EcLevel::L),
        "M" => Some(EcLevel::M),
        "Q" => Some(EcLevel::Q),
        "H" => Some(EcLevel::H),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct QrCodec {
    ec_level: EcLevel,
    /// Pixels per module side.
    module_size: u32,
    /// Quiet zone width in modules.
    quiet_zone: u32,
}

impl QrCodec {
    pub fn new(ec_level: EcLevel, module_size: u32, quiet_zone: u32) -> Self {
        Self {
            ec_level,
            module_size: module_size.max(1),
            quiet_zone,
        }
    }
}

impl Default for QrCodec {
    fn default() -> Self {
        Self::new(EcLevel::L, 10, 5)
    }
}

impl OpticalCodec for QrCodec {
    fn encode(&self, payload: &[u8]) -> Result<Image> {
        let code = QrCode::with_error_correction_level(payload, self.ec_level).map_err(|e| {
            match e {
                QrError::DataTooLong => LinkError::CapacityExceeded { len: payload.len() },
                other => LinkError::Codec(other.to_string()),
            }
        })?;

        let modules = code.width() as u32;
        let side = (modules + 2 * self.quiet_zone) * self.module_size;
        let mut image = Image::filled(side, side, 255);

        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let mx = i as u32 % modules;
            let my = i as u32 / modules;
            image.fill_rect(
                (mx + self.quiet_zone) * self.module_size,
                (my + self.quiet_zone) * self.module_size,
                self.module_size,
                self.module_size,
                0,
            );
        }

        Ok(image)
    }

    fn decode(&self, image: &Image) -> Option<Vec<u8>> {
        if image.is_empty() {
            return None;
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            image.width() as usize,
            image.height() as usize,
            |x, y| image.pixel(x as u32, y as u32),
        );

        for grid in prepared.detect_grids() {
            let mut out = Vec::new();
            match grid.decode_to(&mut out) {
                Ok(_) => return Some(out),
                Err(e) => tracing::trace!("QR grid found but not decodable: {}", e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_roundtrip_small_payload() {
        let codec = QrCodec::new(EcLevel::L, 4, 4);
        let image = codec.encode(b"3SGVsbG8sIHdvcmxkIQ==").unwrap();
        assert_eq!(image.width(), image.height());
        assert_eq!(codec.decode(&image), Some(b"3SGVsbG8sIHdvcmxkIQ==".to_vec()));
    }

    #[test]
    fn test_qr_decode_blank_frame() {
        let codec = QrCodec::default();
        assert_eq!(codec.decode(&Image::empty()), None);
        assert_eq!(codec.decode(&Image::filled(120, 120, 255)), None);
    }

    #[test]
    fn test_qr_rejects_oversized_payload() {
        let codec = QrCodec::new(EcLevel::H, 1, 0);
        let payload = vec![b'A'; max_payload(EcLevel::H) * 2];
        match codec.encode(&payload) {
            Err(LinkError::CapacityExceeded { len }) => assert_eq!(len, payload.len()),
            other => panic!("Expected CapacityExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ec_level() {
        assert_eq!(parse_ec_level("l"), Some(EcLevel::L));
        assert_eq!(parse_ec_level(" H "), Some(EcLevel::H));
        assert_eq!(parse_ec_level("X"), None);
    }
}
