//! Image retrieval
//!
//! Images arrive as a raw JPEG stream right after the request. There is no
//! length header: reading stops at the JPEG end-of-image marker or when the
//! caller's size limit is reached, whichever comes first.

use serde::{Deserialize, Serialize};

use crate::protocol::{ProtocolError, Request, RequestKind, Session};

/// JPEG end-of-image marker
pub const END_OF_IMAGE: [u8; 2] = [0xFF, 0xD9];

/// Size limit for camera images (clear or damaged)
pub const CAMERA_IMAGE_LIMIT: usize = 81_000;

/// Size limit for GPS map images
pub const GPS_IMAGE_LIMIT: usize = 150_000;

/// Which camera image to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    /// Error-free image
    Clear,
    /// Image with injected transmission errors
    Damaged,
}

impl ImageKind {
    pub fn request_kind(&self) -> RequestKind {
        match self {
            ImageKind::Clear => RequestKind::Image,
            ImageKind::Damaged => RequestKind::DamagedImage,
        }
    }

    /// File stem of the saved image
    pub fn file_stem(&self) -> &'static str {
        match self {
            ImageKind::Clear => "image",
            ImageKind::Damaged => "damagedimage",
        }
    }
}

/// Send `request` and read the image it returns.
///
/// Returns only the bytes actually received, at most `limit` of them; the
/// end-of-image marker is included when it was seen.
pub fn receive_image(
    session: &mut Session,
    request: &Request,
    limit: usize,
) -> Result<Vec<u8>, ProtocolError> {
    session.send(request)?;

    let mut image = Vec::with_capacity(limit.min(CAMERA_IMAGE_LIMIT));
    while image.len() < limit {
        image.push(session.read_byte()?);
        if image.ends_with(&END_OF_IMAGE) {
            break;
        }
    }

    tracing::debug!(
        request = %request,
        bytes = image.len(),
        complete = image.ends_with(&END_OF_IMAGE),
        "image received"
    );
    Ok(image)
}
