//! Inline attachments carried as `data:` URIs inside messages.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::constants::MAX_ATTACHMENT_BYTES;
use crate::error::MediaError;

/// Encode raw bytes as a base64 `data:` URI.
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 `data:` URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), MediaError> {
    let rest = uri.strip_prefix("data:").ok_or(MediaError::NotDataUri)?;
    let (mime_type, payload) = rest.split_once(";base64,").ok_or(MediaError::NotBase64)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| MediaError::InvalidPayload)?;
    Ok((mime_type.to_string(), bytes))
}

/// Decoded size of a `data:` URI without allocating the payload.
///
/// Non data URIs (remote links) count as zero bytes.
pub fn attachment_size(uri: &str) -> usize {
    match uri.strip_prefix("data:").and_then(|r| r.split_once(";base64,")) {
        Some((_, payload)) => {
            let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
            ((payload.len() / 4) * 3 + (payload.len() % 4) * 3 / 4).saturating_sub(padding.min(2))
        }
        None => 0,
    }
}

/// Reject attachments larger than [`MAX_ATTACHMENT_BYTES`].
pub fn check_attachment(uri: &str) -> Result<(), MediaError> {
    let size = attachment_size(uri);
    if size > MAX_ATTACHMENT_BYTES {
        return Err(MediaError::TooLarge {
            size,
            max: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}
