//! Hosted vision-language-model integration.
//!
//! Speaks the OpenAI-style chat-completions protocol with interleaved
//! text / base64-image message content, in both batched and streamed form.

pub mod client;
pub mod prompt;

pub use client::{ContentPart, Message, MessageContent, VlmClient};

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};

/// Read an image file and return it as a `data:` URL with base64 payload.
pub fn encode_image_data_url(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::not_found(format!(
            "Image not found: {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    Ok(data_url_from_bytes(&bytes))
}

/// Base64-encode raw JPEG bytes into a `data:` URL.
pub fn data_url_from_bytes(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_and_payload() {
        let url = data_url_from_bytes(b"hello");
        assert_eq!(url, "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = encode_image_data_url(Path::new("/nonexistent/image.jpg")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn encodes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.jpg");
        std::fs::write(&path, b"\xff\xd8\xff").unwrap();

        let url = encode_image_data_url(&path).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
