//! Compact, text-safe encoding of file bytes for storage in a cache bin.
//!
//! Bytes are zlib-compressed at the best level, backslash-escaped, then base64
//! encoded with `+`, `/` and `=` substituted by `-`, `_` and `,`.

use std::io::{Read, Write};

use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid base64 token: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Dangling escape at end of token")]
    DanglingEscape,
    #[error("Compression error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode raw bytes into a cache token.
pub fn encode(data: &[u8]) -> Result<String, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let escaped = add_slashes(&compressed);
    let token = base64::engine::general_purpose::STANDARD.encode(escaped);
    Ok(token
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            '=' => ',',
            c => c,
        })
        .collect())
}

/// Decode a cache token back into the raw bytes it was built from.
pub fn decode(token: &str) -> Result<Vec<u8>, CodecError> {
    let standard: String = token
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            ',' => '=',
            c => c,
        })
        .collect();

    let escaped = base64::engine::general_purpose::STANDARD.decode(standard)?;
    let compressed = strip_slashes(&escaped)?;

    let mut data = Vec::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut data)?;
    Ok(data)
}

/// Prefix quotes and backslashes with a backslash; NUL becomes `\0`.
fn add_slashes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &b in data {
        match b {
            0 => out.extend_from_slice(b"\\0"),
            b'\'' | b'"' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b => out.push(b),
        }
    }
    out
}

fn strip_slashes(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter();
    while let Some(&b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'0') => out.push(0),
            Some(&escaped) => out.push(escaped),
            None => return Err(CodecError::DanglingEscape),
        }
    }
    Ok(out)
}
