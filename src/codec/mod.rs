//! Decoder registry: one stream decoder per compression kind.
//!
//! # Identity rules
//! A cluster names its compression with the low nibble of the cluster info
//! byte.  Those values are frozen by the archive format and are never
//! reassigned, even for kinds this build cannot decode.
//!
//! # Build features
//! Each real codec sits behind a cargo feature (`zlib`, `lzma`, `zstd`).
//! A kind whose feature is compiled out resolves to
//! [`CodecError::Unavailable`] at runtime; callers never need `cfg` of their
//! own.  bzip2 is recognised but has no decoder in any build.

use std::fmt;
use std::io::{self, Read};

use serde::Serialize;
use thiserror::Error;

mod stream;

pub use stream::DecodeStream;

// ── Compression kind ─────────────────────────────────────────────────────────

/// Compression kind carried in bits 0..3 of the cluster info byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Compression {
    /// Legacy "default" marker; payload is stored verbatim.
    Default = 0,
    /// Payload stored verbatim.
    None    = 1,
    Zlib    = 2,
    Bzip2   = 3,
    /// xz container around an LZMA2 stream.
    Lzma    = 4,
    Zstd    = 5,
}

impl Compression {
    /// Resolve a 4-bit flag value.  Returns `None` for values the format does
    /// not define (6..15).
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Compression::Default),
            1 => Some(Compression::None),
            2 => Some(Compression::Zlib),
            3 => Some(Compression::Bzip2),
            4 => Some(Compression::Lzma),
            5 => Some(Compression::Zstd),
            _ => None,
        }
    }

    /// Human-readable name (diagnostics only, never parsed).
    pub fn name(self) -> &'static str {
        match self {
            Compression::Default => "default",
            Compression::None    => "none",
            Compression::Zlib    => "zlib",
            Compression::Bzip2   => "bzip2",
            Compression::Lzma    => "lzma",
            Compression::Zstd    => "zstd",
        }
    }

    /// `true` for every kind whose payload needs a stream decoder.
    #[inline]
    pub fn is_compressed(self) -> bool {
        !matches!(self, Compression::Default | Compression::None)
    }

    /// `true` if this build can read clusters of this kind.
    pub fn is_available(self) -> bool {
        !self.is_compressed() || get_codec(self).is_ok()
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    /// The kind is part of the format but this build carries no decoder.
    #[error("{0} compression is not available in this build")]
    Unavailable(Compression),
    /// Stored kinds have no decoder; they are read directly.
    #[error("{0} is not a stream codec")]
    NotAStreamCodec(Compression),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// Forward-only input handed to a decoder.
pub type DecodeInput = Box<dyn Read + Send>;

/// Forward-only decoded output.
pub type DecodeOutput = Box<dyn Read + Send>;

pub trait Codec: Send + Sync {
    fn compression(&self) -> Compression;

    /// Wrap `input` in a reader yielding decompressed bytes.
    fn decoder(&self, input: DecodeInput) -> Result<DecodeOutput, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

#[cfg(feature = "zstd")]
pub struct ZstdCodec;

#[cfg(feature = "zstd")]
impl Codec for ZstdCodec {
    fn compression(&self) -> Compression { Compression::Zstd }
    fn decoder(&self, input: DecodeInput) -> Result<DecodeOutput, CodecError> {
        Ok(Box::new(zstd::stream::read::Decoder::new(input)?))
    }
}

#[cfg(feature = "zlib")]
pub struct ZlibCodec;

#[cfg(feature = "zlib")]
impl Codec for ZlibCodec {
    fn compression(&self) -> Compression { Compression::Zlib }
    fn decoder(&self, input: DecodeInput) -> Result<DecodeOutput, CodecError> {
        Ok(Box::new(flate2::read::ZlibDecoder::new(input)))
    }
}

#[cfg(feature = "lzma")]
pub struct LzmaCodec;

#[cfg(feature = "lzma")]
impl Codec for LzmaCodec {
    fn compression(&self) -> Compression { Compression::Lzma }
    /// Single-stream xz decoder.  It reports end of stream at the xz footer,
    /// so bytes that follow the cluster in the archive are never parsed.
    fn decoder(&self, input: DecodeInput) -> Result<DecodeOutput, CodecError> {
        Ok(Box::new(xz2::read::XzDecoder::new(input)))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a compression kind to a built-in decoder.
///
/// Returns `Err(CodecError::Unavailable)` if the kind is compiled out or has
/// no decoder at all (bzip2).  The caller MUST NOT fall back to another
/// codec.
pub fn get_codec(kind: Compression) -> Result<Box<dyn Codec>, CodecError> {
    match kind {
        Compression::Default | Compression::None => Err(CodecError::NotAStreamCodec(kind)),
        #[cfg(feature = "zlib")]
        Compression::Zlib => Ok(Box::new(ZlibCodec)),
        #[cfg(feature = "lzma")]
        Compression::Lzma => Ok(Box::new(LzmaCodec)),
        #[cfg(feature = "zstd")]
        Compression::Zstd => Ok(Box::new(ZstdCodec)),
        _ => Err(CodecError::Unavailable(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values_are_frozen() {
        for flag in 0u8..6 {
            let kind = Compression::from_flag(flag).unwrap();
            assert_eq!(kind as u8, flag);
        }
        for flag in 6u8..16 {
            assert!(Compression::from_flag(flag).is_none());
        }
    }

    #[test]
    fn stored_kinds_have_no_decoder() {
        assert!(matches!(
            get_codec(Compression::None),
            Err(CodecError::NotAStreamCodec(Compression::None))
        ));
        assert!(Compression::Default.is_available());
        assert!(!Compression::Default.is_compressed());
    }

    #[test]
    fn bzip2_is_never_available() {
        assert!(matches!(
            get_codec(Compression::Bzip2),
            Err(CodecError::Unavailable(Compression::Bzip2))
        ));
        assert!(!Compression::Bzip2.is_available());
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_decoder_streams() {
        use std::io::Write;

        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"zlib payload").unwrap();
        let packed = enc.finish().unwrap();

        let codec = get_codec(Compression::Zlib).unwrap();
        assert_eq!(codec.compression(), Compression::Zlib);
        let mut out = Vec::new();
        codec
            .decoder(Box::new(io::Cursor::new(packed)))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"zlib payload");
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_decoder_streams() {
        let packed = zstd::encode_all(&b"zstd payload"[..], 3).unwrap();
        let mut out = Vec::new();
        get_codec(Compression::Zstd)
            .unwrap()
            .decoder(Box::new(io::Cursor::new(packed)))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"zstd payload");
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn xz_decoder_stops_at_stream_end() {
        let mut packed = Vec::new();
        lzma_rs::xz_compress(&mut &b"xz payload"[..], &mut packed).unwrap();
        packed.extend_from_slice(&[0xAB; 64]);

        let mut reader = get_codec(Compression::Lzma)
            .unwrap()
            .decoder(Box::new(io::Cursor::new(packed)))
            .unwrap();
        let mut head = [0u8; 2];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"xz");
        let mut rest = [0u8; 8];
        reader.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b" payload");
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn xz_rejects_garbage() {
        let mut reader = get_codec(Compression::Lzma)
            .unwrap()
            .decoder(Box::new(io::Cursor::new(vec![0u8; 32])))
            .unwrap();
        assert!(reader.read(&mut [0u8; 4]).is_err());
    }
}
