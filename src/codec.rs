//! Payload compression applied before signing and reversed on verification.
//!
//! The codec name travels in the JOSE header `zip` parameter.  `DEF` is raw
//! deflate (RFC 1951); zlib-wrapped payloads, as produced by some older
//! issuers, are accepted on the way back in.

use std::fmt::Debug;
use std::io::{self, Read};
use std::sync::Arc;

use flate2::read::{DeflateDecoder, DeflateEncoder, GzDecoder, GzEncoder, ZlibDecoder};
use flate2::Compression;

/// Upper bound on a decompressed payload. Anything larger is refused.
pub const MAX_DECOMPRESSED_LEN: u64 = 256 * 1024;

pub trait CompressionCodec: Debug + Send + Sync {
    /// Value written to the `zip` header.
    fn algorithm(&self) -> &str;

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

/// Maps a `zip` header value to the codec able to reverse it.
pub trait CodecResolver: Debug + Send + Sync {
    fn resolve(&self, algorithm: &str) -> Option<Arc<dyn CompressionCodec>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCodec;

impl CompressionCodec for DeflateCodec {
    fn algorithm(&self) -> &str {
        "DEF"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        DeflateEncoder::new(data, Compression::default()).read_to_end(&mut out)?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        read_bounded(DeflateDecoder::new(data))
            .or_else(|err| read_bounded(ZlibDecoder::new(data)).map_err(|_| err))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn algorithm(&self) -> &str {
        "GZIP"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        GzEncoder::new(data, Compression::default()).read_to_end(&mut out)?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        read_bounded(GzDecoder::new(data))
    }
}

fn read_bounded(decoder: impl Read) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_LEN + 1)
        .read_to_end(&mut out)?;
    if out.len() as u64 > MAX_DECOMPRESSED_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed payload exceeds {MAX_DECOMPRESSED_LEN} bytes"),
        ));
    }
    Ok(out)
}

/// Resolves the two built-in codecs, case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodecResolver;

impl CodecResolver for DefaultCodecResolver {
    fn resolve(&self, algorithm: &str) -> Option<Arc<dyn CompressionCodec>> {
        codec_for_name(algorithm)
    }
}

/// Look up a built-in codec by its `zip` name.
pub fn codec_for_name(name: &str) -> Option<Arc<dyn CompressionCodec>> {
    match name.trim().to_ascii_uppercase().as_str() {
        "DEF" | "DEFLATE" => Some(Arc::new(DeflateCodec)),
        "GZIP" => Some(Arc::new(GzipCodec)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    const CLAIMS: &[u8] = br#"{"sub":"Jwt test","roles":"admin,stu","perms":"user:del"}"#;

    #[test]
    fn deflate_reverses_itself() {
        let packed = DeflateCodec.compress(CLAIMS).unwrap();
        assert_ne!(packed.as_slice(), CLAIMS);
        assert_eq!(DeflateCodec.decompress(&packed).unwrap(), CLAIMS);
    }

    #[test]
    fn deflate_accepts_zlib_wrapped_input() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(CLAIMS).unwrap();
        let zlib = encoder.finish().unwrap();
        assert_eq!(DeflateCodec.decompress(&zlib).unwrap(), CLAIMS);
    }

    #[test]
    fn gzip_reverses_itself() {
        let packed = GzipCodec.compress(CLAIMS).unwrap();
        assert_eq!(GzipCodec.decompress(&packed).unwrap(), CLAIMS);
    }

    #[test]
    fn gzip_rejects_garbage() {
        assert!(GzipCodec.decompress(b"not gzip at all").is_err());
    }

    #[test]
    fn oversized_payloads_are_refused() {
        let bomb = vec![b'a'; MAX_DECOMPRESSED_LEN as usize + 1];
        for codec in [&DeflateCodec as &dyn CompressionCodec, &GzipCodec] {
            let packed = codec.compress(&bomb).unwrap();
            let err = codec.decompress(&packed).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData, "{}", codec.algorithm());
        }

        let at_limit = vec![b'a'; MAX_DECOMPRESSED_LEN as usize];
        let packed = DeflateCodec.compress(&at_limit).unwrap();
        assert_eq!(DeflateCodec.decompress(&packed).unwrap().len(), at_limit.len());
    }

    #[test]
    fn resolver_knows_builtin_names() {
        let resolver = DefaultCodecResolver;
        assert_eq!(resolver.resolve("DEF").unwrap().algorithm(), "DEF");
        assert_eq!(resolver.resolve("gzip").unwrap().algorithm(), "GZIP");
        assert!(resolver.resolve("BR").is_none());
    }
}
