use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::codec::{codec_for_name, CodecResolver, CompressionCodec, DeflateCodec, DefaultCodecResolver};
use crate::error::AuthError;

/// Per-repository settings, read-only once the repository is built.
///
/// Build with [`new`](Self::new) or [`from_env`](Self::from_env) and adjust
/// with the chained setters.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Tolerance applied to `nbf`/`exp` checks.  Zero disables it.
    pub allowed_clock_skew: Duration,
    /// Codec applied to issued payloads; `None` issues plain JWS tokens.
    pub compress_with: Option<Arc<dyn CompressionCodec>>,
    /// Resolves the `zip` header of incoming tokens.
    pub codec_resolver: Arc<dyn CodecResolver>,
    pub clock: Arc<dyn Clock>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtConfig {
    /// No clock skew, `DEF` compression, wall-clock time.
    pub fn new() -> Self {
        Self {
            allowed_clock_skew: Duration::ZERO,
            compress_with: Some(Arc::new(DeflateCodec)),
            codec_resolver: Arc::new(DefaultCodecResolver),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build from environment variables already set in the process.
    ///
    /// | Variable              | Default | Notes                         |
    /// |-----------------------|---------|-------------------------------|
    /// | `JWT_CLOCK_SKEW_SECS` | `0`     | Allowed clock skew in seconds |
    /// | `JWT_COMPRESSION`     | `DEF`   | `DEF`, `GZIP` or `NONE`       |
    pub fn from_env() -> Result<Self, AuthError> {
        let mut config = Self::new();

        if let Ok(raw) = std::env::var("JWT_CLOCK_SKEW_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AuthError::Config(format!("JWT_CLOCK_SKEW_SECS is not a number: {raw:?}"))
            })?;
            config.allowed_clock_skew = Duration::from_secs(secs);
        }

        if let Ok(raw) = std::env::var("JWT_COMPRESSION") {
            config.compress_with = parse_compression(&raw)?;
        }

        Ok(config)
    }

    pub fn allowed_clock_skew(mut self, v: Duration) -> Self {
        self.allowed_clock_skew = v;
        self
    }
    pub fn compress_with(mut self, v: Arc<dyn CompressionCodec>) -> Self {
        self.compress_with = Some(v);
        self
    }
    pub fn uncompressed(mut self) -> Self {
        self.compress_with = None;
        self
    }
    pub fn codec_resolver(mut self, v: Arc<dyn CodecResolver>) -> Self {
        self.codec_resolver = v;
        self
    }
    pub fn clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.clock = v;
        self
    }
}

fn parse_compression(raw: &str) -> Result<Option<Arc<dyn CompressionCodec>>, AuthError> {
    let name = raw.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    codec_for_name(name)
        .map(Some)
        .ok_or_else(|| AuthError::Config(format!("unknown compression codec {name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GzipCodec;

    #[test]
    fn defaults() {
        let cfg = JwtConfig::new();
        assert_eq!(cfg.allowed_clock_skew, Duration::ZERO);
        assert_eq!(cfg.compress_with.as_ref().map(|c| c.algorithm()), Some("DEF"));
    }

    #[test]
    fn setters_chain() {
        let cfg = JwtConfig::new()
            .allowed_clock_skew(Duration::from_secs(30))
            .compress_with(Arc::new(GzipCodec));
        assert_eq!(cfg.allowed_clock_skew.as_secs(), 30);
        assert_eq!(cfg.compress_with.as_ref().map(|c| c.algorithm()), Some("GZIP"));
        assert!(cfg.uncompressed().compress_with.is_none());
    }

    #[test]
    fn compression_names() {
        assert!(parse_compression("NONE").unwrap().is_none());
        assert!(parse_compression("").unwrap().is_none());
        assert_eq!(parse_compression("gzip").unwrap().unwrap().algorithm(), "GZIP");
        assert!(matches!(parse_compression("lz4"), Err(AuthError::Config(_))));
    }
}
