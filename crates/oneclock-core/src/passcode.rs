//! One-time passcode generation for the Duo passcode prompt.
//!
//! Supports HOTP and TOTP (RFC 4226 / RFC 6238) from an `otpauth://` URI, a
//! raw base32 HOTP secret, or a static code. HOTP counters persist in a
//! plain-text file, incremented immediately on every generation so a crashed
//! run never replays a counter.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::debug;
use url::Url;

use crate::error::PasscodeError;

/// Where the next Duo passcode comes from.
#[derive(Debug, Clone)]
pub enum PasscodeSource {
    /// Full `otpauth://hotp/...` or `otpauth://totp/...` URI, as exported by
    /// Duo enrollment. The counter file is only used for HOTP URIs.
    OtpUri { uri: String, counter_file: PathBuf },
    /// Raw base32 HOTP secret with defaults (6 digits).
    HotpSecret { secret: String, counter_file: PathBuf },
    /// Fixed passcode, useful for a one-shot run with a code read off the
    /// Duo app.
    Static(String),
}

impl PasscodeSource {
    /// Produce the current passcode, advancing the HOTP counter when one is
    /// involved.
    pub async fn generate(&self) -> Result<String, PasscodeError> {
        match self {
            PasscodeSource::OtpUri { uri, counter_file } => {
                let parsed = OtpParams::from_uri(uri)?;
                match parsed.kind {
                    OtpKind::Totp { period } => {
                        let code = totp(&parsed.secret, period, parsed.digits)?;
                        debug!(code = %mask_code(&code), "generated TOTP code");
                        Ok(code)
                    }
                    OtpKind::Hotp => {
                        let counter = CounterFile::new(counter_file).next().await?;
                        let code = hotp(&parsed.secret, counter, parsed.digits)?;
                        debug!(counter, code = %mask_code(&code), "generated HOTP code");
                        Ok(code)
                    }
                }
            }
            PasscodeSource::HotpSecret { secret, counter_file } => {
                let key = decode_secret(secret)?;
                let counter = CounterFile::new(counter_file).next().await?;
                let code = hotp(&key, counter, 6)?;
                debug!(counter, code = %mask_code(&code), "generated HOTP code");
                Ok(code)
            }
            PasscodeSource::Static(code) => Ok(code.clone()),
        }
    }
}

#[derive(Debug)]
enum OtpKind {
    Hotp,
    Totp { period: u64 },
}

#[derive(Debug)]
struct OtpParams {
    kind: OtpKind,
    secret: Vec<u8>,
    digits: u32,
}

impl OtpParams {
    fn from_uri(uri: &str) -> Result<Self, PasscodeError> {
        let url =
            Url::parse(uri).map_err(|e| PasscodeError::InvalidUri(e.to_string()))?;
        if url.scheme() != "otpauth" {
            return Err(PasscodeError::InvalidUri(format!(
                "unexpected scheme {}",
                url.scheme()
            )));
        }

        let mut secret = None;
        let mut digits = 6u32;
        let mut period = 30u64;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "secret" => secret = Some(v.into_owned()),
                "digits" => {
                    digits = v
                        .parse()
                        .map_err(|_| PasscodeError::InvalidUri("bad digits".into()))?;
                }
                "period" => {
                    period = v
                        .parse()
                        .map_err(|_| PasscodeError::InvalidUri("bad period".into()))?;
                }
                "algorithm" => {
                    if !v.eq_ignore_ascii_case("SHA1") {
                        return Err(PasscodeError::UnsupportedAlgorithm(v.into_owned()));
                    }
                }
                _ => {}
            }
        }

        let secret = secret
            .ok_or_else(|| PasscodeError::InvalidUri("missing secret".into()))?;
        let secret = decode_secret(&secret)?;

        let kind = match url.host_str() {
            Some(h) if h.eq_ignore_ascii_case("hotp") => OtpKind::Hotp,
            Some(h) if h.eq_ignore_ascii_case("totp") => OtpKind::Totp { period },
            other => {
                return Err(PasscodeError::InvalidUri(format!(
                    "unknown otp type {other:?}"
                )));
            }
        };

        Ok(OtpParams { kind, secret, digits })
    }
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, PasscodeError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let normalized = normalized.trim_end_matches('=');
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, normalized)
        .ok_or(PasscodeError::InvalidSecret)
}

/// RFC 4226 value for one counter.
pub fn hotp(secret: &[u8], counter: u64, digits: u32) -> Result<String, PasscodeError> {
    if !(6..=8).contains(&digits) {
        return Err(PasscodeError::UnsupportedDigits(digits));
    }
    let mut mac = Hmac::<Sha1>::new_from_slice(secret)
        .map_err(|_| PasscodeError::InvalidSecret)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation.
    let offset = (digest[19] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    let code = binary % 10u32.pow(digits);
    Ok(format!("{code:0width$}", width = digits as usize))
}

/// RFC 6238 value for the current time step.
pub fn totp(secret: &[u8], period: u64, digits: u32) -> Result<String, PasscodeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    hotp(secret, now / period.max(1), digits)
}

/// Single-integer counter file. `next` returns the current counter and
/// persists its successor before the value is used anywhere.
pub struct CounterFile<'a> {
    path: &'a Path,
}

impl<'a> CounterFile<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    pub async fn next(&self) -> Result<u64, PasscodeError> {
        let counter = match tokio::fs::read_to_string(self.path).await {
            Ok(s) => s.trim().parse().unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(PasscodeError::CounterFile {
                    path: self.path.to_path_buf(),
                    source: e,
                });
            }
        };
        tokio::fs::write(self.path, (counter + 1).to_string())
            .await
            .map_err(|e| PasscodeError::CounterFile {
                path: self.path.to_path_buf(),
                source: e,
            })?;
        Ok(counter)
    }
}

/// Hide all but the last two digits. Full codes only appear at debug level.
pub fn mask_code(code: &str) -> String {
    let n = code.chars().count();
    if n <= 2 {
        return "*".repeat(n);
    }
    let tail: String = code.chars().skip(n - 2).collect();
    format!("{}{}", "*".repeat(n - 2), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4226 appendix D vectors, ASCII secret "12345678901234567890".
    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn hotp_rfc4226_vectors() {
        assert_eq!(hotp(RFC_SECRET, 0, 6).unwrap(), "755224");
        assert_eq!(hotp(RFC_SECRET, 1, 6).unwrap(), "287082");
        assert_eq!(hotp(RFC_SECRET, 2, 6).unwrap(), "359152");
    }

    #[test]
    fn hotp_rejects_odd_digit_counts() {
        assert!(matches!(
            hotp(RFC_SECRET, 0, 4),
            Err(PasscodeError::UnsupportedDigits(4))
        ));
        assert!(matches!(
            hotp(RFC_SECRET, 0, 9),
            Err(PasscodeError::UnsupportedDigits(9))
        ));
    }

    #[test]
    fn secret_decoding_normalizes_case_whitespace_and_padding() {
        // "MZXW6YTB" decodes to "fooba".
        assert_eq!(decode_secret("mzxw 6ytb==").unwrap(), b"fooba");
        assert!(decode_secret("not!base32").is_err());
    }

    #[test]
    fn mask_keeps_last_two_digits() {
        assert_eq!(mask_code("755224"), "****24");
        assert_eq!(mask_code("12"), "**");
        assert_eq!(mask_code(""), "");
    }

    #[tokio::test]
    async fn counter_file_advances_per_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter");
        let file = CounterFile::new(&path);
        assert_eq!(file.next().await.unwrap(), 0);
        assert_eq!(file.next().await.unwrap(), 1);
        assert_eq!(file.next().await.unwrap(), 2);
        let on_disk = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(on_disk.trim(), "3");
    }

    #[tokio::test]
    async fn hotp_source_yields_distinct_consecutive_codes() {
        let dir = tempfile::tempdir().unwrap();
        let src = PasscodeSource::HotpSecret {
            // "12345678901234567890" in base32.
            secret: "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".into(),
            counter_file: dir.path().join("counter"),
        };
        let a = src.generate().await.unwrap();
        let b = src.generate().await.unwrap();
        assert_eq!(a, "755224");
        assert_eq!(b, "287082");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn hotp_uri_honors_digits() {
        let dir = tempfile::tempdir().unwrap();
        let src = PasscodeSource::OtpUri {
            uri: "otpauth://hotp/Duo?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ&digits=8"
                .into(),
            counter_file: dir.path().join("counter"),
        };
        let code = src.generate().await.unwrap();
        assert_eq!(code.len(), 8);
        assert!(code.ends_with("755224"));
    }

    #[test]
    fn uri_with_unknown_algorithm_is_rejected() {
        let err = OtpParams::from_uri(
            "otpauth://totp/Duo?secret=MZXW6YTB&algorithm=SHA256",
        )
        .unwrap_err();
        assert!(matches!(err, PasscodeError::UnsupportedAlgorithm(_)));
    }
}
