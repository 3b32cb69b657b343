//! One-time-password codec: secret generation, RFC 4226/6238 HOTP/TOTP,
//! backup and challenge codes, E.164 validation, otpauth provisioning URIs.
//! Pure functions; no storage access.

use hmac::{Hmac, Mac};
use rand::RngExt;
use sha1::Sha1;

use crate::domain::types::{
    BACKUP_CODE_BYTES, BACKUP_CODE_COUNT, CHALLENGE_CODE_LEN, TOTP_DIGITS, TOTP_SECRET_BYTES,
    TOTP_SKEW_STEPS, TOTP_STEP_SECS,
};

/// A stored TOTP secret that cannot be decoded as RFC 4648 base32.
#[derive(Debug, thiserror::Error)]
#[error("invalid base32 TOTP secret")]
pub struct InvalidSecret;

/// Generate a fresh TOTP secret: 20 random bytes, base32 (A–Z2–7),
/// no padding, upper-case.
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..TOTP_SECRET_BYTES)
        .map(|_| rng.random_range(0u8..=u8::MAX))
        .collect();
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes)
}

/// Current 30-second time counter for a Unix timestamp.
pub fn time_counter(unix_secs: u64) -> u64 {
    unix_secs / TOTP_STEP_SECS
}

/// HOTP (RFC 4226): HMAC-SHA1 over the 8-byte big-endian counter,
/// dynamic truncation, 6 decimal digits zero-padded.
pub fn hotp(key: &[u8], counter: u64) -> Result<String, InvalidSecret> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(|_| InvalidSecret)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Low 4 bits of the final byte select the truncation offset.
    let offset = (digest[19] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    Ok(format!("{:06}", binary % 1_000_000))
}

/// TOTP value for a base32 secret at a given time counter.
pub fn totp(secret: &str, counter: u64) -> Result<String, InvalidSecret> {
    let key = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, secret)
        .ok_or(InvalidSecret)?;
    hotp(&key, counter)
}

/// Verify a submitted token against the secret within the ±2-step skew
/// window. The current step is checked first (the common case); any of
/// the five steps is accepted. Malformed tokens verify as false.
pub fn verify_totp(secret: &str, token: &str, unix_secs: u64) -> Result<bool, InvalidSecret> {
    if token.len() != TOTP_DIGITS || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }
    let current = time_counter(unix_secs) as i64;
    let mut offsets = vec![0i64];
    for step in 1..=TOTP_SKEW_STEPS as i64 {
        offsets.push(-step);
        offsets.push(step);
    }
    for offset in offsets {
        let counter = current + offset;
        if counter < 0 {
            continue;
        }
        let expected = totp(secret, counter as u64)?;
        if constant_time_eq::constant_time_eq(expected.as_bytes(), token.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Issue a batch of single-use recovery codes: `byte_len` random bytes
/// each, hex-encoded upper-case.
pub fn generate_backup_codes(count: usize, byte_len: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let bytes: Vec<u8> = (0..byte_len)
                .map(|_| rng.random_range(0u8..=u8::MAX))
                .collect();
            hex::encode_upper(bytes)
        })
        .collect()
}

/// Default backup-code batch (10 codes of 8 bytes / 16 hex chars).
pub fn default_backup_codes() -> Vec<String> {
    generate_backup_codes(BACKUP_CODE_COUNT, BACKUP_CODE_BYTES)
}

/// Charset for SMS/email verification codes.
const DIGITS: &[u8] = b"0123456789";

/// 6-digit numeric verification code from the CSPRNG.
pub fn generate_challenge_code() -> String {
    let mut rng = rand::rng();
    (0..CHALLENGE_CODE_LEN)
        .map(|_| DIGITS[rng.random_range(0..DIGITS.len())] as char)
        .collect()
}

/// E.164 shape: leading `+`, first digit 1–9, 5–15 digits total.
pub fn validate_phone_number(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('+') else {
        return false;
    };
    (5..=15).contains(&digits.len())
        && !digits.starts_with('0')
        && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Provisioning URI for authenticator apps. Issuer and account segments
/// are percent-encoded; the secret is base32 and passes through as-is.
pub fn otpauth_uri(secret: &str, account: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account),
        secret,
        urlencoding::encode(issuer),
    )
}
