//! Locally synthesized stand-ins for security headers.
//!
//! None of these values are derived the way the seller centre derives them.
//! They only reproduce the observed shape (length, alphabet, separators) and
//! are used when a live value could not be captured. Whether the remote
//! service accepts them is discovered from response codes, nothing more.

use chrono::Utc;
use rand::Rng;

/// Frontend build version the seller centre stamps into `sc-fe-ver`.
pub const FRONTEND_VERSION: &str = "21.105196";

const UPPER_HEX: &[u8] = b"ABCDEF0123456789";
const LOWER_HEX: &[u8] = b"0123456789abcdef";
const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const SECURITY_BLOB_LEN: usize = 1_364;
const SECURITY_BLOB_MUTATIONS: usize = 10;

/// Source of fallback header values. Swappable so tests can pin them.
pub trait TokenSynthesizer: Send + Sync {
    /// `sc-fe-session`: 16 uppercase hex characters.
    fn session_id(&self) -> String;

    /// `x-sap-ri`: 52 lowercase hex characters.
    fn request_integrity(&self) -> String;

    /// `x-sap-sec`: large opaque base64-looking blob.
    fn security_blob(&self) -> String;

    /// `sc-fe-ver`.
    fn frontend_version(&self) -> String {
        FRONTEND_VERSION.to_string()
    }

    /// `sz-dfp`: device fingerprint.
    fn device_fingerprint(&self) -> String;

    /// `af-ac-enc-sz-token`: anti-forgery token.
    fn anti_forgery_token(&self) -> String;

    /// `upload-session-id`: fresh for every mutating call.
    fn upload_session_id(&self) -> String;

    /// Session id embedded in usage-metrics reports.
    fn metrics_session_id(&self) -> String;
}

/// Default synthesizer backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokens;

impl TokenSynthesizer for RandomTokens {
    fn session_id(&self) -> String {
        random_from(UPPER_HEX, 16)
    }

    fn request_integrity(&self) -> String {
        random_from(LOWER_HEX, 52)
    }

    fn security_blob(&self) -> String {
        let mut blob: Vec<u8> = random_from(BASE64_ALPHABET, SECURITY_BLOB_LEN).into_bytes();
        let mut rng = rand::rng();
        for _ in 0..SECURITY_BLOB_MUTATIONS {
            let pos = rng.random_range(0..blob.len());
            blob[pos] = BASE64_ALPHABET[rng.random_range(0..BASE64_ALPHABET.len())];
        }
        let mut blob = String::from_utf8_lossy(&blob).into_owned();
        blob.push('=');
        blob
    }

    fn device_fingerprint(&self) -> String {
        format!(
            "{}==|{}=|{}|08|3",
            random_from(BASE64_ALPHABET, 22),
            random_from(BASE64_ALPHABET, 75),
            random_from(BASE64_ALPHABET, 16)
        )
    }

    fn anti_forgery_token(&self) -> String {
        format!(
            "{}==|{}=|{}|08|3",
            random_from(BASE64_ALPHABET, 22),
            random_from(BASE64_ALPHABET, 79),
            random_from(BASE64_ALPHABET, 16)
        )
    }

    fn upload_session_id(&self) -> String {
        format!("{}{}", Utc::now().timestamp_millis(), random_from(BASE36, 9))
    }

    fn metrics_session_id(&self) -> String {
        format!(
            "{}{}",
            Utc::now().timestamp_millis(),
            rand::rng().random_range(0..1_000_000u32)
        )
    }
}

fn random_from(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_sixteen_uppercase_hex() {
        let id = RandomTokens.session_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn request_integrity_is_fifty_two_lowercase_hex() {
        let ri = RandomTokens.request_integrity();
        assert_eq!(ri.len(), 52);
        assert!(ri.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn security_blob_keeps_its_shape() {
        let blob = RandomTokens.security_blob();
        assert_eq!(blob.len(), SECURITY_BLOB_LEN + 1);
        assert!(blob.ends_with('='));
        assert_ne!(blob, RandomTokens.security_blob());
    }

    #[test]
    fn upload_session_ids_are_unique_and_time_prefixed() {
        let a = RandomTokens.upload_session_id();
        let b = RandomTokens.upload_session_id();
        assert_ne!(a, b);
        assert!(a.len() >= 13 + 9);
        assert!(a[..13].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn fingerprints_use_pipe_separated_segments() {
        assert_eq!(RandomTokens.device_fingerprint().split('|').count(), 5);
        assert_eq!(RandomTokens.anti_forgery_token().split('|').count(), 5);
    }
}
