//! Inbound request authenticity.
//!
//! The platform signs every delivery with HMAC-SHA256 over the raw body
//! and sends the digest as `X-Hub-Signature-256: sha256=<hex>`. The check
//! must run on the exact bytes received; any re-serialization of the body
//! breaks the digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Checks a delivery signature against the shared app secret.
///
/// Returns false on a missing header, a header without the `sha256=`
/// prefix, non-hex digest characters, an empty secret, or a digest
/// mismatch. The comparison itself is constant-time. Pure function of
/// its inputs, logs nothing.
pub fn verify_signature(raw_body: &[u8], signature_header: Option<&str>, secret: &[u8]) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(header) = signature_header else {
        return false;
    };
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(digest) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&digest).is_ok()
}
