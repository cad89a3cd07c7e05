//! GitHub webhook signature verification.
//!
//! GitHub signs webhook payloads with an HMAC over the raw body, keyed by the
//! secret configured on the App. The legacy `X-Hub-Signature` header carries
//! `sha1=<hex>`; newer deliveries also carry `X-Hub-Signature-256` with
//! `sha256=<hex>`. Both are accepted, but the algorithm token must match exactly.
//!
//! Verification is the first step in webhook processing: a payload that fails
//! here is rejected before any of its JSON is looked at.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// The keyed-hash algorithm named by a signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// HMAC-SHA1, GitHub's legacy default.
    Sha1,
    /// HMAC-SHA256.
    Sha256,
}

impl SignatureAlgorithm {
    /// Parses the algorithm token of a signature header.
    ///
    /// Matching is exact: `SHA1` or `sha-1` are not accepted.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "sha1" => Some(SignatureAlgorithm::Sha1),
            "sha256" => Some(SignatureAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Returns the header token for this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }
}

/// Reasons a webhook signature is rejected.
///
/// Every variant is terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No signature header was supplied.
    #[error("missing signature header")]
    Missing,

    /// The header is not of the form `<algorithm>=<hex-digest>`.
    #[error("malformed signature header")]
    Malformed,

    /// The algorithm token is not one we verify.
    #[error("unsupported signature algorithm: {0:?}")]
    UnsupportedAlgorithm(String),

    /// The digest does not match the payload.
    #[error("signature does not match payload")]
    Mismatch,
}

/// Parses a signature header (e.g., `"sha1=abc123..."`) into its algorithm and
/// raw digest bytes.
///
/// Never panics.
///
/// # Examples
///
/// ```
/// use four_eyes::webhooks::{SignatureAlgorithm, SignatureError, parse_signature_header};
///
/// let (algorithm, digest) = parse_signature_header("sha1=abcd1234").unwrap();
/// assert_eq!(algorithm, SignatureAlgorithm::Sha1);
/// assert_eq!(digest, vec![0xab, 0xcd, 0x12, 0x34]);
///
/// // Missing the `algorithm=` shape
/// assert_eq!(parse_signature_header("abcd1234"), Err(SignatureError::Malformed));
///
/// // Unknown algorithm
/// assert!(matches!(
///     parse_signature_header("md5=abcd"),
///     Err(SignatureError::UnsupportedAlgorithm(_))
/// ));
///
/// // Bad hex
/// assert_eq!(parse_signature_header("sha1=xyz"), Err(SignatureError::Malformed));
/// ```
pub fn parse_signature_header(
    header: &str,
) -> Result<(SignatureAlgorithm, Vec<u8>), SignatureError> {
    let (token, hex_sig) = header
        .split_once('=')
        .filter(|(token, _)| !token.is_empty())
        .ok_or(SignatureError::Malformed)?;

    let algorithm = SignatureAlgorithm::parse(token)
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(token.to_string()))?;

    let digest = hex::decode(hex_sig).map_err(|_| SignatureError::Malformed)?;

    Ok((algorithm, digest))
}

/// Computes the HMAC of a payload using the given secret and algorithm.
///
/// Mostly useful for tests (generating expected signatures).
pub fn compute_signature(payload: &[u8], secret: &[u8], algorithm: SignatureAlgorithm) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Sha1 => {
            let mut mac =
                HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Formats a signature as a GitHub-style header value, e.g. `"sha1=<hex>"`.
pub fn format_signature_header(algorithm: SignatureAlgorithm, signature: &[u8]) -> String {
    format!("{}={}", algorithm.as_str(), hex::encode(signature))
}

/// Verifies a webhook signature against the payload and secret.
///
/// `signature_header` is the raw header value, or `None` if the request had no
/// signature header. An empty header counts as missing.
///
/// The digest comparison is constant-time (delegated to the HMAC library).
///
/// # Examples
///
/// ```
/// use four_eyes::webhooks::{
///     SignatureAlgorithm, SignatureError, compute_signature, format_signature_header,
///     verify_signature,
/// };
///
/// let payload = b"Hello, World!";
/// let secret = b"my-secret-key";
///
/// let sig = compute_signature(payload, secret, SignatureAlgorithm::Sha1);
/// let header = format_signature_header(SignatureAlgorithm::Sha1, &sig);
///
/// assert_eq!(verify_signature(payload, Some(header.as_str()), secret), Ok(()));
/// assert_eq!(
///     verify_signature(payload, Some(header.as_str()), b"wrong-secret"),
///     Err(SignatureError::Mismatch)
/// );
/// assert_eq!(verify_signature(payload, None, secret), Err(SignatureError::Missing));
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature_header: Option<&str>,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let header = signature_header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(SignatureError::Missing)?;

    let (algorithm, expected) = parse_signature_header(header)?;

    let verified = match algorithm {
        SignatureAlgorithm::Sha1 => match HmacSha1::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            }
            Err(_) => false,
        },
        SignatureAlgorithm::Sha256 => match HmacSha256::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            }
            Err(_) => false,
        },
    };

    if verified {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
