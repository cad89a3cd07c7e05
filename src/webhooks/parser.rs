//! GitHub webhook payload parser.
//!
//! Payloads are decoded permissively: unknown fields are ignored and missing
//! or `null` string fields become empty strings. Only malformed JSON (or a
//! field of the wrong JSON type) is an error.
//!
//! # Key paths
//!
//! The push payload fields read here are GitHub's, verbatim:
//! - `ref`
//! - `head_commit.id` (falling back to `after` when there is no head commit)
//! - `head_commit.message`
//! - `repository.name`
//! - `repository.owner.name` (falling back to `repository.owner.login`)

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{RepoId, Sha};

use super::events::PushEvent;
use super::signature::{SignatureError, verify_signature};

/// Error type for payloads that cannot be trusted or decoded.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The signature did not verify; the body was not parsed.
    #[error("signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    /// The body verified but is not valid JSON of the expected shape.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Verifies a payload's signature and decodes the same bytes.
///
/// The digest and the decoder see one and the same byte slice, so what was
/// authenticated is exactly what gets parsed. `decode` only runs once the
/// signature has been accepted.
///
/// # Examples
///
/// ```
/// use four_eyes::webhooks::{
///     PayloadError, SignatureAlgorithm, compute_signature, decode_verified,
///     format_signature_header, parse_push_event,
/// };
///
/// let body = br#"{"ref": "refs/heads/staging"}"#;
/// let secret = b"secret";
/// let header = format_signature_header(
///     SignatureAlgorithm::Sha1,
///     &compute_signature(body, secret, SignatureAlgorithm::Sha1),
/// );
///
/// let event = decode_verified(body, Some(header.as_str()), secret, parse_push_event).unwrap();
/// assert_eq!(event.git_ref, "refs/heads/staging");
///
/// let tampered = br#"{"ref": "refs/heads/trying!"}"#;
/// assert!(matches!(
///     decode_verified(tampered, Some(header.as_str()), secret, parse_push_event),
///     Err(PayloadError::Signature(_))
/// ));
/// ```
pub fn decode_verified<T, F>(
    body: &[u8],
    signature_header: Option<&str>,
    secret: &[u8],
    decode: F,
) -> Result<T, PayloadError>
where
    F: FnOnce(&[u8]) -> Result<T, serde_json::Error>,
{
    verify_signature(body, signature_header, secret)?;
    Ok(decode(body)?)
}

/// Decodes a `push` payload.
pub fn parse_push_event(payload: &[u8]) -> Result<PushEvent, serde_json::Error> {
    let object: Map<String, Value> = serde_json::from_slice(payload)?;
    let raw = RawPushPayload::deserialize(Value::Object(object))?;

    let (head_sha, head_message) = match raw.head_commit {
        Some(commit) if !commit.id.is_empty() => (commit.id, commit.message),
        Some(commit) => (raw.after, commit.message),
        None => (raw.after, String::new()),
    };

    let owner = match raw.repository.owner.name {
        Some(name) if !name.is_empty() => name,
        _ => raw.repository.owner.login,
    };

    Ok(PushEvent {
        git_ref: raw.git_ref,
        head_sha: Sha::new(head_sha),
        head_message,
        repo: RepoId::new(owner, raw.repository.name),
    })
}

// ============================================================================
// Raw payload structures for deserialization
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPushPayload {
    #[serde(rename = "ref", deserialize_with = "null_as_empty")]
    git_ref: String,
    #[serde(deserialize_with = "null_as_empty")]
    after: String,
    #[serde(deserialize_with = "object_or_default")]
    head_commit: Option<RawHeadCommit>,
    #[serde(deserialize_with = "object_or_default")]
    repository: RawRepository,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHeadCommit {
    #[serde(deserialize_with = "null_as_empty")]
    id: String,
    #[serde(deserialize_with = "null_as_empty")]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRepository {
    #[serde(deserialize_with = "null_as_empty")]
    name: String,
    #[serde(deserialize_with = "object_or_default")]
    owner: RawOwner,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOwner {
    name: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    login: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    null_as_default(deserializer)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a nested JSON object, treating `null` as the default.
///
/// Derived struct visitors also accept arrays positionally; going through a
/// `Map` first rejects those.
fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    match Option::<Map<String, Value>>::deserialize(deserializer)? {
        Some(object) => T::deserialize(Value::Object(object)).map_err(D::Error::custom),
        None => Ok(T::default()),
    }
}
