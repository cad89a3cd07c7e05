//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA1, HMAC-SHA256)
//! - Event types and permissive decoding of `push` payloads
//! - A single verify-then-decode step over the raw request body

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{EventKind, PushEvent};
pub use parser::{PayloadError, decode_verified, parse_push_event};
pub use signature::{
    SignatureAlgorithm, SignatureError, compute_signature, format_signature_header,
    parse_signature_header, verify_signature,
};
