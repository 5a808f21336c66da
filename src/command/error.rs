//! Error types of the command pipeline
//!
//! None of these are fatal. The dispatcher turns each of them into a
//! [`DispatchOutcome`](super::dispatcher::DispatchOutcome) and keeps serving
//! the next message.

use thiserror::Error;

/// The inbound topic does not have the `<namespace>/<claimant>/<verb>` shape.
///
/// No reply is sent for these: without a claimant there is nobody to address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("Malformed topic: {segments} segment(s), expected 3")]
    Malformed { segments: usize },

    #[error("Malformed topic: segment {index} is empty")]
    EmptySegment { index: usize },

    #[error("Topic is {len} bytes long, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("Topic is not valid UTF-8")]
    NotUtf8,

    #[error("Unexpected topic namespace '{found}'")]
    UnexpectedNamespace { found: String },

    #[error("Unknown command verb '{verb}'")]
    UnknownVerb { verb: String },
}

/// The claimant named in the topic is not this device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Identity mismatch: '{claimant}' is not permitted to control this device")]
    IdentityMismatch { claimant: String },
}

/// The payload is not a command this device understands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unrecognized command ({len} byte payload)")]
    Unrecognized { len: usize },

    #[error("Command payload is {len} bytes long, limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },
}
