//! Command parsing, authorization and dispatch
//!
//! 1. [`topic`] - splits `<namespace>/<claimant>/<verb>` and builds reply topics
//! 2. [`dispatcher`] - checks the claimant against the device identity and applies the command
//! 3. [`error`] - the non-fatal error cases of both stages

pub mod dispatcher;
pub mod error;
pub mod topic;

pub use dispatcher::{Command, CommandDispatcher, Dispatch, DispatchOutcome};
pub use error::{AuthorizationError, CommandError, TopicError};
pub use topic::{CommandTopic, TopicLayout};
