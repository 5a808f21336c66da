//! Command authorization and dispatch
//!
//! Every inbound command passes through [`CommandDispatcher::handle`]:
//!
//! ```text
//! InboundMessage ──► TopicLayout::parse ──► authorize ──► Command::decode ──► Actuator::set
//!                          │                    │               │                 │
//!                       Dropped             Rejected       Unrecognized        Applied
//!                     (no reply)      (reply to claimant)  (reply to self)  (echo to self)
//! ```
//!
//! The dispatcher keeps no state between messages apart from the actuator it
//! owns. Replies are handed to the [`Publisher`] without waiting for the
//! broker; delivery is the transport's concern.

use super::error::{AuthorizationError, CommandError, TopicError};
use super::topic::TopicLayout;
use crate::actuator::Actuator;
use crate::config::MAX_PAYLOAD_LEN;
use crate::mqtt::message_manager::{InboundMessage, Publisher};
use rumqttc::QoS;
use tracing::{info, warn};

pub const PERMISSION_DENIED: &[u8] = b"ERROR: permission denied";
pub const UNRECOGNIZED_COMMAND: &[u8] = b"ERROR: unrecognized command";
pub const REPLY_QOS: QoS = QoS::AtLeastOnce;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
}

impl Command {
    /// Exact, case-sensitive match on `ON` / `OFF`. Whitespace is not trimmed.
    pub fn decode(payload: &[u8]) -> Result<Self, CommandError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CommandError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        match payload {
            b"ON" => Ok(Command::On),
            b"OFF" => Ok(Command::Off),
            _ => Err(CommandError::Unrecognized { len: payload.len() }),
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Command::On => b"ON",
            Command::Off => b"OFF",
        }
    }

    /// Output level requested by this command
    pub fn state(self) -> bool {
        matches!(self, Command::On)
    }
}

/// Byte-for-byte identity check, no normalization.
pub fn authorize(claimant: &str, own_id: &str) -> Result<(), AuthorizationError> {
    if claimant == own_id {
        Ok(())
    } else {
        Err(AuthorizationError::IdentityMismatch {
            claimant: claimant.to_string(),
        })
    }
}

/// What happened to a single inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Actuator switched and the command echoed to the device's reply topic
    Applied(Command),
    /// Claimant is not this device; rejection sent to the claimant's reply topic
    Rejected(AuthorizationError),
    /// Authorized, but the payload is not a command; error sent to the device's reply topic
    Unrecognized(CommandError),
    /// Topic could not be parsed; nothing published
    Dropped(TopicError),
}

/// Outcome of one message plus whether its reply made it into the publisher's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub outcome: DispatchOutcome,
    pub reply_queued: bool,
}

impl Dispatch {
    fn dropped(error: TopicError) -> Self {
        Self {
            outcome: DispatchOutcome::Dropped(error),
            reply_queued: false,
        }
    }
}

/// Applies authorized commands to the actuator it owns.
///
/// Identity, topic layout, actuator and publisher are all injected at
/// construction, so the dispatcher runs the same against a live broker and in
/// tests.
pub struct CommandDispatcher<A, P> {
    own_id: String,
    layout: TopicLayout,
    actuator: A,
    publisher: P,
}

impl<A: Actuator, P: Publisher> CommandDispatcher<A, P> {
    pub fn new(own_id: impl Into<String>, layout: TopicLayout, actuator: A, publisher: P) -> Self {
        Self {
            own_id: own_id.into(),
            layout,
            actuator,
            publisher,
        }
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Handles one inbound message to completion.
    ///
    /// Never fails: every error ends up in the returned outcome and is logged.
    pub fn handle(&mut self, message: &InboundMessage) -> Dispatch {
        let topic = match self.layout.parse(message.topic.as_bytes()) {
            Ok(topic) => topic,
            Err(e) => {
                warn!("Dropping message on '{}': {}", message.topic, e);
                return Dispatch::dropped(e);
            }
        };

        if topic.verb != self.layout.actuator() {
            let e = TopicError::UnknownVerb {
                verb: topic.verb.to_string(),
            };
            warn!("Dropping message on '{}': {}", message.topic, e);
            return Dispatch::dropped(e);
        }

        if let Err(e) = authorize(topic.claimant, &self.own_id) {
            warn!("Rejecting command on '{}': {}", message.topic, e);
            let reply = self.layout.reply_topic(topic.claimant);
            return Dispatch {
                reply_queued: self.reply(&reply, PERMISSION_DENIED),
                outcome: DispatchOutcome::Rejected(e),
            };
        }

        let reply = self.layout.reply_topic(&self.own_id);
        match Command::decode(&message.payload) {
            Ok(command) => {
                self.actuator.set(command.state());
                info!("Applied {:?} from '{}'", command, topic.claimant);
                Dispatch {
                    reply_queued: self.reply(&reply, command.as_bytes()),
                    outcome: DispatchOutcome::Applied(command),
                }
            }
            Err(e) => {
                warn!("Ignoring command on '{}': {}", message.topic, e);
                Dispatch {
                    reply_queued: self.reply(&reply, UNRECOGNIZED_COMMAND),
                    outcome: DispatchOutcome::Unrecognized(e),
                }
            }
        }
    }

    /// Queues a reply, returns whether the publisher accepted it.
    fn reply(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.publisher.publish(topic, payload, REPLY_QOS, false) {
            Ok(()) => true,
            Err(e) => {
                warn!("Reply to '{}' not queued: {}", topic, e);
                false
            }
        }
    }
}
