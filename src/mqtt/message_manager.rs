//! Message representation between the rumqttc event loop and the dispatcher.
//!
//! Raw rumqttc events are translated once into [`MessageEvent`], so the rest
//! of the device only ever matches on one enum and never touches protocol
//! packets directly.

use bytes::Bytes;
use rumqttc::{AsyncClient, ClientError, ConnectReturnCode, Event, Packet, QoS};
use std::fmt;
use thiserror::Error;
use tracing::trace;

const PREVIEW_LEN: usize = 32;

/// A message received on a subscribed topic.
///
/// The payload is an owned, length-bounded byte buffer. It is never read as a
/// terminated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Printable prefix of the payload for logging
    pub fn payload_preview(&self) -> String {
        let end = self.payload.len().min(PREVIEW_LEN);
        let mut preview = String::from_utf8_lossy(&self.payload[..end]).into_owned();
        if self.payload.len() > PREVIEW_LEN {
            preview.push_str("...");
        }
        preview
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TOPIC={} DATA={} ({} bytes)",
            self.topic,
            self.payload_preview(),
            self.payload.len()
        )
    }
}

/// Everything the device reacts to on the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    Connected { session_present: bool },
    Disconnected,
    Subscribed { pkid: u16 },
    Unsubscribed { pkid: u16 },
    Published { pkid: u16 },
    Data(InboundMessage),
    Error(String),
}

impl MessageEvent {
    /// Translates a rumqttc event. Outgoing packets and pings yield `None`.
    pub fn from_event(event: Event) -> Option<Self> {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    Some(MessageEvent::Connected {
                        session_present: ack.session_present,
                    })
                } else {
                    Some(MessageEvent::Error(format!(
                        "Connection refused: {:?}",
                        ack.code
                    )))
                }
            }
            Event::Incoming(Packet::Publish(publish)) => Some(MessageEvent::Data(
                InboundMessage::new(publish.topic, publish.payload),
            )),
            Event::Incoming(Packet::SubAck(ack)) => {
                Some(MessageEvent::Subscribed { pkid: ack.pkid })
            }
            Event::Incoming(Packet::UnsubAck(ack)) => {
                Some(MessageEvent::Unsubscribed { pkid: ack.pkid })
            }
            Event::Incoming(Packet::PubAck(ack)) => Some(MessageEvent::Published { pkid: ack.pkid }),
            Event::Incoming(Packet::Disconnect) => Some(MessageEvent::Disconnected),
            other => {
                trace!("Ignoring event {:?}", other);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request queue is full")]
    QueueFull,

    #[error("Client error: {0}")]
    Client(String),
}

impl From<ClientError> for TransportError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::TryRequest(_) => TransportError::QueueFull,
            other => TransportError::Client(other.to_string()),
        }
    }
}

/// Outbound side of the broker connection.
///
/// Implementations must not block. A returned `Ok` only means the message was
/// queued; delivery for QoS >= 1 is tracked by the transport.
pub trait Publisher {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError>;
}

/// Session-level requests the connection handler issues besides publishing.
pub trait Transport: Publisher {
    fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError>;
}

impl Publisher for AsyncClient {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.try_publish(topic, qos, retain, payload.to_vec())?;
        Ok(())
    }
}

impl Transport for AsyncClient {
    fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), TransportError> {
        self.try_subscribe(filter, qos)?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.try_disconnect()?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Transport that keeps every request, optionally failing each call.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<SentMessage>,
    pub subscriptions: Vec<(String, QoS)>,
    pub disconnects: usize,
    fail_with: Option<TransportError>,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn failing(error: TransportError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), TransportError> {
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
impl Publisher for RecordingTransport {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.check()?;
        self.sent.push(SentMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }
}

#[cfg(test)]
impl Transport for RecordingTransport {
    fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), TransportError> {
        self.check()?;
        self.subscriptions.push((filter.to_string(), qos));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.check()?;
        self.disconnects += 1;
        Ok(())
    }
}
