//! # MQTT Integration Module
//!
//! Connects the device to its broker and turns broker traffic into calls on the
//! command dispatcher.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker address, credentials and connection tuning
//! ├── message_manager.rs  - InboundMessage, MessageEvent, Publisher and Transport seams
//! └── mqtt_handler.rs     - Event loop, connection status and subscription on connect
//! ```
//!
//! ## Event Flow
//!
//! ```text
//! rumqttc EventLoop ──► MessageEvent ──► MqttHandler::on_event
//!                                           ├── Connected ──► subscribe <ns>/+/<actuator>
//!                                           ├── Data      ──► CommandDispatcher::handle
//!                                           └── Error     ──► status, back-off, poll again
//! ```
//!
//! The handler polls on a single task. Replies, subscriptions and the announce
//! are queued with the non-blocking `try_*` client calls, so handling a message
//! never waits on the broker.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
