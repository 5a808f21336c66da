use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{BrokerUrlError, MqttConfig};
use super::message_manager::{InboundMessage, MessageEvent, Publisher, Transport};
use crate::actuator::Actuator;
use crate::command::dispatcher::CommandDispatcher;
use crate::command::topic::TopicLayout;

const MAX_ERROR_MESSAGES: usize = 16;
const MIN_KEEP_ALIVE_SECS: u64 = 5;
const SUBSCRIBE_QOS: QoS = QoS::AtMostOnce;
const ANNOUNCE_QOS: QoS = QoS::AtLeastOnce;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Reconnecting,
}

#[derive(Clone, Debug, Default)]
pub struct MQTTStatus {
    pub connection_state: ConnectionState,
    pub error_messages: Vec<String>,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

impl MQTTStatus {
    fn touch(&mut self) {
        self.last_activity = Some(chrono::Local::now());
    }

    fn record_error(&mut self, message: String) {
        if self.error_messages.len() == MAX_ERROR_MESSAGES {
            self.error_messages.remove(0);
        }
        self.error_messages.push(message);
    }
}

/// Owns the broker connection and feeds inbound messages to the dispatcher.
///
/// Events are processed strictly one after another on the caller's task, so the
/// dispatcher and its actuator never see concurrent access. Session requests
/// (subscribe, announce, disconnect) go through the [`Transport`] `T`.
pub struct MqttHandler<T = AsyncClient> {
    status: MQTTStatus,
    transport: T,
    eventloop: EventLoop,
    config: MqttConfig,
    layout: TopicLayout,
}

fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions, BrokerUrlError> {
    let (host, port) = config.broker_address()?;
    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(
        config.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
    ));
    if let Some(user) = &config.user {
        mqtt_options.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
    }
    Ok(mqtt_options)
}

impl MqttHandler<AsyncClient> {
    /// Prepares the client. No connection is made until [`MqttHandler::run`] polls.
    pub fn new(config: MqttConfig, layout: TopicLayout) -> Result<Self, BrokerUrlError> {
        let (client, eventloop) = AsyncClient::new(mqtt_options(&config)?, config.channel_capacity);

        Ok(MqttHandler {
            status: MQTTStatus::default(),
            transport: client,
            eventloop,
            config,
            layout,
        })
    }

    /// Handle for publishing outside the event loop, e.g. dispatcher replies
    pub fn client(&self) -> AsyncClient {
        self.transport.clone()
    }
}

impl<T: Transport> MqttHandler<T> {
    pub fn status(&self) -> &MQTTStatus {
        &self.status
    }

    /// Polls the broker connection until `shutdown` is cancelled.
    ///
    /// Transport errors are logged and polling resumes after the configured
    /// delay; rumqttc reconnects on the next poll.
    pub async fn run<A: Actuator, P: Publisher>(
        &mut self,
        dispatcher: &mut CommandDispatcher<A, P>,
        shutdown: CancellationToken,
    ) {
        let reconnect_delay = Duration::from_millis(self.config.reconnect_delay_ms);
        info!("Connecting to broker at {}", self.config.broker_url);
        self.status.connection_state = ConnectionState::Connecting;

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.eventloop.poll() => polled,
            };

            match polled {
                Ok(event) => {
                    if let Some(event) = MessageEvent::from_event(event) {
                        self.on_event(event, dispatcher);
                    }
                }
                Err(e) => {
                    self.on_event(MessageEvent::Error(e.to_string()), dispatcher);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }

        info!("Shutting down broker connection");
        if let Err(e) = self.transport.disconnect() {
            warn!("Failed to queue disconnect: {}", e);
        }
        self.status.connection_state = ConnectionState::Disconnected;
    }

    pub fn on_event<A: Actuator, P: Publisher>(
        &mut self,
        event: MessageEvent,
        dispatcher: &mut CommandDispatcher<A, P>,
    ) {
        self.status.touch();
        match event {
            MessageEvent::Connected { session_present } => {
                info!("MQTT connected (session present: {})", session_present);
                self.status.connection_state = ConnectionState::Connected;
                self.on_connected();
            }
            MessageEvent::Disconnected => {
                info!("MQTT disconnected by broker");
                self.status.connection_state = ConnectionState::Disconnected;
            }
            MessageEvent::Subscribed { pkid } => info!("MQTT subscribed, msg_id={}", pkid),
            MessageEvent::Unsubscribed { pkid } => info!("MQTT unsubscribed, msg_id={}", pkid),
            MessageEvent::Published { pkid } => debug!("MQTT published, msg_id={}", pkid),
            MessageEvent::Data(message) => self.on_message(message, dispatcher),
            MessageEvent::Error(reason) => {
                error!("MQTT error: {}", reason);
                self.status.connection_state = match self.status.connection_state {
                    ConnectionState::Connected | ConnectionState::Reconnecting => {
                        ConnectionState::Reconnecting
                    }
                    _ => ConnectionState::Failed,
                };
                self.status.record_error(reason);
            }
        }
    }

    /// Subscribes to the command filter, then publishes the announce message if one is configured.
    fn on_connected(&mut self) {
        let filter = self.layout.subscription_filter();
        match self.transport.subscribe(&filter, SUBSCRIBE_QOS) {
            Ok(()) => info!("Subscribing to {}", filter),
            Err(e) => {
                error!("Failed to queue subscription to {}: {}", filter, e);
                self.status.record_error(e.to_string());
            }
        }

        if let Some(announce) = &self.config.announce {
            match self.transport.publish(
                &announce.topic,
                announce.payload.as_bytes(),
                ANNOUNCE_QOS,
                announce.retain,
            ) {
                Ok(()) => {
                    self.status.messages_sent += 1;
                    info!("Announced on {}", announce.topic);
                }
                Err(e) => warn!("Failed to queue announce on {}: {}", announce.topic, e),
            }
        }
    }

    fn on_message<A: Actuator, P: Publisher>(
        &mut self,
        message: InboundMessage,
        dispatcher: &mut CommandDispatcher<A, P>,
    ) {
        self.status.messages_received += 1;
        info!("MQTT data: {}", message);

        let dispatch = dispatcher.handle(&message);
        debug!("Dispatch result: {:?}", dispatch);
        if dispatch.reply_queued {
            self.status.messages_sent += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::VirtualActuator;
    use crate::command::dispatcher::{Command, DispatchOutcome};
    use crate::mqtt::config::Announce;
    use crate::mqtt::message_manager::{RecordingTransport, SentMessage, TransportError};

    impl<T: Transport> MqttHandler<T> {
        fn with_transport(config: MqttConfig, transport: T) -> Self {
            let eventloop = EventLoop::new(mqtt_options(&config).unwrap(), config.channel_capacity);
            MqttHandler {
                status: MQTTStatus::default(),
                transport,
                eventloop,
                config,
                layout: TopicLayout::default(),
            }
        }

        fn transport(&self) -> &T {
            &self.transport
        }
    }

    fn handler() -> MqttHandler<RecordingTransport> {
        MqttHandler::with_transport(MqttConfig::default(), RecordingTransport::default())
    }

    fn dispatcher() -> CommandDispatcher<VirtualActuator, RecordingTransport> {
        CommandDispatcher::new(
            "99101608",
            TopicLayout::default(),
            VirtualActuator::default(),
            RecordingTransport::default(),
        )
    }

    fn connected() -> MessageEvent {
        MessageEvent::Connected {
            session_present: false,
        }
    }

    #[test]
    fn subscribes_to_command_filter_on_every_connect() {
        let mut handler = handler();
        let mut dispatcher = dispatcher();

        handler.on_event(connected(), &mut dispatcher);
        handler.on_event(MessageEvent::Error("connection reset".into()), &mut dispatcher);
        handler.on_event(connected(), &mut dispatcher);

        let subscription = ("SIOT/+/LED".to_string(), QoS::AtMostOnce);
        assert_eq!(
            handler.transport().subscriptions,
            vec![subscription.clone(), subscription]
        );
        assert!(handler.transport().sent.is_empty());
        assert_eq!(handler.status().messages_sent, 0);
        assert_eq!(handler.status().connection_state, ConnectionState::Connected);
    }

    #[test]
    fn publishes_announce_after_subscribing() {
        let config = MqttConfig {
            announce: Some(Announce {
                topic: "SIOT/99101608/status".to_string(),
                payload: "online".to_string(),
                retain: true,
            }),
            ..MqttConfig::default()
        };
        let mut handler = MqttHandler::with_transport(config, RecordingTransport::default());
        let mut dispatcher = dispatcher();

        handler.on_event(connected(), &mut dispatcher);

        assert_eq!(
            handler.transport().subscriptions,
            vec![("SIOT/+/LED".to_string(), QoS::AtMostOnce)]
        );
        assert_eq!(
            handler.transport().sent,
            vec![SentMessage {
                topic: "SIOT/99101608/status".to_string(),
                payload: b"online".to_vec(),
                qos: QoS::AtLeastOnce,
                retain: true,
            }]
        );
        assert_eq!(handler.status().messages_sent, 1);
    }

    #[test]
    fn failed_connect_requests_are_recorded_not_counted() {
        let config = MqttConfig {
            announce: Some(Announce {
                topic: "SIOT/99101608/status".to_string(),
                payload: "online".to_string(),
                retain: false,
            }),
            ..MqttConfig::default()
        };
        let transport = RecordingTransport::failing(TransportError::QueueFull);
        let mut handler = MqttHandler::with_transport(config, transport);
        let mut dispatcher = dispatcher();

        handler.on_event(connected(), &mut dispatcher);

        assert_eq!(
            handler.status().error_messages,
            vec![TransportError::QueueFull.to_string()]
        );
        assert_eq!(handler.status().messages_sent, 0);
    }

    #[test]
    fn data_events_reach_the_dispatcher() {
        let mut handler = handler();
        let mut dispatcher = dispatcher();

        handler.on_event(
            MessageEvent::Data(InboundMessage::new("SIOT/99101608/LED", "ON")),
            &mut dispatcher,
        );
        handler.on_event(
            MessageEvent::Data(InboundMessage::new("SIOT/LED", "ON")),
            &mut dispatcher,
        );

        assert!(dispatcher.actuator().is_on());
        assert_eq!(handler.status().messages_received, 2);
        assert_eq!(handler.status().messages_sent, 1);
        assert!(handler.status().last_activity.is_some());
    }

    #[test]
    fn unqueued_replies_are_not_counted_as_sent() {
        let mut handler = handler();
        let mut dispatcher = CommandDispatcher::new(
            "99101608",
            TopicLayout::default(),
            VirtualActuator::default(),
            RecordingTransport::failing(TransportError::QueueFull),
        );

        handler.on_event(
            MessageEvent::Data(InboundMessage::new("SIOT/99101608/LED", "ON")),
            &mut dispatcher,
        );
        handler.on_event(
            MessageEvent::Data(InboundMessage::new("SIOT/12345678/LED", "OFF")),
            &mut dispatcher,
        );

        assert!(dispatcher.actuator().is_on());
        assert_eq!(handler.status().messages_received, 2);
        assert_eq!(handler.status().messages_sent, 0);
    }

    #[test]
    fn errors_do_not_stop_message_handling() {
        let mut handler = handler();
        let mut dispatcher = dispatcher();

        handler.on_event(connected(), &mut dispatcher);
        assert_eq!(handler.status().connection_state, ConnectionState::Connected);

        handler.on_event(MessageEvent::Error("connection reset".into()), &mut dispatcher);
        assert_eq!(handler.status().connection_state, ConnectionState::Reconnecting);
        assert_eq!(handler.status().error_messages, vec!["connection reset".to_string()]);

        handler.on_event(
            MessageEvent::Data(InboundMessage::new("SIOT/12345678/LED", "ON")),
            &mut dispatcher,
        );
        assert!(!dispatcher.actuator().is_on());
        assert_eq!(
            dispatcher
                .handle(&InboundMessage::new("SIOT/99101608/LED", "ON"))
                .outcome,
            DispatchOutcome::Applied(Command::On)
        );
    }

    #[test]
    fn error_before_first_connect_is_a_failure() {
        let mut handler = handler();
        let mut dispatcher = dispatcher();

        handler.on_event(MessageEvent::Error("refused".into()), &mut dispatcher);
        assert_eq!(handler.status().connection_state, ConnectionState::Failed);
    }

    #[test]
    fn error_history_is_bounded() {
        let mut status = MQTTStatus::default();
        for i in 0..(MAX_ERROR_MESSAGES + 4) {
            status.record_error(format!("error {}", i));
        }

        assert_eq!(status.error_messages.len(), MAX_ERROR_MESSAGES);
        assert_eq!(status.error_messages[0], "error 4");
    }

    #[tokio::test]
    async fn run_disconnects_on_shutdown() {
        let config = MqttConfig {
            broker_url: "mqtt://127.0.0.1:1".to_string(),
            reconnect_delay_ms: 10,
            ..MqttConfig::default()
        };
        let mut handler = MqttHandler::with_transport(config, RecordingTransport::default());
        let mut dispatcher = dispatcher();
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), handler.run(&mut dispatcher, shutdown))
            .await
            .expect("run did not observe shutdown");
        assert_eq!(handler.status().connection_state, ConnectionState::Disconnected);
        assert_eq!(handler.transport().disconnects, 1);
        assert!(!dispatcher.actuator().is_on());
    }

    #[test]
    fn live_client_handler_builds_from_defaults() {
        let handler = MqttHandler::new(MqttConfig::default(), TopicLayout::default()).unwrap();
        assert_eq!(handler.status().connection_state, ConnectionState::Disconnected);
    }
}
