pub mod actuator;
pub mod command;
pub mod config;
pub mod mqtt;

use crate::command::{CommandDispatcher, TopicLayout};
use crate::config::{DeviceConfig, DEVICE_ID};
use actuator::Actuator;
use color_eyre::{eyre::eyre, Result};
use mqtt::mqtt_handler::MqttHandler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config = DeviceConfig::load()
        .await
        .map_err(|e| eyre!("Failed to load device config: {}", e))?;
    info!("Starting actuator node {}", DEVICE_ID);

    let actuator = actuator::from_config(&config.actuator)
        .map_err(|e| eyre!("Failed to initialize actuator: {}", e))?;

    let layout = TopicLayout::default();
    let mut mqtt_handler = MqttHandler::new(config.mqtt.clone(), layout.clone())
        .map_err(|e| eyre!("Invalid broker configuration: {}", e))?;

    let mut dispatcher = CommandDispatcher::new(DEVICE_ID, layout, actuator, mqtt_handler.client());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                signal.cancel();
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    mqtt_handler.run(&mut dispatcher, shutdown).await;

    dispatcher.actuator_mut().set(false);
    info!("Actuator switched off, exiting");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
