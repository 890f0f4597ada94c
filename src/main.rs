use eq3_mqtt::{Config, Event, MqttClient};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting eq3-mqtt (mqtt={}:{}, id={})",
        config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.mqtt_id,
    );

    let client = MqttClient::new(&config);
    let mut events = client.subscribe();
    let mut mqtt_handle = tokio::spawn(client.run());

    loop {
        tokio::select! {
            Some(event) = events.recv() => log_event(&event),
            result = &mut mqtt_handle => {
                if let Err(e) = result {
                    error!("MQTT task failed: {}", e);
                }
                std::process::exit(1);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = async {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).expect("Failed to register SIGTERM handler");
                sigterm.recv().await;
            } => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    mqtt_handle.abort();
    info!("eq3-mqtt stopped");
}

fn log_event(event: &Event) {
    match event {
        Event::DevicesDiscovered(devices) => {
            info!("Discovered {} thermostat(s)", devices.len());
            for device in devices {
                info!("  Device: {} (rssi {})", device.bleaddr, device.rssi);
            }
        }
        Event::State(status) => info!(
            "Status: trv={} temp={} offset={} mode={} battery={} heating={}",
            status.trv,
            status.temp,
            status.offset_temp,
            status.mode,
            status.battery,
            status.is_heating(),
        ),
        other => info!("{}: {:?}", other.name(), other),
    }
}
