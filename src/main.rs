use std::sync::Arc;

use egauge_mqtt_bridge::{
    AnomalyFilter, Config, Dispatcher, EgaugeClient, HealthTracker, HostPipeline, MqttBus,
    PollScheduler,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Starting eGauge MQTT bridge");
    tracing::info!("  Topic prefix: {}", config.topic_prefix);
    tracing::info!("  Retain: {}", config.retain);
    tracing::info!(
        "  Poll interval: {:?}, timeout: {:?}",
        config.poll_interval,
        config.poll_timeout
    );
    if config.poll_timeout > config.poll_interval {
        tracing::info!("  Slow hosts will skip ticks while a poll is outstanding");
    }

    let health = Arc::new(HealthTracker::new());
    let bus = Arc::new(MqttBus::connect(&config.mqtt, config.retain, health.clone()));

    let pipeline = Arc::new(HostPipeline::new(
        EgaugeClient::new(config.poll_timeout)?,
        AnomalyFilter::new(),
        Dispatcher::new(&config.topic_prefix, config.snapshot_topic.as_deref(), bus),
        health,
    ));

    PollScheduler::new(config.hosts, config.poll_interval, pipeline)
        .run()
        .await;

    Ok(())
}
