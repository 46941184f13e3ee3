//! eGauge to MQTT bridge
//!
//! This library polls eGauge energy meters over HTTP, parses their XML register
//! reports, drops spurious readings, and republishes each register on MQTT under
//! `{topic_prefix}/{register name}`.

pub mod anomaly_filter;
pub mod config;
pub mod dispatcher;
pub mod egauge_client;
pub mod error;
pub mod health;
pub mod mqtt_bus;
pub mod poll_scheduler;
pub mod reading_history;
pub mod register_name;
pub mod register_report;

// Re-export commonly used types for easier access
pub use anomaly_filter::{AnomalyFilter, Verdict};
pub use config::Config;
pub use dispatcher::{Dispatcher, MessageBus};
pub use egauge_client::EgaugeClient;
pub use health::{HealthSignal, HealthTracker};
pub use mqtt_bus::MqttBus;
pub use poll_scheduler::{HostPipeline, PollScheduler};
pub use register_report::RegisterRecord;
