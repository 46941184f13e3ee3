use std::collections::BTreeMap;
use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};

use crate::error::PublishError;
use crate::register_name::fix_name;
use crate::register_report::RegisterRecord;

/// Outbound message bus. Publishing only queues the message, it never blocks.
pub trait MessageBus: Send + Sync {
    fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError>;
}

/// Accepted readings of one host for one tick, keyed by normalized register name.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub host: String,
    pub registers: BTreeMap<String, f64>,
}

impl RegisterSnapshot {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            registers: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: &RegisterRecord) {
        self.registers
            .insert(fix_name(&record.name), record.instantaneous);
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Publishes accepted readings under `{topic_prefix}/{register name}`.
///
/// The prefix is used exactly as configured, trailing `/` included.
pub struct Dispatcher {
    topic_prefix: String,
    snapshot_topic: Option<String>,
    bus: Arc<dyn MessageBus>,
}

impl Dispatcher {
    pub fn new(topic_prefix: &str, snapshot_topic: Option<&str>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            topic_prefix: topic_prefix.to_string(),
            snapshot_topic: snapshot_topic.map(str::to_string),
            bus,
        }
    }

    /// Topic for a register. The name is used verbatim, spaces and case included.
    pub fn register_topic(&self, name: &str) -> String {
        format!("{}/{}", self.topic_prefix, name)
    }

    pub fn dispatch(&self, record: &RegisterRecord) -> Result<(), PublishError> {
        let topic = self.register_topic(&record.name);
        self.bus.publish(&topic, record.raw_instantaneous.clone())
    }

    /// Publishes the aggregate snapshot when a snapshot topic is configured.
    ///
    /// Returns `Ok(false)` when disabled or there is nothing to send.
    pub fn dispatch_snapshot(&self, snapshot: &RegisterSnapshot) -> Result<bool, PublishError> {
        let Some(sub_topic) = &self.snapshot_topic else {
            return Ok(false);
        };
        if snapshot.is_empty() {
            return Ok(false);
        }
        let payload = serde_json::to_string(snapshot)?;
        let topic = format!("{}/{}", self.topic_prefix, sub_topic);
        self.bus.publish(&topic, payload)?;
        Ok(true)
    }
}
