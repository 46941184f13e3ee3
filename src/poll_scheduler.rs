use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::anomaly_filter::{AnomalyFilter, SuppressReason, Verdict};
use crate::dispatcher::{Dispatcher, RegisterSnapshot};
use crate::egauge_client::EgaugeClient;
use crate::error::CycleError;
use crate::health::HealthSignal;
use crate::register_report::{self, RegisterRecord};

/// Outcome of one host's chain for one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub published: usize,
    pub suppressed: usize,
    pub failed_publishes: usize,
}

/// The poll, parse, filter and publish chain shared by all hosts.
pub struct HostPipeline {
    client: EgaugeClient,
    filter: Mutex<AnomalyFilter>,
    dispatcher: Dispatcher,
    health: Arc<dyn HealthSignal>,
}

impl HostPipeline {
    pub fn new(
        client: EgaugeClient,
        filter: AnomalyFilter,
        dispatcher: Dispatcher,
        health: Arc<dyn HealthSignal>,
    ) -> Self {
        Self {
            client,
            filter: Mutex::new(filter),
            dispatcher,
            health,
        }
    }

    /// Runs one host's chain and reports the outcome to the health signal.
    ///
    /// Errors stay local to this host and tick.
    pub async fn process_host(&self, host: &str) -> Option<CycleReport> {
        match self.run_cycle(host).await {
            Ok(report) => {
                tracing::debug!(
                    "{host}: published {}, suppressed {}",
                    report.published,
                    report.suppressed
                );
                if report.failed_publishes == 0 {
                    self.health.healthy();
                } else {
                    self.health.unhealthy();
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!("{host}: {e}");
                self.health.unhealthy();
                None
            }
        }
    }

    pub async fn run_cycle(&self, host: &str) -> Result<CycleReport, CycleError> {
        let body = self.client.poll(host).await?;
        let records = register_report::parse(&body)?;
        Ok(self.publish_accepted(host, &records).await)
    }

    /// Filters a parsed batch and publishes what survives.
    pub async fn publish_accepted(&self, host: &str, records: &[RegisterRecord]) -> CycleReport {
        let mut report = CycleReport::default();
        let mut snapshot = RegisterSnapshot::new(host);

        let mut filter = self.filter.lock().await;
        for record in records {
            match filter.evaluate(&record.name, record.instantaneous) {
                Verdict::Accepted => {
                    snapshot.insert(record);
                    match self.dispatcher.dispatch(record) {
                        Ok(()) => report.published += 1,
                        Err(e) => {
                            tracing::warn!("{host}: {e}");
                            report.failed_publishes += 1;
                        }
                    }
                }
                Verdict::Suppressed(reason) => {
                    log_suppressed(host, record, reason);
                    report.suppressed += 1;
                }
            }
        }
        drop(filter);

        if let Err(e) = self.dispatcher.dispatch_snapshot(&snapshot) {
            tracing::warn!("{host}: snapshot not published: {e}");
            report.failed_publishes += 1;
        }
        report
    }

    /// Seeds a register's history with known-good readings.
    pub async fn seed_history(&self, name: &str, readings: &[f64]) {
        self.filter
            .lock()
            .await
            .seed(name, readings.iter().copied());
    }

    pub async fn is_skipping(&self, name: &str) -> bool {
        self.filter.lock().await.is_skipping(name)
    }
}

fn log_suppressed(host: &str, record: &RegisterRecord, reason: SuppressReason) {
    match reason {
        SuppressReason::GlitchSpike { average } => tracing::info!(
            "{host}: suppressing {} = {} (history average {average})",
            record.name,
            record.instantaneous
        ),
        SuppressReason::RecoveryJump { average } => tracing::info!(
            "{host}: suppressing {} = {} after glitch (history average {average})",
            record.name,
            record.instantaneous
        ),
    }
}

/// Fires one pass over all hosts per interval.
///
/// Each host runs in its own task. A host whose previous chain has not
/// finished is skipped for that tick.
pub struct PollScheduler {
    hosts: Vec<String>,
    period: Duration,
    pipeline: Arc<HostPipeline>,
    in_flight: Vec<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(hosts: Vec<String>, period: Duration, pipeline: Arc<HostPipeline>) -> Self {
        let in_flight = hosts.iter().map(|_| None).collect();
        Self {
            hosts,
            period,
            pipeline,
            in_flight,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting to monitor: {:?}", self.hosts);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.run_tick();
        }
    }

    /// Spawns a chain for every idle host. Returns how many were started.
    pub fn run_tick(&mut self) -> usize {
        let mut started = 0;
        for (host, slot) in self.hosts.iter().zip(self.in_flight.iter_mut()) {
            if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
                tracing::debug!("{host}: previous poll still running, skipping tick");
                continue;
            }
            let pipeline = Arc::clone(&self.pipeline);
            let host = host.clone();
            *slot = Some(tokio::spawn(async move {
                pipeline.process_host(&host).await;
            }));
            started += 1;
        }
        started
    }

    /// Waits for every chain started so far to finish.
    pub async fn wait_for_in_flight(&mut self) {
        for slot in self.in_flight.iter_mut() {
            if let Some(handle) = slot.take() {
                if let Err(e) = handle.await {
                    tracing::error!("Host task failed: {e}");
                }
            }
        }
    }
}
