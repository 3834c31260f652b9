use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::report::InventoryReport;
use super::tracker::{Inventory, InventoryTargets};
use crate::config::constants::RANDOM_DELAY_UPPER_SECS;
use crate::config::models::InventorySettings;
use crate::messages::Message;
use crate::runtime::ExitSignal;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_EMPTY_POLLS: u32 = 10;
const REPORT_GRACE: Duration = Duration::from_secs(60);

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    OutOfTime,
    Complete,
    Otaped,
    FrequencyReached,
    Exit,
}

/// Start delay from the settings, or a random one when unset.
pub fn start_delay(settings: &InventorySettings) -> Duration {
    let secs = settings
        .delay_secs
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..RANDOM_DELAY_UPPER_SECS));
    Duration::from_secs(secs)
}

/// Longest wait for a single report: the jitter before the run, the start
/// delay and the run itself, plus a grace period.
pub fn report_timeout(settings: &InventorySettings, delay: Duration) -> Duration {
    let jitter = settings.jitter_minimum_secs.max(settings.jitter_maximum_secs);
    Duration::from_secs(jitter + settings.duration_secs) + delay + REPORT_GRACE
}

/// Runs advertiser inventories one after another and reports each of them.
pub struct AdvertiserManager {
    targets: InventoryTargets,
    delay: Duration,
    duration: Duration,
    jitter: (u64, u64),
    rx: mpsc::UnboundedReceiver<Message>,
    report_tx: mpsc::UnboundedSender<InventoryReport>,
    storage_tx: Option<mpsc::UnboundedSender<Message>>,
    exit: ExitSignal,
    poll_timeout: Duration,
}

impl AdvertiserManager {
    pub fn new(
        targets: InventoryTargets,
        settings: &InventorySettings,
        delay: Duration,
        rx: mpsc::UnboundedReceiver<Message>,
        report_tx: mpsc::UnboundedSender<InventoryReport>,
        exit: ExitSignal,
    ) -> Self {
        let mut settings = settings.clone();
        settings.normalize();
        Self {
            targets,
            delay,
            duration: Duration::from_secs(settings.duration_secs),
            jitter: (settings.jitter_minimum_secs, settings.jitter_maximum_secs),
            rx,
            report_tx,
            storage_tx: None,
            exit,
            poll_timeout: POLL_TIMEOUT,
        }
    }

    /// Forwards every received message to storage.
    pub fn with_storage(mut self, tx: mpsc::UnboundedSender<Message>) -> Self {
        self.storage_tx = Some(tx);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub async fn run(mut self, number_of_runs: u32) {
        for sequence in 0..number_of_runs {
            if self.exit.is_set() {
                break;
            }
            if sequence > 0 {
                let jitter = self.jitter();
                debug!(jitter_secs = jitter.as_secs(), "Waiting before next inventory");
                tokio::select! {
                    _ = self.exit.wait() => break,
                    _ = tokio::time::sleep(jitter) => {}
                }
            }
            let report = self.run_inventory(sequence).await;
            if self.report_tx.send(report).is_err() {
                warn!("Report consumer is gone");
                break;
            }
        }
    }

    fn jitter(&self) -> Duration {
        let (min, max) = self.jitter;
        if max <= min {
            return Duration::from_secs(min);
        }
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }

    pub async fn run_inventory(&mut self, sequence: u32) -> InventoryReport {
        let mut inventory = Inventory::new(self.targets.clone(), self.delay, self.duration);
        inventory.sequence = sequence;

        tokio::select! {
            _ = self.exit.wait() => {}
            _ = inventory.wait() => {}
        }
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        info!(sequence, discarded, "Starting inventory");

        let reason = self.collect(&mut inventory).await;
        info!(sequence, reason = ?reason, "Inventory stopped");

        let report = InventoryReport::from_inventory(&mut inventory);
        info!(
            test_sequence_number = sequence,
            total_nodes = report.observed_total,
            inventory_start = %report.start.to_rfc3339(),
            inventory_end = %report.end.to_rfc3339(),
            node_frequency = ?report.node_frequency,
            frequency_by_value = ?report.frequency_by_value,
            target_nodes = ?report.inventory_target_nodes,
            target_otap = ?report.inventory_target_otap,
            target_frequency = ?report.inventory_target_frequency,
            difference = ?report.difference,
            elapsed = report.elapsed,
            "Inventory record"
        );
        report
    }

    async fn collect(&mut self, inventory: &mut Inventory) -> StopReason {
        let mut index: u64 = 0;
        let mut empty_polls = 0;

        loop {
            if self.exit.is_set() {
                return StopReason::Exit;
            }

            let received = tokio::select! {
                _ = self.exit.wait() => return StopReason::Exit,
                received = tokio::time::timeout(self.poll_timeout, self.rx.recv()) => received,
            };
            let mut message = match received {
                Ok(Some(message)) => message,
                Ok(None) => {
                    warn!("Message channel closed");
                    return StopReason::Exit;
                }
                Err(_) => {
                    empty_polls += 1;
                    if empty_polls > MAX_EMPTY_POLLS {
                        debug!("Advertiser messages are not being received");
                        empty_polls = 0;
                    }
                    if inventory.is_out_of_time() {
                        return StopReason::OutOfTime;
                    }
                    continue;
                }
            };
            empty_polls = 0;

            if let Message::Advertiser(advertiser) = &mut message {
                advertiser.index = Some(index);
                index += 1;
                debug!(
                    index = advertiser.index,
                    source_address = advertiser.data.source_address,
                    transport_delay_ms = advertiser.data.transport_delay_ms(),
                    "Advertiser message"
                );
                for (node_address, record) in &advertiser.advertisers {
                    inventory.add(
                        *node_address,
                        record.rss.last().copied(),
                        record.otap.last().copied(),
                        record.time,
                    );
                }
            }

            if let Some(tx) = &self.storage_tx {
                if tx.send(message).is_err() {
                    warn!("Storage is gone, message not stored");
                }
            }

            if inventory.is_out_of_time() {
                return StopReason::OutOfTime;
            }
            if inventory.is_complete() {
                info!(sequence = inventory.sequence, "Inventory completed for all target nodes");
                return StopReason::Complete;
            }
            if inventory.is_otaped() {
                info!(sequence = inventory.sequence, "Inventory completed for all otap targets");
                return StopReason::Otaped;
            }
            if inventory.is_frequency_reached() {
                info!(sequence = inventory.sequence, "Inventory completed for frequency target");
                return StopReason::FrequencyReached;
            }
        }
    }
}
