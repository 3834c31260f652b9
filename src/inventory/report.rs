use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::tracker::{Inventory, NodeObservation};
use crate::config::Settings;
use crate::errors::InventoryError;
use crate::runtime::ExitSignal;

pub const REPORT_TITLE: &str = "test_advertiser";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryReport {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub elapsed: f64,
    pub difference: BTreeSet<u32>,
    pub inventory_target_nodes: BTreeSet<u32>,
    pub inventory_target_otap: Option<u8>,
    pub inventory_target_frequency: Option<u32>,
    pub node_frequency: BTreeMap<u32, u32>,
    pub frequency_by_value: BTreeMap<u32, usize>,
    pub observed_total: usize,
    pub observed: BTreeMap<u32, NodeObservation>,
}

impl InventoryReport {
    /// Finishes the inventory and summarizes it.
    pub fn from_inventory(inventory: &mut Inventory) -> Self {
        let end = inventory.finish();
        Self {
            title: format!("{}:{}", REPORT_TITLE, inventory.sequence),
            start: inventory.start(),
            end,
            elapsed: inventory.elapsed(),
            difference: inventory.difference(),
            inventory_target_nodes: inventory.targets.nodes.iter().copied().collect(),
            inventory_target_otap: inventory.targets.otap_sequence,
            inventory_target_frequency: inventory.targets.frequency,
            node_frequency: inventory.frequency(),
            frequency_by_value: inventory.frequency_by_value(),
            observed_total: inventory.nodes().len(),
            observed: inventory.nodes().clone(),
        }
    }
}

/// `output`, or `output` with its file name prefixed by the local time.
pub fn report_path(output: &str, output_time: bool, now: DateTime<Local>) -> PathBuf {
    let path = Path::new(output);
    if !output_time {
        return path.to_path_buf();
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        "{}_{}",
        now.format("%Y-%m-%dT%H:%M:%S%.6f"),
        file_name
    ))
}

/// Waits for one report per run and writes them as `{run: report}` JSON.
pub async fn fetch_reports(
    rx: &mut mpsc::UnboundedReceiver<InventoryReport>,
    timeout: Duration,
    number_of_runs: u32,
    exit: &ExitSignal,
    output: &Path,
) -> Result<BTreeMap<u32, InventoryReport>, InventoryError> {
    let mut reports = BTreeMap::new();
    for run in 0..number_of_runs {
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(report)) => {
                reports.insert(run, report);
            }
            Ok(None) => warn!(run, "Report channel closed"),
            Err(_) => warn!(run, timeout_secs = timeout.as_secs(), "Timed out waiting for report"),
        }

        if exit.is_set() {
            return Err(InventoryError::Interrupted);
        }
    }

    write_json(output, &reports)?;
    info!(path = %output.display(), runs = reports.len(), "Inventory reports written");
    Ok(reports)
}

/// Dumps the effective settings, without secrets, next to the reports.
pub fn write_run_information(settings: &Settings, dir: &Path, now: DateTime<Local>) -> Result<PathBuf, InventoryError> {
    let path = dir.join(format!(
        "run_information_{}.txt",
        now.format("%Y-%m-%dT%H:%M:%S%.6f")
    ));
    let contents = serde_yaml::to_string(&settings.redacted())?;
    std::fs::write(&path, contents).map_err(|source| InventoryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), InventoryError> {
    let contents = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, contents).map_err(|source| InventoryError::Io {
        path: path.display().to_string(),
        source,
    })
}
