use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// What an inventory run is looking for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryTargets {
    pub nodes: HashSet<u32>,
    pub otap_sequence: Option<u8>,
    pub frequency: Option<u32>,
}

/// Latest observation of one advertiser node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeObservation {
    pub count: u32,
    pub rss: Option<f64>,
    pub otap: Option<u8>,
    /// Milliseconds since the epoch.
    pub last_seen: u64,
}

/// Counts which advertiser nodes are heard inside a time window.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub targets: InventoryTargets,
    pub sequence: u32,
    start: DateTime<Utc>,
    deadline: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    nodes: BTreeMap<u32, NodeObservation>,
}

impl Inventory {
    pub fn new(targets: InventoryTargets, start_delay: Duration, maximum_duration: Duration) -> Self {
        Self::starting_at(targets, after(Utc::now(), start_delay), maximum_duration)
    }

    pub fn starting_at(targets: InventoryTargets, start: DateTime<Utc>, maximum_duration: Duration) -> Self {
        Self {
            targets,
            sequence: 0,
            start,
            deadline: after(start, maximum_duration),
            end: None,
            nodes: BTreeMap::new(),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Sleeps until the start time.
    pub async fn wait(&self) {
        if let Ok(remaining) = (self.start - Utc::now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }

    pub fn add(&mut self, node_address: u32, rss: Option<f64>, otap: Option<u8>, timestamp: u64) {
        let node = self.nodes.entry(node_address).or_default();
        node.count += 1;
        if rss.is_some() {
            node.rss = rss;
        }
        if otap.is_some() {
            node.otap = otap;
        }
        node.last_seen = timestamp;
    }

    pub fn is_out_of_time(&self) -> bool {
        self.is_out_of_time_at(Utc::now())
    }

    pub fn is_out_of_time_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Every target node has been observed.
    pub fn is_complete(&self) -> bool {
        !self.targets.nodes.is_empty()
            && self
                .targets
                .nodes
                .iter()
                .all(|node| self.nodes.contains_key(node))
    }

    /// Every observed node reports the target otap sequence.
    pub fn is_otaped(&self) -> bool {
        let Some(target) = self.targets.otap_sequence else {
            return false;
        };
        self.nodes.values().any(|node| node.otap.is_some())
            && self.nodes.values().all(|node| node.otap == Some(target))
    }

    /// Every observed node has been heard at least the target number of times.
    pub fn is_frequency_reached(&self) -> bool {
        let Some(target) = self.targets.frequency else {
            return false;
        };
        !self.nodes.is_empty() && self.nodes.values().all(|node| node.count >= target)
    }

    /// Target nodes not observed yet.
    pub fn difference(&self) -> BTreeSet<u32> {
        self.targets
            .nodes
            .iter()
            .filter(|node| !self.nodes.contains_key(node))
            .copied()
            .collect()
    }

    pub fn frequency(&self) -> BTreeMap<u32, u32> {
        self.nodes
            .iter()
            .map(|(address, node)| (*address, node.count))
            .collect()
    }

    /// Number of nodes per observation count.
    pub fn frequency_by_value(&self) -> BTreeMap<u32, usize> {
        let mut by_value = BTreeMap::new();
        for node in self.nodes.values() {
            *by_value.entry(node.count).or_insert(0) += 1;
        }
        by_value
    }

    pub fn nodes(&self) -> &BTreeMap<u32, NodeObservation> {
        &self.nodes
    }

    /// Stamps the end time on first call and returns it.
    pub fn finish(&mut self) -> DateTime<Utc> {
        *self.end.get_or_insert_with(Utc::now)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Seconds between start and end, zero before `finish`.
    pub fn elapsed(&self) -> f64 {
        self.end
            .map(|end| (end - self.start).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

fn after(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
