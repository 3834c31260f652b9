pub mod manager;
pub mod report;
pub mod tracker;

pub use manager::{report_timeout, start_delay, AdvertiserManager, StopReason};
pub use report::{fetch_reports, report_path, write_run_information, InventoryReport};
pub use tracker::{Inventory, InventoryTargets, NodeObservation};
