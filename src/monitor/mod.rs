pub mod cache;
pub mod commands;
pub mod config;
pub mod controller;
pub mod events;
pub mod filter;
pub mod history;
pub mod loop_worker;
pub mod persistence;

pub use cache::AppInfo;
pub use config::ScreenshotConfig;
pub use controller::{MonitorController, MonitorStatus};
pub use events::MonitorEvent;
pub use history::RecordSummary;
