// Library interface for queryprobe
// This allows integration tests to access the modules

pub mod analytics;
pub mod auth;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod options;
pub mod report;
pub mod sitemap;
pub mod storage;
pub mod utils;
