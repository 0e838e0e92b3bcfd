pub mod config;
pub mod errors;
pub mod models;
pub mod handlers;
pub mod services;
pub mod storage;
pub mod registry;
pub mod ledger;
pub mod recommendation;
pub mod photos;
pub mod reporting;
pub mod security_middleware;
pub mod metrics;

pub use config::Config;
pub use errors::{SeedTrackerError, Result};
