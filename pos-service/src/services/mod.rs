//! Service layer for pos-service.

pub mod database;
pub mod metrics;
pub mod reports;
pub mod submission;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
