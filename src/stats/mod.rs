//! Statistics for image delivery

pub mod metrics;

pub use metrics::{DeliveryStats, StatsSnapshot};
