pub mod config;
pub mod error;
pub mod funnel;
pub mod import;
pub mod telemetry;
