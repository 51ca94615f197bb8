//! MAC Scheduler Library
//!
//! This crate implements the HARQ engine and the UE grant allocation of the
//! 5G NR MAC scheduler according to 3GPP TS 38.321 and TS 38.214.

pub mod config;
pub mod harq;
pub mod scheduler;

use thiserror::Error;

pub use config::{CellConfig, HarqConfig, SchedulerExpertConfig};

/// Errors raised while setting up the MAC scheduler
#[derive(Error, Debug)]
pub enum MacError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Install a test-friendly subscriber so `RUST_LOG=debug cargo test` shows scheduler logs
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
