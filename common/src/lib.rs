//! Common Utilities and Types Library
//!
//! This crate provides the radio identifiers, resource intervals and the slot
//! clock shared by the MAC scheduler.

pub mod slot_point;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use slot_point::SlotPoint;
pub use types::*;
pub use utils::*;
