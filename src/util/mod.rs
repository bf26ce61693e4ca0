//! Utility modules for the DataGator client.

pub mod spooled;

pub use spooled::{SpooledBuffer, DEFAULT_SPILL_THRESHOLD};
