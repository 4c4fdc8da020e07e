//! Common Utilities and Types Library
//!
//! This crate provides shared types and utilities used across the DU scheduler.

pub mod bitmap;
pub mod interval;
pub mod slot_point;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use bitmap::PrbBitmap;
pub use interval::{Interval, OfdmSymbolRange, PrbInterval};
pub use slot_point::{SlotInterval, SlotPoint};
pub use types::*;
pub use utils::*;
