//! Scheduler Interface Library
//!
//! This crate defines the messages consumed and produced by the MAC scheduler:
//! indications from PHY and upper layers, configuration requests, and the
//! per-slot scheduling result handed to the PHY adapter.

pub mod bounded;
pub mod codec;
pub mod message_types;
pub mod sched_result;

use thiserror::Error;

pub use bounded::BoundedList;

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Invalid message format")]
    InvalidMessage,

    #[error("Buffer full")]
    BufferFull,
}
