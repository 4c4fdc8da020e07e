//! MAC Slot Scheduler Library
//!
//! Implements the 5G NR MAC scheduler of a DU: per-cell resource grids with a
//! sliding slot window, random access, broadcast and paging scheduling, the
//! per-cell-group UE scheduling context, and the dispatcher that routes
//! indications and drives the per-slot scheduling pass.

pub mod cell;
pub mod config;
pub mod config_validator;
pub mod harq;
pub mod logging;
pub mod metrics;
pub mod scheduler_impl;
pub mod ue;

#[cfg(test)]
pub(crate) mod test_utils;

use common::types::Rnti;
use thiserror::Error;

pub use config::{CellConfiguration, SchedConfigurationNotifier, SchedulerConfig, SchedulerExpertConfig};
pub use metrics::{SchedulerCellMetrics, SchedulerMetricsNotifier};
pub use scheduler_impl::MacScheduler;

#[doc(hidden)]
pub use tracing as __tracing;

/// Recoverable scheduler errors
///
/// These never unwind past the call that detected them. Internal invariant
/// violations use [`report_fatal_error!`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("RA response window expired: {0}")]
    WindowExpired(String),

    #[error("RNTI {0} already in use")]
    RntiInUse(Rnti),
}

/// Abort the process on a scheduler defect
#[macro_export]
macro_rules! report_fatal_error {
    ($($arg:tt)+) => {{
        let msg = format!($($arg)+);
        $crate::__tracing::error!("Fatal scheduler error: {}", msg);
        panic!("{}", msg)
    }};
}

/// Check an internal invariant, aborting with context when it does not hold
#[macro_export]
macro_rules! sanity_check {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::report_fatal_error!($($arg)+);
        }
    };
}
