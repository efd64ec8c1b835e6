#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core feeding logic (hardware-agnostic).
//!
//! This crate provides the hardware-independent feeder engine. All hardware
//! interactions go through the `feeder_traits` seams (`LoadcellAdc`,
//! `LimitSwitch`, `MotorDrive`, `Clock`).
//!
//! ## Architecture
//!
//! - **Sampling**: two-channel strain-gauge averaging with tare and gain
//!   calibration (`sampler` module)
//! - **Scheduling**: deficit accounting driven by elapsed time (`deficit`
//!   module)
//! - **Control**: the feeding state machine with jam escalation and limp
//!   fallbacks (`fsm` module)
//! - **Reporting**: read-only status, feed and error snapshots (`report`
//!   module)
//!
//! ## Time model
//!
//! All timing runs off a free-running `u32` millisecond counter that wraps
//! roughly every 49.7 days; duration math goes through `util::elapsed_ms`
//! rather than direct comparison.

pub mod config;
pub mod deficit;
pub mod error;
pub mod flags;
pub mod fsm;
pub mod mocks;
pub mod report;
pub mod sampler;
pub mod util;

pub use config::{FeedCfg, ScheduleCfg, SensorCfg};
pub use deficit::DeficitAccumulator;
pub use error::BuildError;
pub use flags::ErrorFlags;
pub use fsm::{FeedingController, FeedingState, MaintenanceMode, WeightEstimate};
pub use report::{
    ErrorReport, ErrorSeverity, FeedBlockReason, FeedReport, FeedResult, StateReport,
    REPORT_LARGE_WIDTH, REPORT_WIDTH,
};
pub use sampler::{Measurement, Sampler, SensorChannel};
