//! Scan acquisition: position planning, device coordination and the
//! run loop.
//!
//! A run is described by a [`ScanPlan`] (materialized grid, tabular
//! path, or adaptive proposer), executed by the
//! [`ScanAcquisitionEngine`] against `modaq-hardware` capability traits
//! and persisted into a `modaq-store` [`HierarchicalStore`]. Device
//! commands are coordinated step-by-step through an all-or-nothing
//! barrier; sample coordinates come from the [`IndexMapper`].

pub mod barrier;
pub mod engine;
pub mod index;
pub mod plans;

pub use barrier::broadcast_and_wait;
pub use engine::{
    EngineHandle, EngineState, Notification, RunOutcome, RunSummary, ScanAcquisitionEngine,
};
pub use index::IndexMapper;
pub use plans::{
    AdaptivePlan, AxisPoints, AxisSpec, DeterminatePlan, PositionPlanner, ScanMode, ScanPlan,
};
