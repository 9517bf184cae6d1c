//! Hardware gateway interfaces for modaq.
//!
//! Devices are exposed to the scan engine through two small capability
//! traits ([`Actuator`] and [`Detector`]); concrete drivers live behind
//! them. This crate ships the trait definitions and a set of mock
//! devices used by the engine's tests and by simulation setups.

pub mod capabilities;
pub mod mock;

pub use capabilities::{Actuator, Detector};
pub use mock::{FaultyDetector, MockScalarDetector, MockSpectrumDetector, MockStage, SilentActuator};
