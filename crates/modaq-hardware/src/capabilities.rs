//! Hardware capability traits.
//!
//! The scan engine never depends on a concrete device type — only on the
//! two capability interfaces below. Each capability trait:
//!
//! - is async (`#[async_trait]`),
//! - is thread-safe (`Send + Sync`),
//! - uses `anyhow::Result` for driver-level errors.
//!
//! A driver failure surfacing through these traits aborts the run at the
//! coordination barrier; timeouts are enforced by the caller, not by the
//! device.

use anyhow::Result;
use async_trait::async_trait;

use modaq_core::data::DetectorData;

/// A positionable device (stage, rotator, delay line, ...).
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Display title; also used as the navigation-axis label fallback.
    fn title(&self) -> &str;

    /// Physical units of the position value.
    fn units(&self) -> &str {
        ""
    }

    /// Move to an absolute position. Resolving the future is the
    /// completion acknowledgment consumed by the coordination barrier.
    async fn move_to(&self, position: f64) -> Result<()>;

    /// Current position readback. May be polled by external observers
    /// while a scan is running.
    async fn current_value(&self) -> Result<f64>;
}

/// A measuring device producing named, dimension-tagged channels.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Display title; used as the detector group title in the store.
    fn title(&self) -> &str;

    /// Acquire one sample. Resolving the future is the completion
    /// acknowledgment; the payload carries every channel of this grab.
    async fn grab(&self) -> Result<DetectorData>;
}
