//! Mock devices for tests and simulation.
//!
//! All mocks use async-safe timing (`tokio::time::sleep`, never
//! `std::thread::sleep`) so they behave under paused-time tests.
//!
//! - [`MockStage`] — instantaneous or settling linear stage
//! - [`MockScalarDetector`] — 0D channel computed by a closure
//! - [`MockSpectrumDetector`] — 1D Gaussian line with optional noise
//! - [`SilentActuator`] — never acknowledges a chosen target (timeouts)
//! - [`FaultyDetector`] — fails after N grabs (actor-error paths)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::debug;

use modaq_core::data::{Axis, Channel, DetectorData};

use crate::capabilities::{Actuator, Detector};

// =============================================================================
// MockStage
// =============================================================================

/// Simulated linear stage with a configurable settling delay.
pub struct MockStage {
    title: String,
    units: String,
    settle: Duration,
    position: Arc<RwLock<f64>>,
}

impl MockStage {
    pub fn new(title: &str, units: &str) -> Self {
        Self {
            title: title.to_string(),
            units: units.to_string(),
            settle: Duration::ZERO,
            position: Arc::new(RwLock::new(0.0)),
        }
    }

    /// Settling delay applied to every move.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Shared position state, readable by observers (e.g. a detector
    /// closure computing a position-dependent signal).
    pub fn shared_position(&self) -> Arc<RwLock<f64>> {
        Arc::clone(&self.position)
    }
}

#[async_trait]
impl Actuator for MockStage {
    fn title(&self) -> &str {
        &self.title
    }

    fn units(&self) -> &str {
        &self.units
    }

    async fn move_to(&self, position: f64) -> Result<()> {
        if !self.settle.is_zero() {
            sleep(self.settle).await;
        }
        *self
            .position
            .write()
            .map_err(|_| anyhow!("stage position lock poisoned"))? = position;
        debug!(stage = %self.title, position, "mock stage settled");
        Ok(())
    }

    async fn current_value(&self) -> Result<f64> {
        Ok(*self
            .position
            .read()
            .map_err(|_| anyhow!("stage position lock poisoned"))?)
    }
}

// =============================================================================
// MockScalarDetector
// =============================================================================

/// 0D detector whose reading is computed by a user closure, typically
/// wired to a [`MockStage::shared_position`] handle.
pub struct MockScalarDetector {
    title: String,
    channel: String,
    sample: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl MockScalarDetector {
    pub fn new(
        title: &str,
        channel: &str,
        sample: impl Fn() -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            title: title.to_string(),
            channel: channel.to_string(),
            sample: Box::new(sample),
        }
    }
}

#[async_trait]
impl Detector for MockScalarDetector {
    fn title(&self) -> &str {
        &self.title
    }

    async fn grab(&self) -> Result<DetectorData> {
        let value = (self.sample)();
        Ok(DetectorData::new(
            self.title.clone(),
            vec![Channel::scalar(&self.channel, value)],
        ))
    }
}

// =============================================================================
// MockSpectrumDetector
// =============================================================================

/// 1D detector producing a Gaussian line over a fixed wavelength axis,
/// with optional uniform noise.
pub struct MockSpectrumDetector {
    title: String,
    bins: usize,
    center: f64,
    width: f64,
    noise: f64,
}

impl MockSpectrumDetector {
    pub fn new(title: &str, bins: usize) -> Self {
        Self {
            title: title.to_string(),
            bins,
            center: bins as f64 / 2.0,
            width: bins as f64 / 10.0,
            noise: 0.0,
        }
    }

    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude;
        self
    }
}

#[async_trait]
impl Detector for MockSpectrumDetector {
    fn title(&self) -> &str {
        &self.title
    }

    async fn grab(&self) -> Result<DetectorData> {
        let mut rng = rand::thread_rng();
        let data: Vec<f64> = (0..self.bins)
            .map(|i| {
                let x = (i as f64 - self.center) / self.width;
                let noise = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                (-x * x / 2.0).exp() + noise
            })
            .collect();
        let axis = Axis::linspace("wavelength", "nm", 0, 0.0, self.bins as f64 - 1.0, self.bins);
        Ok(DetectorData::new(
            self.title.clone(),
            vec![Channel::vector("spectrum", data, vec![axis])],
        ))
    }
}

// =============================================================================
// Failure-injection mocks
// =============================================================================

/// Actuator that never acknowledges a move to one chosen target; other
/// moves complete immediately. Used to exercise barrier timeouts.
pub struct SilentActuator {
    title: String,
    silent_at: f64,
    position: Arc<RwLock<f64>>,
}

impl SilentActuator {
    pub fn new(title: &str, silent_at: f64) -> Self {
        Self {
            title: title.to_string(),
            silent_at,
            position: Arc::new(RwLock::new(0.0)),
        }
    }

    pub fn shared_position(&self) -> Arc<RwLock<f64>> {
        Arc::clone(&self.position)
    }
}

#[async_trait]
impl Actuator for SilentActuator {
    fn title(&self) -> &str {
        &self.title
    }

    async fn move_to(&self, position: f64) -> Result<()> {
        if (position - self.silent_at).abs() < f64::EPSILON {
            // The acknowledgment never comes; the barrier deadline fires.
            std::future::pending::<()>().await;
        }
        *self
            .position
            .write()
            .map_err(|_| anyhow!("position lock poisoned"))? = position;
        Ok(())
    }

    async fn current_value(&self) -> Result<f64> {
        Ok(*self
            .position
            .read()
            .map_err(|_| anyhow!("position lock poisoned"))?)
    }
}

/// Detector that reports a hardware failure after a number of
/// successful grabs.
pub struct FaultyDetector {
    title: String,
    grabs_before_failure: usize,
    grabs: AtomicUsize,
}

impl FaultyDetector {
    pub fn new(title: &str, grabs_before_failure: usize) -> Self {
        Self {
            title: title.to_string(),
            grabs_before_failure,
            grabs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Detector for FaultyDetector {
    fn title(&self) -> &str {
        &self.title
    }

    async fn grab(&self) -> Result<DetectorData> {
        let n = self.grabs.fetch_add(1, Ordering::SeqCst);
        if n >= self.grabs_before_failure {
            debug!(detector = %self.title, grab = n, "injecting sensor fault");
            return Err(anyhow!("sensor fault on grab {n}"));
        }
        Ok(DetectorData::new(
            self.title.clone(),
            vec![Channel::scalar("ch0", n as f64)],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_moves_and_reads_back() {
        let stage = MockStage::new("stage_x", "mm");
        stage.move_to(4.5).await.unwrap();
        assert_eq!(stage.current_value().await.unwrap(), 4.5);
    }

    #[tokio::test]
    async fn scalar_detector_follows_stage_position() {
        let stage = MockStage::new("stage_x", "mm");
        let position = stage.shared_position();
        let detector = MockScalarDetector::new("det", "ch0", move || {
            *position.read().unwrap() * 10.0
        });

        stage.move_to(2.0).await.unwrap();
        let data = detector.grab().await.unwrap();
        assert_eq!(data.channels[0].data, vec![20.0]);
    }

    #[tokio::test]
    async fn spectrum_detector_shape_is_consistent() {
        let detector = MockSpectrumDetector::new("spectro", 64);
        let data = detector.grab().await.unwrap();
        let channel = &data.channels[0];
        assert!(channel.validate().is_ok());
        assert_eq!(channel.shape, vec![64]);
        assert_eq!(channel.axes[0].len(), 64);
    }

    #[tokio::test]
    async fn silent_actuator_times_out_only_at_target() {
        let actuator = SilentActuator::new("stage_x", 1.0);
        actuator.move_to(0.0).await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), actuator.move_to(1.0)).await;
        assert!(pending.is_err(), "move to silent target must never ack");
        // The aborted move left the position untouched.
        assert_eq!(actuator.current_value().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn faulty_detector_fails_after_budget() {
        let detector = FaultyDetector::new("det", 2);
        assert!(detector.grab().await.is_ok());
        assert!(detector.grab().await.is_ok());
        assert!(detector.grab().await.is_err());
    }
}
