//! The scan acquisition engine: the run loop tying planner, barrier,
//! index mapper and store together.
//!
//! A run walks the planned positions; at each step every actuator is
//! moved and every detector is read through the coordination barrier,
//! and the samples land in the store at the coordinate computed by the
//! [`IndexMapper`]. The engine state machine is
//! `Idle -> Running -> {Stopping, TimedOut, Finished} -> Idle`,
//! published on a `watch` channel; progress events go out on a
//! best-effort `broadcast` channel (lagging receivers drop).
//!
//! Failure policy: barrier timeouts and actor errors abort the run,
//! store errors propagate, and a sample whose channel shapes disagree
//! with the layout established by the first sample is logged and
//! skipped. Whatever the exit path, the scan group is stamped
//! `scan_done = true` and the store is flushed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use modaq_core::config::ScanConfig;
use modaq_core::data::{DataDim, DetectorData, ScanType};
use modaq_core::error::{ScanError, ScanResult, StoreResult};
use modaq_hardware::{Actuator, Detector};
use modaq_store::node::{ArrayRole, AttrValue, NodeId};
use modaq_store::store::HierarchicalStore;

use crate::barrier::broadcast_and_wait;
use crate::index::IndexMapper;
use crate::plans::{AdaptivePlan, DeterminatePlan, ScanPlan};

/// Minimum interval between `NewSample`/`Progress` notifications. Fast
/// scans produce samples far quicker than any consumer wants to hear
/// about them.
const NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

/// Engine lifecycle state, published on a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// A stop request was observed at an iteration boundary; the run is
    /// winding down.
    Stopping,
    /// A barrier deadline elapsed; the run is winding down.
    TimedOut,
    /// The plan was exhausted; finalization is in progress.
    Finished,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::TimedOut => "timed_out",
            EngineState::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// How a run ended (when it did not abort with an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every planned position was visited.
    Finished,
    /// An operator stop request ended the run early.
    Stopped,
    /// A move or grab barrier deadline elapsed.
    TimedOut { phase: &'static str },
}

/// Result of a completed (possibly early-ended) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Store path of the scan group the run wrote into.
    pub scan_path: String,
    pub outcome: RunOutcome,
    /// Samples actually written (skipped steps excluded).
    pub samples_written: usize,
}

/// Best-effort progress events. Receivers that lag are disconnected by
/// the broadcast channel and simply miss events; the run never blocks
/// on a slow consumer.
#[derive(Debug, Clone)]
pub enum Notification {
    Status(String),
    Progress {
        average_index: usize,
        scan_index: usize,
        done: usize,
        /// `None` for adaptive runs, whose extent is unknown.
        total: Option<usize>,
    },
    /// A sample was written, with the values that were collected, so an
    /// observer (e.g. a live plotter) never has to re-read the store.
    NewSample {
        scan_index: usize,
        coords: Vec<usize>,
        samples: Vec<DetectorData>,
    },
    RunFinished { scan_path: String, outcome: RunOutcome },
    RunTimedOut { phase: &'static str },
}

/// Cloneable control surface handed to whoever supervises the engine.
#[derive(Clone)]
pub struct EngineHandle {
    stop: Arc<AtomicBool>,
    state: watch::Receiver<EngineState>,
    notify: broadcast::Sender<Notification>,
}

impl EngineHandle {
    /// Request a cooperative stop. The run ends at the next iteration
    /// boundary; a step already in flight completes normally.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify.subscribe()
    }
}

/// Per-channel storage slot established by the first sample.
struct ChannelSlot {
    array: NodeId,
    /// Flat element count of one sample.
    expected: usize,
}

struct DetectorLayout {
    channels: Vec<ChannelSlot>,
}

/// Storage layout of one run, created lazily when the first sample
/// arrives (the first grab defines the channel set and shapes).
struct RunLayout {
    nav_axes: Vec<NodeId>,
    detectors: Vec<DetectorLayout>,
}

/// Drives one scan run over a set of actuators and detectors, writing
/// into a [`HierarchicalStore`].
pub struct ScanAcquisitionEngine {
    actuators: Vec<Arc<dyn Actuator>>,
    detectors: Vec<Arc<dyn Detector>>,
    store: HierarchicalStore,
    config: ScanConfig,
    stop: Arc<AtomicBool>,
    state_tx: watch::Sender<EngineState>,
    notify_tx: broadcast::Sender<Notification>,
}

impl ScanAcquisitionEngine {
    pub fn new(
        store: HierarchicalStore,
        actuators: Vec<Arc<dyn Actuator>>,
        detectors: Vec<Arc<dyn Detector>>,
        config: ScanConfig,
    ) -> ScanResult<Self> {
        config.validate()?;
        let (state_tx, _) = watch::channel(EngineState::Idle);
        let (notify_tx, _) = broadcast::channel(64);
        Ok(Self {
            actuators,
            detectors,
            store,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            state_tx,
            notify_tx,
        })
    }

    /// Control surface for the supervising side.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            stop: Arc::clone(&self.stop),
            state: self.state_tx.subscribe(),
            notify: self.notify_tx.clone(),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }

    pub fn store(&self) -> &HierarchicalStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut HierarchicalStore {
        &mut self.store
    }

    /// Release the store (e.g. to close it after the last run).
    pub fn into_store(self) -> HierarchicalStore {
        self.store
    }

    /// Execute one run to completion.
    ///
    /// Returns `Ok` with the outcome for normal completion, operator
    /// stop and barrier timeout; actor and store errors abort with
    /// `Err`. The scan group is finalized (`scan_done = true`, store
    /// flushed) on every exit path.
    pub async fn run(&mut self, plan: impl Into<ScanPlan>) -> ScanResult<RunSummary> {
        if self.state() != EngineState::Idle {
            return Err(ScanError::NotIdle);
        }
        self.config.validate()?;
        if self.actuators.is_empty() {
            return Err(ScanError::Config("run needs at least one actuator".into()));
        }
        if self.detectors.is_empty() {
            return Err(ScanError::Config("run needs at least one detector".into()));
        }
        let plan = plan.into();
        match &plan {
            ScanPlan::Determinate(plan) => {
                if plan.is_empty() {
                    return Err(ScanError::Config("plan has no positions".into()));
                }
                if plan.positions[0].len() != self.actuators.len() {
                    return Err(ScanError::Config(format!(
                        "plan has {} axes for {} actuators",
                        plan.positions[0].len(),
                        self.actuators.len()
                    )));
                }
            }
            ScanPlan::Adaptive(plan) => {
                if plan.axes().len() != self.actuators.len() {
                    return Err(ScanError::Config(format!(
                        "plan has {} axes for {} actuators",
                        plan.axes().len(),
                        self.actuators.len()
                    )));
                }
            }
        }

        self.stop.store(false, Ordering::SeqCst);
        self.state_tx.send_replace(EngineState::Running);

        let scan = match self.resolve_session_root() {
            Ok(id) => id,
            Err(err) => {
                self.state_tx.send_replace(EngineState::Idle);
                return Err(err.into());
            }
        };
        let scan_path = self.store.path_of(scan);
        info!(scan = %scan_path, "run started");
        let _ = self
            .notify_tx
            .send(Notification::Status(format!("run started in {scan_path}")));
        if let Err(err) = self.store.log_record(&format!("run started in {scan_path}")) {
            self.state_tx.send_replace(EngineState::Idle);
            return Err(err.into());
        }

        let result = match plan {
            ScanPlan::Determinate(plan) => self.run_determinate(scan, &plan).await,
            ScanPlan::Adaptive(mut plan) => self.run_adaptive(scan, &mut plan).await,
        };

        let finalized = self.finalize(scan, &scan_path, &result);
        if let Err(err) = &finalized {
            error!(scan = %scan_path, error = %err, "run finalization failed");
        }
        self.state_tx.send_replace(EngineState::Idle);

        let (outcome, samples_written) = result?;
        finalized?;

        if !matches!(outcome, RunOutcome::TimedOut { .. }) {
            // A timed-out run already announced itself at the barrier.
            let _ = self.notify_tx.send(Notification::RunFinished {
                scan_path: scan_path.clone(),
                outcome,
            });
        }
        Ok(RunSummary {
            scan_path,
            outcome,
            samples_written,
        })
    }

    /// Reuse the latest scan group when it was never finished and never
    /// written to (a previous run died before its first sample);
    /// otherwise open a fresh `ScanNNN` group.
    fn resolve_session_root(&mut self) -> StoreResult<NodeId> {
        if let Some(last) = self.store.latest_scan_group() {
            let unfinished = self
                .store
                .get_attr(last, "scan_done")
                .and_then(AttrValue::as_bool)
                == Some(false);
            if unfinished && self.store.children(last)?.is_empty() {
                debug!(scan = %self.store.path_of(last), "reusing unfinished scan group");
                return Ok(last);
            }
        }
        self.store.add_scan_group("")
    }

    async fn run_determinate(
        &mut self,
        scan: NodeId,
        plan: &DeterminatePlan,
    ) -> ScanResult<(RunOutcome, usize)> {
        let mapper = IndexMapper::new(plan.nav_shape.clone(), self.config.averages);
        let total = plan.len() * self.config.averages;
        let mut layout: Option<RunLayout> = None;
        let mut written = 0usize;
        let mut last_notified: Option<Instant> = None;

        for average in 0..self.config.averages {
            for (scan_index, position) in plan.positions.iter().enumerate() {
                if self.stop.load(Ordering::SeqCst) {
                    info!(scan_index, "stop requested, ending run");
                    self.state_tx.send_replace(EngineState::Stopping);
                    return Ok((RunOutcome::Stopped, written));
                }

                match self.after_barrier(self.move_all(position).await)? {
                    Ok(_) => {}
                    Err(phase) => return Ok((RunOutcome::TimedOut { phase }, written)),
                }
                let wait = self.config.wait_between_move_and_grab();
                if !wait.is_zero() {
                    sleep(wait).await;
                }
                let frames = match self.after_barrier(self.grab_all().await)? {
                    Ok(frames) => frames,
                    Err(phase) => return Ok((RunOutcome::TimedOut { phase }, written)),
                };

                if layout.is_none() {
                    layout = Some(self.build_determinate_layout(scan, plan, &mapper, &frames)?);
                }
                let coords = mapper.map_coords(average, &plan.indexes[scan_index]);
                #[allow(clippy::unwrap_used)]
                let slots = layout.as_ref().unwrap();
                if self.write_step(slots, &coords, &frames)? {
                    written += 1;
                    if last_notified.map_or(true, |t| t.elapsed() >= NOTIFY_INTERVAL) {
                        let _ = self.notify_tx.send(Notification::NewSample {
                            scan_index,
                            coords: coords.clone(),
                            samples: frames.clone(),
                        });
                        let _ = self.notify_tx.send(Notification::Progress {
                            average_index: average,
                            scan_index,
                            done: written,
                            total: Some(total),
                        });
                        last_notified = Some(Instant::now());
                    }
                }

                let wait = self.config.wait_after_step();
                if !wait.is_zero() {
                    sleep(wait).await;
                }
            }
        }

        self.state_tx.send_replace(EngineState::Finished);
        Ok((RunOutcome::Finished, written))
    }

    async fn run_adaptive(
        &mut self,
        scan: NodeId,
        plan: &mut AdaptivePlan,
    ) -> ScanResult<(RunOutcome, usize)> {
        let mut layout: Option<RunLayout> = None;
        let mut written = 0usize;
        let mut last_notified: Option<Instant> = None;
        let mut feedback: Option<f64> = None;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!(written, "stop requested, ending adaptive run");
                self.state_tx.send_replace(EngineState::Stopping);
                return Ok((RunOutcome::Stopped, written));
            }
            let Some(position) = plan.next(feedback.take()) else {
                break;
            };
            if position.len() != self.actuators.len() {
                return Err(ScanError::Config(format!(
                    "proposer returned {} coordinates for {} actuators",
                    position.len(),
                    self.actuators.len()
                )));
            }

            match self.after_barrier(self.move_all(&position).await)? {
                Ok(_) => {}
                Err(phase) => return Ok((RunOutcome::TimedOut { phase }, written)),
            }
            let wait = self.config.wait_between_move_and_grab();
            if !wait.is_zero() {
                sleep(wait).await;
            }
            let frames = match self.after_barrier(self.grab_all().await)? {
                Ok(frames) => frames,
                Err(phase) => return Ok((RunOutcome::TimedOut { phase }, written)),
            };

            if layout.is_none() {
                layout = Some(self.build_adaptive_layout(scan, plan, &frames)?);
            }
            #[allow(clippy::unwrap_used)]
            let slots = layout.as_ref().unwrap();
            if self.append_step(slots, &position, &frames)? {
                // The proposer observes the first value of the first
                // channel of the first detector.
                feedback = frames
                    .first()
                    .and_then(|frame| frame.channels.first())
                    .and_then(|channel| channel.data.first())
                    .copied();
                let scan_index = written;
                written += 1;
                if last_notified.map_or(true, |t| t.elapsed() >= NOTIFY_INTERVAL) {
                    let _ = self.notify_tx.send(Notification::NewSample {
                        scan_index,
                        coords: vec![scan_index],
                        samples: frames.clone(),
                    });
                    let _ = self.notify_tx.send(Notification::Progress {
                        average_index: 0,
                        scan_index,
                        done: written,
                        total: None,
                    });
                    last_notified = Some(Instant::now());
                }
            }

            let wait = self.config.wait_after_step();
            if !wait.is_zero() {
                sleep(wait).await;
            }
        }

        self.state_tx.send_replace(EngineState::Finished);
        Ok((RunOutcome::Finished, written))
    }

    /// Distinguish a barrier timeout (a run outcome) from fatal errors.
    /// On timeout the state and notification are published here.
    fn after_barrier<T>(
        &self,
        result: ScanResult<T>,
    ) -> ScanResult<std::result::Result<T, &'static str>> {
        match result {
            Ok(value) => Ok(Ok(value)),
            Err(ScanError::TimedOut { phase, pending }) => {
                warn!(phase, pending = ?pending, "barrier timed out, aborting run");
                self.state_tx.send_replace(EngineState::TimedOut);
                let _ = self.notify_tx.send(Notification::RunTimedOut { phase });
                Ok(Err(phase))
            }
            Err(err) => Err(err),
        }
    }

    /// Move every actuator to its coordinate of `position`, all under
    /// one barrier deadline.
    async fn move_all(&self, position: &[f64]) -> ScanResult<()> {
        let mut commands: Vec<(String, BoxFuture<'static, anyhow::Result<()>>)> =
            Vec::with_capacity(self.actuators.len());
        for (actuator, &target) in self.actuators.iter().zip(position) {
            let name = actuator.title().to_string();
            let actuator = Arc::clone(actuator);
            commands.push((name, async move { actuator.move_to(target).await }.boxed()));
        }
        broadcast_and_wait("move", commands, self.config.move_timeout()).await?;
        Ok(())
    }

    /// Grab every detector under one barrier deadline. Frames come back
    /// in detector declaration order regardless of completion order.
    async fn grab_all(&self) -> ScanResult<Vec<DetectorData>> {
        let mut commands: Vec<(String, BoxFuture<'static, anyhow::Result<DetectorData>>)> =
            Vec::with_capacity(self.detectors.len());
        for detector in &self.detectors {
            let name = detector.title().to_string();
            let detector = Arc::clone(detector);
            commands.push((name, async move { detector.grab().await }.boxed()));
        }
        let acks = broadcast_and_wait("grab", commands, self.config.grab_timeout()).await?;

        let mut ordered: Vec<Option<DetectorData>> =
            (0..self.detectors.len()).map(|_| None).collect();
        for (name, frame) in acks {
            if let Some(slot) = self
                .detectors
                .iter()
                .enumerate()
                .position(|(i, d)| d.title() == name && ordered[i].is_none())
            {
                ordered[slot] = Some(frame);
            }
        }
        Ok(ordered.into_iter().flatten().collect())
    }

    /// Create navigation axes and per-channel data arrays for a
    /// determinate run. Called once, on the first sample.
    fn build_determinate_layout(
        &mut self,
        scan: NodeId,
        plan: &DeterminatePlan,
        mapper: &IndexMapper,
        frames: &[DetectorData],
    ) -> StoreResult<RunLayout> {
        let averages = self.config.averages;
        let shift = usize::from(averages > 1);
        let mut nav_axes = Vec::new();

        if averages > 1 {
            // The averaging dimension is itself a navigation axis,
            // leading every other one.
            let data: Vec<f64> = (0..averages).map(|i| i as f64).collect();
            let id = self.store.create_fixed_array(
                scan,
                "Average",
                &[averages],
                ArrayRole::NavigationAxis,
                DataDim::Data1D,
                plan.scan_type,
                "Average",
                Some(data),
            )?;
            self.store.set_attr(id, "nav_index", AttrValue::Int(0))?;
            nav_axes.push(id);
        }
        for axis in &plan.nav_axes {
            let id = self.store.create_fixed_array(
                scan,
                &axis.label,
                &[axis.len()],
                ArrayRole::NavigationAxis,
                DataDim::Data1D,
                plan.scan_type,
                &axis.label,
                Some(axis.data.clone()),
            )?;
            self.store
                .set_attr(id, "nav_index", AttrValue::Int((axis.index + shift) as i64))?;
            if !axis.units.is_empty() {
                self.store.set_attr(id, "units", axis.units.as_str().into())?;
            }
            nav_axes.push(id);
        }

        let detectors = self.build_channel_arrays(scan, frames, |store, parent, channel| {
            store.create_fixed_array(
                parent,
                "Data",
                &mapper.storage_shape(&channel.shape),
                ArrayRole::Data,
                channel.dim,
                plan.scan_type,
                &channel.label,
                None,
            )
        })?;
        info!(scan = %self.store.path_of(scan), detectors = detectors.len(), "layout created");
        Ok(RunLayout {
            nav_axes,
            detectors,
        })
    }

    /// Create growable navigation axes and data arrays for an adaptive
    /// run. Everything grows one record per accepted proposal.
    fn build_adaptive_layout(
        &mut self,
        scan: NodeId,
        plan: &AdaptivePlan,
        frames: &[DetectorData],
    ) -> StoreResult<RunLayout> {
        let mut nav_axes = Vec::new();
        for (index, (label, units)) in plan.axes().iter().enumerate() {
            let id = self.store.create_growable_array(
                scan,
                label,
                &[],
                ArrayRole::NavigationAxis,
                DataDim::Data1D,
                label,
            )?;
            self.store
                .set_attr(id, "nav_index", AttrValue::Int(index as i64))?;
            if !units.is_empty() {
                self.store.set_attr(id, "units", units.as_str().into())?;
            }
            nav_axes.push(id);
        }

        let detectors = self.build_channel_arrays(scan, frames, |store, parent, channel| {
            store.create_growable_array(
                parent,
                "Data",
                &channel.shape,
                ArrayRole::Data,
                channel.dim,
                &channel.label,
            )
        })?;
        info!(scan = %self.store.path_of(scan), detectors = detectors.len(), "adaptive layout created");
        Ok(RunLayout {
            nav_axes,
            detectors,
        })
    }

    /// Shared part of layout creation: `DetectorNNN/ChNNN` groups, one
    /// data array per channel (built by `make_data`), plus the
    /// channel's signal axes.
    fn build_channel_arrays(
        &mut self,
        scan: NodeId,
        frames: &[DetectorData],
        mut make_data: impl FnMut(
            &mut HierarchicalStore,
            NodeId,
            &modaq_core::data::Channel,
        ) -> StoreResult<NodeId>,
    ) -> StoreResult<Vec<DetectorLayout>> {
        let mut detectors = Vec::with_capacity(frames.len());
        for frame in frames {
            let det = self.store.add_det_group(scan, &frame.source)?;
            let mut channels = Vec::with_capacity(frame.channels.len());
            for channel in &frame.channels {
                let ch = self.store.add_ch_group(det, &channel.label)?;
                let array = make_data(&mut self.store, ch, channel)?;
                for (i, axis) in channel.axes.iter().enumerate() {
                    let name = format!("Axis{i:02}");
                    let axis_id = self.store.create_fixed_array(
                        ch,
                        &name,
                        &[axis.len()],
                        ArrayRole::Axis,
                        DataDim::Data1D,
                        ScanType::None,
                        &axis.label,
                        Some(axis.data.clone()),
                    )?;
                    if !axis.units.is_empty() {
                        self.store
                            .set_attr(axis_id, "units", axis.units.as_str().into())?;
                    }
                }
                channels.push(ChannelSlot {
                    array,
                    expected: channel.sample_len(),
                });
            }
            detectors.push(DetectorLayout { channels });
        }
        Ok(detectors)
    }

    /// Validate a sample against the layout, then write it at `coords`.
    /// A shape disagreement skips the whole step (returns `false`)
    /// without touching any array.
    fn write_step(
        &mut self,
        layout: &RunLayout,
        coords: &[usize],
        frames: &[DetectorData],
    ) -> StoreResult<bool> {
        if !self.step_matches_layout(layout, coords, frames) {
            return Ok(false);
        }
        let ticket = self.store.begin_write();
        for (frame, det) in frames.iter().zip(&layout.detectors) {
            for (channel, slot) in frame.channels.iter().zip(&det.channels) {
                self.store.write_at(slot.array, coords, &channel.data)?;
            }
        }
        drop(ticket);
        Ok(true)
    }

    /// Append one adaptive record: the position to every navigation
    /// axis, the sample to every channel array. Skips the whole step on
    /// a shape disagreement so all extents stay in lockstep.
    fn append_step(
        &mut self,
        layout: &RunLayout,
        position: &[f64],
        frames: &[DetectorData],
    ) -> StoreResult<bool> {
        if !self.step_matches_layout(layout, &[], frames) {
            return Ok(false);
        }
        let ticket = self.store.begin_write();
        for (&axis, &value) in layout.nav_axes.iter().zip(position) {
            self.store.append(axis, &[value])?;
        }
        for (frame, det) in frames.iter().zip(&layout.detectors) {
            for (channel, slot) in frame.channels.iter().zip(&det.channels) {
                self.store.append(slot.array, &channel.data)?;
            }
        }
        drop(ticket);
        Ok(true)
    }

    fn step_matches_layout(
        &self,
        layout: &RunLayout,
        coords: &[usize],
        frames: &[DetectorData],
    ) -> bool {
        for (frame, det) in frames.iter().zip(&layout.detectors) {
            if frame.channels.len() != det.channels.len() {
                warn!(
                    detector = %frame.source,
                    got = frame.channels.len(),
                    expected = det.channels.len(),
                    coords = ?coords,
                    "channel count changed mid-run, skipping sample"
                );
                return false;
            }
            for (channel, slot) in frame.channels.iter().zip(&det.channels) {
                if channel.data.len() != slot.expected {
                    warn!(
                        detector = %frame.source,
                        channel = %channel.label,
                        got = channel.data.len(),
                        expected = slot.expected,
                        coords = ?coords,
                        "unexpected channel shape, skipping sample"
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Stamp `scan_done`, log the outcome and flush. Runs on every exit
    /// path.
    fn finalize(
        &mut self,
        scan: NodeId,
        scan_path: &str,
        result: &ScanResult<(RunOutcome, usize)>,
    ) -> StoreResult<()> {
        let outcome = match result {
            Ok((RunOutcome::Finished, n)) => format!("run finished, {n} samples"),
            Ok((RunOutcome::Stopped, n)) => format!("run stopped by operator, {n} samples"),
            Ok((RunOutcome::TimedOut { phase }, n)) => {
                format!("run timed out during {phase}, {n} samples")
            }
            Err(err) => format!("run aborted: {err}"),
        };
        self.store.set_attr(scan, "scan_done", true.into())?;
        self.store.log_record(&format!("{outcome} in {scan_path}"))?;
        self.store.flush()?;
        info!(scan = %scan_path, outcome = %outcome, "run finalized");
        Ok(())
    }
}
