//! Position planning: expand axis specifications into ordered position
//! sequences and their navigation axes.
//!
//! Non-adaptive plans are materialized eagerly: the full position list
//! and one navigation [`Axis`] per input axis, each tagged with its rank
//! in the nested iteration order (axes declared earlier vary slower —
//! they are the outer loops). Adaptive plans produce positions on
//! demand from previously observed values and grow their navigation
//! axes one point at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! let plan = PositionPlanner::plan(
//!     &[
//!         AxisSpec::range("y", "mm", 0.0, 2.0, 1.0),
//!         AxisSpec::range("x", "mm", 0.0, 1.0, 1.0),
//!     ],
//!     ScanMode::Snake,
//! )?;
//! assert_eq!(plan.nav_shape, vec![3, 2]);
//! ```

use modaq_core::data::{Axis, ScanType};
use modaq_core::error::{ScanError, ScanResult};

/// Point source for one scan axis.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisPoints {
    /// Evenly stepped range, `stop` inclusive (within step tolerance).
    Range { start: f64, stop: f64, step: f64 },
    /// Explicit point list.
    List(Vec<f64>),
}

/// Specification of one scan axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub label: String,
    pub units: String,
    pub points: AxisPoints,
}

impl AxisSpec {
    pub fn range(label: &str, units: &str, start: f64, stop: f64, step: f64) -> Self {
        Self {
            label: label.to_string(),
            units: units.to_string(),
            points: AxisPoints::Range { start, stop, step },
        }
    }

    pub fn list(label: &str, units: &str, points: Vec<f64>) -> Self {
        Self {
            label: label.to_string(),
            units: units.to_string(),
            points: AxisPoints::List(points),
        }
    }

    fn expand(&self) -> ScanResult<Vec<f64>> {
        match &self.points {
            AxisPoints::List(points) => {
                if points.is_empty() {
                    return Err(ScanError::Config(format!(
                        "axis '{}' has no points",
                        self.label
                    )));
                }
                Ok(points.clone())
            }
            AxisPoints::Range { start, stop, step } => {
                if *step == 0.0 || !step.is_finite() {
                    return Err(ScanError::Config(format!(
                        "axis '{}' has invalid step {step}",
                        self.label
                    )));
                }
                if (stop - start) * step < 0.0 {
                    return Err(ScanError::Config(format!(
                        "axis '{}': step {step} never reaches {stop} from {start}",
                        self.label
                    )));
                }
                // Inclusive stop, with a half-step tolerance against
                // floating point accumulation.
                let n = ((stop - start) / step + 0.5).floor() as usize + 1;
                Ok((0..n).map(|i| start + step * i as f64).collect())
            }
        }
    }
}

/// Traversal order for non-adaptive plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Raster: the innermost axis always restarts from its first point.
    Linear,
    /// Serpentine: the innermost axis alternates direction per outer
    /// step; boundary points are revisited only at fold points.
    Snake,
}

/// Eagerly materialized plan: ordered positions plus navigation axes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeterminatePlan {
    /// One position tuple per scan index, one entry per axis.
    pub positions: Vec<Vec<f64>>,
    /// Grid coordinate of each position. For snake traversals this is
    /// the flipped coordinate, so a sample always lands at the cell the
    /// actuators actually visited.
    pub indexes: Vec<Vec<usize>>,
    /// One navigation axis per input axis, rank-tagged.
    pub nav_axes: Vec<Axis>,
    /// Extent of each navigation dimension, outer first.
    pub nav_shape: Vec<usize>,
    pub scan_type: ScanType,
}

impl DeterminatePlan {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Proposes the next position from all previously observed
/// (position, value) pairs; `None` signals convergence.
pub type Proposer = Box<dyn FnMut(&[(Vec<f64>, f64)]) -> Option<Vec<f64>> + Send>;

/// Adaptive plan: the next position is computed from observed values.
pub struct AdaptivePlan {
    axes: Vec<(String, String)>,
    budget: usize,
    proposer: Proposer,
    history: Vec<(Vec<f64>, f64)>,
    last_proposed: Option<Vec<f64>>,
    proposed: usize,
}

impl AdaptivePlan {
    /// `axes` are (label, units) pairs, one per actuator; `budget` caps
    /// the number of proposed points regardless of convergence.
    pub fn new(axes: Vec<(String, String)>, budget: usize, proposer: Proposer) -> Self {
        Self {
            axes,
            budget,
            proposer,
            history: Vec::new(),
            last_proposed: None,
            proposed: 0,
        }
    }

    /// Axis (label, units) pairs, in declaration order.
    pub fn axes(&self) -> &[(String, String)] {
        &self.axes
    }

    /// Feed back the value observed at the previously proposed position
    /// and obtain the next one. `None` is the stop signal: either the
    /// budget is exhausted or the proposer reported convergence.
    pub fn next(&mut self, previous_value: Option<f64>) -> Option<Vec<f64>> {
        if let (Some(position), Some(value)) = (self.last_proposed.take(), previous_value) {
            self.history.push((position, value));
        }
        if self.proposed >= self.budget {
            return None;
        }
        let position = (self.proposer)(&self.history)?;
        self.proposed += 1;
        self.last_proposed = Some(position.clone());
        Some(position)
    }
}

/// Produces ordered (or on-demand) position sequences.
pub struct PositionPlanner;

impl PositionPlanner {
    /// Expand per-axis specifications into the full ordered position
    /// sequence. Axes declared earlier vary slower (outer loop).
    pub fn plan(specs: &[AxisSpec], mode: ScanMode) -> ScanResult<DeterminatePlan> {
        if specs.is_empty() {
            return Err(ScanError::Config("scan needs at least one axis".into()));
        }
        let values: Vec<Vec<f64>> = specs
            .iter()
            .map(AxisSpec::expand)
            .collect::<ScanResult<_>>()?;
        let nav_shape: Vec<usize> = values.iter().map(Vec::len).collect();
        let total: usize = nav_shape.iter().product();

        let inner = specs.len() - 1;
        let mut positions = Vec::with_capacity(total);
        let mut indexes = Vec::with_capacity(total);
        for flat in 0..total {
            // Row-major index decomposition, outer axes first.
            let mut remainder = flat;
            let mut coords = vec![0usize; specs.len()];
            for axis in (0..specs.len()).rev() {
                coords[axis] = remainder % nav_shape[axis];
                remainder /= nav_shape[axis];
            }
            if mode == ScanMode::Snake && specs.len() > 1 {
                // Alternate the innermost axis direction per outer step.
                let outer_flat = flat / nav_shape[inner];
                if outer_flat % 2 == 1 {
                    coords[inner] = nav_shape[inner] - 1 - coords[inner];
                }
            }
            positions.push(
                coords
                    .iter()
                    .enumerate()
                    .map(|(axis, &i)| values[axis][i])
                    .collect(),
            );
            indexes.push(coords);
        }

        let nav_axes = specs
            .iter()
            .zip(values.iter())
            .enumerate()
            .map(|(index, (spec, data))| Axis::new(&spec.label, &spec.units, index, data.clone()))
            .collect();

        Ok(DeterminatePlan {
            positions,
            indexes,
            nav_axes,
            scan_type: ScanType::from_nav_rank(nav_shape.len()),
            nav_shape,
        })
    }

    /// Path-ordered plan: explicit rows of position tuples. The result
    /// has a single navigation dimension of length `rows.len()`, with
    /// one navigation axis per actuator sharing that dimension.
    pub fn tabular(axes: &[(String, String)], rows: Vec<Vec<f64>>) -> ScanResult<DeterminatePlan> {
        if rows.is_empty() {
            return Err(ScanError::Config("tabular scan has no rows".into()));
        }
        for row in &rows {
            if row.len() != axes.len() {
                return Err(ScanError::Config(format!(
                    "tabular row has {} values for {} axes",
                    row.len(),
                    axes.len()
                )));
            }
        }
        let nav_axes = axes
            .iter()
            .enumerate()
            .map(|(column, (label, units))| {
                let data = rows.iter().map(|row| row[column]).collect();
                // All tabular axes describe the same (single) navigation
                // dimension.
                Axis::new(label, units, 0, data)
            })
            .collect();
        Ok(DeterminatePlan {
            nav_shape: vec![rows.len()],
            indexes: (0..rows.len()).map(|i| vec![i]).collect(),
            positions: rows,
            nav_axes,
            scan_type: ScanType::Scan1D,
        })
    }
}

/// A plan handed to the engine for one run.
pub enum ScanPlan {
    Determinate(DeterminatePlan),
    Adaptive(AdaptivePlan),
}

impl From<DeterminatePlan> for ScanPlan {
    fn from(plan: DeterminatePlan) -> Self {
        ScanPlan::Determinate(plan)
    }
}

impl From<AdaptivePlan> for ScanPlan {
    fn from(plan: AdaptivePlan) -> Self {
        ScanPlan::Adaptive(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_expansion_is_inclusive() {
        let spec = AxisSpec::range("x", "mm", 0.0, 1.0, 0.25);
        assert_eq!(spec.expand().unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn zero_step_rejected() {
        let spec = AxisSpec::range("x", "", 0.0, 1.0, 0.0);
        assert!(matches!(spec.expand(), Err(ScanError::Config(_))));
    }

    #[test]
    fn wrong_direction_step_rejected() {
        let spec = AxisSpec::range("x", "", 0.0, 1.0, -0.5);
        assert!(spec.expand().is_err());
    }

    #[test]
    fn linear_grid_order_outer_first() {
        let plan = PositionPlanner::plan(
            &[
                AxisSpec::list("y", "", vec![0.0, 1.0]),
                AxisSpec::list("x", "", vec![10.0, 20.0, 30.0]),
            ],
            ScanMode::Linear,
        )
        .unwrap();

        assert_eq!(plan.nav_shape, vec![2, 3]);
        assert_eq!(plan.positions[0], vec![0.0, 10.0]);
        assert_eq!(plan.positions[2], vec![0.0, 30.0]);
        // y advances only after x completes a full traversal.
        assert_eq!(plan.positions[3], vec![1.0, 10.0]);
        assert_eq!(plan.nav_axes[0].index, 0);
        assert_eq!(plan.nav_axes[1].index, 1);
    }

    #[test]
    fn snake_alternates_inner_direction() {
        let plan = PositionPlanner::plan(
            &[
                AxisSpec::list("y", "", vec![0.0, 1.0]),
                AxisSpec::list("x", "", vec![10.0, 20.0, 30.0]),
            ],
            ScanMode::Snake,
        )
        .unwrap();

        let xs: Vec<f64> = plan.positions.iter().map(|p| p[1]).collect();
        assert_eq!(xs, vec![10.0, 20.0, 30.0, 30.0, 20.0, 10.0]);
        // The grid coordinate follows the flip: the fourth step sits at
        // the far end of the second row.
        assert_eq!(plan.indexes[3], vec![1, 2]);
        assert_eq!(plan.indexes[5], vec![1, 0]);
    }

    #[test]
    fn no_duplicate_adjacent_positions_except_fold() {
        let plan = PositionPlanner::plan(
            &[
                AxisSpec::list("y", "", vec![0.0, 1.0, 2.0]),
                AxisSpec::list("x", "", vec![0.0, 1.0]),
            ],
            ScanMode::Snake,
        )
        .unwrap();
        for pair in plan.positions.windows(2) {
            // Full tuples always differ: the inner coordinate repeats at
            // a fold, but the outer coordinate has advanced.
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn tabular_single_nav_dimension() {
        let plan = PositionPlanner::tabular(
            &[("x".into(), "mm".into()), ("y".into(), "mm".into())],
            vec![vec![0.0, 0.0], vec![1.0, 0.5], vec![2.0, 2.0]],
        )
        .unwrap();
        assert_eq!(plan.nav_shape, vec![3]);
        assert_eq!(plan.nav_axes.len(), 2);
        assert_eq!(plan.nav_axes[1].data, vec![0.0, 0.5, 2.0]);
        assert_eq!(plan.nav_axes[0].index, 0);
        assert_eq!(plan.nav_axes[1].index, 0);
    }

    #[test]
    fn tabular_ragged_rows_rejected() {
        let result = PositionPlanner::tabular(
            &[("x".into(), String::new())],
            vec![vec![0.0], vec![1.0, 2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn adaptive_budget_stops_proposals() {
        let mut plan = AdaptivePlan::new(
            vec![("x".into(), "mm".into())],
            5,
            Box::new(|history| Some(vec![history.len() as f64])),
        );

        let mut proposed = Vec::new();
        let mut value = None;
        while let Some(position) = plan.next(value) {
            value = Some(position[0] * 2.0);
            proposed.push(position);
        }
        assert_eq!(proposed.len(), 5);
        // The proposer saw each observed value exactly once.
        assert_eq!(proposed[4], vec![4.0]);
    }

    #[test]
    fn adaptive_proposer_convergence_stops_early() {
        let mut plan = AdaptivePlan::new(
            vec![("x".into(), String::new())],
            100,
            Box::new(|history| {
                if history.len() >= 3 {
                    None
                } else {
                    Some(vec![0.0])
                }
            }),
        );
        let mut count = 0;
        let mut value = None;
        while plan.next(value).is_some() {
            value = Some(1.0);
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
