//! Shared data model: dimensionality tags, axes and detector payloads.
//!
//! An [`Axis`] is a named coordinate. Axes tagged *navigation* describe
//! the outer (scan) dimensions of a dataset: one entry per scan step.
//! Axes tagged *signal* describe the inner dimensions of a single
//! measurement (e.g. wavelength bins of a spectrometer).
//!
//! A [`DetectorData`] is the payload of one grab acknowledgment: a set of
//! named, dimension-tagged [`Channel`]s, each carrying its own signal
//! axes.

use serde::{Deserialize, Serialize};

/// Dimensionality of a single detector sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataDim {
    /// A scalar per step (e.g. power meter reading).
    Data0D,
    /// A vector per step (e.g. spectrum).
    Data1D,
    /// An image per step (e.g. camera frame).
    Data2D,
}

impl DataDim {
    /// Tag persisted in array attributes.
    pub fn label(&self) -> &'static str {
        match self {
            DataDim::Data0D => "Data0D",
            DataDim::Data1D => "Data1D",
            DataDim::Data2D => "Data2D",
        }
    }

    /// Number of signal dimensions.
    pub fn rank(&self) -> usize {
        match self {
            DataDim::Data0D => 0,
            DataDim::Data1D => 1,
            DataDim::Data2D => 2,
        }
    }
}

impl std::fmt::Display for DataDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Navigation layout of a scan, persisted in array attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanType {
    /// Not part of a scan (plain data).
    #[default]
    None,
    /// One navigation dimension.
    Scan1D,
    /// Two navigation dimensions.
    Scan2D,
}

impl ScanType {
    /// Tag persisted in array attributes (empty for [`ScanType::None`]).
    pub fn label(&self) -> &'static str {
        match self {
            ScanType::None => "",
            ScanType::Scan1D => "scan1D",
            ScanType::Scan2D => "scan2D",
        }
    }

    /// Derive the tag from the number of navigation dimensions.
    pub fn from_nav_rank(rank: usize) -> Self {
        match rank {
            0 => ScanType::None,
            1 => ScanType::Scan1D,
            _ => ScanType::Scan2D,
        }
    }
}

/// A named coordinate: either a navigation axis (indexed by scan step)
/// or a signal axis (internal to one measurement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Human-readable label, also used as the node name in the store.
    pub label: String,
    /// Physical units (may be empty).
    pub units: String,
    /// Rank of this axis in the nested iteration order; axes declared
    /// earlier vary slower (outer loop).
    pub index: usize,
    /// Ordered coordinate values.
    pub data: Vec<f64>,
}

impl Axis {
    pub fn new(label: impl Into<String>, units: impl Into<String>, index: usize, data: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            units: units.into(),
            index,
            data,
        }
    }

    /// Evenly spaced axis over `[start, stop]` with `n` points.
    pub fn linspace(label: impl Into<String>, units: impl Into<String>, index: usize, start: f64, stop: f64, n: usize) -> Self {
        let data = if n <= 1 {
            vec![start]
        } else {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        };
        Self::new(label, units, index, data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One named, dimension-tagged array produced by a detector grab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel label (e.g. "ch0", "spectrum").
    pub label: String,
    /// Dimensionality tag.
    pub dim: DataDim,
    /// Extent of one sample; empty for 0D.
    pub shape: Vec<usize>,
    /// Flat row-major sample values.
    pub data: Vec<f64>,
    /// Signal axes describing the inner dimensions.
    pub axes: Vec<Axis>,
}

impl Channel {
    /// A scalar channel.
    pub fn scalar(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            dim: DataDim::Data0D,
            shape: Vec::new(),
            data: vec![value],
            axes: Vec::new(),
        }
    }

    /// A 1D channel with an optional signal axis.
    pub fn vector(label: impl Into<String>, data: Vec<f64>, axes: Vec<Axis>) -> Self {
        let shape = vec![data.len()];
        Self {
            label: label.into(),
            dim: DataDim::Data1D,
            shape,
            data,
            axes,
        }
    }

    /// Number of elements in one sample (1 for 0D).
    pub fn sample_len(&self) -> usize {
        self.shape.iter().product::<usize>().max(1)
    }

    /// Check that `shape`, `dim` and `data` agree.
    pub fn validate(&self) -> Result<(), String> {
        if self.shape.len() != self.dim.rank() {
            return Err(format!(
                "channel '{}': shape rank {} does not match {}",
                self.label,
                self.shape.len(),
                self.dim
            ));
        }
        if self.data.len() != self.sample_len() {
            return Err(format!(
                "channel '{}': {} values for shape {:?}",
                self.label,
                self.data.len(),
                self.shape
            ));
        }
        Ok(())
    }
}

/// The payload carried by one detector grab acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorData {
    /// Title of the detector that produced this data.
    pub source: String,
    /// Named channels, in declaration order.
    pub channels: Vec<Channel>,
}

impl DetectorData {
    pub fn new(source: impl Into<String>, channels: Vec<Channel>) -> Self {
        Self {
            source: source.into(),
            channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_endpoints() {
        let axis = Axis::linspace("x", "mm", 0, 0.0, 10.0, 11);
        assert_eq!(axis.len(), 11);
        assert!((axis.data[0]).abs() < 1e-12);
        assert!((axis.data[10] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn linspace_single_point() {
        let axis = Axis::linspace("x", "", 0, 3.5, 9.0, 1);
        assert_eq!(axis.data, vec![3.5]);
    }

    #[test]
    fn scalar_channel_validates() {
        let ch = Channel::scalar("ch0", 42.0);
        assert!(ch.validate().is_ok());
        assert_eq!(ch.sample_len(), 1);
    }

    #[test]
    fn malformed_channel_rejected() {
        let mut ch = Channel::vector("spectrum", vec![1.0, 2.0, 3.0], Vec::new());
        ch.shape = vec![4];
        assert!(ch.validate().is_err());
    }

    #[test]
    fn scan_type_from_rank() {
        assert_eq!(ScanType::from_nav_rank(1), ScanType::Scan1D);
        assert_eq!(ScanType::from_nav_rank(3), ScanType::Scan2D);
        assert_eq!(ScanType::from_nav_rank(0).label(), "");
    }
}
