//! Node model: handles, kinds, attributes and array payloads.
//!
//! Nodes live in a slab owned by the store and are addressed by
//! [`NodeId`] handles. Holding a handle never keeps a node alive on its
//! own and no node holds an owning reference back into the store, so
//! there are no ownership cycles between the engine, the store and the
//! session state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle to a node in the store's slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

/// Kind tag carried by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Owns ordered child nodes.
    Group,
    /// Pre-shaped array, mutable only by in-bounds index writes.
    FixedArray,
    /// Append-only array whose extent is unknown at creation.
    GrowableArray,
}

/// Group kind, persisted as the `type` attribute and used as the prefix
/// of incrementally named groups (`Scan000`, `Detector000`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Scan,
    Detector,
    Actuator,
    Channel,
    Data,
}

impl GroupKind {
    /// Lowercase tag stored in the `type` attribute.
    pub fn tag(&self) -> &'static str {
        match self {
            GroupKind::Scan => "scan",
            GroupKind::Detector => "detector",
            GroupKind::Actuator => "actuator",
            GroupKind::Channel => "ch",
            GroupKind::Data => "data",
        }
    }

    /// Capitalized prefix used for incremental naming.
    pub fn prefix(&self) -> &'static str {
        match self {
            GroupKind::Scan => "Scan",
            GroupKind::Detector => "Detector",
            GroupKind::Actuator => "Actuator",
            GroupKind::Channel => "Ch",
            GroupKind::Data => "Data",
        }
    }
}

/// Role tag of an array node, persisted as the `data_type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayRole {
    /// Detector channel data.
    Data,
    /// Signal axis internal to one measurement.
    Axis,
    /// Navigation axis indexed by scan position.
    NavigationAxis,
    /// Opaque logger records.
    Strings,
}

impl ArrayRole {
    pub fn label(&self) -> &'static str {
        match self {
            ArrayRole::Data => "data",
            ArrayRole::Axis => "axis",
            ArrayRole::NavigationAxis => "navigation_axis",
            ArrayRole::Strings => "strings",
        }
    }
}

/// Attribute values: scalars, strings, or fixed-length lists of those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// Array storage. Float payloads are flat row-major; the logger uses
/// variable-length opaque byte records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayPayload {
    /// Final shape known at creation; no later resize.
    Fixed { shape: Vec<usize>, data: Vec<f64> },
    /// Shape `(records, *inner_shape)`; grows by whole records along
    /// axis 0.
    Growable {
        inner_shape: Vec<usize>,
        records: usize,
        data: Vec<f64>,
    },
    /// Variable-length opaque records (logger).
    Records { records: Vec<Vec<u8>> },
}

impl ArrayPayload {
    /// True extent, including the growable record count.
    pub fn extent(&self) -> Vec<usize> {
        match self {
            ArrayPayload::Fixed { shape, .. } => shape.clone(),
            ArrayPayload::Growable {
                inner_shape,
                records,
                ..
            } => {
                let mut shape = vec![*records];
                shape.extend_from_slice(inner_shape);
                shape
            }
            ArrayPayload::Records { records } => vec![records.len()],
        }
    }
}

/// One addressable entity in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) attrs: BTreeMap<String, AttrValue>,
    pub(crate) payload: Option<ArrayPayload>,
}

impl Node {
    pub(crate) fn group(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Group,
            parent,
            children: Vec::new(),
            attrs: BTreeMap::new(),
            payload: None,
        }
    }

    pub(crate) fn array(
        name: impl Into<String>,
        parent: NodeId,
        kind: NodeKind,
        payload: ArrayPayload,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: Some(parent),
            children: Vec::new(),
            attrs: BTreeMap::new(),
            payload: Some(payload),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growable_extent_includes_record_count() {
        let payload = ArrayPayload::Growable {
            inner_shape: vec![5],
            records: 3,
            data: vec![0.0; 15],
        };
        assert_eq!(payload.extent(), vec![3, 5]);
    }

    #[test]
    fn attr_conversions() {
        assert_eq!(AttrValue::from(true).as_bool(), Some(true));
        assert_eq!(AttrValue::from("x").as_str(), Some("x"));
        assert_eq!(AttrValue::from(7i64).as_int(), Some(7));
        assert!(AttrValue::from(1.5).as_bool().is_none());
    }
}
