//! The hierarchical store: groups, arrays, attributes, durable flush.
//!
//! A store is a slab of [`Node`]s addressed by [`NodeId`] handles plus a
//! file path the slab is snapshotted to on [`HierarchicalStore::flush`].
//! Opening with [`OpenMode::Truncate`] bootstraps the canonical layout:
//!
//! ```text
//! /RawData            type="scan", modaq_version, date, time
//!   /Logger           growable array of opaque records
//! ```
//!
//! Opening with [`OpenMode::Append`] reloads an existing snapshot; the
//! "last scan" pointer is re-derived by a lexicographic scan of the
//! `Scan*` children rather than trusted from any cached index.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use modaq_core::config::StoreFilters;
use modaq_core::data::{DataDim, ScanType};
use modaq_core::error::{StoreError, StoreResult};

use crate::node::{ArrayPayload, ArrayRole, AttrValue, GroupKind, Node, NodeId, NodeKind};

/// Zero-padded width of incremental group suffixes. Three digits per the
/// canonical layout (`Scan000` .. `Scan999`); indices past 999 fail with
/// `NamingOverflow` instead of wrapping.
const SUFFIX_WIDTH: usize = 3;
const MAX_SUFFIX: usize = 999;

const VERSION_ATTR: &str = "modaq_version";

/// File open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a fresh file, replacing any existing one.
    Truncate,
    /// Reuse an existing file, appending new scans to it.
    Append,
}

/// RAII guard marking an array write as in flight. While any ticket is
/// alive, [`HierarchicalStore::close`] fails loudly instead of risking a
/// snapshot that disagrees with the true array extents.
pub struct WriteTicket {
    counter: Arc<AtomicUsize>,
}

impl Drop for WriteTicket {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    nodes: Vec<Node>,
    root: NodeId,
    raw_group: NodeId,
    logger: NodeId,
}

/// Typed node/group/array container with path addressing and durable
/// snapshots.
pub struct HierarchicalStore {
    path: PathBuf,
    nodes: Vec<Node>,
    root: NodeId,
    raw_group: NodeId,
    logger: NodeId,
    filters: StoreFilters,
    closed: bool,
    in_flight: Arc<AtomicUsize>,
}

/// First-letter capitalization used to normalize group names, matching
/// the canonical layout (`Scan000`, `External`, ...). Array names are
/// stored as given: an axis labeled `x` persists as node `x`.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

impl HierarchicalStore {
    /// Open a store file.
    ///
    /// `filters` apply to arrays created through this handle; existing
    /// arrays keep the filters they were created with.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, filters: StoreFilters) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        match mode {
            OpenMode::Truncate => Self::create(path, filters),
            OpenMode::Append => {
                if path.is_file() {
                    Self::load(path, filters)
                } else {
                    Self::create(path, filters)
                }
            }
        }
    }

    fn create(path: PathBuf, filters: StoreFilters) -> StoreResult<Self> {
        let root = NodeId(0);
        let mut store = Self {
            path,
            nodes: vec![Node::group("/", None)],
            root,
            raw_group: root,
            logger: root,
            filters,
            closed: false,
            in_flight: Arc::new(AtomicUsize::new(0)),
        };

        let now = chrono::Local::now();
        let raw = store.insert_child(root, Node::group("RawData", Some(root)))?;
        store.nodes[raw.0].attrs.insert("type".into(), "scan".into());
        store.nodes[raw.0].attrs.insert(
            VERSION_ATTR.into(),
            env!("CARGO_PKG_VERSION").into(),
        );
        store.nodes[raw.0]
            .attrs
            .insert("date".into(), now.format("%Y-%m-%d").to_string().into());
        store.nodes[raw.0]
            .attrs
            .insert("time".into(), now.format("%H:%M:%S").to_string().into());
        store.raw_group = raw;

        let logger = store.insert_child(
            raw,
            Node::array(
                "Logger",
                raw,
                NodeKind::GrowableArray,
                ArrayPayload::Records {
                    records: Vec::new(),
                },
            ),
        )?;
        store.nodes[logger.0]
            .attrs
            .insert("data_type".into(), ArrayRole::Strings.label().into());
        store.nodes[logger.0]
            .attrs
            .insert("shape".into(), AttrValue::IntList(vec![0]));
        store.logger = logger;

        store.flush()?;
        info!(path = %store.path.display(), "created store file");
        Ok(store)
    }

    fn load(path: PathBuf, filters: StoreFilters) -> StoreResult<Self> {
        let bytes = std::fs::read(&path)?;
        let snapshot: Snapshot =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        let store = Self {
            path,
            nodes: snapshot.nodes,
            root: snapshot.root,
            raw_group: snapshot.raw_group,
            logger: snapshot.logger,
            filters,
            closed: false,
            in_flight: Arc::new(AtomicUsize::new(0)),
        };
        info!(
            path = %store.path.display(),
            last_scan = ?store.latest_scan_group().map(|id| store.nodes[id.0].name.clone()),
            "reopened store file"
        );
        Ok(store)
    }

    /// Root group handle.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// `/RawData` group handle.
    pub fn raw_group(&self) -> NodeId {
        self.raw_group
    }

    fn node(&self, id: NodeId) -> StoreResult<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| StoreError::NodeNotFound(format!("#{}", id.0)))
    }

    /// POSIX-like absolute path of a node.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get(node_id.0) else {
                break;
            };
            if node.parent.is_some() {
                segments.push(node.name.clone());
            }
            current = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Resolve a slash-separated path to a handle.
    pub fn node_by_path(&self, path: &str) -> StoreResult<NodeId> {
        let mut current = self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .child_by_name(current, segment)
                .ok_or_else(|| StoreError::NodeNotFound(path.to_string()))?;
        }
        Ok(current)
    }

    /// Ordered children of a group.
    pub fn children(&self, id: NodeId) -> StoreResult<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    /// Node name.
    pub fn name(&self, id: NodeId) -> StoreResult<&str> {
        Ok(self.node(id)?.name())
    }

    /// Node kind tag.
    pub fn kind(&self, id: NodeId) -> StoreResult<NodeKind> {
        Ok(self.node(id)?.kind())
    }

    /// Lookup a direct child by name: exact match first, then the
    /// capitalized form (groups are stored case-normalized, arrays
    /// verbatim).
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.nodes.get(parent.0)?;
        let exact = parent
            .children
            .iter()
            .copied()
            .find(|id| self.nodes[id.0].name == name);
        exact.or_else(|| {
            let normalized = capitalize(name);
            parent
                .children
                .iter()
                .copied()
                .find(|id| self.nodes[id.0].name == normalized)
        })
    }

    fn insert_child(&mut self, parent: NodeId, node: Node) -> StoreResult<NodeId> {
        if self.node(parent)?.kind != NodeKind::Group {
            return Err(StoreError::NotAGroup(self.path_of(parent)));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    // -------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------

    /// Get or create a named child group.
    ///
    /// Idempotent: if a child with that (case-normalized) name already
    /// exists it is returned unchanged, attributes untouched.
    pub fn add_group(
        &mut self,
        parent: NodeId,
        name: &str,
        kind: GroupKind,
        title: &str,
        metadata: Vec<(String, AttrValue)>,
    ) -> StoreResult<NodeId> {
        self.ensure_open()?;
        let normalized = capitalize(name);
        if let Some(existing) = self.child_by_name(parent, &normalized) {
            debug!(path = %self.path_of(existing), "group exists, reusing");
            return Ok(existing);
        }

        let id = self.insert_child(parent, Node::group(normalized, Some(parent)))?;
        let attrs = &mut self.nodes[id.0].attrs;
        attrs.insert("type".into(), kind.tag().into());
        if !title.is_empty() {
            attrs.insert("TITLE".into(), title.into());
        }
        for (key, value) in metadata {
            attrs.insert(key, value);
        }
        Ok(id)
    }

    /// Create the next `"{Prefix}{NNN}"` child group.
    ///
    /// The next index is recomputed from a sorted scan of the existing
    /// children on every call; no cached index is trusted. Suffixes are
    /// zero-padded to a fixed width, so lexicographic order is numeric
    /// order and repeated calls yield strictly increasing, gap-free
    /// names.
    pub fn add_incremental_group(
        &mut self,
        parent: NodeId,
        kind: GroupKind,
        title: &str,
        metadata: Vec<(String, AttrValue)>,
    ) -> StoreResult<NodeId> {
        self.ensure_open()?;
        let prefix = kind.prefix();
        let next = match self.max_suffix(parent, prefix)? {
            Some(max) if max >= MAX_SUFFIX => {
                return Err(StoreError::NamingOverflow {
                    prefix: prefix.to_string(),
                    max: MAX_SUFFIX,
                })
            }
            Some(max) => max + 1,
            None => 0,
        };
        let width = SUFFIX_WIDTH;
        let name = format!("{prefix}{next:0width$}");
        self.add_group(parent, &name, kind, title, metadata)
    }

    fn max_suffix(&self, parent: NodeId, prefix: &str) -> StoreResult<Option<usize>> {
        let mut max = None;
        for &child in &self.node(parent)?.children {
            let name = &self.nodes[child.0].name;
            let Some(suffix) = name.strip_prefix(prefix) else {
                continue;
            };
            if suffix.len() != SUFFIX_WIDTH || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let value: usize = suffix.parse().unwrap_or(0);
            max = Some(max.map_or(value, |m: usize| m.max(value)));
        }
        Ok(max)
    }

    /// Create the next `ScanNNN` group under `/RawData`, stamped with
    /// the `description` and `scan_done` attributes used to resume
    /// incomplete runs.
    pub fn add_scan_group(&mut self, title: &str) -> StoreResult<NodeId> {
        let metadata = vec![
            ("description".to_string(), "".into()),
            ("scan_done".to_string(), false.into()),
        ];
        self.add_incremental_group(self.raw_group, GroupKind::Scan, title, metadata)
    }

    /// Create the next `DetectorNNN` group.
    pub fn add_det_group(&mut self, parent: NodeId, title: &str) -> StoreResult<NodeId> {
        self.add_incremental_group(parent, GroupKind::Detector, title, Vec::new())
    }

    /// Create the next `ChNNN` group.
    pub fn add_ch_group(&mut self, parent: NodeId, title: &str) -> StoreResult<NodeId> {
        self.add_incremental_group(parent, GroupKind::Channel, title, Vec::new())
    }

    /// Latest `ScanNNN` child of `/RawData`, by lexicographic scan of
    /// the zero-padded names.
    pub fn latest_scan_group(&self) -> Option<NodeId> {
        let raw = self.nodes.get(self.raw_group.0)?;
        raw.children
            .iter()
            .copied()
            .filter(|id| {
                let name = &self.nodes[id.0].name;
                name.strip_prefix("Scan")
                    .map(|s| s.len() == SUFFIX_WIDTH && s.bytes().all(|b| b.is_ascii_digit()))
                    .unwrap_or(false)
            })
            .max_by(|a, b| self.nodes[a.0].name.cmp(&self.nodes[b.0].name))
    }

    // -------------------------------------------------------------------
    // Arrays
    // -------------------------------------------------------------------

    /// Create a pre-shaped array. Zero-filled when `initial` is `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_fixed_array(
        &mut self,
        parent: NodeId,
        name: &str,
        shape: &[usize],
        role: ArrayRole,
        dim: DataDim,
        scan_type: ScanType,
        title: &str,
        initial: Option<Vec<f64>>,
    ) -> StoreResult<NodeId> {
        self.ensure_open()?;
        let total: usize = shape.iter().product();
        let data = match initial {
            Some(data) => {
                if data.len() != total {
                    return Err(StoreError::ShapeMismatch {
                        path: format!("{}/{}", self.path_of(parent), name),
                        expected: total,
                        actual: data.len(),
                    });
                }
                data
            }
            None => vec![0.0; total],
        };

        let id = self.new_array(
            parent,
            name,
            NodeKind::FixedArray,
            ArrayPayload::Fixed {
                shape: shape.to_vec(),
                data,
            },
        )?;
        self.stamp_array_attrs(id, role, dim, scan_type, title, shape);
        Ok(id)
    }

    /// Create an append-only array with shape `(0, *inner_shape)`.
    pub fn create_growable_array(
        &mut self,
        parent: NodeId,
        name: &str,
        inner_shape: &[usize],
        role: ArrayRole,
        dim: DataDim,
        title: &str,
    ) -> StoreResult<NodeId> {
        self.ensure_open()?;
        let id = self.new_array(
            parent,
            name,
            NodeKind::GrowableArray,
            ArrayPayload::Growable {
                inner_shape: inner_shape.to_vec(),
                records: 0,
                data: Vec::new(),
            },
        )?;
        let mut shape = vec![0];
        shape.extend_from_slice(inner_shape);
        self.stamp_array_attrs(id, role, dim, ScanType::None, title, &shape);
        Ok(id)
    }

    fn new_array(
        &mut self,
        parent: NodeId,
        name: &str,
        kind: NodeKind,
        payload: ArrayPayload,
    ) -> StoreResult<NodeId> {
        if self.child_by_name(parent, name).is_some() {
            return Err(StoreError::DuplicateName(format!(
                "{}/{name}",
                self.path_of(parent)
            )));
        }
        self.insert_child(parent, Node::array(name.to_string(), parent, kind, payload))
    }

    fn stamp_array_attrs(
        &mut self,
        id: NodeId,
        role: ArrayRole,
        dim: DataDim,
        scan_type: ScanType,
        title: &str,
        shape: &[usize],
    ) {
        let compression = self.filters.clone();
        let attrs = &mut self.nodes[id.0].attrs;
        attrs.insert("data_type".into(), role.label().into());
        attrs.insert("type".into(), role.label().into());
        attrs.insert("data_dimension".into(), dim.label().into());
        attrs.insert("scan_type".into(), scan_type.label().into());
        attrs.insert("dtype".into(), "f64".into());
        if !title.is_empty() {
            attrs.insert("TITLE".into(), title.into());
        }
        attrs.insert(
            "shape".into(),
            AttrValue::IntList(shape.iter().map(|&s| s as i64).collect()),
        );
        attrs.insert("compression".into(), compression.compression_kind.into());
        attrs.insert(
            "compression_level".into(),
            AttrValue::Int(compression.compression_level as i64),
        );
    }

    /// Write a block at an in-bounds index of a fixed array.
    ///
    /// `index` addresses the leading dimensions; `data` must fill the
    /// remaining ones exactly. Bounds are checked before any mutation,
    /// so a failed write never writes partially.
    pub fn write_at(&mut self, array: NodeId, index: &[usize], data: &[f64]) -> StoreResult<()> {
        self.ensure_open()?;
        let path = self.path_of(array);
        let node = self
            .nodes
            .get_mut(array.0)
            .ok_or_else(|| StoreError::NodeNotFound(path.clone()))?;
        let Some(ArrayPayload::Fixed { shape, data: buf }) = node.payload.as_mut() else {
            return Err(StoreError::NotAnArray(path));
        };

        if index.len() > shape.len() {
            return Err(StoreError::OutOfBounds {
                path,
                index: index.to_vec(),
                shape: shape.clone(),
            });
        }
        for (coord, extent) in index.iter().zip(shape.iter()) {
            if coord >= extent {
                return Err(StoreError::OutOfBounds {
                    path,
                    index: index.to_vec(),
                    shape: shape.clone(),
                });
            }
        }

        let block: usize = shape[index.len()..].iter().product();
        if data.len() != block {
            return Err(StoreError::ShapeMismatch {
                path,
                expected: block,
                actual: data.len(),
            });
        }

        let mut offset = 0;
        for (coord, extent) in index.iter().zip(shape.iter()) {
            offset = offset * extent + coord;
        }
        let start = offset * block;
        buf[start..start + block].copy_from_slice(data);
        Ok(())
    }

    /// Append one record of shape `inner_shape` to a growable array.
    ///
    /// The cached `shape` attribute is updated in the same call, so the
    /// attribute always equals the true stored extent.
    pub fn append(&mut self, array: NodeId, record: &[f64]) -> StoreResult<()> {
        self.ensure_open()?;
        let path = self.path_of(array);
        let node = self
            .nodes
            .get_mut(array.0)
            .ok_or_else(|| StoreError::NodeNotFound(path.clone()))?;
        let Some(ArrayPayload::Growable {
            inner_shape,
            records,
            data,
        }) = node.payload.as_mut()
        else {
            return Err(StoreError::NotGrowable(path));
        };

        let expected: usize = inner_shape.iter().product::<usize>().max(1);
        if record.len() != expected {
            return Err(StoreError::ShapeMismatch {
                path,
                expected,
                actual: record.len(),
            });
        }

        data.extend_from_slice(record);
        *records += 1;
        let mut shape = vec![*records as i64];
        shape.extend(inner_shape.iter().map(|&s| s as i64));
        node.attrs.insert("shape".into(), AttrValue::IntList(shape));
        Ok(())
    }

    /// Append one opaque record to a byte-record array (the Logger).
    pub fn append_record(&mut self, array: NodeId, bytes: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        let path = self.path_of(array);
        let node = self
            .nodes
            .get_mut(array.0)
            .ok_or_else(|| StoreError::NodeNotFound(path.clone()))?;
        let Some(ArrayPayload::Records { records }) = node.payload.as_mut() else {
            return Err(StoreError::NotGrowable(path));
        };
        records.push(bytes.to_vec());
        let count = records.len() as i64;
        node.attrs
            .insert("shape".into(), AttrValue::IntList(vec![count]));
        Ok(())
    }

    /// Append a UTF-8 line to the reserved `/RawData/Logger` array.
    pub fn log_record(&mut self, text: &str) -> StoreResult<()> {
        let logger = self.logger;
        self.append_record(logger, text.as_bytes())
    }

    // -------------------------------------------------------------------
    // Attributes & data access
    // -------------------------------------------------------------------

    /// Set an attribute on any node.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: AttrValue) -> StoreResult<()> {
        self.ensure_open()?;
        let path = self.path_of(id);
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or(StoreError::NodeNotFound(path))?;
        node.attrs.insert(name.to_string(), value);
        Ok(())
    }

    /// Read an attribute from any node.
    pub fn get_attr(&self, id: NodeId, name: &str) -> Option<&AttrValue> {
        self.nodes.get(id.0)?.attrs.get(name)
    }

    /// Flat row-major contents of a float array.
    pub fn array_data(&self, id: NodeId) -> StoreResult<&[f64]> {
        let node = self.node(id)?;
        match node.payload.as_ref() {
            Some(ArrayPayload::Fixed { data, .. }) => Ok(data),
            Some(ArrayPayload::Growable { data, .. }) => Ok(data),
            _ => Err(StoreError::NotAnArray(self.path_of(id))),
        }
    }

    /// True extent of an array (growable arrays include the record
    /// count as the leading dimension).
    pub fn array_shape(&self, id: NodeId) -> StoreResult<Vec<usize>> {
        let node = self.node(id)?;
        node.payload
            .as_ref()
            .map(ArrayPayload::extent)
            .ok_or_else(|| StoreError::NotAnArray(self.path_of(id)))
    }

    /// One opaque record of a byte-record array.
    pub fn record_bytes(&self, id: NodeId, index: usize) -> StoreResult<&[u8]> {
        let node = self.node(id)?;
        match node.payload.as_ref() {
            Some(ArrayPayload::Records { records }) => records
                .get(index)
                .map(|r| r.as_slice())
                .ok_or_else(|| StoreError::OutOfBounds {
                    path: self.path_of(id),
                    index: vec![index],
                    shape: vec![records.len()],
                }),
            _ => Err(StoreError::NotAnArray(self.path_of(id))),
        }
    }

    // -------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------

    /// Mark an array write as in flight until the ticket is dropped.
    pub fn begin_write(&self) -> WriteTicket {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        WriteTicket {
            counter: Arc::clone(&self.in_flight),
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Make all writes durable: snapshot to a temp file, then rename
    /// over the target and sync.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        let snapshot = Snapshot {
            nodes: self.nodes.clone(),
            root: self.root,
            raw_group: self.raw_group,
            logger: self.logger,
        };
        let bytes =
            bincode::serialize(&snapshot).map_err(|e| StoreError::Codec(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        let file = std::fs::File::open(&self.path)?;
        file.sync_all()?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "flushed store");
        Ok(())
    }

    /// Flush and close. Fails with `WriteInFlight` while any
    /// [`WriteTicket`] is outstanding.
    pub fn close(&mut self) -> StoreResult<()> {
        let pending = self.in_flight.load(Ordering::SeqCst);
        if pending > 0 {
            return Err(StoreError::WriteInFlight(pending));
        }
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, HierarchicalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HierarchicalStore::open(
            dir.path().join("scan.modaq"),
            OpenMode::Truncate,
            StoreFilters::default(),
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn truncate_bootstraps_raw_data_and_logger() {
        let (_dir, store) = temp_store();
        let raw = store.node_by_path("/RawData").unwrap();
        assert_eq!(store.get_attr(raw, "type").unwrap().as_str(), Some("scan"));
        assert!(store.get_attr(raw, "date").is_some());
        assert!(store.get_attr(raw, "time").is_some());
        assert!(store.node_by_path("/RawData/Logger").is_ok());
    }

    #[test]
    fn add_group_is_idempotent() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        let first = store
            .add_group(raw, "external", GroupKind::Data, "Ext", Vec::new())
            .unwrap();
        // Same name, different case: must return the existing node.
        let second = store
            .add_group(raw, "External", GroupKind::Data, "other title", Vec::new())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.name(first).unwrap(), "External");
        assert_eq!(store.get_attr(first, "TITLE").unwrap().as_str(), Some("Ext"));
    }

    #[test]
    fn incremental_groups_are_monotonic_and_gap_free() {
        let (_dir, mut store) = temp_store();
        for expected in 0..5 {
            let id = store.add_scan_group("").unwrap();
            assert_eq!(store.name(id).unwrap(), format!("Scan{expected:03}"));
        }
    }

    #[test]
    fn incremental_suffix_overflow() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        store
            .add_group(raw, "Scan999", GroupKind::Scan, "", Vec::new())
            .unwrap();
        let err = store.add_scan_group("").unwrap_err();
        assert!(matches!(err, StoreError::NamingOverflow { .. }));
    }

    #[test]
    fn scan_group_stamps_resume_attributes() {
        let (_dir, mut store) = temp_store();
        let scan = store.add_scan_group("first run").unwrap();
        assert_eq!(
            store.get_attr(scan, "scan_done").unwrap().as_bool(),
            Some(false)
        );
        assert!(store.get_attr(scan, "description").is_some());
        assert_eq!(store.latest_scan_group(), Some(scan));
    }

    #[test]
    fn write_at_bounds_checked_without_partial_write() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        let array = store
            .create_fixed_array(
                raw,
                "data",
                &[3, 2],
                ArrayRole::Data,
                DataDim::Data1D,
                ScanType::Scan1D,
                "",
                None,
            )
            .unwrap();

        store.write_at(array, &[1], &[5.0, 6.0]).unwrap();
        assert_eq!(store.array_data(array).unwrap(), &[0.0, 0.0, 5.0, 6.0, 0.0, 0.0]);

        let err = store.write_at(array, &[3], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, StoreError::OutOfBounds { .. }));
        // Nothing was written by the failed call.
        assert_eq!(store.array_data(array).unwrap(), &[0.0, 0.0, 5.0, 6.0, 0.0, 0.0]);

        let err = store.write_at(array, &[0], &[1.0]).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn scalar_write_at_full_index() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        let array = store
            .create_fixed_array(
                raw,
                "grid",
                &[2, 3],
                ArrayRole::Data,
                DataDim::Data0D,
                ScanType::Scan2D,
                "",
                None,
            )
            .unwrap();
        store.write_at(array, &[1, 2], &[9.0]).unwrap();
        assert_eq!(store.array_data(array).unwrap()[5], 9.0);
    }

    #[test]
    fn growable_shape_attribute_tracks_extent() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        let array = store
            .create_growable_array(raw, "enl", &[2], ArrayRole::Data, DataDim::Data1D, "")
            .unwrap();

        for n in 1..=4 {
            store.append(array, &[n as f64, 0.0]).unwrap();
            let attr = store.get_attr(array, "shape").unwrap().as_int_list().unwrap();
            assert_eq!(attr, &[n, 2]);
            assert_eq!(store.array_shape(array).unwrap(), vec![n as usize, 2]);
        }
    }

    #[test]
    fn append_on_fixed_array_is_not_growable() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        let array = store
            .create_fixed_array(
                raw,
                "fixed",
                &[2],
                ArrayRole::Data,
                DataDim::Data0D,
                ScanType::Scan1D,
                "",
                None,
            )
            .unwrap();
        assert!(matches!(
            store.append(array, &[1.0]).unwrap_err(),
            StoreError::NotGrowable(_)
        ));
    }

    #[test]
    fn array_names_are_stored_verbatim() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        let array = store
            .create_fixed_array(
                raw,
                "x",
                &[3],
                ArrayRole::NavigationAxis,
                DataDim::Data1D,
                ScanType::Scan1D,
                "",
                None,
            )
            .unwrap();
        // A lowercase axis label persists as-is and resolves by path.
        assert_eq!(store.name(array).unwrap(), "x");
        assert_eq!(store.node_by_path("/RawData/x").unwrap(), array);
        // Group names keep their case normalization.
        let group = store
            .add_group(raw, "external", GroupKind::Data, "", Vec::new())
            .unwrap();
        assert_eq!(store.name(group).unwrap(), "External");
    }

    #[test]
    fn duplicate_array_name_rejected() {
        let (_dir, mut store) = temp_store();
        let raw = store.raw_group();
        store
            .create_fixed_array(
                raw,
                "x",
                &[1],
                ArrayRole::NavigationAxis,
                DataDim::Data1D,
                ScanType::Scan1D,
                "",
                None,
            )
            .unwrap();
        let err = store
            .create_fixed_array(
                raw,
                "x",
                &[1],
                ArrayRole::NavigationAxis,
                DataDim::Data1D,
                ScanType::Scan1D,
                "",
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(_)));
    }

    #[test]
    fn logger_keeps_opaque_records() {
        let (_dir, mut store) = temp_store();
        store.log_record("run started").unwrap();
        store.log_record("run finished").unwrap();
        let logger = store.node_by_path("/RawData/Logger").unwrap();
        assert_eq!(store.array_shape(logger).unwrap(), vec![2]);
        assert_eq!(store.record_bytes(logger, 1).unwrap(), b"run finished");
    }

    #[test]
    fn append_mode_reuses_file_and_rederives_last_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.modaq");
        {
            let mut store =
                HierarchicalStore::open(&path, OpenMode::Truncate, StoreFilters::default())
                    .unwrap();
            store.add_scan_group("").unwrap();
            store.add_scan_group("").unwrap();
            store.flush().unwrap();
        }

        let mut store =
            HierarchicalStore::open(&path, OpenMode::Append, StoreFilters::default()).unwrap();
        let last = store.latest_scan_group().unwrap();
        assert_eq!(store.name(last).unwrap(), "Scan001");
        // The next incremental group continues from the reloaded state.
        let next = store.add_scan_group("").unwrap();
        assert_eq!(store.name(next).unwrap(), "Scan002");
    }

    #[test]
    fn close_fails_while_write_in_flight() {
        let (_dir, mut store) = temp_store();
        let ticket = store.begin_write();
        assert!(matches!(
            store.close().unwrap_err(),
            StoreError::WriteInFlight(1)
        ));
        drop(ticket);
        store.close().unwrap();
        assert!(matches!(store.flush().unwrap_err(), StoreError::Closed));
    }

    #[test]
    fn filters_stamped_on_new_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let filters = StoreFilters {
            compression_kind: "none".into(),
            compression_level: 0,
        };
        let mut store =
            HierarchicalStore::open(dir.path().join("f.modaq"), OpenMode::Truncate, filters)
                .unwrap();
        let raw = store.raw_group();
        let array = store
            .create_fixed_array(
                raw,
                "d",
                &[1],
                ArrayRole::Data,
                DataDim::Data0D,
                ScanType::None,
                "",
                None,
            )
            .unwrap();
        assert_eq!(
            store.get_attr(array, "compression").unwrap().as_str(),
            Some("none")
        );
    }
}
