//! Hierarchical, appendable data store for scan acquisitions.
//!
//! A self-describing container with an array/group/attribute model:
//! groups own ordered children, arrays are either fixed (pre-shaped,
//! mutable at in-bounds indices) or growable (append-only along axis 0),
//! and every node carries an attribute map. Nodes are addressed by
//! POSIX-like paths or by [`NodeId`] handles.
//!
//! The store guarantees two invariants the scan engine relies on:
//!
//! - a growable array's `shape` attribute always equals its true stored
//!   extent, after every append;
//! - a failed `write_at` never writes partially.
//!
//! Snapshots are made durable on [`HierarchicalStore::flush`]; the
//! concrete on-disk encoding is an implementation detail.

pub mod node;
pub mod store;

pub use node::{ArrayPayload, ArrayRole, AttrValue, GroupKind, Node, NodeId, NodeKind};
pub use store::{HierarchicalStore, OpenMode, WriteTicket};
