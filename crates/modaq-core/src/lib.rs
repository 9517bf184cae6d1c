//! Core types and traits for modaq.
//!
//! This crate is the leaf of the workspace: it defines the shared data
//! model (axes, channels, detector payloads), the error taxonomy used by
//! the store and the scan engine, and the immutable per-run configuration.
//!
//! Nothing here touches hardware or storage directly; those live in
//! `modaq-hardware` and `modaq-store`.

pub mod config;
pub mod data;
pub mod error;

pub use config::{ScanConfig, StoreFilters};
pub use data::{Axis, Channel, DataDim, DetectorData, ScanType};
pub use error::{ScanError, ScanResult, StoreError, StoreResult};
