//! Core of the RiskLens proof anchor.
//!
//! This crate contains:
//! - Fixed-width identifier types for snapshots, users and portfolios.
//! - The write-once registry binding a snapshot to the user/portfolio that produced it.
//! - The deterministic portfolio analysis whose report is hashed into a snapshot id.

pub mod analysis;
pub mod constants;
pub mod registry;
pub mod types;

pub use registry::{ProofAnchorRegistry, RegistryError};
pub use types::{AnchorRecord, IdParseError, PortfolioId, SnapshotId, UserId};
