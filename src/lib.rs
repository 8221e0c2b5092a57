//! equipgraph - dynamic equipment type schemas over a graph store
//!
//! Equipment types are defined at runtime. Their definitions are validated
//! and compiled into storage schema statements, instances are bound from
//! raw ingestion payloads, and listing and hierarchy requests are compiled
//! into graph queries against a [`store::GraphStore`].

pub mod binder;
pub mod cli;
pub mod config;
pub mod errors;
pub mod hierarchy;
pub mod query;
pub mod repository;
pub mod schema;
pub mod store;

pub use config::DeletionConfig;
pub use errors::{EquipError, EquipResult};
pub use repository::{DeletionReport, EquipmentRepository, StructuralGuard, StructuralLock};
