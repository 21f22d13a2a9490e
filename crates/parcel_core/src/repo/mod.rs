//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the parcel data-access contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Parcel::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   storage errors.

pub mod parcel_repo;
