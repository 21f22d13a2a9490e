//! Domain model for parcel tracking.
//!
//! # Responsibility
//! - Define canonical data structures used by the store and services.
//!
//! # Invariants
//! - Every parcel is identified by a storage-assigned `ParcelNumber`.
//! - Deletion is physical; there is no tombstone state.

pub mod parcel;
