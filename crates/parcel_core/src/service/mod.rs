//! Parcel use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the executable decoupled from storage details.

pub mod parcel_service;
