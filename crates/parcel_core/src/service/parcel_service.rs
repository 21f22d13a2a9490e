//! Parcel use-case service.
//!
//! # Responsibility
//! - Provide registration and delivery-flow entry points for callers.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or status policy.
//! - Status only ever advances `registered -> sent -> delivered` here;
//!   arbitrary transitions stay available on the repository.

use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_repo::{ParcelRepository, RepoError, RepoResult};
use log::{debug, info};

/// Use-case service wrapper for parcel operations.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client` and returns it with its number set.
    ///
    /// # Contract
    /// - Status starts at `ParcelStatus::Registered`.
    /// - `created_at` is the current UTC time.
    pub fn register(&self, client: ClientId, address: impl Into<String>) -> RepoResult<Parcel> {
        let mut parcel = Parcel::new(client, address);
        parcel.number = self.repo.add(&parcel)?;

        info!(
            "event=parcel_register module=service status=ok number={} client={}",
            parcel.number, parcel.client
        );
        Ok(parcel)
    }

    pub fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.repo.get(number)
    }

    /// Lists all parcels of one client.
    pub fn client_parcels(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        self.repo.get_by_client(client)
    }

    /// Advances a parcel one step along the delivery flow.
    ///
    /// Returns the new status, or `None` when the parcel is already delivered
    /// (nothing is written in that case). The write is conditional on the
    /// status just read: a parcel deleted in between yields `NotFound`, one
    /// whose status changed in between yields `StaleStatus`.
    pub fn next_status(&self, number: ParcelNumber) -> RepoResult<Option<ParcelStatus>> {
        let parcel = self.repo.get(number)?;
        let Some(next) = parcel.status.next() else {
            debug!(
                "event=parcel_next_status module=service status=skipped number={} current={}",
                number, parcel.status
            );
            return Ok(None);
        };

        if !self.repo.transition_status(number, parcel.status, next)? {
            // Deleted or moved on since the read; `get` surfaces `NotFound`.
            self.repo.get(number)?;
            return Err(RepoError::StaleStatus {
                number,
                expected: parcel.status,
            });
        }
        info!(
            "event=parcel_next_status module=service status=ok number={} from={} to={}",
            number, parcel.status, next
        );
        Ok(Some(next))
    }

    /// Changes the delivery address; `false` once the parcel has left
    /// `registered` or does not exist.
    pub fn change_address(&self, number: ParcelNumber, address: &str) -> RepoResult<bool> {
        let applied = self.repo.set_address(number, address)?;
        debug!(
            "event=parcel_change_address module=service status={} number={}",
            applied_label(applied),
            number
        );
        Ok(applied)
    }

    /// Deletes a parcel; `false` once it has left `registered` or does not exist.
    pub fn delete(&self, number: ParcelNumber) -> RepoResult<bool> {
        let applied = self.repo.delete(number)?;
        debug!(
            "event=parcel_delete module=service status={} number={}",
            applied_label(applied),
            number
        );
        Ok(applied)
    }
}

fn applied_label(applied: bool) -> &'static str {
    if applied {
        "ok"
    } else {
        "skipped"
    }
}
