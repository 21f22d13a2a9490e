//! Parcel domain model.
//!
//! # Responsibility
//! - Define the canonical shipment record persisted in the `parcel` table.
//! - Own the status vocabulary and its forward progression.
//!
//! # Invariants
//! - `number` is assigned by storage; callers never choose it.
//! - `created_at` is an RFC3339 UTC string and never changes after creation.
//! - Only `ParcelStatus::Registered` parcels accept address changes or deletion.
//! - `address` is free-form; an empty string is a legal destination.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-generated parcel identifier.
pub type ParcelNumber = i64;

/// Owning client identifier. Not checked against any client registry.
pub type ClientId = i64;

/// Lifecycle stage of a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    /// Accepted for shipping; address and deletion are still allowed.
    Registered,
    /// Handed over to the carrier.
    Sent,
    /// Reached the recipient.
    Delivered,
}

impl ParcelStatus {
    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
        }
    }

    /// Parses a storage/wire name. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "registered" => Some(Self::Registered),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }

    /// Next stage in the delivery flow, `None` once delivered.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for parcel input accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelValidationError {
    InvalidCreatedAt(String),
    NonUtcCreatedAt(String),
}

impl Display for ParcelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCreatedAt(value) => {
                write!(f, "created_at `{value}` is not an RFC3339 timestamp")
            }
            Self::NonUtcCreatedAt(value) => {
                write!(f, "created_at `{value}` must carry a UTC offset")
            }
        }
    }
}

impl Error for ParcelValidationError {}

/// Shipment record as stored in the `parcel` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Assigned by storage on insert; ignored by `add`.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: ParcelStatus,
    /// Free-form delivery destination.
    pub address: String,
    /// RFC3339 UTC creation time, e.g. `2024-01-01T00:00:00Z`.
    pub created_at: String,
}

impl Parcel {
    /// Creates a freshly registered parcel stamped with the current UTC time.
    ///
    /// `number` stays `0` until storage assigns one.
    pub fn new(client: ClientId, address: impl Into<String>) -> Self {
        Self {
            number: 0,
            client,
            status: ParcelStatus::Registered,
            address: address.into(),
            created_at: now_rfc3339(),
        }
    }

    /// Checks caller input before it is written.
    ///
    /// Only `created_at` is constrained: it must be RFC3339 with a UTC offset
    /// (`Z` or `+00:00`). Rows are read back as stored, without validation.
    pub fn validate(&self) -> Result<(), ParcelValidationError> {
        let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| ParcelValidationError::InvalidCreatedAt(self.created_at.clone()))?;
        if parsed.offset().local_minus_utc() != 0 {
            return Err(ParcelValidationError::NonUtcCreatedAt(
                self.created_at.clone(),
            ));
        }
        Ok(())
    }
}

/// Current UTC time in the textual form stored in `parcel.created_at`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::{now_rfc3339, Parcel, ParcelStatus, ParcelValidationError};

    #[test]
    fn status_progresses_forward_and_stops_at_delivered() {
        assert_eq!(ParcelStatus::Registered.next(), Some(ParcelStatus::Sent));
        assert_eq!(ParcelStatus::Sent.next(), Some(ParcelStatus::Delivered));
        assert_eq!(ParcelStatus::Delivered.next(), None);
    }

    #[test]
    fn status_names_roundtrip_through_parse() {
        for status in [
            ParcelStatus::Registered,
            ParcelStatus::Sent,
            ParcelStatus::Delivered,
        ] {
            assert_eq!(ParcelStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ParcelStatus::parse("lost"), None);
    }

    #[test]
    fn now_rfc3339_is_utc_with_second_precision() {
        let stamp = now_rfc3339();
        assert!(stamp.ends_with('Z'), "unexpected timestamp: {stamp}");
        assert_eq!(stamp.len(), "2024-01-01T00:00:00Z".len());
    }

    #[test]
    fn validate_allows_blank_address_but_rejects_bad_timestamp() {
        let mut parcel = Parcel::new(1, "");
        assert_eq!(parcel.validate(), Ok(()));

        parcel.created_at = "yesterday".to_string();
        assert_eq!(
            parcel.validate(),
            Err(ParcelValidationError::InvalidCreatedAt(
                "yesterday".to_string()
            ))
        );
    }

    #[test]
    fn validate_requires_utc_offset() {
        let mut parcel = Parcel::new(1, "somewhere");
        parcel.created_at = "2024-06-01T12:30:00+00:00".to_string();
        assert_eq!(parcel.validate(), Ok(()));

        parcel.created_at = "2024-06-01T12:30:00+03:00".to_string();
        assert_eq!(
            parcel.validate(),
            Err(ParcelValidationError::NonUtcCreatedAt(
                "2024-06-01T12:30:00+03:00".to_string()
            ))
        );
    }
}
