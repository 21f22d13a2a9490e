//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the CRUD gateway over the `parcel` table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Insert and key retrieval happen in one `INSERT ... RETURNING` statement.
//! - Address changes and deletion only apply while status is `registered`;
//!   the status guard lives in the SQL `WHERE` clause, so check and write
//!   are a single statement.
//! - Read paths return rows exactly as stored; only an unknown `status`
//!   value is reported as `InvalidData`.

use crate::db::migrations::{latest_version, schema_state};
use crate::db::{DbError, SchemaState};
use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_TABLE: &str = "parcel";
const PARCEL_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error type for parcel persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Statement could not be executed; `operation` names the store call.
    Storage {
        operation: &'static str,
        source: DbError,
    },
    NotFound(ParcelNumber),
    /// A conditional status change found the parcel in another status.
    StaleStatus {
        number: ParcelNumber,
        expected: ParcelStatus,
    },
    Validation(ParcelValidationError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Returns whether this error means "no such parcel".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    fn in_operation(self, operation: &'static str) -> Self {
        match self {
            Self::Storage { source, .. } => Self::Storage { operation, source },
            other => other,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { operation, source } => write!(f, "{operation}: {source}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::StaleStatus { number, expected } => {
                write!(f, "parcel {number} is no longer `{expected}`")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted parcel data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParcelValidationError> for RepoError {
    fn from(value: ParcelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Storage {
            operation: "sqlite",
            source: value,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Data-access contract for parcel records.
///
/// Mutating calls return `true` when a row changed and `false` when the
/// parcel is unknown or the status policy filtered the write.
pub trait ParcelRepository {
    /// Inserts a parcel and returns the storage-generated number.
    /// `parcel.number` is ignored.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Loads one parcel; `RepoError::NotFound` when absent.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Loads every parcel owned by `client`. Order is not significant.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Replaces the address of a `registered` parcel.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<bool>;
    /// Moves a parcel to any status, unconditionally.
    fn set_status(&self, number: ParcelNumber, status: ParcelStatus) -> RepoResult<bool>;
    /// Moves a parcel to `to` only while its status is still `from`.
    fn transition_status(
        &self,
        number: ParcelNumber,
        from: ParcelStatus,
        to: ParcelStatus,
    ) -> RepoResult<bool>;
    /// Physically removes a `registered` parcel.
    fn delete(&self, number: ParcelNumber) -> RepoResult<bool>;
}

/// SQLite-backed parcel repository.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_parcel_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        parcel.validate()?;

        let number = self
            .conn
            .query_row(
                "INSERT INTO parcel (client, status, address, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING number;",
                params![
                    parcel.client,
                    parcel.status.as_str(),
                    parcel.address.as_str(),
                    parcel.created_at.as_str(),
                ],
                |row| row.get::<_, ParcelNumber>(0),
            )
            .map_err(|err| RepoError::from(err).in_operation("add"))?;

        Ok(number)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        let run = || -> RepoResult<Parcel> {
            let mut stmt = self
                .conn
                .prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"))?;
            let mut rows = stmt.query([number])?;
            if let Some(row) = rows.next()? {
                return parse_parcel_row(row);
            }
            Err(RepoError::NotFound(number))
        };
        run().map_err(|err| err.in_operation("get"))
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let run = || -> RepoResult<Vec<Parcel>> {
            let mut stmt = self.conn.prepare(&format!(
                "{PARCEL_SELECT_SQL} WHERE client = ?1 ORDER BY number ASC;"
            ))?;
            let mut rows = stmt.query([client])?;
            let mut parcels = Vec::new();
            while let Some(row) = rows.next()? {
                parcels.push(parse_parcel_row(row)?);
            }
            Ok(parcels)
        };
        run().map_err(|err| err.in_operation("get_by_client"))
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE parcel
                 SET address = ?1
                 WHERE number = ?2
                   AND status = ?3;",
                params![address, number, ParcelStatus::Registered.as_str()],
            )
            .map_err(|err| RepoError::from(err).in_operation("set_address"))?;

        Ok(changed > 0)
    }

    fn set_status(&self, number: ParcelNumber, status: ParcelStatus) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE parcel SET status = ?1 WHERE number = ?2;",
                params![status.as_str(), number],
            )
            .map_err(|err| RepoError::from(err).in_operation("set_status"))?;

        Ok(changed > 0)
    }

    fn transition_status(
        &self,
        number: ParcelNumber,
        from: ParcelStatus,
        to: ParcelStatus,
    ) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE parcel
                 SET status = ?1
                 WHERE number = ?2
                   AND status = ?3;",
                params![to.as_str(), number, from.as_str()],
            )
            .map_err(|err| RepoError::from(err).in_operation("transition_status"))?;

        Ok(changed > 0)
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM parcel
                 WHERE number = ?1
                   AND status = ?2;",
                params![number, ParcelStatus::Registered.as_str()],
            )
            .map_err(|err| RepoError::from(err).in_operation("delete"))?;

        Ok(changed > 0)
    }
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let status_text: String = row.get("status")?;
    let status = ParcelStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in parcel.status"))
    })?;

    Ok(Parcel {
        number: row.get("number")?,
        client: row.get("client")?,
        status,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_parcel_connection_ready(conn: &Connection) -> RepoResult<()> {
    match schema_state(conn)? {
        SchemaState::Current => {}
        SchemaState::Behind { db_version } | SchemaState::Ahead { db_version } => {
            return Err(RepoError::UninitializedConnection {
                expected_version: latest_version(),
                actual_version: db_version,
            });
        }
    }

    if !table_exists(conn, PARCEL_TABLE)? {
        return Err(RepoError::MissingRequiredTable(PARCEL_TABLE));
    }

    for column in PARCEL_COLUMNS {
        if !table_has_column(conn, PARCEL_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: PARCEL_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
