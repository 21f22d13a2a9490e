//! Parcel tracker demo executable.
//!
//! # Responsibility
//! - Run one registration/delivery flow against a SQLite database file.
//! - Print human-readable progress; diagnostics go to the rolling log.
//!
//! Usage: `parcel_tracker [db_path]` (default `tracker.db`).
//! Logging is enabled by setting `PARCEL_TRACKER_LOG_DIR` to an absolute path;
//! `PARCEL_TRACKER_LOG_LEVEL` overrides the build default level.

use log::error;
use parcel_core::db::open_db;
use parcel_core::{
    default_log_level, init_logging, ClientId, Parcel, ParcelService, SqliteParcelRepository,
};
use std::error::Error;
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "tracker.db";
const LOG_DIR_ENV: &str = "PARCEL_TRACKER_LOG_DIR";
const LOG_LEVEL_ENV: &str = "PARCEL_TRACKER_LOG_LEVEL";

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        let level =
            std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
        if let Err(err) = init_logging(&level, &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    match run(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: &str) -> Result<(), Box<dyn Error>> {
    let conn = open_db(db_path)?;
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn)?);

    let client: ClientId = 1;
    let parcel = service.register(client, "Moscow, Tverskaya st. 1")?;
    print_registered(&parcel);

    let new_address = "Saratov, Lenina st. 10";
    if service.change_address(parcel.number, new_address)? {
        println!("parcel #{} address changed to {new_address}", parcel.number);
    }

    if let Some(status) = service.next_status(parcel.number)? {
        println!("parcel #{} status changed to {status}", parcel.number);
    }

    print_client_parcels(&service, client)?;

    if !service.delete(parcel.number)? {
        println!(
            "parcel #{} was not deleted: it has already left the registered state",
            parcel.number
        );
    }
    print_client_parcels(&service, client)?;

    let parcel = service.register(client, "Moscow, Tverskaya st. 1")?;
    print_registered(&parcel);
    if service.delete(parcel.number)? {
        println!("parcel #{} deleted", parcel.number);
    }
    print_client_parcels(&service, client)?;

    Ok(())
}

fn print_registered(parcel: &Parcel) {
    println!(
        "parcel #{} to {} from client {} registered at {}",
        parcel.number, parcel.address, parcel.client, parcel.created_at
    );
}

fn print_client_parcels(
    service: &ParcelService<SqliteParcelRepository<'_>>,
    client: ClientId,
) -> Result<(), Box<dyn Error>> {
    let parcels = service.client_parcels(client)?;
    println!("client {client} parcels:");
    for parcel in parcels {
        println!(
            "  #{} to {} registered at {}, status {}",
            parcel.number, parcel.address, parcel.created_at, parcel.status
        );
    }
    println!();
    Ok(())
}
