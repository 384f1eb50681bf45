//! Opens the application's database and creates its tables.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    config::{Config, ConfigError, DatabaseClient},
    transaction::create_transaction_table,
};

/// Open a connection to the database named by `config`.
///
/// The database is created if it does not exist. The tables are not created
/// here, call [initialize] (or [crate::AppState::new]) for that.
///
/// # Errors
/// Returns a:
/// - [Error::Config] if `config` names a database client without a backend,
/// - or [Error::SqlError] if the database cannot be opened.
pub fn open(config: &Config) -> Result<Connection, Error> {
    match config.database_client {
        DatabaseClient::Sqlite => Ok(Connection::open(&config.database_url)?),
        client => Err(ConfigError::UnsupportedDatabaseClient(client).into()),
    }
}

/// Create the tables for the domain models if they do not exist yet.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_transaction_table(&transaction)?;

    transaction.commit()
}
