//! A small JSON API for recording personal finance transactions.
//!
//! Each client gets an anonymous session on its first write. Transactions are
//! stored per session in SQLite and can be listed, fetched one at a time, or
//! summed into a running balance.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
pub mod config;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod not_found;
mod routing;
mod session;
mod transaction;

pub use app_state::{AppState, create_cookie_key};
pub use config::{AppEnvironment, Config, ConfigError, DatabaseClient};
pub use database_id::{DatabaseId, TransactionId};
pub use db::{initialize as initialize_db, open as open_db};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use session::{SessionCookieSettings, SessionId};
pub use transaction::{
    MAX_AMOUNT, NewTransaction, Summary, SummaryResponse, Transaction, TransactionForm,
    TransactionResponse, TransactionType, TransactionsResponse, ValidationError,
};

use crate::not_found::get_404_not_found_response;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The data for a new transaction was rejected.
    #[error("invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    /// The request body could not be parsed as JSON of the expected shape.
    ///
    /// Callers should pass in the rejection message from the extractor.
    #[error("invalid request body: {0}")]
    InvalidJson(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the ID is
    /// correct and that the transaction was created with the same session.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The balance of a session is too large to represent.
    #[error("the sum of the transaction amounts overflowed")]
    SummaryOverflow,

    /// The configuration does not allow the application to start.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidJson(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Validation(_) | Error::InvalidJson(_) => {
                let message = self.to_string();
                (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
            }
            Error::NotFound => get_404_not_found_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
