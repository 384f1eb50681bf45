//! Defines the endpoints for reading a session's transactions.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State, rejection::PathRejection},
};
use axum_extra::extract::PrivateCookieJar;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::TransactionId,
    session::get_session_id,
    transaction::core::{Transaction, get_transaction, list_transactions},
};

/// The state needed to read transactions.
#[derive(Debug, Clone)]
pub struct GetTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GetTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON body listing a session's transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsResponse {
    /// The transactions in the order they were created.
    pub transactions: Vec<Transaction>,
}

/// The JSON body for a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// The requested transaction.
    pub transaction: Transaction,
}

/// A route handler for listing the transactions of the client's session.
///
/// Clients without a session get an empty list.
pub async fn list_transactions_endpoint(
    State(state): State<GetTransactionsState>,
    jar: PrivateCookieJar,
) -> Result<Json<TransactionsResponse>, Error> {
    let Some(session_id) = get_session_id(&jar) else {
        return Ok(Json(TransactionsResponse {
            transactions: Vec::new(),
        }));
    };

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let transactions = list_transactions(&session_id, &connection)?;

    Ok(Json(TransactionsResponse { transactions }))
}

/// A route handler for getting a transaction by its database ID.
///
/// Responds with 404 Not Found if the ID is malformed, does not exist, or the
/// transaction belongs to another session, so that clients cannot tell
/// whether another session's transaction exists.
pub async fn get_transaction_endpoint(
    State(state): State<GetTransactionsState>,
    jar: PrivateCookieJar,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<TransactionResponse>, Error> {
    let Ok(Path(transaction_id)) = transaction_id else {
        return Err(Error::NotFound);
    };
    let session_id = get_session_id(&jar).ok_or(Error::NotFound)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let transaction = get_transaction(&session_id, transaction_id, &connection)?;

    Ok(Json(TransactionResponse { transaction }))
}
