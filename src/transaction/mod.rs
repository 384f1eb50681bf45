//! Transaction management for the ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `NewTransaction` for validating input
//! - Database functions for storing, querying, and summing transactions
//! - Route handlers for the transaction endpoints

mod core;
mod create_endpoint;
mod get_endpoint;
mod summary_endpoint;

pub use core::{
    MAX_AMOUNT, NewTransaction, Summary, Transaction, TransactionType, ValidationError,
    create_transaction_table,
};
pub use create_endpoint::{TransactionForm, create_transaction_endpoint};
pub use get_endpoint::{
    TransactionResponse, TransactionsResponse, get_transaction_endpoint,
    list_transactions_endpoint,
};
pub use summary_endpoint::{SummaryResponse, get_summary_endpoint};

#[cfg(test)]
pub use core::{create_transaction, get_summary, get_transaction, list_transactions};
