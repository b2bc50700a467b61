//! Transactions, sub-transactions and their operation logs.
//!
//! Every space operation runs in its own [`SubTransaction`]. The operation
//! logs what it did; committing the sub-transaction surrenders its lock
//! holders to the parent [`Transaction`] and merges the log into it, while
//! rolling it back replays the log in undo order. The transaction finally
//! replays the merged log once more when it commits or rolls back.

mod log;
mod manager;
mod state;
mod sub_transaction;

pub use log::{LogCategory, LogContext, LogItem, OperationLog, COMMIT_ORDER, ROLLBACK_ORDER};
pub use manager::TransactionManager;
pub use state::{Transaction, TransactionStatus};
pub use sub_transaction::SubTransaction;
