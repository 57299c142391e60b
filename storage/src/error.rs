use maskdb_path::Address;
use thiserror::Error;

/// Errors shared by every implementation of the store contract.
///
/// These are data errors: absence of a value is never an error (lookups
/// return `Option`), and contract misuse panics instead (see the
/// crate-level docs of `maskdb`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("address {address} is below the leaves of a depth-{tree_depth} tree")]
    AddressOutOfRange { address: Address, tree_depth: u8 },

    #[error("tree is full (capacity {capacity})")]
    TreeFull { capacity: u64 },

    #[error("no account indexed for the given key")]
    AccountNotFound,

    #[error("storage error: {0}")]
    StorageError(String),
}
