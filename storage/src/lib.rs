//! The account store contract shared by every tree-backed store in maskdb,
//! plus an in-memory reference implementation.
//!
//! A store is a fixed-depth binary Merkle tree whose leaves hold accounts.
//! [`TreeStore`] is the full read/write contract: account access by
//! [`Location`], node hash access by [`Address`](maskdb_path::Address),
//! Merkle paths, subtree enumeration, and key-based allocation. Anything
//! implementing it can serve as the parent of a masking overlay, including
//! another overlay.
//!
//! The account payload, its key, and the node hash are capability traits
//! ([`Account`], [`NodeHash`]) so the contract stays independent of any
//! concrete ledger format.

mod account;
mod error;
mod location;
pub mod memory_store;
mod merkle;
mod store;
#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use account::{Account, NodeHash};
pub use error::Error;
pub use location::Location;
pub use memory_store::MemoryStore;
pub use merkle::{MerklePath, MerklePathStep};
pub use store::{AccountStatus, TreeStore};
