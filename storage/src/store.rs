use maskdb_path::Address;

use crate::{Account, Error, Location, MerklePath, NodeHash};

/// Outcome of [`TreeStore::get_or_create_account`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccountStatus {
    /// A fresh slot was allocated for the key.
    Added,
    /// The key was already indexed; the existing slot is returned.
    Existed,
}

/// The full contract of a Merkle-tree-backed account store.
///
/// Methods take `&self`; implementations use interior mutability so a store
/// can be shared as the read/write delegation target of several overlays.
/// Nothing here locks: callers serialize mutations externally
/// (single-writer model).
pub trait TreeStore {
    /// Account key type.
    type Key: Clone + Eq + std::hash::Hash + std::fmt::Debug;
    /// Node hash type.
    type Hash: NodeHash;
    /// Account payload type.
    type Account: Account<Key = Self::Key, Hash = Self::Hash>;

    /// Fixed depth of the tree. Leaves live at this depth.
    fn depth(&self) -> u8;

    /// Number of accounts materialized in this store. For an overlay this
    /// counts only overridden accounts, not the combined view.
    fn num_accounts(&self) -> usize;

    /// Current root hash.
    fn merkle_root(&self) -> Self::Hash;

    /// The account at `location`, or `None` when the slot is absent.
    fn get(&self, location: &Location) -> Option<Self::Account>;

    /// Write `account` at `location` and bring ancestor hashes up to date.
    fn set(&self, location: &Location, account: Self::Account) -> Result<(), Error>;

    /// Element-wise [`get`](TreeStore::get).
    fn get_batch(&self, locations: &[Location]) -> Vec<(Location, Option<Self::Account>)> {
        locations
            .iter()
            .map(|location| (*location, self.get(location)))
            .collect()
    }

    /// Element-wise [`set`](TreeStore::set). No cross-item atomicity: a
    /// failure leaves earlier writes in place.
    fn set_batch(&self, entries: Vec<(Location, Self::Account)>) -> Result<(), Error> {
        for (location, account) in entries {
            self.set(&location, account)?;
        }
        Ok(())
    }

    /// The node hash at `address`, failing when no value is resolvable.
    fn get_inner_hash_at_addr(&self, address: Address) -> Result<Self::Hash, Error>;

    /// Write a node hash directly, bypassing account hashing. Low-level
    /// tree construction only; a later account write on the same path
    /// overwrites it.
    fn set_inner_hash_at_addr(&self, address: Address, hash: Self::Hash) -> Result<(), Error>;

    /// Leaf-to-root sibling hashes for `address`.
    fn merkle_path_at_addr(&self, address: Address) -> Result<MerklePath<Self::Hash>, Error>;

    /// [`merkle_path_at_addr`](TreeStore::merkle_path_at_addr) for the
    /// leaf at `index`.
    fn merkle_path_at_index(&self, index: u64) -> Result<MerklePath<Self::Hash>, Error> {
        self.merkle_path_at_addr(Address::leaf(self.depth(), index))
    }

    /// [`merkle_path_at_addr`](TreeStore::merkle_path_at_addr) for an
    /// account location.
    fn merkle_path(&self, location: &Location) -> Result<MerklePath<Self::Hash>, Error> {
        self.merkle_path_at_addr(location.to_path())
    }

    /// All materialized accounts whose leaf falls under `address`, in leaf
    /// order.
    fn get_all_accounts_rooted_at(
        &self,
        address: Address,
    ) -> Result<Vec<(Address, Self::Account)>, Error>;

    /// Assign `accounts` in order to the successive leaves under
    /// `address`. Leaves beyond the supplied list are left untouched;
    /// accounts beyond the subtree's capacity are ignored.
    fn set_all_accounts_rooted_at(
        &self,
        address: Address,
        accounts: &[Self::Account],
    ) -> Result<(), Error> {
        let depth = self.depth();
        for (index, account) in address.subtree_range(depth).zip(accounts.iter().cloned()) {
            self.set(&Location::Account(Address::leaf(depth, index)), account)?;
        }
        Ok(())
    }

    /// Every materialized account, in leaf order.
    fn to_list(&self) -> Vec<Self::Account>;

    /// The slot indexed for `key`, if any.
    fn location_of_key(&self, key: &Self::Key) -> Option<Location>;

    /// The leaf index for `key`.
    ///
    /// # Panics
    ///
    /// Panics when no account is indexed for `key`.
    fn index_of_key(&self, key: &Self::Key) -> u64 {
        match self.location_of_key(key) {
            Some(location) => location.to_path().index(),
            None => panic!("index_of_key: no account indexed for key {key:?}"),
        }
    }

    /// The slot for `key`, allocating a fresh leaf holding `account` when
    /// the key is unknown. `account` is expected to carry `key`.
    fn get_or_create_account(
        &self,
        key: Self::Key,
        account: Self::Account,
    ) -> Result<(AccountStatus, Location), Error>;

    /// [`get_or_create_account`](Self::get_or_create_account) for callers
    /// that treat allocation failure as fatal.
    ///
    /// # Panics
    ///
    /// Panics when the underlying allocation fails.
    fn get_or_create_account_strict(
        &self,
        key: Self::Key,
        account: Self::Account,
    ) -> (AccountStatus, Location) {
        match self.get_or_create_account(key, account) {
            Ok(result) => result,
            Err(error) => panic!("get_or_create_account_strict: {error}"),
        }
    }

    /// Hint that `space` additional accounts are coming. Stores with fixed
    /// capacity may ignore it.
    fn make_space_for(&self, space: u64);

    /// Free the slots indexed for `keys`.
    fn remove_accounts(&self, keys: &[Self::Key]) -> Result<(), Error>;

    /// Tear the store down, clearing its state. Cascades through
    /// delegation chains; the store must not be used afterwards.
    fn destroy(&self);
}
