//! In-memory reference implementation of the store contract.
//!
//! `MemoryStore` keeps allocated leaf accounts in a sparse map and caches
//! recomputed internal node hashes; nodes never touched by a write resolve
//! to a precomputed empty-subtree hash ladder, so construction is O(depth)
//! and every write is O(depth).

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use maskdb_path::{leaf_count, Address, MAX_DEPTH};

use crate::{
    Account, AccountStatus, Error, Location, MerklePath, MerklePathStep, NodeHash, TreeStore,
};

/// An in-memory Merkle-tree account store of fixed depth.
///
/// Suitable as the bottom of an overlay stack and as the reference store in
/// tests. Interior mutability throughout; not thread-safe.
#[derive(Debug)]
pub struct MemoryStore<A: Account> {
    depth: u8,
    accounts: RefCell<HashMap<u64, A>>,
    hashes: RefCell<HashMap<Address, A::Hash>>,
    index: RefCell<HashMap<A::Key, Location>>,
    next_free: Cell<u64>,
    /// `empty_hashes[h]` is the hash of an all-empty subtree of height `h`.
    empty_hashes: Vec<A::Hash>,
}

impl<A: Account> MemoryStore<A> {
    /// Create an empty store of the given tree depth (1..=[`MAX_DEPTH`]).
    pub fn new(depth: u8) -> Result<Self, Error> {
        if !(1..=MAX_DEPTH).contains(&depth) {
            return Err(Error::InvalidInput(format!(
                "tree depth must be between 1 and {MAX_DEPTH}, got {depth}"
            )));
        }
        let mut empty_hashes = Vec::with_capacity(depth as usize + 1);
        empty_hashes.push(A::empty().hash());
        for height in 0..depth {
            let child = empty_hashes[height as usize].clone();
            empty_hashes.push(A::Hash::merge(height, &child, &child));
        }
        Ok(MemoryStore {
            depth,
            accounts: RefCell::new(HashMap::new()),
            hashes: RefCell::new(HashMap::new()),
            index: RefCell::new(HashMap::new()),
            next_free: Cell::new(0),
            empty_hashes,
        })
    }

    /// Number of leaves.
    pub fn capacity(&self) -> u64 {
        leaf_count(self.depth)
    }

    fn check_range(&self, address: Address) -> Result<(), Error> {
        if address.depth() > self.depth {
            return Err(Error::AddressOutOfRange {
                address,
                tree_depth: self.depth,
            });
        }
        Ok(())
    }

    /// Resolve the hash of any node at depth <= tree depth.
    fn node_hash(&self, address: Address) -> A::Hash {
        if let Some(hash) = self.hashes.borrow().get(&address) {
            return hash.clone();
        }
        if address.depth() == self.depth {
            return match self.accounts.borrow().get(&address.index()) {
                Some(account) => account.hash(),
                None => self.empty_hashes[0].clone(),
            };
        }
        let height = (self.depth - address.depth()) as usize;
        self.empty_hashes[height].clone()
    }

    /// Recompute every ancestor hash of `leaf` up to the root.
    fn rehash_to_root(&self, leaf: Address) {
        let mut cur = leaf;
        while let Some(parent) = cur.parent() {
            let height = self.depth - cur.depth();
            let own = self.node_hash(cur);
            let sibling = self.node_hash(cur.sibling());
            let merged = if cur.is_right_child() {
                A::Hash::merge(height, &sibling, &own)
            } else {
                A::Hash::merge(height, &own, &sibling)
            };
            self.hashes.borrow_mut().insert(parent, merged);
            cur = parent;
        }
    }

    fn leaf_address(&self, location: &Location) -> Address {
        let address = location.to_path();
        assert_eq!(
            address.depth(),
            self.depth,
            "account location {address:?} is not at leaf depth {}",
            self.depth
        );
        address
    }
}

impl<A: Account> TreeStore for MemoryStore<A> {
    type Key = A::Key;
    type Hash = A::Hash;
    type Account = A;

    fn depth(&self) -> u8 {
        self.depth
    }

    fn num_accounts(&self) -> usize {
        self.accounts.borrow().len()
    }

    fn merkle_root(&self) -> A::Hash {
        self.node_hash(Address::root())
    }

    fn get(&self, location: &Location) -> Option<A> {
        let address = self.leaf_address(location);
        self.accounts.borrow().get(&address.index()).cloned()
    }

    fn set(&self, location: &Location, account: A) -> Result<(), Error> {
        let address = self.leaf_address(location);
        let index = address.index();
        {
            let mut accounts = self.accounts.borrow_mut();
            let mut keys = self.index.borrow_mut();
            let displaced = if account.is_empty() {
                accounts.remove(&index)
            } else {
                accounts.insert(index, account.clone())
            };
            if let Some(key) = displaced.and_then(|old| old.key()) {
                keys.remove(&key);
            }
            if let Some(key) = account.key() {
                keys.insert(key, *location);
            }
        }
        self.rehash_to_root(address);
        Ok(())
    }

    fn get_inner_hash_at_addr(&self, address: Address) -> Result<A::Hash, Error> {
        self.check_range(address)?;
        Ok(self.node_hash(address))
    }

    fn set_inner_hash_at_addr(&self, address: Address, hash: A::Hash) -> Result<(), Error> {
        self.check_range(address)?;
        self.hashes.borrow_mut().insert(address, hash);
        Ok(())
    }

    fn merkle_path_at_addr(&self, address: Address) -> Result<MerklePath<A::Hash>, Error> {
        self.check_range(address)?;
        let mut steps = Vec::with_capacity(address.depth() as usize);
        let mut cur = address;
        while !cur.is_root() {
            let sibling = self.node_hash(cur.sibling());
            steps.push(if cur.is_right_child() {
                MerklePathStep::Left(sibling)
            } else {
                MerklePathStep::Right(sibling)
            });
            cur = cur.parent().expect("non-root address has a parent");
        }
        Ok(MerklePath::new(steps))
    }

    fn get_all_accounts_rooted_at(&self, address: Address) -> Result<Vec<(Address, A)>, Error> {
        self.check_range(address)?;
        let range = address.subtree_range(self.depth);
        let mut found: Vec<(Address, A)> = self
            .accounts
            .borrow()
            .iter()
            .filter(|(index, _)| range.contains(*index))
            .map(|(index, account)| (Address::leaf(self.depth, *index), account.clone()))
            .collect();
        found.sort_by_key(|(address, _)| address.index());
        Ok(found)
    }

    fn to_list(&self) -> Vec<A> {
        let accounts = self.accounts.borrow();
        let mut indices: Vec<u64> = accounts.keys().copied().collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .map(|index| accounts[&index].clone())
            .collect()
    }

    fn location_of_key(&self, key: &A::Key) -> Option<Location> {
        self.index.borrow().get(key).copied()
    }

    fn get_or_create_account(
        &self,
        key: A::Key,
        account: A,
    ) -> Result<(AccountStatus, Location), Error> {
        if let Some(location) = self.location_of_key(&key) {
            return Ok((AccountStatus::Existed, location));
        }
        let capacity = self.capacity();
        let mut cursor = self.next_free.get();
        {
            // Skip slots taken by direct writes.
            let accounts = self.accounts.borrow();
            while cursor < capacity && accounts.contains_key(&cursor) {
                cursor += 1;
            }
        }
        if cursor >= capacity {
            return Err(Error::TreeFull { capacity });
        }
        self.next_free.set(cursor + 1);
        let location = Location::Account(Address::leaf(self.depth, cursor));
        self.set(&location, account)?;
        Ok((AccountStatus::Added, location))
    }

    fn make_space_for(&self, _space: u64) {
        // Fixed capacity; allocation happens in get_or_create_account.
    }

    fn remove_accounts(&self, keys: &[A::Key]) -> Result<(), Error> {
        let locations: Vec<Location> = keys
            .iter()
            .map(|key| self.location_of_key(key).ok_or(Error::AccountNotFound))
            .collect::<Result<_, _>>()?;
        for location in locations {
            self.set(&location, A::empty())?;
        }
        Ok(())
    }

    fn destroy(&self) {
        self.accounts.borrow_mut().clear();
        self.hashes.borrow_mut().clear();
        self.index.borrow_mut().clear();
        self.next_free.set(0);
    }
}

#[cfg(all(test, feature = "test_utils"))]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_utils::{account, make_accounts, TestAccount, TestHash};

    fn leaf(depth: u8, index: u64) -> Location {
        Location::Account(Address::leaf(depth, index))
    }

    #[test]
    fn empty_store_root_is_the_ladder_top() {
        let store = MemoryStore::<TestAccount>::new(4).expect("depth 4");
        assert_eq!(store.merkle_root(), store.empty_hashes[4]);
        assert_eq!(store.num_accounts(), 0);
        assert_eq!(store.capacity(), 16);
    }

    #[test]
    fn depth_validation() {
        assert_matches!(
            MemoryStore::<TestAccount>::new(0),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            MemoryStore::<TestAccount>::new(64),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn set_then_get() {
        let store = MemoryStore::<TestAccount>::new(3).expect("depth 3");
        let a = account(7);
        store.set(&leaf(3, 5), a).expect("set");
        assert_eq!(store.get(&leaf(3, 5)), Some(a));
        assert_eq!(store.get(&leaf(3, 4)), None);
        assert_eq!(store.num_accounts(), 1);
    }

    #[test]
    fn set_changes_the_root_and_empty_reverts_it() {
        let store = MemoryStore::<TestAccount>::new(3).expect("depth 3");
        let empty_root = store.merkle_root();
        store.set(&leaf(3, 2), account(1)).expect("set");
        assert_ne!(store.merkle_root(), empty_root);
        store.set(&leaf(3, 2), TestAccount::empty()).expect("clear");
        assert_eq!(store.merkle_root(), empty_root);
        assert_eq!(store.num_accounts(), 0);
    }

    #[test]
    fn merkle_paths_agree_with_the_root() {
        let store = MemoryStore::<TestAccount>::new(4).expect("depth 4");
        for (i, a) in make_accounts(10, 42).into_iter().enumerate() {
            store.set(&leaf(4, i as u64), a).expect("set");
        }
        let root = store.merkle_root();
        for index in 0..16 {
            let path = store.merkle_path_at_index(index).expect("path");
            assert_eq!(path.len(), 4);
            let leaf_hash = store
                .get(&leaf(4, index))
                .unwrap_or_else(TestAccount::empty)
                .hash();
            assert_eq!(path.implied_root(&leaf_hash), root, "leaf {index}");
        }
    }

    #[test]
    fn inner_hash_access() {
        let store = MemoryStore::<TestAccount>::new(2).expect("depth 2");
        store.set(&leaf(2, 3), account(9)).expect("set");
        let right = Address::root().right_child();
        let cached = store.get_inner_hash_at_addr(right).expect("hash");
        assert_eq!(
            cached,
            TestHash::merge(0, &TestAccount::empty().hash(), &account(9).hash())
        );
        let too_deep = Address::leaf(3, 0);
        assert_matches!(
            store.get_inner_hash_at_addr(too_deep),
            Err(Error::AddressOutOfRange { .. })
        );
    }

    #[test]
    fn get_or_create_allocates_and_reuses() {
        let store = MemoryStore::<TestAccount>::new(2).expect("depth 2");
        let a = account(3);
        let (status, location) = store.get_or_create_account(3, a).expect("create");
        assert_eq!(status, AccountStatus::Added);
        assert_eq!(store.get(&location), Some(a));
        let (status, again) = store.get_or_create_account(3, a).expect("lookup");
        assert_eq!(status, AccountStatus::Existed);
        assert_eq!(again, location);
        assert_eq!(store.location_of_key(&3), Some(location));
        assert_eq!(store.index_of_key(&3), location.to_path().index());
    }

    #[test]
    fn strict_allocation_panics_only_on_failure() {
        let store = MemoryStore::<TestAccount>::new(1).expect("depth 1");
        let (status, _) = store.get_or_create_account_strict(1, account(1));
        assert_eq!(status, AccountStatus::Added);
    }

    #[test]
    #[should_panic(expected = "get_or_create_account_strict")]
    fn strict_allocation_panics_when_full() {
        let store = MemoryStore::<TestAccount>::new(1).expect("depth 1");
        store.get_or_create_account_strict(1, account(1));
        store.get_or_create_account_strict(2, account(2));
        store.get_or_create_account_strict(3, account(3));
    }

    #[test]
    fn allocation_skips_directly_written_slots() {
        let store = MemoryStore::<TestAccount>::new(2).expect("depth 2");
        store.set(&leaf(2, 0), account(1)).expect("set");
        let (_, location) = store.get_or_create_account(2, account(2)).expect("create");
        assert_eq!(location.to_path().index(), 1);
    }

    #[test]
    fn allocation_exhausts_to_tree_full() {
        let store = MemoryStore::<TestAccount>::new(1).expect("depth 1");
        store.get_or_create_account(1, account(1)).expect("first");
        store.get_or_create_account(2, account(2)).expect("second");
        assert_matches!(
            store.get_or_create_account(3, account(3)),
            Err(Error::TreeFull { capacity: 2 })
        );
    }

    #[test]
    fn remove_accounts_frees_slots() {
        let store = MemoryStore::<TestAccount>::new(2).expect("depth 2");
        let empty_root = store.merkle_root();
        store.get_or_create_account(1, account(1)).expect("create");
        let (_, location) = store.get_or_create_account(2, account(2)).expect("create");
        store.remove_accounts(&[2]).expect("remove");
        assert_eq!(store.get(&location), None);
        assert_eq!(store.location_of_key(&2), None);
        store.remove_accounts(&[1]).expect("remove");
        assert_eq!(store.merkle_root(), empty_root);
        assert_matches!(store.remove_accounts(&[9]), Err(Error::AccountNotFound));
    }

    #[test]
    fn subtree_enumeration_is_leaf_ordered() {
        let store = MemoryStore::<TestAccount>::new(3).expect("depth 3");
        for index in [6, 4, 1] {
            store.set(&leaf(3, index), account(index)).expect("set");
        }
        let right = Address::root().right_child();
        let found = store.get_all_accounts_rooted_at(right).expect("rooted at");
        let indices: Vec<u64> = found.iter().map(|(address, _)| address.index()).collect();
        assert_eq!(indices, vec![4, 6]);
    }

    #[test]
    fn to_list_is_leaf_ordered() {
        let store = MemoryStore::<TestAccount>::new(3).expect("depth 3");
        store.set(&leaf(3, 5), account(5)).expect("set");
        store.set(&leaf(3, 0), account(10)).expect("set");
        assert_eq!(store.to_list(), vec![account(10), account(5)]);
    }

    #[test]
    fn destroy_clears_everything() {
        let store = MemoryStore::<TestAccount>::new(2).expect("depth 2");
        let empty_root = store.merkle_root();
        store.get_or_create_account(1, account(1)).expect("create");
        store.destroy();
        assert_eq!(store.num_accounts(), 0);
        assert_eq!(store.merkle_root(), empty_root);
        assert_eq!(store.location_of_key(&1), None);
    }

    #[test]
    #[should_panic(expected = "no account indexed")]
    fn index_of_unknown_key_panics() {
        let store = MemoryStore::<TestAccount>::new(2).expect("depth 2");
        store.index_of_key(&77);
    }

    #[test]
    #[should_panic(expected = "not at leaf depth")]
    fn non_leaf_account_location_panics() {
        let store = MemoryStore::<TestAccount>::new(3).expect("depth 3");
        store.get(&Location::Account(Address::root().left_child()));
    }
}
