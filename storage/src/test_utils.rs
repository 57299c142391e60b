//! Concrete account and hash types plus helpers for tests and benchmarks.

use std::fmt;

use maskdb_path::Address;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{Account, AccountStatus, Error, Location, MerklePath, NodeHash, TreeStore};

/// A blake3 node hash with height-domain-separated merging.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TestHash(pub [u8; 32]);

impl NodeHash for TestHash {
    fn merge(height: u8, left: &Self, right: &Self) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[height]);
        hasher.update(&left.0);
        hasher.update(&right.0);
        TestHash(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for TestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestHash({})", &hex::encode(self.0)[..16])
    }
}

/// A minimal ledger account: a non-zero id keys it, zero ids are reserved
/// for the empty account.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TestAccount {
    pub id: u64,
    pub balance: u64,
    pub nonce: u64,
}

impl Account for TestAccount {
    type Key = u64;
    type Hash = TestHash;

    fn hash(&self) -> TestHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"maskdb.account.v1");
        hasher.update(&self.id.to_le_bytes());
        hasher.update(&self.balance.to_le_bytes());
        hasher.update(&self.nonce.to_le_bytes());
        TestHash(*hasher.finalize().as_bytes())
    }

    fn empty() -> Self {
        TestAccount::default()
    }

    fn key(&self) -> Option<u64> {
        (self.id != 0).then_some(self.id)
    }
}

/// An account with the given id and deterministic payload.
pub fn account(id: u64) -> TestAccount {
    TestAccount {
        id,
        balance: id * 1000,
        nonce: id % 7,
    }
}

/// `count` random non-empty accounts from a seeded generator.
pub fn make_accounts(count: usize, seed: u64) -> Vec<TestAccount> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| TestAccount {
            id: rng.gen_range(1..u64::MAX),
            balance: rng.gen(),
            nonce: rng.gen_range(0..1000),
        })
        .collect()
}

/// The account location for leaf `index` in a depth-`depth` tree.
pub fn account_location(depth: u8, index: u64) -> Location {
    Location::Account(Address::leaf(depth, index))
}

/// A store wrapper whose `set_batch` can be armed to fail, for exercising
/// half-committed overlay states.
pub struct FailingStore<S> {
    inner: S,
    fail_set_batch: std::cell::Cell<bool>,
}

impl<S> FailingStore<S> {
    /// Wrap `inner`; failure injection starts disarmed.
    pub fn new(inner: S) -> Self {
        FailingStore {
            inner,
            fail_set_batch: std::cell::Cell::new(false),
        }
    }

    /// Arm or disarm `set_batch` failure.
    pub fn fail_set_batch(&self, fail: bool) {
        self.fail_set_batch.set(fail);
    }
}

impl<S: TreeStore> TreeStore for FailingStore<S> {
    type Key = S::Key;
    type Hash = S::Hash;
    type Account = S::Account;

    fn depth(&self) -> u8 {
        self.inner.depth()
    }

    fn num_accounts(&self) -> usize {
        self.inner.num_accounts()
    }

    fn merkle_root(&self) -> S::Hash {
        self.inner.merkle_root()
    }

    fn get(&self, location: &Location) -> Option<S::Account> {
        self.inner.get(location)
    }

    fn set(&self, location: &Location, account: S::Account) -> Result<(), Error> {
        self.inner.set(location, account)
    }

    fn set_batch(&self, entries: Vec<(Location, S::Account)>) -> Result<(), Error> {
        if self.fail_set_batch.get() {
            return Err(Error::StorageError("simulated set_batch failure".into()));
        }
        self.inner.set_batch(entries)
    }

    fn get_inner_hash_at_addr(&self, address: Address) -> Result<S::Hash, Error> {
        self.inner.get_inner_hash_at_addr(address)
    }

    fn set_inner_hash_at_addr(&self, address: Address, hash: S::Hash) -> Result<(), Error> {
        self.inner.set_inner_hash_at_addr(address, hash)
    }

    fn merkle_path_at_addr(&self, address: Address) -> Result<MerklePath<S::Hash>, Error> {
        self.inner.merkle_path_at_addr(address)
    }

    fn get_all_accounts_rooted_at(
        &self,
        address: Address,
    ) -> Result<Vec<(Address, S::Account)>, Error> {
        self.inner.get_all_accounts_rooted_at(address)
    }

    fn to_list(&self) -> Vec<S::Account> {
        self.inner.to_list()
    }

    fn location_of_key(&self, key: &S::Key) -> Option<Location> {
        self.inner.location_of_key(key)
    }

    fn get_or_create_account(
        &self,
        key: S::Key,
        account: S::Account,
    ) -> Result<(AccountStatus, Location), Error> {
        self.inner.get_or_create_account(key, account)
    }

    fn make_space_for(&self, space: u64) {
        self.inner.make_space_for(space)
    }

    fn remove_accounts(&self, keys: &[S::Key]) -> Result<(), Error> {
        self.inner.remove_accounts(keys)
    }

    fn destroy(&self) {
        self.inner.destroy()
    }
}
