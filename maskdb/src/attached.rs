use maskdb_path::Address;
use maskdb_storage::{
    Account, AccountStatus, Error, Location, MerklePath, MerklePathStep, NodeHash, TreeStore,
};

use crate::Mask;

/// A mask bound to its parent store.
///
/// Implements the full [`TreeStore`] contract by resolving reads from the
/// overlay first and delegating misses to the parent, while capturing every
/// write in the overlay together with the recomputed ancestor hash chain.
/// Obtained only through [`Mask::attach`].
///
/// The parent reference is non-owning; the single exception is
/// [`destroy`](TreeStore::destroy), which deliberately cascades into the
/// parent and tears down the whole delegation chain.
pub struct AttachedMask<'p, P: TreeStore> {
    parent: &'p P,
    inner: Mask<P::Account>,
}

impl<'p, P: TreeStore> AttachedMask<'p, P> {
    pub(crate) fn new(parent: &'p P, inner: Mask<P::Account>) -> Self {
        AttachedMask { parent, inner }
    }

    /// The parent store this mask delegates to.
    pub fn parent(&self) -> &'p P {
        self.parent
    }

    /// Drop the parent binding, yielding the overlay tables unchanged.
    pub fn detach(self) -> Mask<P::Account> {
        self.inner
    }

    /// Fork an independent view: deep-copied overlay tables, same parent.
    ///
    /// Mutating the copy never affects this mask, but both views still
    /// write into the same parent on commit.
    pub fn copy(&self) -> Self {
        AttachedMask {
            parent: self.parent,
            inner: self.inner.clone(),
        }
    }

    /// The hash at `address` if anything can resolve it: the overlay
    /// first, else the parent. A parent that cannot produce the hash is
    /// treated as absence, not as an error.
    pub fn get_hash(&self, address: Address) -> Option<P::Hash> {
        if let Some(hash) = self.inner.hashes.borrow().get(&address) {
            return Some(hash.clone());
        }
        self.parent.get_inner_hash_at_addr(address).ok()
    }

    /// Element-wise [`get_hash`](AttachedMask::get_hash).
    pub fn get_hash_batch(&self, addresses: &[Address]) -> Vec<(Address, Option<P::Hash>)> {
        addresses
            .iter()
            .map(|address| (*address, self.get_hash(*address)))
            .collect()
    }

    /// Whether the overlay overrides the account at `location`.
    pub fn overrides_account(&self, location: &Location) -> bool {
        self.inner.accounts.borrow().contains_key(location)
    }

    /// Whether the overlay overrides the hash at `address`.
    pub fn overrides_hash(&self, address: Address) -> bool {
        self.inner.hashes.borrow().contains_key(&address)
    }

    /// Flush every overridden account into the parent as one batch, then
    /// empty the overlay. Reads are unchanged by a successful commit; the
    /// data has merely moved down.
    ///
    /// Not atomic: if the parent write fails the overlay is left as it
    /// was, but a parent that partially applied the batch is now
    /// inconsistent with it. That state is unrecoverable; discard the
    /// mask instead of retrying.
    pub fn commit(&self) -> Result<(), Error> {
        let entries: Vec<(Location, P::Account)> = self
            .inner
            .accounts
            .borrow()
            .iter()
            .map(|(location, account)| (*location, account.clone()))
            .collect();
        self.parent.set_batch(entries)?;
        self.inner.accounts.borrow_mut().clear();
        self.inner.hashes.borrow_mut().clear();
        Ok(())
    }

    /// Notification that the parent store now holds `account` at
    /// `location`. If the overlay's override there is equal, the override
    /// is dropped as redundant and the ancestor hash chain is rewritten
    /// from the empty account's leaf hash.
    ///
    /// Rehashing from the empty leaf rather than the confirmed account is
    /// long-standing observed behavior; see DESIGN.md before changing it.
    pub fn parent_set_notify(&self, location: &Location, account: &P::Account) -> Result<(), Error> {
        let confirmed = self
            .inner
            .accounts
            .borrow()
            .get(location)
            .is_some_and(|held| held == account);
        if !confirmed {
            return Ok(());
        }
        self.inner.accounts.borrow_mut().shift_remove(location);
        let target = location.to_path();
        let path = self.merkle_path_at_addr(target)?;
        self.write_hashes_to_root(target, P::Account::empty().hash(), &path);
        Ok(())
    }

    /// Replace each sibling hash in `path` with the overlay's value where
    /// the overlay has one, walking `target` upward level by level.
    fn fixup_path(&self, target: Address, path: MerklePath<P::Hash>) -> MerklePath<P::Hash> {
        let hashes = self.inner.hashes.borrow();
        let mut cur = target;
        let steps = path
            .into_steps()
            .into_iter()
            .map(|step| {
                let sibling = cur.sibling();
                let fixed = match hashes.get(&sibling) {
                    Some(hash) => step.with_hash(hash.clone()),
                    None => step,
                };
                if let Some(parent) = cur.parent() {
                    cur = parent;
                }
                fixed
            })
            .collect();
        MerklePath::new(steps)
    }

    /// Fold `leaf_hash` upward through `path` and record every node hash
    /// from `leaf` to the root in the overlay.
    fn write_hashes_to_root(&self, leaf: Address, leaf_hash: P::Hash, path: &MerklePath<P::Hash>) {
        let mut hashes = self.inner.hashes.borrow_mut();
        let mut cur = leaf;
        let mut acc = leaf_hash;
        hashes.insert(cur, acc.clone());
        for (height, step) in path.steps().iter().enumerate() {
            acc = match step {
                MerklePathStep::Left(sibling) => P::Hash::merge(height as u8, sibling, &acc),
                MerklePathStep::Right(sibling) => P::Hash::merge(height as u8, &acc, sibling),
            };
            cur = cur
                .parent()
                .expect("a merkle path is no longer than its address depth");
            hashes.insert(cur, acc.clone());
        }
    }
}

impl<'p, P: TreeStore> TreeStore for AttachedMask<'p, P> {
    type Key = P::Key;
    type Hash = P::Hash;
    type Account = P::Account;

    fn depth(&self) -> u8 {
        self.parent.depth()
    }

    /// Overridden accounts only, not the size of the combined view.
    fn num_accounts(&self) -> usize {
        self.inner.accounts.borrow().len()
    }

    fn merkle_root(&self) -> P::Hash {
        if let Some(hash) = self.inner.hashes.borrow().get(&Address::root()) {
            return hash.clone();
        }
        self.parent.merkle_root()
    }

    fn get(&self, location: &Location) -> Option<P::Account> {
        if let Some(account) = self.inner.accounts.borrow().get(location) {
            return Some(account.clone());
        }
        self.parent.get(location)
    }

    fn set(&self, location: &Location, account: P::Account) -> Result<(), Error> {
        let target = location.to_path();
        assert_eq!(
            target.depth(),
            self.depth(),
            "account location {target:?} is not at leaf depth {}",
            self.depth()
        );
        let leaf_hash = account.hash();
        self.inner.accounts.borrow_mut().insert(*location, account);
        // The path is fetched after the account write but reflects only
        // sibling state: this leaf's own ancestors are never its siblings.
        let path = self.merkle_path_at_addr(target)?;
        self.write_hashes_to_root(target, leaf_hash, &path);
        Ok(())
    }

    fn get_inner_hash_at_addr(&self, address: Address) -> Result<P::Hash, Error> {
        if let Some(hash) = self.inner.hashes.borrow().get(&address) {
            return Ok(hash.clone());
        }
        self.parent.get_inner_hash_at_addr(address)
    }

    fn set_inner_hash_at_addr(&self, address: Address, hash: P::Hash) -> Result<(), Error> {
        let tree_depth = self.depth();
        if address.depth() > tree_depth {
            return Err(Error::AddressOutOfRange {
                address,
                tree_depth,
            });
        }
        self.inner.hashes.borrow_mut().insert(address, hash);
        Ok(())
    }

    fn merkle_path_at_addr(&self, address: Address) -> Result<MerklePath<P::Hash>, Error> {
        let path = self.parent.merkle_path_at_addr(address)?;
        Ok(self.fixup_path(address, path))
    }

    fn get_all_accounts_rooted_at(
        &self,
        address: Address,
    ) -> Result<Vec<(Address, P::Account)>, Error> {
        let depth = self.depth();
        if address.depth() > depth {
            return Err(Error::AddressOutOfRange {
                address,
                tree_depth: depth,
            });
        }
        let range = address.subtree_range(depth);
        let mut found: Vec<(Address, P::Account)> = {
            let accounts = self.inner.accounts.borrow();
            let mut masked: Vec<(Address, P::Account)> = accounts
                .iter()
                .map(|(location, account)| (location.to_path(), account.clone()))
                .filter(|(path, _)| range.contains(&path.index()))
                .collect();
            masked.sort_by_key(|(path, _)| path.index());
            masked
        };
        // Disjoint from the overlay's entries as long as parent writes are
        // announced through parent_set_notify.
        found.extend(self.parent.get_all_accounts_rooted_at(address)?);
        Ok(found)
    }

    fn to_list(&self) -> Vec<P::Account> {
        let mut list = self.parent.to_list();
        let accounts = self.inner.accounts.borrow();
        for (location, account) in accounts.iter() {
            let index = location.to_path().index() as usize;
            if index >= list.len() {
                list.resize(index + 1, P::Account::empty());
            }
            list[index] = account.clone();
        }
        list
    }

    fn location_of_key(&self, _key: &P::Key) -> Option<Location> {
        unimplemented!("AttachedMask::location_of_key: key indexing belongs to the base store")
    }

    fn index_of_key(&self, _key: &P::Key) -> u64 {
        unimplemented!("AttachedMask::index_of_key: key indexing belongs to the base store")
    }

    fn get_or_create_account(
        &self,
        key: P::Key,
        account: P::Account,
    ) -> Result<(AccountStatus, Location), Error> {
        // The overlay never allocates; allocation is the parent's.
        self.parent.get_or_create_account(key, account)
    }

    fn make_space_for(&self, _space: u64) {
        unimplemented!("AttachedMask::make_space_for: space management belongs to the base store")
    }

    fn remove_accounts(&self, _keys: &[P::Key]) -> Result<(), Error> {
        unimplemented!("AttachedMask::remove_accounts: account removal belongs to the base store")
    }

    fn destroy(&self) {
        self.inner.accounts.borrow_mut().clear();
        self.inner.hashes.borrow_mut().clear();
        self.parent.destroy();
    }
}
