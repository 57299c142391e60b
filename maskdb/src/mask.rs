use std::{cell::RefCell, collections::HashMap};

use indexmap::IndexMap;
use maskdb_path::Address;
use maskdb_storage::{Account, Location, TreeStore};

use crate::AttachedMask;

/// Unattached overlay state: the two override tables and nothing else.
///
/// A fresh mask has no delegation target and therefore answers no queries;
/// it becomes operational by [`attach`](Mask::attach)ing to a parent store,
/// which moves the tables into an [`AttachedMask`] without copying them.
/// Detaching an attached mask yields the tables back, so an overlay can be
/// re-parented onto a different store.
///
/// The account table is insertion-ordered so commits replay writes in the
/// order they were made.
pub struct Mask<A: Account> {
    pub(crate) accounts: RefCell<IndexMap<Location, A>>,
    pub(crate) hashes: RefCell<HashMap<Address, A::Hash>>,
}

impl<A: Account> Mask<A> {
    /// A fresh, empty, unattached mask.
    pub fn new() -> Self {
        Mask {
            accounts: RefCell::new(IndexMap::new()),
            hashes: RefCell::new(HashMap::new()),
        }
    }

    /// Bind this mask to `parent`, producing the operational overlay.
    ///
    /// This is the only way to obtain an [`AttachedMask`]; an overlay
    /// without a delegation target cannot be constructed.
    pub fn attach<P>(self, parent: &P) -> AttachedMask<'_, P>
    where
        P: TreeStore<Account = A>,
    {
        AttachedMask::new(parent, self)
    }

    /// Whether the overlay holds no overrides at all.
    pub fn is_empty(&self) -> bool {
        self.accounts.borrow().is_empty() && self.hashes.borrow().is_empty()
    }
}

impl<A: Account> Default for Mask<A> {
    fn default() -> Self {
        Mask::new()
    }
}

impl<A: Account> Clone for Mask<A> {
    fn clone(&self) -> Self {
        Mask {
            accounts: RefCell::new(self.accounts.borrow().clone()),
            hashes: RefCell::new(self.hashes.borrow().clone()),
        }
    }
}
