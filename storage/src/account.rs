use std::fmt;
use std::hash::Hash;

/// A Merkle tree node hash.
///
/// `merge` combines the hashes of two sibling nodes into their parent's
/// hash. `height` is the height of the two children above the leaves
/// (leaves are height 0) and is expected to feed domain separation, so that
/// equal subtrees at different levels hash differently.
pub trait NodeHash: Clone + PartialEq + fmt::Debug {
    /// Combine two child hashes at `height` into their parent's hash.
    fn merge(height: u8, left: &Self, right: &Self) -> Self;
}

/// An account payload stored at a leaf.
///
/// The distinguished [`empty`](Account::empty) value represents a
/// logically absent slot; it hashes like any other account, which is what
/// gives an untouched tree a well-defined root.
pub trait Account: Clone + PartialEq + fmt::Debug {
    /// Key by which accounts are allocated and looked up in stores that
    /// maintain a key index.
    type Key: Clone + Eq + Hash + fmt::Debug;
    /// Node hash type of the tree this account lives in.
    type Hash: NodeHash;

    /// Leaf hash of this account.
    fn hash(&self) -> Self::Hash;

    /// The distinguished empty account.
    fn empty() -> Self;

    /// The key of this account, `None` for the empty account.
    fn key(&self) -> Option<Self::Key>;

    /// Whether this is the empty account.
    fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}
