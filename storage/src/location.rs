use maskdb_path::Address;

/// A store-level slot identifier.
///
/// Account slots live at leaf addresses; node slots address internal tree
/// positions and exist for stores that expose hash-level access.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Location {
    /// A leaf slot holding an account.
    Account(Address),
    /// An internal node slot.
    Node(Address),
}

impl Location {
    /// The tree address of an account slot.
    ///
    /// # Panics
    ///
    /// Panics for a node location; only account slots convert to leaf
    /// paths.
    pub fn to_path(&self) -> Address {
        match self {
            Location::Account(address) => *address,
            Location::Node(address) => {
                panic!("node location {address:?} does not address an account slot")
            }
        }
    }

    /// Whether this is an account slot.
    pub fn is_account(&self) -> bool {
        matches!(self, Location::Account(_))
    }
}
