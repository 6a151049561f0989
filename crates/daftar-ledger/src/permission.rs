//! Capability checks consulted by the engine before destructive operations.
//!
//! Authentication lives outside the ledger; the engine only asks.

use std::collections::HashSet;

/// Operations that need a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DeleteTransaction,
}

pub trait PermissionCheck: Send + Sync {
    fn allows(&self, capability: Capability) -> bool;

    fn can_delete_transaction(&self) -> bool {
        self.allows(Capability::DeleteTransaction)
    }
}

/// Grants everything. For single-user shops and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn allows(&self, _capability: Capability) -> bool {
        true
    }
}

/// A fixed set of granted capabilities, e.g. resolved from the signed-in
/// user's role at login.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    granted: HashSet<Capability>,
}

impl StaticPermissions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn grant(mut self, capability: Capability) -> Self {
        self.granted.insert(capability);
        self
    }
}

impl PermissionCheck for StaticPermissions {
    fn allows(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }
}
