use rustc_hash::FxHashSet;
use std::sync::RwLock;

use tracing::info;

use super::AdminError;
use crate::core_types::AccountId;
use crate::transfer::ValidationError;

/// Who may run administrative operations.
pub trait AccessControl: Send + Sync {
    fn is_admin(&self, caller: &AccountId) -> bool;

    /// Returns false if `id` already was an admin.
    fn grant(&self, caller: &AccountId, id: AccountId) -> Result<bool, AdminError>;

    /// Returns false if `id` was not an admin.
    fn revoke(&self, caller: &AccountId, id: &AccountId) -> Result<bool, AdminError>;
}

/// Owner plus a mutable set of delegated admins.
///
/// The owner can never be revoked.
pub struct AdminRoster {
    owner: AccountId,
    delegates: RwLock<FxHashSet<AccountId>>,
}

impl AdminRoster {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            delegates: RwLock::new(FxHashSet::default()),
        }
    }

    pub fn with_delegates(owner: AccountId, delegates: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            owner,
            delegates: RwLock::new(delegates.into_iter().collect()),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    fn ensure_owner(&self, caller: &AccountId) -> Result<(), AdminError> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(AdminError::Unauthorized(*caller))
        }
    }
}

impl AccessControl for AdminRoster {
    fn is_admin(&self, caller: &AccountId) -> bool {
        !caller.is_empty()
            && (*caller == self.owner
                || self
                    .delegates
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .contains(caller))
    }

    /// Owner-only.
    fn grant(&self, caller: &AccountId, id: AccountId) -> Result<bool, AdminError> {
        self.ensure_owner(caller)?;
        if id.is_empty() {
            return Err(ValidationError::EmptyIdentifier("admin").into());
        }
        let added = self
            .delegates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);
        info!(admin = %id, "Admin granted");
        Ok(added)
    }

    fn revoke(&self, caller: &AccountId, id: &AccountId) -> Result<bool, AdminError> {
        self.ensure_owner(caller)?;
        let removed = self
            .delegates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        info!(admin = %id, "Admin revoked");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_and_delegates() {
        let owner = AccountId::from_label("owner").unwrap();
        let ops = AccountId::from_label("ops").unwrap();
        let roster = AdminRoster::new(owner);

        assert!(roster.is_admin(&owner));
        assert!(!roster.is_admin(&ops));
        assert!(roster.grant(&owner, ops).unwrap());
        assert!(roster.is_admin(&ops));
        // Delegates cannot grant
        assert_eq!(
            roster.grant(&ops, AccountId::from_label("x").unwrap()),
            Err(AdminError::Unauthorized(ops))
        );
        assert!(roster.revoke(&owner, &ops).unwrap());
        assert!(!roster.is_admin(&ops));
        assert!(!roster.is_admin(&AccountId::ZERO));
    }
}
