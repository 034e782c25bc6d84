//! Media Vault - Permission Resolver
//!
//! Answers "may `user` do `permission` on `photo`". The owner always may.
//! Anyone else needs an unexpired grant for exactly that permission. A
//! download grant does not imply view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{VaultError, VaultResult};
use crate::index::{PhotoRepo, ShareRepo};
use crate::model::Permission;

pub struct PermissionResolver {
    photos: Arc<dyn PhotoRepo>,
    shares: Arc<dyn ShareRepo>,
}

impl PermissionResolver {
    pub fn new(photos: Arc<dyn PhotoRepo>, shares: Arc<dyn ShareRepo>) -> Self {
        Self { photos, shares }
    }

    /// Check against the current clock
    pub fn has_permission(
        &self,
        photo_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> VaultResult<bool> {
        self.has_permission_at(photo_id, user_id, permission, Utc::now())
    }

    /// A missing photo is `NotFound`, not a plain refusal
    pub fn has_permission_at(
        &self,
        photo_id: &str,
        user_id: &str,
        permission: Permission,
        now: DateTime<Utc>,
    ) -> VaultResult<bool> {
        let owner = self
            .photos
            .owner_of(photo_id)?
            .ok_or_else(|| VaultError::photo_not_found(photo_id))?;
        if owner == user_id {
            return Ok(true);
        }

        let allowed = self
            .shares
            .grants_matching(photo_id, user_id, permission)?
            .iter()
            .any(|grant| grant.is_active_at(now));

        debug!("{} {} on {}: {}", user_id, permission, photo_id, allowed);
        Ok(allowed)
    }

    /// Like `has_permission`, but a refusal is an error
    pub fn require(&self, photo_id: &str, user_id: &str, permission: Permission) -> VaultResult<()> {
        if self.has_permission(photo_id, user_id, permission)? {
            Ok(())
        } else {
            Err(VaultError::PermissionDenied(format!(
                "{user_id} lacks {permission} on photo {photo_id}"
            )))
        }
    }
}
