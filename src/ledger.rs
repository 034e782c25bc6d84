//! Media Vault - Sharing Ledger
//!
//! The authoritative record of who may see what. Grants are validated here,
//! then written through [`ShareRepo`], which keeps the photo's share counters
//! in step inside the same transaction.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::index::{PhotoRepo, ShareRepo};
use crate::model::{Permission, Photo, ShareGrant};

/// Parameters of a single grant
#[derive(Debug, Clone, Default)]
pub struct GrantRequest {
    pub photo_id: String,
    pub granted_by: String,
    pub granted_to: String,
    pub permission: Permission,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One (photo, grantee) pair of a batch that did not go through
#[derive(Debug)]
pub struct BatchFailure {
    pub photo_id: String,
    pub granted_to: String,
    pub error: VaultError,
}

/// Outcome of [`SharingLedger::batch_share`]
#[derive(Debug, Default)]
pub struct BatchShareReport {
    pub granted: Vec<ShareGrant>,
    pub failures: Vec<BatchFailure>,
}

pub struct SharingLedger {
    photos: Arc<dyn PhotoRepo>,
    shares: Arc<dyn ShareRepo>,
}

impl SharingLedger {
    pub fn new(photos: Arc<dyn PhotoRepo>, shares: Arc<dyn ShareRepo>) -> Self {
        Self { photos, shares }
    }

    pub fn grant(&self, request: &GrantRequest) -> VaultResult<ShareGrant> {
        self.grant_at(request, Utc::now())
    }

    /// Validate and record a grant. Re-granting the same
    /// (photo, grantee, permission) refreshes the existing grant.
    pub fn grant_at(&self, request: &GrantRequest, now: DateTime<Utc>) -> VaultResult<ShareGrant> {
        for (field, value) in [
            ("photo id", &request.photo_id),
            ("granted_by", &request.granted_by),
            ("granted_to", &request.granted_to),
        ] {
            if value.trim().is_empty() {
                return Err(VaultError::Validation(format!("{field} must not be empty")));
            }
        }
        if request.granted_to == request.granted_by {
            return Err(VaultError::Validation("cannot share a photo with yourself".into()));
        }
        if let Some(expires_at) = request.expires_at {
            if expires_at <= now {
                return Err(VaultError::Validation(format!(
                    "expiry {} is not in the future",
                    expires_at.to_rfc3339()
                )));
            }
        }

        let owner = self
            .photos
            .owner_of(&request.photo_id)?
            .ok_or_else(|| VaultError::photo_not_found(&request.photo_id))?;
        if owner != request.granted_by {
            return Err(VaultError::PermissionDenied(format!(
                "only the owner can share photo {}",
                request.photo_id
            )));
        }

        let grant = self.shares.upsert_grant(&ShareGrant {
            id: Uuid::new_v4().to_string(),
            photo_id: request.photo_id.clone(),
            granted_by: request.granted_by.clone(),
            granted_to: request.granted_to.clone(),
            permission: request.permission,
            created_at: now,
            expires_at: request.expires_at,
        })?;

        info!(
            "{} granted {} on {} to {}",
            grant.granted_by, grant.permission, grant.photo_id, grant.granted_to
        );
        Ok(grant)
    }

    /// Grant every (photo, grantee) pair. Fails only when nothing succeeded.
    pub fn batch_share(
        &self,
        photo_ids: &[String],
        granted_by: &str,
        granted_to: &[String],
        permission: Permission,
        expires_at: Option<DateTime<Utc>>,
    ) -> VaultResult<BatchShareReport> {
        if photo_ids.is_empty() || granted_to.is_empty() {
            return Err(VaultError::Validation(
                "batch share needs at least one photo and one grantee".into(),
            ));
        }

        let mut report = BatchShareReport::default();
        for photo_id in photo_ids {
            for to in granted_to {
                let request = GrantRequest {
                    photo_id: photo_id.clone(),
                    granted_by: granted_by.to_string(),
                    granted_to: to.clone(),
                    permission,
                    expires_at,
                };
                match self.grant(&request) {
                    Ok(grant) => report.granted.push(grant),
                    Err(error) => {
                        warn!("sharing {} with {} failed: {}", photo_id, to, error);
                        report.failures.push(BatchFailure {
                            photo_id: photo_id.clone(),
                            granted_to: to.clone(),
                            error,
                        });
                    }
                }
            }
        }

        if report.granted.is_empty() {
            // every pair failed; surface the first cause
            return Err(report.failures.remove(0).error);
        }
        Ok(report)
    }

    pub fn revoke(&self, grant_id: &str) -> VaultResult<ShareGrant> {
        let grant = self
            .shares
            .delete_grant(grant_id)?
            .ok_or_else(|| VaultError::grant_not_found(grant_id))?;
        info!("revoked share {} on {}", grant.id, grant.photo_id);
        Ok(grant)
    }

    pub fn get(&self, grant_id: &str) -> VaultResult<ShareGrant> {
        self.shares
            .get_grant(grant_id)?
            .ok_or_else(|| VaultError::grant_not_found(grant_id))
    }

    /// All grants on a photo, expired ones included
    pub fn list_for_photo(&self, photo_id: &str) -> VaultResult<Vec<ShareGrant>> {
        self.shares.grants_for_photo(photo_id)
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> VaultResult<usize> {
        let purged = self.shares.purge_expired(now)?;
        if purged > 0 {
            info!("purged {} expired shares", purged);
        }
        Ok(purged)
    }

    /// Photos with at least one active grant to `user_id`, newest grant first
    pub fn shared_with_user(&self, user_id: &str, now: DateTime<Utc>) -> VaultResult<Vec<Photo>> {
        let mut seen = HashSet::new();
        let mut photos = Vec::new();

        for grant in self.shares.grants_to_user(user_id)? {
            if !grant.is_active_at(now) || !seen.insert(grant.photo_id.clone()) {
                continue;
            }
            if let Some(photo) = self.photos.get_photo(&grant.photo_id)? {
                photos.push(photo);
            }
        }

        Ok(photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::PermissionResolver;
    use crate::index::tests::sample_photo;
    use crate::index::PhotoIndex;
    use chrono::Duration;

    fn setup() -> (Arc<PhotoIndex>, SharingLedger) {
        let index = Arc::new(PhotoIndex::open_in_memory().unwrap());
        index.insert_photo(&sample_photo("p1", "alice")).unwrap();
        index.insert_photo(&sample_photo("p2", "alice")).unwrap();
        let ledger = SharingLedger::new(index.clone(), index.clone());
        (index, ledger)
    }

    fn request(photo: &str, to: &str, permission: Permission) -> GrantRequest {
        GrantRequest {
            photo_id: photo.into(),
            granted_by: "alice".into(),
            granted_to: to.into(),
            permission,
            expires_at: None,
        }
    }

    #[test]
    fn test_grant_validations() {
        let (_index, ledger) = setup();

        let mut empty = request("p1", "bob", Permission::View);
        empty.granted_to = "  ".into();
        assert!(matches!(ledger.grant(&empty), Err(VaultError::Validation(_))));

        let own = request("p1", "alice", Permission::View);
        assert!(matches!(ledger.grant(&own), Err(VaultError::Validation(_))));

        let mut stale = request("p1", "bob", Permission::View);
        stale.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(matches!(ledger.grant(&stale), Err(VaultError::Validation(_))));

        let missing = request("nope", "bob", Permission::View);
        assert!(matches!(ledger.grant(&missing), Err(VaultError::NotFound { .. })));

        let mut stranger = request("p1", "carol", Permission::View);
        stranger.granted_by = "mallory".into();
        assert!(matches!(
            ledger.grant(&stranger),
            Err(VaultError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_revoke_then_check() {
        let (index, ledger) = setup();
        let resolver = PermissionResolver::new(index.clone(), index.clone());

        let grant = ledger.grant(&request("p1", "bob", Permission::View)).unwrap();
        assert!(resolver.has_permission("p1", "bob", Permission::View).unwrap());
        assert_eq!(index.get_photo("p1").unwrap().unwrap().share_count, 1);

        ledger.revoke(&grant.id).unwrap();
        assert!(!resolver.has_permission("p1", "bob", Permission::View).unwrap());
        assert!(!index.get_photo("p1").unwrap().unwrap().is_shared);

        assert!(matches!(
            ledger.revoke(&grant.id),
            Err(VaultError::NotFound { kind: "Share", .. })
        ));
    }

    #[test]
    fn test_download_grant_upgrades_access() {
        let (index, ledger) = setup();
        let resolver = PermissionResolver::new(index.clone(), index.clone());

        ledger.grant(&request("p1", "bob", Permission::View)).unwrap();
        assert!(!resolver.has_permission("p1", "bob", Permission::Download).unwrap());

        ledger.grant(&request("p1", "bob", Permission::Download)).unwrap();
        assert!(resolver.has_permission("p1", "bob", Permission::Download).unwrap());
        assert_eq!(ledger.list_for_photo("p1").unwrap().len(), 2);
    }

    #[test]
    fn test_regrant_keeps_id() {
        let (_index, ledger) = setup();
        let first = ledger.grant(&request("p1", "bob", Permission::View)).unwrap();

        let mut again = request("p1", "bob", Permission::View);
        again.expires_at = Some(Utc::now() + Duration::days(1));
        let second = ledger.grant(&again).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.get(&first.id).unwrap().expires_at, again.expires_at);
    }

    #[test]
    fn test_batch_share_partial() {
        let (_index, ledger) = setup();
        let photos = vec!["p1".to_string(), "missing".to_string(), "p2".to_string()];
        let grantees = vec!["bob".to_string(), "carol".to_string()];

        let report = ledger
            .batch_share(&photos, "alice", &grantees, Permission::View, None)
            .unwrap();
        assert_eq!(report.granted.len(), 4);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.photo_id == "missing"));

        let nothing = ledger.batch_share(
            &["missing".to_string()],
            "alice",
            &grantees,
            Permission::View,
            None,
        );
        assert!(matches!(nothing, Err(VaultError::NotFound { .. })));
    }

    #[test]
    fn test_shared_with_user_skips_expired() {
        let (_index, ledger) = setup();
        let now = Utc::now();

        let mut short = request("p1", "bob", Permission::View);
        short.expires_at = Some(now + Duration::seconds(30));
        ledger.grant_at(&short, now).unwrap();
        ledger.grant(&request("p2", "bob", Permission::Download)).unwrap();
        ledger.grant(&request("p2", "bob", Permission::View)).unwrap();

        assert_eq!(ledger.shared_with_user("bob", now).unwrap().len(), 2);

        let later = now + Duration::minutes(1);
        let visible = ledger.shared_with_user("bob", later).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "p2");

        assert_eq!(ledger.purge_expired(later).unwrap(), 1);
        assert_eq!(ledger.list_for_photo("p1").unwrap().len(), 0);
    }
}
