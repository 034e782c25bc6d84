//! Media Vault - Main Vault Implementation
//!
//! The facade callers talk to. It wires the content store, index, ingestion
//! pipeline, resolver and ledger together and puts an ownership or permission
//! check in front of every read and mutation.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::access::PermissionResolver;
use crate::config::VaultConfig;
use crate::derive::{AiDescription, Describer, DerivativeGenerator, DerivativeReport, DerivativeStep};
use crate::error::{VaultError, VaultResult};
use crate::index::{PhotoIndex, PhotoRepo};
use crate::ingest::{merge_tags, BulkIngestReport, IngestPipeline, Upload};
use crate::ledger::{BatchShareReport, GrantRequest, SharingLedger};
use crate::model::{ModerationStatus, Permission, Photo, ShareGrant};
use crate::store::ContentStore;

/// Page size when the caller asks for none
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on a single page
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of a user's photos
#[derive(Debug, Clone, Serialize)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub total: u64,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl PhotoPage {
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.limit) < self.total
    }
}

/// Result of re-hashing every stored original
#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub checked: usize,
    /// Stored bytes no longer match the recorded hash
    pub mismatched: Vec<String>,
    /// Indexed, but the original is gone
    pub missing: Vec<String>,
    pub missing_thumbnails: Vec<String>,
    /// On disk, but not indexed
    pub orphans: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.mismatched.is_empty()
            && self.missing.is_empty()
            && self.missing_thumbnails.is_empty()
            && self.orphans.is_empty()
    }
}

/// Photos of one user sharing a content hash, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub photos: Vec<Photo>,
}

/// Media Vault - Main entry point
pub struct MediaVault {
    /// Effective configuration
    config: VaultConfig,
    /// Originals and thumbnails
    store: Arc<ContentStore>,
    /// Photo and grant records
    index: Arc<PhotoIndex>,
    pipeline: IngestPipeline,
    resolver: PermissionResolver,
    ledger: SharingLedger,
    /// For on-demand descriptions
    generator: DerivativeGenerator,
    describer: Option<Arc<dyn Describer>>,
}

impl MediaVault {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Open (creating if needed) the vault described by `config`
    pub fn open(config: VaultConfig) -> VaultResult<Self> {
        std::fs::create_dir_all(&config.root)?;

        let store = Arc::new(ContentStore::open(&config.root)?.with_max_bytes(config.max_upload_bytes));
        let index = Arc::new(PhotoIndex::open(&config.database_path())?);

        let pipeline = IngestPipeline::new(store.clone(), index.clone(), &config);
        let resolver = PermissionResolver::new(index.clone(), index.clone());
        let ledger = SharingLedger::new(index.clone(), index.clone());

        info!("vault opened at {}", config.root.display());

        Ok(Self {
            generator: DerivativeGenerator::new(config.thumbnail_size),
            config,
            store,
            index,
            pipeline,
            resolver,
            ledger,
            describer: None,
        })
    }

    /// Plug in an AI captioning backend, used at ingestion and by [`Self::describe`]
    pub fn with_describer(mut self, describer: Arc<dyn Describer>) -> Self {
        self.pipeline = self.pipeline.with_describer(describer.clone());
        self.describer = Some(describer);
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn index(&self) -> &PhotoIndex {
        &self.index
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UPLOAD
    // ═══════════════════════════════════════════════════════════════════════

    pub fn upload<R: Read>(&self, upload: Upload<R>) -> VaultResult<Photo> {
        self.pipeline.ingest(upload)
    }

    pub fn upload_many<R, I>(&self, uploads: I) -> VaultResult<BulkIngestReport>
    where
        R: Read,
        I: IntoIterator<Item = Upload<R>>,
    {
        self.pipeline.ingest_many(uploads)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // READS
    // ═══════════════════════════════════════════════════════════════════════

    /// Fetch a photo for display. Counts as a view.
    pub fn get_photo(&self, user_id: &str, photo_id: &str) -> VaultResult<Photo> {
        self.resolver.require(photo_id, user_id, Permission::View)?;
        self.index.increment_view_count(photo_id)?;
        self.photo(photo_id)
    }

    /// Open the original bytes for download
    pub fn open_original(&self, user_id: &str, photo_id: &str) -> VaultResult<(Photo, File)> {
        self.resolver.require(photo_id, user_id, Permission::Download)?;
        let photo = self.photo(photo_id)?;
        let file = self.store.get(photo_id)?;
        Ok((photo, file))
    }

    pub fn read_thumbnail(&self, user_id: &str, photo_id: &str) -> VaultResult<Vec<u8>> {
        self.resolver.require(photo_id, user_id, Permission::View)?;
        let photo = self.photo(photo_id)?;
        if !photo.has_thumbnail() {
            return Err(VaultError::NotFound {
                kind: "Thumbnail",
                id: photo_id.to_string(),
            });
        }
        self.store.read_thumbnail(photo_id)
    }

    /// A user's own photos, newest first. `page` is 1-based.
    pub fn list_photos(&self, user_id: &str, page: u32, limit: u32) -> VaultResult<PhotoPage> {
        let (page, limit) = normalize_page(page, limit);
        let photos = match page_offset(page, limit) {
            Some(offset) => self.index.list_by_user(user_id, limit, offset)?,
            None => Vec::new(),
        };
        let total = self.index.count_by_user(user_id)?;
        Ok(PhotoPage {
            photos,
            total,
            page,
            limit,
        })
    }

    pub fn list_partner_photos(&self, partner_id: &str, page: u32, limit: u32) -> VaultResult<Vec<Photo>> {
        let (page, limit) = normalize_page(page, limit);
        match page_offset(page, limit) {
            Some(offset) => self.index.list_by_partner(partner_id, limit, offset),
            None => Ok(Vec::new()),
        }
    }

    /// Photos other users currently share with `user_id`
    pub fn shared_with_me(&self, user_id: &str) -> VaultResult<Vec<Photo>> {
        self.ledger.shared_with_user(user_id, Utc::now())
    }

    pub fn shares_for_photo(&self, owner_id: &str, photo_id: &str) -> VaultResult<Vec<ShareGrant>> {
        self.owned_photo(owner_id, photo_id)?;
        self.ledger.list_for_photo(photo_id)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SHARING
    // ═══════════════════════════════════════════════════════════════════════

    /// Grant `granted_to` a permission on one of `owner_id`'s photos
    pub fn share(
        &self,
        owner_id: &str,
        photo_id: &str,
        granted_to: &str,
        permission: Permission,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> VaultResult<ShareGrant> {
        self.ledger.grant(&GrantRequest {
            photo_id: photo_id.to_string(),
            granted_by: owner_id.to_string(),
            granted_to: granted_to.to_string(),
            permission,
            expires_at,
        })
    }

    pub fn share_many(
        &self,
        owner_id: &str,
        photo_ids: &[String],
        granted_to: &[String],
        permission: Permission,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> VaultResult<BatchShareReport> {
        self.ledger
            .batch_share(photo_ids, owner_id, granted_to, permission, expires_at)
    }

    /// Only the photo's owner may revoke
    pub fn revoke_share(&self, user_id: &str, grant_id: &str) -> VaultResult<ShareGrant> {
        let grant = self.ledger.get(grant_id)?;
        self.owned_photo(user_id, &grant.photo_id)?;
        self.ledger.revoke(grant_id)
    }

    pub fn purge_expired_shares(&self) -> VaultResult<usize> {
        self.ledger.purge_expired(Utc::now())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn update_description(
        &self,
        user_id: &str,
        photo_id: &str,
        description: Option<&str>,
    ) -> VaultResult<Photo> {
        self.owned_photo(user_id, photo_id)?;
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        self.index.update_description(photo_id, description)?;
        self.photo(photo_id)
    }

    /// Replace the tag list
    pub fn set_tags(&self, user_id: &str, photo_id: &str, tags: &[String]) -> VaultResult<Photo> {
        self.owned_photo(user_id, photo_id)?;
        let mut cleaned = Vec::new();
        merge_tags(&mut cleaned, tags.iter().cloned());
        self.index.set_tags(photo_id, &cleaned)?;
        self.photo(photo_id)
    }

    /// Generate and store an AI description. `Ok(None)` when no describer is
    /// configured or the attempt failed.
    pub fn describe(&self, user_id: &str, photo_id: &str) -> VaultResult<Option<AiDescription>> {
        self.resolver.require(photo_id, user_id, Permission::View)?;
        let Some(describer) = self.describer.as_deref() else {
            debug!("no describer configured, skipping {}", photo_id);
            return Ok(None);
        };
        let photo = self.photo(photo_id)?;

        let mut report = DerivativeReport::default();
        let image = report.attempt(DerivativeStep::Decode, photo_id, || {
            self.generator.decode(&self.store.original_path(photo_id))
        });
        let described = image.and_then(|img| {
            report.attempt(DerivativeStep::Describe, photo_id, || {
                describer.describe(&img, &photo.mime_type)
            })
        });

        if let Some(ref ai) = described {
            self.index.set_ai_description(photo_id, &ai.text, ai.confidence)?;
            let mut tags = photo.tags.clone();
            merge_tags(&mut tags, ai.tags.iter().cloned());
            if tags != photo.tags {
                self.index.set_tags(photo_id, &tags)?;
            }
        }
        Ok(described)
    }

    /// Record a moderation decision. Who may moderate is decided upstream.
    pub fn set_moderation(
        &self,
        photo_id: &str,
        status: ModerationStatus,
        nsfw: Option<(bool, f64)>,
    ) -> VaultResult<Photo> {
        if !self.index.set_moderation(photo_id, status, nsfw)? {
            return Err(VaultError::photo_not_found(photo_id));
        }
        info!("photo {} moderated: {}", photo_id, status);
        self.photo(photo_id)
    }

    /// Delete a photo with its files and grants
    pub fn delete_photo(&self, user_id: &str, photo_id: &str) -> VaultResult<()> {
        let photo = self.owned_photo(user_id, photo_id)?;

        // grants go with the row
        self.index.delete_photo(photo_id)?;
        self.store.delete(photo_id)?;
        if photo.has_thumbnail() {
            self.store.delete_thumbnail(photo_id)?;
        }

        info!("deleted photo {} of {}", photo_id, user_id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MAINTENANCE
    // ═══════════════════════════════════════════════════════════════════════

    /// Re-hash every original and cross-check disk against the index
    pub fn verify_integrity(&self) -> VaultResult<IntegrityReport> {
        let mut report = IntegrityReport::default();
        let photos = self.index.list_all()?;
        let known: HashSet<&str> = photos.iter().map(|p| p.id.as_str()).collect();

        for photo in &photos {
            report.checked += 1;

            if !self.store.original_path(&photo.id).exists() {
                report.missing.push(photo.id.clone());
            } else {
                match self.store.verify(&photo.id, &photo.hash) {
                    Ok(true) => {}
                    Ok(false) => report.mismatched.push(photo.id.clone()),
                    Err(e) => {
                        warn!("could not re-hash {}: {}", photo.id, e);
                        report.missing.push(photo.id.clone());
                    }
                }
            }

            if photo.has_thumbnail() && !self.store.thumbnail_exists(&photo.id) {
                report.missing_thumbnails.push(photo.id.clone());
            }
        }

        report.orphans = self
            .store
            .list_original_ids()
            .into_iter()
            .filter(|id| !known.contains(id.as_str()))
            .collect();

        if !report.is_healthy() {
            warn!(
                "integrity: {} mismatched, {} missing, {} missing thumbnails, {} orphans",
                report.mismatched.len(),
                report.missing.len(),
                report.missing_thumbnails.len(),
                report.orphans.len()
            );
        }
        Ok(report)
    }

    /// A user's photos grouped by identical content
    pub fn find_duplicates(&self, user_id: &str) -> VaultResult<Vec<DuplicateGroup>> {
        self.index
            .duplicate_hashes(user_id)?
            .into_iter()
            .map(|hash| {
                let photos = self.index.find_by_hash(user_id, &hash)?;
                Ok(DuplicateGroup { hash, photos })
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn photo(&self, photo_id: &str) -> VaultResult<Photo> {
        self.index
            .get_photo(photo_id)?
            .ok_or_else(|| VaultError::photo_not_found(photo_id))
    }

    fn owned_photo(&self, user_id: &str, photo_id: &str) -> VaultResult<Photo> {
        let photo = self.photo(photo_id)?;
        if !photo.is_owned_by(user_id) {
            return Err(VaultError::PermissionDenied(format!(
                "{user_id} does not own photo {photo_id}"
            )));
        }
        Ok(photo)
    }
}

fn normalize_page(page: u32, limit: u32) -> (u32, u32) {
    let limit = match limit {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };
    (page.max(1), limit)
}

/// Row offset of a normalized page; `None` past the addressable range
fn page_offset(page: u32, limit: u32) -> Option<u32> {
    page.saturating_sub(1).checked_mul(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ShareRepo;
    use crate::ingest::tests::jpeg_bytes;
    use crate::store::hash_reader;
    use chrono::Duration;
    use image::DynamicImage;
    use std::io::Cursor;
    use tempfile::TempDir;

    struct StaticDescriber;

    impl Describer for StaticDescriber {
        fn describe(&self, _image: &DynamicImage, _mime_type: &str) -> VaultResult<AiDescription> {
            Ok(AiDescription {
                text: "a pink square".into(),
                confidence: Some(0.5),
                tags: vec!["pink".into()],
            })
        }
    }

    fn vault() -> (TempDir, MediaVault) {
        let dir = TempDir::new().unwrap();
        let vault = MediaVault::open(VaultConfig::with_root(dir.path())).unwrap();
        (dir, vault)
    }

    fn upload_jpeg(vault: &MediaVault, owner: &str) -> Photo {
        vault
            .upload(Upload::new(owner, "pic.jpg", Cursor::new(jpeg_bytes(300, 200))))
            .unwrap()
    }

    fn share(vault: &MediaVault, photo: &Photo, to: &str, permission: Permission) -> ShareGrant {
        vault
            .share(&photo.user_id, &photo.id, to, permission, None)
            .unwrap()
    }

    #[test]
    fn test_get_photo_counts_views() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");

        vault.get_photo("alice", &photo.id).unwrap();
        let seen = vault.get_photo("alice", &photo.id).unwrap();
        assert_eq!(seen.view_count, 2);

        assert!(matches!(
            vault.get_photo("bob", &photo.id),
            Err(VaultError::PermissionDenied(_))
        ));
        assert!(matches!(
            vault.get_photo("alice", "missing"),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn test_view_grant_is_not_download() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");

        share(&vault, &photo, "bob", Permission::View);
        assert!(vault.get_photo("bob", &photo.id).is_ok());
        assert!(!vault.read_thumbnail("bob", &photo.id).unwrap().is_empty());
        assert!(matches!(
            vault.open_original("bob", &photo.id),
            Err(VaultError::PermissionDenied(_))
        ));

        share(&vault, &photo, "bob", Permission::Download);
        let (meta, file) = vault.open_original("bob", &photo.id).unwrap();
        assert_eq!(hash_reader(file).unwrap(), meta.hash);

        let shares = vault.shares_for_photo("alice", &photo.id).unwrap();
        assert_eq!(shares.len(), 2);
        assert!(matches!(
            vault.shares_for_photo("bob", &photo.id),
            Err(VaultError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_expiring_grant() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");

        let t = Utc::now();
        vault
            .share("alice", &photo.id, "bob", Permission::View, Some(t + Duration::seconds(1)))
            .unwrap();

        let resolver = vault.resolver();
        assert!(resolver.has_permission_at(&photo.id, "bob", Permission::View, t).unwrap());
        assert!(!resolver
            .has_permission_at(&photo.id, "bob", Permission::View, t + Duration::seconds(1))
            .unwrap());
    }

    #[test]
    fn test_share_acts_as_caller() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");

        let grant = share(&vault, &photo, "bob", Permission::View);
        assert_eq!(grant.granted_by, "alice");
        assert!(matches!(
            vault.share("bob", &photo.id, "carol", Permission::View, None),
            Err(VaultError::PermissionDenied(_))
        ));
        assert!(vault.shared_with_me("carol").unwrap().is_empty());
    }

    #[test]
    fn test_revoke_requires_owner() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");
        let grant = share(&vault, &photo, "bob", Permission::View);

        assert!(matches!(
            vault.revoke_share("bob", &grant.id),
            Err(VaultError::PermissionDenied(_))
        ));
        vault.revoke_share("alice", &grant.id).unwrap();
        assert!(vault.get_photo("bob", &photo.id).is_err());
        assert!(matches!(
            vault.revoke_share("alice", &grant.id),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_cascades() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");
        share(&vault, &photo, "bob", Permission::View);
        assert_eq!(vault.shared_with_me("bob").unwrap().len(), 1);

        assert!(matches!(
            vault.delete_photo("bob", &photo.id),
            Err(VaultError::PermissionDenied(_))
        ));
        vault.delete_photo("alice", &photo.id).unwrap();

        assert!(!vault.store().original_path(&photo.id).exists());
        assert!(!vault.store().thumbnail_exists(&photo.id));
        assert!(vault.shared_with_me("bob").unwrap().is_empty());
        assert!(vault.index().grants_to_user("bob").unwrap().is_empty());
        assert!(matches!(
            vault.get_photo("alice", &photo.id),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn test_owner_only_edits() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");
        share(&vault, &photo, "bob", Permission::View);

        let updated = vault
            .update_description("alice", &photo.id, Some("  sunset  "))
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("sunset"));

        let tags = vec!["sea".to_string(), "sea".to_string(), "".to_string()];
        assert_eq!(vault.set_tags("alice", &photo.id, &tags).unwrap().tags, vec!["sea"]);

        assert!(matches!(
            vault.update_description("bob", &photo.id, None),
            Err(VaultError::PermissionDenied(_))
        ));
        assert!(matches!(
            vault.set_tags("bob", &photo.id, &tags),
            Err(VaultError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_describe() {
        let (dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");
        assert_eq!(vault.describe("alice", &photo.id).unwrap(), None);
        drop(vault);

        let vault = MediaVault::open(VaultConfig::with_root(dir.path()))
            .unwrap()
            .with_describer(Arc::new(StaticDescriber));
        let ai = vault.describe("alice", &photo.id).unwrap().unwrap();
        assert_eq!(ai.text, "a pink square");

        let stored = vault.get_photo("alice", &photo.id).unwrap();
        assert_eq!(stored.ai_description.as_deref(), Some("a pink square"));
        assert_eq!(stored.tags, vec!["pink"]);
        assert!(matches!(
            vault.describe("bob", &photo.id),
            Err(VaultError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_moderation() {
        let (_dir, vault) = vault();
        let photo = upload_jpeg(&vault, "alice");

        let moderated = vault
            .set_moderation(&photo.id, ModerationStatus::Approved, Some((false, 0.02)))
            .unwrap();
        assert_eq!(moderated.moderation_status, ModerationStatus::Approved);
        assert_eq!(moderated.is_nsfw, Some(false));
        assert!(matches!(
            vault.set_moderation("missing", ModerationStatus::Rejected, None),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn test_integrity_and_duplicates() {
        let (dir, vault) = vault();
        let bytes = jpeg_bytes(40, 40);
        let a = vault
            .upload(Upload::new("alice", "a.jpg", Cursor::new(bytes.clone())))
            .unwrap();
        let b = vault
            .upload(Upload::new("alice", "b.jpg", Cursor::new(bytes)))
            .unwrap();
        upload_jpeg(&vault, "alice");

        let groups = vault.find_duplicates("alice").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].photos.len(), 2);
        assert!(vault.verify_integrity().unwrap().is_healthy());

        std::fs::write(vault.store().original_path(&a.id), b"tampered").unwrap();
        std::fs::remove_file(dir.path().join(ContentStore::thumbnail_relative(&b.id))).unwrap();
        let orphan = vault.store().put(Cursor::new(b"stray".to_vec())).unwrap();

        let report = vault.verify_integrity().unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.mismatched, vec![a.id.clone()]);
        assert_eq!(report.missing_thumbnails, vec![b.id.clone()]);
        assert_eq!(report.orphans, vec![orphan.id]);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_paging() {
        let (_dir, vault) = vault();
        for _ in 0..3 {
            upload_jpeg(&vault, "alice");
        }
        upload_jpeg(&vault, "bob");

        let first = vault.list_photos("alice", 1, 2).unwrap();
        assert_eq!(first.photos.len(), 2);
        assert_eq!(first.total, 3);
        assert!(first.has_more());

        let second = vault.list_photos("alice", 2, 2).unwrap();
        assert_eq!(second.photos.len(), 1);
        assert!(!second.has_more());

        assert_eq!(normalize_page(0, 0), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(normalize_page(3, 1000), (3, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_paging_past_range_is_empty() {
        let (_dir, vault) = vault();
        vault
            .upload(Upload::new("alice", "pic.jpg", Cursor::new(jpeg_bytes(30, 20))).with_partner("studio"))
            .unwrap();

        let far = vault.list_photos("alice", u32::MAX, MAX_PAGE_SIZE).unwrap();
        assert!(far.photos.is_empty());
        assert_eq!(far.total, 1);
        assert!(!far.has_more());

        assert!(vault
            .list_partner_photos("studio", 50_000_000, MAX_PAGE_SIZE)
            .unwrap()
            .is_empty());
        assert_eq!(vault.list_partner_photos("studio", 1, 0).unwrap().len(), 1);

        assert_eq!(page_offset(1, MAX_PAGE_SIZE), Some(0));
        assert_eq!(page_offset(u32::MAX, MAX_PAGE_SIZE), None);
    }
}
