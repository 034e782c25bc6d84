//! Media Vault - Ingestion Pipeline
//!
//! Upload -> content store (write + hash) -> derivatives -> index row.
//! The original write and the index insert are hard requirements; everything
//! in between is best-effort. A failed insert undoes every file written for
//! the upload before the error is returned.

use std::io::Read;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use crate::config::VaultConfig;
use crate::derive::{Describer, DerivativeGenerator, DerivativeStep};
use crate::error::{VaultError, VaultResult};
use crate::index::PhotoRepo;
use crate::model::{ModerationStatus, Photo};
use crate::store::{detect_mime, ContentStore};

const SNIFF_LEN: usize = 32;
const FALLBACK_MIME: &str = "application/octet-stream";

// ═══════════════════════════════════════════════════════════════════════════════
// UPLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// An incoming file plus what the transport knows about it
pub struct Upload<R> {
    pub owner_id: String,
    pub partner_id: Option<String>,
    pub original_name: String,
    /// Size claimed by the transport, checked before any byte is written
    pub declared_size: Option<u64>,
    pub declared_mime: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub reader: R,
}

impl<R: Read> Upload<R> {
    pub fn new(owner_id: &str, original_name: &str, reader: R) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            partner_id: None,
            original_name: original_name.to_string(),
            declared_size: None,
            declared_mime: None,
            description: None,
            tags: Vec::new(),
            reader,
        }
    }

    pub fn with_partner(mut self, partner_id: &str) -> Self {
        self.partner_id = Some(partner_id.to_string());
        self
    }

    pub fn with_declared(mut self, size: Option<u64>, mime: Option<&str>) -> Self {
        self.declared_size = size;
        self.declared_mime = mime.map(str::to_string);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROLLBACK
// ═══════════════════════════════════════════════════════════════════════════════

type Undo<'a> = Box<dyn FnOnce() -> VaultResult<()> + 'a>;

/// Compensation stack. Each side effect registers its undo; dropping the
/// guard without [`Rollback::commit`] runs them newest first.
pub struct Rollback<'a> {
    subject: String,
    actions: Vec<(&'static str, Undo<'a>)>,
}

impl<'a> Rollback<'a> {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            actions: Vec::new(),
        }
    }

    pub fn push<F>(&mut self, what: &'static str, undo: F)
    where
        F: FnOnce() -> VaultResult<()> + 'a,
    {
        self.actions.push((what, Box::new(undo)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keep every side effect
    pub fn commit(mut self) {
        self.actions.clear();
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some((what, undo)) = self.actions.pop() {
            warn!("rolling back {} for {}", what, self.subject);
            if let Err(e) = undo() {
                error!("rollback of {} for {} failed: {}", what, self.subject, e);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// One upload that did not make it into the vault
#[derive(Debug)]
pub struct IngestFailure {
    pub original_name: String,
    pub error: VaultError,
}

/// Outcome of [`IngestPipeline::ingest_many`]
#[derive(Debug, Default)]
pub struct BulkIngestReport {
    pub ingested: Vec<Photo>,
    pub failures: Vec<IngestFailure>,
}

pub struct IngestPipeline {
    store: Arc<ContentStore>,
    photos: Arc<dyn PhotoRepo>,
    generator: DerivativeGenerator,
    describer: Option<Arc<dyn Describer>>,
    config: VaultConfig,
}

impl IngestPipeline {
    pub fn new(store: Arc<ContentStore>, photos: Arc<dyn PhotoRepo>, config: &VaultConfig) -> Self {
        Self {
            store,
            photos,
            generator: DerivativeGenerator::new(config.thumbnail_size),
            describer: None,
            config: config.clone(),
        }
    }

    pub fn with_describer(mut self, describer: Arc<dyn Describer>) -> Self {
        self.describer = Some(describer);
        self
    }

    /// Store, derive and index one upload
    pub fn ingest<R: Read>(&self, upload: Upload<R>) -> VaultResult<Photo> {
        self.validate(&upload)?;

        let Upload {
            owner_id,
            partner_id,
            original_name,
            declared_mime,
            description,
            tags,
            reader,
            ..
        } = upload;

        let stored = self.store.put(reader)?;
        let id = stored.id.clone();

        let mut rollback = Rollback::new(&id);
        {
            let store = &self.store;
            let id = id.clone();
            rollback.push("original", move || store.delete(&id));
        }

        if stored.size == 0 {
            return Err(VaultError::Validation(format!("{original_name} is empty")));
        }

        let header = self.sniff_header(&id);
        let mime_type = resolve_mime(declared_mime.as_deref(), &header, &original_name);

        let mut derived = self.generator.derive(
            &id,
            &self.store.original_path(&id),
            &mime_type,
            self.describer.as_deref(),
        );

        let mut thumbnail_path = None;
        if let Some(bytes) = derived.thumbnail.take() {
            thumbnail_path = derived
                .report
                .attempt(DerivativeStep::Thumbnail, &id, || self.store.put_thumbnail(&id, &bytes));
            if thumbnail_path.is_some() {
                let store = &self.store;
                let id = id.clone();
                rollback.push("thumbnail", move || store.delete_thumbnail(&id));
            }
        }

        let now = Utc::now();
        let mut photo = Photo {
            id: id.clone(),
            user_id: owner_id,
            partner_id,
            original_name,
            file_path: stored.relative_path,
            thumbnail_path,
            file_size: stored.size,
            mime_type,
            hash: stored.hash,
            width: derived.width,
            height: derived.height,
            metadata: derived.metadata.take().unwrap_or_default(),
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            ai_description: None,
            tags: Vec::new(),
            ai_confidence: None,
            moderation_status: ModerationStatus::Pending,
            is_nsfw: None,
            nsfw_confidence: None,
            is_shared: false,
            share_count: 0,
            view_count: 0,
            created_at: now,
            updated_at: now,
            processed_at: derived.decoded().then_some(now),
        };
        merge_tags(&mut photo.tags, tags);
        if let Some(ai) = derived.description.take() {
            photo.ai_description = Some(ai.text);
            photo.ai_confidence = ai.confidence;
            merge_tags(&mut photo.tags, ai.tags);
        }

        if let Err(e) = self.photos.insert_photo(&photo) {
            error!("indexing {} failed, discarding its files: {}", id, e);
            drop(rollback);
            return Err(e);
        }
        rollback.commit();

        info!(
            "ingested {} ({} bytes, {}) for {}{}",
            photo.id,
            photo.file_size,
            photo.mime_type,
            photo.user_id,
            if derived.report.is_clean() { "" } else { ", with skipped derivatives" }
        );
        Ok(photo)
    }

    /// Ingest each upload independently. Fails only when nothing succeeded.
    pub fn ingest_many<R, I>(&self, uploads: I) -> VaultResult<BulkIngestReport>
    where
        R: Read,
        I: IntoIterator<Item = Upload<R>>,
    {
        let mut report = BulkIngestReport::default();

        for upload in uploads {
            let name = upload.original_name.clone();
            match self.ingest(upload) {
                Ok(photo) => report.ingested.push(photo),
                Err(error) => {
                    warn!("upload {} rejected: {}", name, error);
                    report.failures.push(IngestFailure {
                        original_name: name,
                        error,
                    });
                }
            }
        }

        if report.ingested.is_empty() {
            return Err(match report.failures.len() {
                0 => VaultError::Validation("no files uploaded".into()),
                _ => report.failures.remove(0).error,
            });
        }
        Ok(report)
    }

    /// Leading bytes for type sniffing; empty when they cannot be read
    fn sniff_header(&self, id: &str) -> Vec<u8> {
        match self.store.read_header(id, SNIFF_LEN) {
            Ok(header) => header,
            Err(e) => {
                warn!("type sniffing skipped for {}: {}", id, e);
                Vec::new()
            }
        }
    }

    fn validate<R>(&self, upload: &Upload<R>) -> VaultResult<()> {
        if upload.owner_id.trim().is_empty() {
            return Err(VaultError::Validation("owner id must not be empty".into()));
        }
        if upload.original_name.trim().is_empty() {
            return Err(VaultError::Validation("file name must not be empty".into()));
        }
        if !self.config.is_allowed_file(&upload.original_name) {
            return Err(VaultError::UnsupportedFileType(upload.original_name.clone()));
        }
        if let (Some(size), Some(max)) = (upload.declared_size, self.config.max_upload_bytes) {
            if size > max {
                return Err(VaultError::FileTooLarge { size, max });
            }
        }
        Ok(())
    }
}

/// Declared type, else magic bytes, else the extension, else opaque bytes
pub fn resolve_mime(declared: Option<&str>, header: &[u8], original_name: &str) -> String {
    declared
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| detect_mime(header))
        .or_else(|| mime_guess::from_path(original_name).first_raw())
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

/// Append trimmed, non-empty tags not already present
pub(crate) fn merge_tags(tags: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    for tag in extra {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
}
