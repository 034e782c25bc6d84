//! Media Vault - Photo Index (SQLite)
//!
//! The relational store behind the vault: one row per photo in `photos`,
//! one row per grant in `photo_shares`. Counter updates happen in SQL, never
//! as read-modify-write in Rust.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::VaultResult;
use crate::model::{CaptureMetadata, ModerationStatus, Permission, Photo, ShareGrant};

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE CONTRACTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Photo persistence used by ingestion and permission checks
pub trait PhotoRepo: Send + Sync {
    fn insert_photo(&self, photo: &Photo) -> VaultResult<()>;
    fn get_photo(&self, id: &str) -> VaultResult<Option<Photo>>;
    fn owner_of(&self, id: &str) -> VaultResult<Option<String>>;
    /// Deletes the row and, by cascade, its grants
    fn delete_photo(&self, id: &str) -> VaultResult<bool>;
}

/// Grant persistence used by the sharing ledger and the resolver
pub trait ShareRepo: Send + Sync {
    /// Insert, or supersede the grant with the same (photo, grantee, permission)
    fn upsert_grant(&self, grant: &ShareGrant) -> VaultResult<ShareGrant>;
    fn delete_grant(&self, id: &str) -> VaultResult<Option<ShareGrant>>;
    fn get_grant(&self, id: &str) -> VaultResult<Option<ShareGrant>>;
    fn grants_for_photo(&self, photo_id: &str) -> VaultResult<Vec<ShareGrant>>;
    fn grants_to_user(&self, user_id: &str) -> VaultResult<Vec<ShareGrant>>;
    fn grants_matching(
        &self,
        photo_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> VaultResult<Vec<ShareGrant>>;
    /// Remove grants expired at `now`, returning how many went
    fn purge_expired(&self, now: DateTime<Utc>) -> VaultResult<usize>;
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS photos (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        partner_id TEXT,
        original_name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        thumbnail_path TEXT,
        file_size INTEGER NOT NULL,
        mime_type TEXT NOT NULL,
        width INTEGER,
        height INTEGER,
        hash TEXT NOT NULL,
        description TEXT,
        ai_description TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        ai_confidence REAL,
        is_nsfw INTEGER,
        nsfw_confidence REAL,
        moderation_status TEXT NOT NULL DEFAULT 'pending',
        exif_data TEXT,
        location TEXT,
        camera_make TEXT,
        camera_model TEXT,
        taken_at TEXT,
        is_shared INTEGER NOT NULL DEFAULT 0,
        share_count INTEGER NOT NULL DEFAULT 0,
        view_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        processed_at TEXT
    );

    CREATE TABLE IF NOT EXISTS photo_shares (
        id TEXT PRIMARY KEY,
        photo_id TEXT NOT NULL,
        shared_by TEXT NOT NULL,
        shared_with TEXT NOT NULL,
        permission TEXT NOT NULL DEFAULT 'view',
        created_at TEXT NOT NULL,
        expires_at TEXT,
        UNIQUE (photo_id, shared_with, permission),
        FOREIGN KEY (photo_id) REFERENCES photos (id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_photos_user_id ON photos (user_id);
    CREATE INDEX IF NOT EXISTS idx_photos_partner_id ON photos (partner_id);
    CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos (created_at);
    CREATE INDEX IF NOT EXISTS idx_photos_hash ON photos (user_id, hash);
    CREATE INDEX IF NOT EXISTS idx_photo_shares_photo_id ON photo_shares (photo_id);
    CREATE INDEX IF NOT EXISTS idx_photo_shares_shared_with ON photo_shares (shared_with);
"#;

const PHOTO_COLUMNS: &str = "id, user_id, partner_id, original_name, file_path, thumbnail_path, \
     file_size, mime_type, width, height, hash, description, ai_description, tags, ai_confidence, \
     is_nsfw, nsfw_confidence, moderation_status, exif_data, location, camera_make, camera_model, \
     taken_at, is_shared, share_count, view_count, created_at, updated_at, processed_at";

const GRANT_COLUMNS: &str =
    "id, photo_id, shared_by, shared_with, permission, created_at, expires_at";

/// Tag list stored as a JSON array
struct Tags(Vec<String>);

impl ToSql for Tags {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let json = serde_json::to_string(&self.0)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(json))
    }
}

impl FromSql for Tags {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        serde_json::from_str(value.as_str()?)
            .map(Tags)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SQLITE INDEX
// ═══════════════════════════════════════════════════════════════════════════════

/// Photo Index - SQLite-backed store for photos and grants
pub struct PhotoIndex {
    /// Database connection
    conn: Mutex<Connection>,
}

impl PhotoIndex {
    /// Open (creating if needed) the index at `db_path`
    pub fn open(db_path: &Path) -> VaultResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(db_path)?)
    }

    /// Throwaway index, for tests and dry runs
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> VaultResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LISTING
    // ═══════════════════════════════════════════════════════════════════════

    /// Photos owned by `user_id`, newest first
    pub fn list_by_user(&self, user_id: &str, limit: u32, offset: u32) -> VaultResult<Vec<Photo>> {
        self.query_photos(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM photos WHERE user_id = ?1 \
                 ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
            ),
            params![user_id, limit, offset],
        )
    }

    pub fn count_by_user(&self, user_id: &str) -> VaultResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Photos attributed to a partner account, newest first
    pub fn list_by_partner(
        &self,
        partner_id: &str,
        limit: u32,
        offset: u32,
    ) -> VaultResult<Vec<Photo>> {
        self.query_photos(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM photos WHERE partner_id = ?1 \
                 ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
            ),
            params![partner_id, limit, offset],
        )
    }

    pub fn list_all(&self) -> VaultResult<Vec<Photo>> {
        self.query_photos(
            &format!("SELECT {PHOTO_COLUMNS} FROM photos ORDER BY created_at DESC, id"),
            params![],
        )
    }

    /// A user's photos with the given content hash
    pub fn find_by_hash(&self, user_id: &str, hash: &str) -> VaultResult<Vec<Photo>> {
        self.query_photos(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM photos WHERE user_id = ?1 AND hash = ?2 \
                 ORDER BY created_at, id"
            ),
            params![user_id, hash],
        )
    }

    /// Hashes that occur more than once among a user's photos
    pub fn duplicate_hashes(&self, user_id: &str) -> VaultResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT hash FROM photos WHERE user_id = ?1 \
             GROUP BY hash HAVING COUNT(*) > 1 ORDER BY hash",
        )?;
        let hashes = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(hashes)
    }

    fn query_photos(&self, sql: &str, params: &[&dyn ToSql]) -> VaultResult<Vec<Photo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let photos = stmt
            .query_map(params, photo_from_row)?
            .collect::<rusqlite::Result<Vec<Photo>>>()?;
        Ok(photos)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UPDATES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn update_description(&self, id: &str, description: Option<&str>) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE photos SET description = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, description, Utc::now()],
        )?;
        Ok(changed > 0)
    }

    pub fn set_tags(&self, id: &str, tags: &[String]) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE photos SET tags = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, Tags(tags.to_vec()), Utc::now()],
        )?;
        Ok(changed > 0)
    }

    pub fn set_ai_description(
        &self,
        id: &str,
        text: &str,
        confidence: Option<f64>,
    ) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE photos SET ai_description = ?2, ai_confidence = ?3, updated_at = ?4 \
             WHERE id = ?1",
            params![id, text, confidence, Utc::now()],
        )?;
        Ok(changed > 0)
    }

    /// Record a moderation decision; `nsfw` is (flag, confidence) from a
    /// moderation pass, if one ran
    pub fn set_moderation(
        &self,
        id: &str,
        status: ModerationStatus,
        nsfw: Option<(bool, f64)>,
    ) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE photos SET moderation_status = ?2, \
                 is_nsfw = COALESCE(?3, is_nsfw), \
                 nsfw_confidence = COALESCE(?4, nsfw_confidence), \
                 updated_at = ?5 \
             WHERE id = ?1",
            params![id, status, nsfw.map(|n| n.0), nsfw.map(|n| n.1), Utc::now()],
        )?;
        Ok(changed > 0)
    }

    /// Atomic `view_count + 1`
    pub fn increment_view_count(&self, id: &str) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE photos SET view_count = view_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(changed > 0)
    }
}

impl PhotoRepo for PhotoIndex {
    fn insert_photo(&self, photo: &Photo) -> VaultResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO photos ({PHOTO_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                  ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)"
            ),
            params![
                photo.id,
                photo.user_id,
                photo.partner_id,
                photo.original_name,
                photo.file_path,
                photo.thumbnail_path,
                photo.file_size as i64,
                photo.mime_type,
                photo.width,
                photo.height,
                photo.hash,
                photo.description,
                photo.ai_description,
                Tags(photo.tags.clone()),
                photo.ai_confidence,
                photo.is_nsfw,
                photo.nsfw_confidence,
                photo.moderation_status,
                photo.metadata.exif_json,
                photo.metadata.location,
                photo.metadata.camera_make,
                photo.metadata.camera_model,
                photo.metadata.taken_at,
                photo.is_shared,
                photo.share_count,
                photo.view_count,
                photo.created_at,
                photo.updated_at,
                photo.processed_at,
            ],
        )?;
        debug!("indexed photo {}", photo.id);
        Ok(())
    }

    fn get_photo(&self, id: &str) -> VaultResult<Option<Photo>> {
        let conn = self.conn.lock();
        let photo = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![id],
                photo_from_row,
            )
            .optional()?;
        Ok(photo)
    }

    fn owner_of(&self, id: &str) -> VaultResult<Option<String>> {
        let conn = self.conn.lock();
        let owner = conn
            .query_row(
                "SELECT user_id FROM photos WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn delete_photo(&self, id: &str) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM photos WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

impl ShareRepo for PhotoIndex {
    fn upsert_grant(&self, grant: &ShareGrant) -> VaultResult<ShareGrant> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM photo_shares \
                 WHERE photo_id = ?1 AND shared_with = ?2 AND permission = ?3",
                params![grant.photo_id, grant.granted_to, grant.permission],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE photo_shares SET shared_by = ?2, created_at = ?3, expires_at = ?4 \
                     WHERE id = ?1",
                    params![id, grant.granted_by, grant.created_at, grant.expires_at],
                )?;
                id
            }
            None => {
                tx.execute(
                    &format!("INSERT INTO photo_shares ({GRANT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                    params![
                        grant.id,
                        grant.photo_id,
                        grant.granted_by,
                        grant.granted_to,
                        grant.permission,
                        grant.created_at,
                        grant.expires_at,
                    ],
                )?;
                grant.id.clone()
            }
        };

        refresh_share_counters(&tx, &grant.photo_id)?;
        tx.commit()?;

        Ok(ShareGrant {
            id,
            ..grant.clone()
        })
    }

    fn delete_grant(&self, id: &str) -> VaultResult<Option<ShareGrant>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let grant = tx
            .query_row(
                &format!("SELECT {GRANT_COLUMNS} FROM photo_shares WHERE id = ?1"),
                params![id],
                grant_from_row,
            )
            .optional()?;

        if let Some(ref grant) = grant {
            tx.execute("DELETE FROM photo_shares WHERE id = ?1", params![id])?;
            refresh_share_counters(&tx, &grant.photo_id)?;
        }

        tx.commit()?;
        Ok(grant)
    }

    fn get_grant(&self, id: &str) -> VaultResult<Option<ShareGrant>> {
        let conn = self.conn.lock();
        let grant = conn
            .query_row(
                &format!("SELECT {GRANT_COLUMNS} FROM photo_shares WHERE id = ?1"),
                params![id],
                grant_from_row,
            )
            .optional()?;
        Ok(grant)
    }

    fn grants_for_photo(&self, photo_id: &str) -> VaultResult<Vec<ShareGrant>> {
        self.query_grants(
            &format!(
                "SELECT {GRANT_COLUMNS} FROM photo_shares WHERE photo_id = ?1 \
                 ORDER BY created_at, id"
            ),
            params![photo_id],
        )
    }

    fn grants_to_user(&self, user_id: &str) -> VaultResult<Vec<ShareGrant>> {
        self.query_grants(
            &format!(
                "SELECT {GRANT_COLUMNS} FROM photo_shares WHERE shared_with = ?1 \
                 ORDER BY created_at DESC, id"
            ),
            params![user_id],
        )
    }

    fn grants_matching(
        &self,
        photo_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> VaultResult<Vec<ShareGrant>> {
        self.query_grants(
            &format!(
                "SELECT {GRANT_COLUMNS} FROM photo_shares \
                 WHERE photo_id = ?1 AND shared_with = ?2 AND permission = ?3"
            ),
            params![photo_id, user_id, permission],
        )
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> VaultResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let expired: Vec<ShareGrant> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {GRANT_COLUMNS} FROM photo_shares WHERE expires_at IS NOT NULL"
            ))?;
            let rows = stmt
                .query_map([], grant_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().filter(|g| !g.is_active_at(now)).collect()
        };

        for grant in &expired {
            tx.execute("DELETE FROM photo_shares WHERE id = ?1", params![grant.id])?;
        }

        let mut photo_ids: Vec<&str> = expired.iter().map(|g| g.photo_id.as_str()).collect();
        photo_ids.sort_unstable();
        photo_ids.dedup();
        for photo_id in photo_ids {
            refresh_share_counters(&tx, photo_id)?;
        }

        tx.commit()?;
        Ok(expired.len())
    }
}

impl PhotoIndex {
    fn query_grants(&self, sql: &str, params: &[&dyn ToSql]) -> VaultResult<Vec<ShareGrant>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let grants = stmt
            .query_map(params, grant_from_row)?
            .collect::<rusqlite::Result<Vec<ShareGrant>>>()?;
        Ok(grants)
    }
}

/// Recompute `share_count` / `is_shared` from the grant rows in one statement
fn refresh_share_counters(conn: &Connection, photo_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE photos SET \
             share_count = (SELECT COUNT(*) FROM photo_shares WHERE photo_id = ?1), \
             is_shared = EXISTS (SELECT 1 FROM photo_shares WHERE photo_id = ?1), \
             updated_at = ?2 \
         WHERE id = ?1",
        params![photo_id, Utc::now()],
    )?;
    Ok(())
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let tags: Tags = row.get("tags")?;
    let file_size: i64 = row.get("file_size")?;

    Ok(Photo {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        partner_id: row.get("partner_id")?,
        original_name: row.get("original_name")?,
        file_path: row.get("file_path")?,
        thumbnail_path: row.get("thumbnail_path")?,
        file_size: file_size.max(0) as u64,
        mime_type: row.get("mime_type")?,
        hash: row.get("hash")?,
        width: row.get("width")?,
        height: row.get("height")?,
        metadata: CaptureMetadata {
            camera_make: row.get("camera_make")?,
            camera_model: row.get("camera_model")?,
            taken_at: row.get("taken_at")?,
            location: row.get("location")?,
            exif_json: row.get("exif_data")?,
        },
        description: row.get("description")?,
        ai_description: row.get("ai_description")?,
        tags: tags.0,
        ai_confidence: row.get("ai_confidence")?,
        moderation_status: row.get("moderation_status")?,
        is_nsfw: row.get("is_nsfw")?,
        nsfw_confidence: row.get("nsfw_confidence")?,
        is_shared: row.get("is_shared")?,
        share_count: row.get("share_count")?,
        view_count: row.get("view_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        processed_at: row.get("processed_at")?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<ShareGrant> {
    Ok(ShareGrant {
        id: row.get("id")?,
        photo_id: row.get("photo_id")?,
        granted_by: row.get("shared_by")?,
        granted_to: row.get("shared_with")?,
        permission: row.get("permission")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}
