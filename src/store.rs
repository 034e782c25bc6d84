//! Media Vault - Content Store
//!
//! Streams uploads to disk while hashing them, addressed by generated id.
//! Originals live under `originals/<id[..2]>/<id>`, thumbnails under
//! `thumbs/<id>.jpg`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{VaultError, VaultResult};

const CHUNK_SIZE: usize = 64 * 1024;

const ORIGINALS_DIR: &str = "originals";
const THUMBS_DIR: &str = "thumbs";

/// Result of a successful `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub id: String,
    /// Path relative to the store root
    pub relative_path: String,
    /// Lowercase hex SHA-256 of the stored bytes
    pub hash: String,
    pub size: u64,
}

/// Removes a temp file unless disarmed
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("could not remove partial upload {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Content Store - filesystem namespace for originals and thumbnails
pub struct ContentStore {
    /// Root directory
    root: PathBuf,
    /// Upload size limit
    max_bytes: Option<u64>,
}

impl ContentStore {
    /// Open (creating if needed) a store under `root`
    pub fn open(root: &Path) -> VaultResult<Self> {
        fs::create_dir_all(root.join(ORIGINALS_DIR))?;
        fs::create_dir_all(root.join(THUMBS_DIR))?;

        Ok(Self {
            root: root.to_path_buf(),
            max_bytes: None,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path of an original
    pub fn original_relative(id: &str) -> String {
        let shard = id.get(..2).unwrap_or("00");
        format!("{ORIGINALS_DIR}/{shard}/{id}")
    }

    /// Relative path of a thumbnail
    pub fn thumbnail_relative(id: &str) -> String {
        format!("{THUMBS_DIR}/{id}.jpg")
    }

    /// Absolute path for a relative one
    pub fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Absolute path of an original
    pub fn original_path(&self, id: &str) -> PathBuf {
        self.full_path(&Self::original_relative(id))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ORIGINALS
    // ═══════════════════════════════════════════════════════════════════════

    /// Stream `reader` into a new object, hashing in the same pass.
    ///
    /// All-or-nothing: on any error the partial file is gone before this
    /// returns.
    pub fn put<R: Read>(&self, mut reader: R) -> VaultResult<StoredObject> {
        let id = Uuid::new_v4().to_string();
        let relative_path = Self::original_relative(&id);
        let path = self.full_path(&relative_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(storage_write)?;
        }

        let temp_path = path.with_extension("tmp");
        let temp = TempFile::new(temp_path.clone());

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(storage_write)?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut size: u64 = 0;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VaultError::StorageWrite(format!("upload stream: {e}")));
                }
            };

            size += n as u64;
            if let Some(max) = self.max_bytes {
                if size > max {
                    return Err(VaultError::FileTooLarge { size, max });
                }
            }

            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).map_err(storage_write)?;
        }

        file.sync_all().map_err(storage_write)?;
        drop(file);

        fs::rename(&temp_path, &path).map_err(storage_write)?;
        temp.disarm();

        let hash = hex::encode(hasher.finalize());
        debug!("stored {} ({} bytes, sha256 {})", id, size, hash);

        Ok(StoredObject {
            id,
            relative_path,
            hash,
            size,
        })
    }

    /// Open an original for reading
    pub fn get(&self, id: &str) -> VaultResult<File> {
        File::open(self.original_path(id)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::NotFound {
                kind: "Object",
                id: id.to_string(),
            },
            _ => VaultError::Io(e),
        })
    }

    /// Remove an original; absent objects are not an error
    pub fn delete(&self, id: &str) -> VaultResult<()> {
        remove_if_exists(&self.original_path(id))
    }

    /// First bytes of an original, for content sniffing
    pub fn read_header(&self, id: &str, len: usize) -> VaultResult<Vec<u8>> {
        let mut header = Vec::with_capacity(len);
        self.get(id)?.take(len as u64).read_to_end(&mut header)?;
        Ok(header)
    }

    /// Re-hash a stored original and compare
    pub fn verify(&self, id: &str, expected_hash: &str) -> VaultResult<bool> {
        let actual = hash_reader(self.get(id)?)?;
        Ok(actual.eq_ignore_ascii_case(expected_hash))
    }

    /// Ids of every original on disk
    pub fn list_original_ids(&self) -> Vec<String> {
        WalkDir::new(self.root.join(ORIGINALS_DIR))
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.ends_with(".tmp"))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // THUMBNAILS
    // ═══════════════════════════════════════════════════════════════════════

    /// Write a thumbnail atomically, returning its relative path
    pub fn put_thumbnail(&self, id: &str, data: &[u8]) -> VaultResult<String> {
        let relative = Self::thumbnail_relative(id);
        let path = self.full_path(&relative);
        let temp_path = path.with_extension("tmp");
        let temp = TempFile::new(temp_path.clone());

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(storage_write)?;
        file.write_all(data).map_err(storage_write)?;
        file.sync_all().map_err(storage_write)?;
        drop(file);

        fs::rename(&temp_path, &path).map_err(storage_write)?;
        temp.disarm();

        Ok(relative)
    }

    pub fn read_thumbnail(&self, id: &str) -> VaultResult<Vec<u8>> {
        fs::read(self.full_path(&Self::thumbnail_relative(id))).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::NotFound {
                kind: "Thumbnail",
                id: id.to_string(),
            },
            _ => VaultError::Io(e),
        })
    }

    pub fn thumbnail_exists(&self, id: &str) -> bool {
        self.full_path(&Self::thumbnail_relative(id)).exists()
    }

    /// Remove a thumbnail; absent thumbnails are not an error
    pub fn delete_thumbnail(&self, id: &str) -> VaultResult<()> {
        remove_if_exists(&self.full_path(&Self::thumbnail_relative(id)))
    }
}

/// Lowercase hex SHA-256 of everything `reader` yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Detect MIME type from magic bytes
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    match &data[0..8] {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, ..] if data.len() >= 12 && &data[8..12] == b"WEBP" => {
            Some("image/webp")
        }
        _ if data.len() >= 12 && &data[4..8] == b"ftyp" => match &data[8..12] {
            b"heic" | b"heix" => Some("image/heic"),
            b"mif1" => Some("image/heif"),
            _ => None,
        },
        _ => None,
    }
}

fn storage_write(e: io::Error) -> VaultError {
    VaultError::StorageWrite(e.to_string())
}

fn remove_if_exists(path: &Path) -> VaultResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    /// Yields `good` bytes, then fails
    struct FailingReader {
        good: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.good == 0 {
                return Err(io::Error::new(ErrorKind::ConnectionReset, "client went away"));
            }
            let n = buf.len().min(self.good);
            buf[..n].fill(7);
            self.good -= n;
            Ok(n)
        }
    }

    fn files_under(root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    #[test]
    fn test_put_hashes_while_streaming() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let data = vec![42u8; CHUNK_SIZE * 3 + 17];
        let stored = store.put(Cursor::new(data.clone())).unwrap();

        assert_eq!(stored.size, data.len() as u64);
        assert_eq!(stored.hash, hex::encode(Sha256::digest(&data)));
        assert_eq!(std::fs::read(store.original_path(&stored.id)).unwrap(), data);
        assert!(store.verify(&stored.id, &stored.hash).unwrap());
        assert_eq!(store.list_original_ids(), vec![stored.id.clone()]);
    }

    #[test]
    fn test_put_failure_leaves_nothing() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let err = store.put(FailingReader { good: CHUNK_SIZE + 5 }).unwrap_err();
        assert!(matches!(err, VaultError::StorageWrite(_)));
        assert!(files_under(dir.path()).is_empty());
    }

    #[test]
    fn test_put_respects_limit() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap().with_max_bytes(Some(100));

        let err = store.put(Cursor::new(vec![0u8; 101])).unwrap_err();
        assert!(matches!(err, VaultError::FileTooLarge { max: 100, .. }));
        assert!(files_under(dir.path()).is_empty());

        assert!(store.put(Cursor::new(vec![0u8; 100])).is_ok());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let stored = store.put(Cursor::new(b"abc".to_vec())).unwrap();
        store.delete(&stored.id).unwrap();
        store.delete(&stored.id).unwrap();
        store.delete("never-existed").unwrap();

        assert!(matches!(store.get(&stored.id), Err(VaultError::NotFound { .. })));
    }

    #[test]
    fn test_thumbnail_lifecycle() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let rel = store.put_thumbnail("abc", b"thumb").unwrap();
        assert_eq!(rel, "thumbs/abc.jpg");
        assert_eq!(store.read_thumbnail("abc").unwrap(), b"thumb");

        store.delete_thumbnail("abc").unwrap();
        store.delete_thumbnail("abc").unwrap();
        assert!(!store.thumbnail_exists("abc"));
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]), Some("image/jpeg"));
        assert_eq!(detect_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(detect_mime(b"RIFF\0\0\0\0WAVEfmt "), None);
        assert_eq!(detect_mime(b"\0\0\0\x18ftypheic"), Some("image/heic"));
        assert_eq!(detect_mime(b"short"), None);
    }
}
