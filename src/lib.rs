//! # Media Vault
//!
//! Multi-tenant photo storage with derived thumbnails, capture metadata and
//! owner-controlled sharing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      MEDIA VAULT                          │
//! │  ┌──────────────────────────────────────────────────────┐ │
//! │  │           MediaVault facade (ownership checks)        │ │
//! │  └──────┬──────────────────┬──────────────────┬─────────┘ │
//! │         │                  │                  │           │
//! │  ┌──────┴──────┐  ┌────────┴────────┐  ┌──────┴────────┐  │
//! │  │  INGESTION  │  │   PERMISSION    │  │   SHARING     │  │
//! │  │  PIPELINE   │  │   RESOLVER      │  │   LEDGER      │  │
//! │  └──┬───────┬──┘  └────────┬────────┘  └──────┬────────┘  │
//! │     │       │              │                  │           │
//! │  ┌──┴────┐ ┌┴───────────┐ ┌┴──────────────────┴────────┐  │
//! │  │CONTENT│ │ DERIVATIVE │ │   PHOTO INDEX (SQLite)     │  │
//! │  │ STORE │ │ GENERATOR  │ │   photos / photo_shares    │  │
//! │  └───────┘ └────────────┘ └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Originals are hashed (SHA-256) while they stream to disk
//! - An upload is either fully indexed or leaves no files behind
//! - Thumbnails, EXIF and AI descriptions are best-effort
//! - Owners hold every permission; everyone else needs an unexpired grant

pub mod access;
pub mod config;
pub mod derive;
pub mod error;
pub mod index;
pub mod ingest;
pub mod ledger;
pub mod model;
pub mod store;
pub mod vault;

pub use access::PermissionResolver;
pub use config::VaultConfig;
pub use derive::{AiDescription, Describer, DerivativeGenerator, DerivativeReport};
pub use error::{VaultError, VaultResult};
pub use index::{PhotoIndex, PhotoRepo, ShareRepo};
pub use ingest::{BulkIngestReport, IngestPipeline, Upload};
pub use ledger::{BatchShareReport, GrantRequest, SharingLedger};
pub use model::{CaptureMetadata, ModerationStatus, Permission, Photo, ShareGrant};
pub use store::ContentStore;
pub use vault::{IntegrityReport, MediaVault, PhotoPage};

/// Media Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
