//! Media Vault - CLI
//!
//! Operator command line. Stands in for the upload transport and the
//! authenticated caller: the acting user comes from `--user`.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use log::{debug, info};
use walkdir::WalkDir;

use media_vault::{MediaVault, ModerationStatus, Permission, Photo, Upload, VaultConfig};

#[derive(Parser)]
#[command(name = "media-vault")]
#[command(version = media_vault::VERSION)]
#[command(about = "Media Vault - photo storage with sharing and expiring grants")]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage root (overrides config and MEDIA_VAULT_ROOT)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Acting user id
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage layout and database
    Init,

    /// Upload files or whole directories
    Upload {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Partner account the upload is attributed to
        #[arg(long)]
        partner: Option<String>,

        /// Description applied to every file
        #[arg(short, long)]
        description: Option<String>,

        /// Tag, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// List your photos, or a partner's
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// List a partner account's uploads instead
        #[arg(long)]
        partner: Option<String>,
    },

    /// Show one photo (counts as a view)
    Show { id: String },

    /// Copy the original out of the vault
    Export { id: String, output: PathBuf },

    /// Write the thumbnail to a file
    Thumbnail { id: String, output: PathBuf },

    /// Set or clear the description
    Describe {
        id: String,
        /// New text; omit to clear
        text: Option<String>,
    },

    /// Replace the tag list
    Tag {
        id: String,
        tags: Vec<String>,
    },

    /// Record a moderation decision
    Moderate {
        id: String,
        status: ModerationStatus,

        /// NSFW confidence from a moderation pass; >= 0.5 flags the photo
        #[arg(long)]
        nsfw: Option<f64>,
    },

    /// Delete a photo with its files and shares
    Delete { id: String },

    /// Share photos with other users
    Share {
        /// Photo ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Grantee, repeatable
        #[arg(short, long = "with", required = true)]
        with: Vec<String>,

        #[arg(short, long, default_value = "view")]
        permission: Permission,

        /// Lifetime of the grant in hours
        #[arg(long)]
        expires_in: Option<i64>,
    },

    /// Revoke a share
    Revoke { grant_id: String },

    /// List shares of one of your photos
    Shares { id: String },

    /// Photos shared with you
    Inbox,

    /// Drop expired shares
    PurgeExpired,

    /// Re-hash originals and cross-check the index
    Verify,

    /// Group your photos by identical content
    Duplicates,

    /// Print the effective configuration
    Config,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = VaultConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(root) = cli.root.clone() {
        config.root = root;
    }
    debug!("effective config: {:?}", config);

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let vault = MediaVault::open(config.clone())
        .with_context(|| format!("opening vault at {}", config.root.display()))?;

    match cli.command {
        Commands::Init => {
            println!("✅ Vault ready at: {}", config.root.display());
            println!("📁 Structure:");
            println!("   /originals/  - Original uploads");
            println!("   /thumbs/     - JPEG thumbnails");
            println!("   {}", config.database_path().display());
        }

        Commands::Upload {
            paths,
            partner,
            description,
            tags,
        } => {
            let user = acting_user(&cli.user)?;
            let files = collect_files(&paths, &config)?;
            if files.is_empty() {
                bail!("no uploadable files found");
            }
            println!("📥 Uploading {} file(s)...", files.len());

            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
                let size = file.metadata().map(|m| m.len()).ok();
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");

                let mut upload = Upload::new(user, name, file)
                    .with_declared(size, None)
                    .with_tags(tags.iter().cloned());
                if let Some(ref partner) = partner {
                    upload = upload.with_partner(partner);
                }
                if let Some(ref description) = description {
                    upload = upload.with_description(description);
                }
                uploads.push(upload);
            }

            let report = vault.upload_many(uploads)?;
            for photo in &report.ingested {
                let dims = match (photo.width, photo.height) {
                    (Some(w), Some(h)) => format!("{w}x{h}"),
                    _ => "undecoded".to_string(),
                };
                println!("✅ {} - {} ({}, {})", photo.id, photo.original_name, dims, photo.hash);
            }
            for failure in &report.failures {
                println!("❌ {} - {}", failure.original_name, failure.error);
            }
        }

        Commands::List {
            page,
            limit,
            partner,
        } => {
            let photos = match partner {
                Some(partner) => vault.list_partner_photos(&partner, page, limit)?,
                None => {
                    let user = acting_user(&cli.user)?;
                    let listing = vault.list_photos(user, page, limit)?;
                    println!(
                        "📷 Photos of {} (page {}, {} total):",
                        user, listing.page, listing.total
                    );
                    listing.photos
                }
            };
            print_photos(&photos);
        }

        Commands::Show { id } => {
            let photo = vault.get_photo(acting_user(&cli.user)?, &id)?;
            println!("{}", serde_json::to_string_pretty(&photo)?);
        }

        Commands::Export { id, output } => {
            let (photo, mut original) = vault.open_original(acting_user(&cli.user)?, &id)?;
            let mut out = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let copied = std::io::copy(&mut original, &mut out)?;
            println!("✅ Exported {} ({} bytes) to: {}", photo.original_name, copied, output.display());
        }

        Commands::Thumbnail { id, output } => {
            let bytes = vault.read_thumbnail(acting_user(&cli.user)?, &id)?;
            std::fs::write(&output, &bytes)?;
            println!("✅ Thumbnail written to: {}", output.display());
        }

        Commands::Describe { id, text } => {
            let photo = vault.update_description(acting_user(&cli.user)?, &id, text.as_deref())?;
            println!("✅ Description: {}", photo.description.as_deref().unwrap_or("(none)"));
        }

        Commands::Tag { id, tags } => {
            let photo = vault.set_tags(acting_user(&cli.user)?, &id, &tags)?;
            println!("✅ Tags: {}", photo.tags.join(", "));
        }

        Commands::Moderate { id, status, nsfw } => {
            let nsfw = nsfw.map(|confidence| (confidence >= 0.5, confidence));
            let photo = vault.set_moderation(&id, status, nsfw)?;
            println!("✅ {} is now {}", photo.id, photo.moderation_status);
        }

        Commands::Delete { id } => {
            vault.delete_photo(acting_user(&cli.user)?, &id)?;
            println!("🗑️ Photo deleted!");
        }

        Commands::Share {
            ids,
            with,
            permission,
            expires_in,
        } => {
            let user = acting_user(&cli.user)?;
            let expires_at = expires_in
                .map(|hours| expiry_after_hours(Utc::now(), hours))
                .transpose()?;

            if let ([id], [to]) = (ids.as_slice(), with.as_slice()) {
                let grant = vault.share(user, id, to, permission, expires_at)?;
                println!("🔗 Share {} created", grant.id);
            } else {
                let report = vault.share_many(user, &ids, &with, permission, expires_at)?;
                println!("🔗 {} share(s) created", report.granted.len());
                for failure in &report.failures {
                    println!("❌ {} -> {}: {}", failure.photo_id, failure.granted_to, failure.error);
                }
            }
        }

        Commands::Revoke { grant_id } => {
            let grant = vault.revoke_share(acting_user(&cli.user)?, &grant_id)?;
            println!("✅ Revoked {} access of {}", grant.permission, grant.granted_to);
        }

        Commands::Shares { id } => {
            let grants = vault.shares_for_photo(acting_user(&cli.user)?, &id)?;
            if grants.is_empty() {
                println!("📭 Not shared");
            }
            let now = Utc::now();
            for grant in grants {
                let expiry = match grant.expires_at {
                    Some(at) if !grant.is_active_at(now) => format!("expired {}", at.to_rfc3339()),
                    Some(at) => format!("until {}", at.to_rfc3339()),
                    None => "no expiry".to_string(),
                };
                println!("{} {} {} ({})", grant.id, grant.granted_to, grant.permission, expiry);
            }
        }

        Commands::Inbox => {
            let photos = vault.shared_with_me(acting_user(&cli.user)?)?;
            print_photos(&photos);
        }

        Commands::PurgeExpired => {
            let purged = vault.purge_expired_shares()?;
            println!("🧹 Purged {} expired share(s)", purged);
        }

        Commands::Verify => {
            let report = vault.verify_integrity()?;
            println!("🔍 Checked {} photo(s)", report.checked);
            if report.is_healthy() {
                println!("💚 Vault is healthy!");
            } else {
                for id in &report.mismatched {
                    println!("   - hash mismatch: {}", id);
                }
                for id in &report.missing {
                    println!("   - missing original: {}", id);
                }
                for id in &report.missing_thumbnails {
                    println!("   - missing thumbnail: {}", id);
                }
                for id in &report.orphans {
                    println!("   - unindexed file: {}", id);
                }
                bail!("integrity check found problems");
            }
        }

        Commands::Duplicates => {
            let groups = vault.find_duplicates(acting_user(&cli.user)?)?;
            if groups.is_empty() {
                println!("✨ No duplicates");
            }
            for group in groups {
                println!("{} ({} copies)", group.hash, group.photos.len());
                for photo in group.photos {
                    println!("   {} - {}", photo.id, photo.original_name);
                }
            }
        }

        // printed before the vault is opened
        Commands::Config => {}
    }

    Ok(())
}

fn acting_user(user: &Option<String>) -> Result<&str> {
    match user.as_deref() {
        Some(user) if !user.trim().is_empty() => Ok(user),
        _ => bail!("this command needs --user"),
    }
}

/// Expand directories into the allowed files beneath them
fn collect_files(paths: &[PathBuf], config: &VaultConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file() && is_allowed(entry.path(), config) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    info!("{} file(s) selected for upload", files.len());
    Ok(files)
}

fn is_allowed(path: &Path, config: &VaultConfig) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| config.is_allowed_file(n))
        .unwrap_or(false)
}

fn print_photos(photos: &[Photo]) {
    if photos.is_empty() {
        println!("📭 No photos");
        return;
    }
    println!("{:-<60}", "");
    for photo in photos {
        let shared = if photo.is_shared { "🔗" } else { "  " };
        println!(
            "{} {} - {} ({} bytes, {} views)",
            shared, photo.id, photo.original_name, photo.file_size, photo.view_count
        );
    }
}

/// `now` plus `hours`, refusing lifetimes chrono cannot represent
fn expiry_after_hours(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>> {
    match Duration::try_hours(hours).and_then(|lifetime| now.checked_add_signed(lifetime)) {
        Some(expires_at) => Ok(expires_at),
        None => bail!("--expires-in {hours} is out of range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_after_hours() {
        let now = Utc::now();
        assert_eq!(expiry_after_hours(now, 24).unwrap(), now + Duration::days(1));
        assert!(expiry_after_hours(now, i64::MAX).is_err());
        assert!(expiry_after_hours(now, 2_000_000_000_000).is_err());
    }
}
