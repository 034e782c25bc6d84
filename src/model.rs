//! Media Vault - Data Model
//!
//! Photo records and share grants, plus their SQL enum encodings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Moderation state of a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ModerationStatus::Pending),
            "approved" => Ok(ModerationStatus::Approved),
            "rejected" => Ok(ModerationStatus::Rejected),
            other => Err(VaultError::Validation(format!("unknown moderation status '{other}'"))),
        }
    }
}

/// Share permission level. Levels are not hierarchical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    View,
    Download,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Download => "download",
        }
    }
}

impl FromStr for Permission {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Permission::View),
            "download" => Ok(Permission::Download),
            other => Err(VaultError::Validation(format!("unknown permission '{other}'"))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: VaultError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

sql_text_enum!(Permission);
sql_text_enum!(ModerationStatus);

/// Camera and capture metadata read from EXIF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    /// "lat,lon" in decimal degrees
    pub location: Option<String>,
    /// Primary IFD dump, JSON object of tag -> display value
    pub exif_json: Option<String>,
}

/// A stored image and everything derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub partner_id: Option<String>,
    pub original_name: String,

    // storage
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub file_size: u64,
    pub mime_type: String,
    pub hash: String,

    // optics
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub metadata: CaptureMetadata,

    // annotation
    pub description: Option<String>,
    pub ai_description: Option<String>,
    pub tags: Vec<String>,
    pub ai_confidence: Option<f64>,

    // moderation
    pub moderation_status: ModerationStatus,
    pub is_nsfw: Option<bool>,
    pub nsfw_confidence: Option<f64>,

    // sharing counters
    pub is_shared: bool,
    pub share_count: u32,
    pub view_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Photo {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_path.is_some()
    }
}

/// Permission for one user on one photo, optionally time-bounded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: String,
    pub photo_id: String,
    pub granted_by: String,
    pub granted_to: String,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareGrant {
    /// Expired grants stay on record but grant nothing
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_enum_round_trip_strings() {
        assert_eq!("view".parse::<Permission>().unwrap(), Permission::View);
        assert_eq!("download".parse::<Permission>().unwrap(), Permission::Download);
        assert!("admin".parse::<Permission>().is_err());
        assert_eq!(Permission::default(), Permission::View);

        assert_eq!(ModerationStatus::default().as_str(), "pending");
        assert_eq!(
            "rejected".parse::<ModerationStatus>().unwrap(),
            ModerationStatus::Rejected
        );
    }

    #[test]
    fn test_grant_activity() {
        let now = Utc::now();
        let mut grant = ShareGrant {
            id: "g".into(),
            photo_id: "p".into(),
            granted_by: "a".into(),
            granted_to: "b".into(),
            permission: Permission::View,
            created_at: now,
            expires_at: None,
        };
        assert!(grant.is_active_at(now + Duration::days(3650)));

        grant.expires_at = Some(now);
        assert!(!grant.is_active_at(now));
        assert!(grant.is_active_at(now - Duration::seconds(1)));
    }
}
