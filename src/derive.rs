//! Media Vault - Derivative Generator
//!
//! Decoding, thumbnails, EXIF capture metadata and optional AI descriptions.
//! Every step here is best-effort: failures are logged, recorded in a
//! [`DerivativeReport`] and never abort ingestion.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use exif::{In, Reader as ExifReader, Tag, Value};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use log::warn;

use crate::error::{VaultError, VaultResult};
use crate::model::CaptureMetadata;

// ═══════════════════════════════════════════════════════════════════════════════
// BEST-EFFORT COMBINATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Optional processing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeStep {
    Decode,
    Thumbnail,
    Metadata,
    Describe,
}

impl fmt::Display for DerivativeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivativeStep::Decode => "decode",
            DerivativeStep::Thumbnail => "thumbnail",
            DerivativeStep::Metadata => "metadata",
            DerivativeStep::Describe => "describe",
        };
        f.write_str(name)
    }
}

/// One swallowed failure
#[derive(Debug, Clone)]
pub struct DerivativeFailure {
    pub step: DerivativeStep,
    pub reason: String,
}

/// Outcome log of the best-effort steps for one photo
#[derive(Debug, Default)]
pub struct DerivativeReport {
    pub failures: Vec<DerivativeFailure>,
}

impl DerivativeReport {
    /// Run `f`; on error log it, record it and carry on with `None`
    pub fn attempt<T, F>(&mut self, step: DerivativeStep, subject: &str, f: F) -> Option<T>
    where
        F: FnOnce() -> VaultResult<T>,
    {
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{} skipped for {}: {}", step, subject, e);
                self.failures.push(DerivativeFailure {
                    step,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    pub fn failed(&self, step: DerivativeStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AI DESCRIPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Generated caption for a photo
#[derive(Debug, Clone, PartialEq)]
pub struct AiDescription {
    pub text: String,
    pub confidence: Option<f64>,
    pub tags: Vec<String>,
}

/// Image captioning backend
pub trait Describer: Send + Sync {
    fn describe(&self, image: &DynamicImage, mime_type: &str) -> VaultResult<AiDescription>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything derived from one original
#[derive(Debug, Default)]
pub struct Derivatives {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Encoded JPEG, not yet stored
    pub thumbnail: Option<Vec<u8>>,
    pub metadata: Option<CaptureMetadata>,
    pub description: Option<AiDescription>,
    pub report: DerivativeReport,
}

impl Derivatives {
    pub fn decoded(&self) -> bool {
        self.width.is_some()
    }
}

/// Derivative Generator
pub struct DerivativeGenerator {
    /// Thumbnail bounding box
    thumb_size: (u32, u32),
}

impl DerivativeGenerator {
    /// Create a generator producing thumbnails within `size`x`size`
    pub fn new(size: u32) -> Self {
        Self {
            thumb_size: (size, size),
        }
    }

    /// Decode an image file, sniffing the format from content
    pub fn decode(&self, path: &Path) -> VaultResult<DynamicImage> {
        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| VaultError::Derivative(format!("open {}: {e}", path.display())))?;

        Ok(reader.decode()?)
    }

    /// Encode a JPEG thumbnail fitting within `target` (aspect preserved)
    pub fn thumbnail(&self, img: &DynamicImage, target: (u32, u32)) -> VaultResult<Vec<u8>> {
        let (max_w, max_h) = target;
        if max_w == 0 || max_h == 0 {
            return Err(VaultError::Derivative("zero thumbnail size".into()));
        }

        let (width, height) = img.dimensions();
        let thumb = if width <= max_w && height <= max_h {
            img.clone()
        } else {
            img.thumbnail(max_w, max_h)
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(thumb.to_rgb8());

        let mut output = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut output), ImageFormat::Jpeg)?;
        Ok(output)
    }

    /// Read camera, capture time and GPS location from EXIF
    pub fn extract_metadata(&self, path: &Path) -> VaultResult<CaptureMetadata> {
        let file = File::open(path)?;
        let exif = ExifReader::new()
            .read_from_container(&mut BufReader::new(file))
            .map_err(|e| VaultError::Derivative(format!("exif: {e}")))?;

        let text = |tag| {
            exif.get_field(tag, In::PRIMARY)
                .and_then(|f| ascii_value(&f.value))
        };

        let taken_at = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
            .into_iter()
            .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
            .find_map(|field| exif_datetime(&field.value));

        let coord = |value_tag, ref_tag| {
            let field = exif.get_field(value_tag, In::PRIMARY)?;
            let reference = exif.get_field(ref_tag, In::PRIMARY).and_then(|f| ascii_value(&f.value));
            gps_coordinate(&field.value, reference.as_deref())
        };
        let location = match (
            coord(Tag::GPSLatitude, Tag::GPSLatitudeRef),
            coord(Tag::GPSLongitude, Tag::GPSLongitudeRef),
        ) {
            (Some(lat), Some(lon)) => Some(format!("{lat:.6},{lon:.6}")),
            _ => None,
        };

        let dump: serde_json::Map<String, serde_json::Value> = exif
            .fields()
            .filter(|f| f.ifd_num == In::PRIMARY)
            .map(|f| {
                (
                    f.tag.to_string(),
                    serde_json::Value::String(f.display_value().with_unit(&exif).to_string()),
                )
            })
            .collect();

        Ok(CaptureMetadata {
            camera_make: text(Tag::Make),
            camera_model: text(Tag::Model),
            taken_at,
            location,
            exif_json: (!dump.is_empty()).then(|| serde_json::Value::Object(dump).to_string()),
        })
    }

    /// Run every best-effort step for one stored original
    pub fn derive(
        &self,
        subject: &str,
        path: &Path,
        mime_type: &str,
        describer: Option<&dyn Describer>,
    ) -> Derivatives {
        let mut out = Derivatives::default();

        let image = out
            .report
            .attempt(DerivativeStep::Decode, subject, || self.decode(path));

        if let Some(ref img) = image {
            let (width, height) = img.dimensions();
            out.width = Some(width);
            out.height = Some(height);

            out.thumbnail = out
                .report
                .attempt(DerivativeStep::Thumbnail, subject, || {
                    self.thumbnail(img, self.thumb_size)
                });

            if let Some(describer) = describer {
                out.description = out
                    .report
                    .attempt(DerivativeStep::Describe, subject, || {
                        describer.describe(img, mime_type)
                    });
            }
        }

        out.metadata = out
            .report
            .attempt(DerivativeStep::Metadata, subject, || self.extract_metadata(path));

        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXIF HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
            .find(|s| !s.is_empty()),
        _ => None,
    }
}

fn exif_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let Value::Ascii(parts) = value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;

    let naive = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?
        .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())?;

    // local time without an offset tag is taken as UTC
    let utc = naive.and_utc() - Duration::minutes(dt.offset.unwrap_or(0).into());
    Some(utc)
}

/// Degrees/minutes/seconds rationals to signed decimal degrees
fn gps_coordinate(value: &Value, reference: Option<&str>) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }

    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    match reference {
        Some(r) if r.starts_with('S') || r.starts_with('W') => Some(-degrees),
        _ => Some(degrees),
    }
}
