//! Domain models for offline content
//!
//! Content descriptors handed in by the caller plus the persisted download record.

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteTypeInfo, SqliteValueRef};
use sqlx::FromRow;
use std::fmt;
use std::path::Path;

// =============================================================================
// ID Types
// =============================================================================

/// Identifier of a piece of course content. Unique per download record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// Content Type
// =============================================================================

/// Kind of content. Persisted as upper-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Video,
    Audio,
    Pdf,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "VIDEO",
            ContentType::Audio => "AUDIO",
            ContentType::Pdf => "PDF",
            ContentType::Other => "OTHER",
        }
    }

    /// Parses a stored value. Unknown values map to `Other`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "VIDEO" => ContentType::Video,
            "AUDIO" => ContentType::Audio,
            "PDF" => ContentType::Pdf,
            _ => ContentType::Other,
        }
    }

    /// Extension used for encrypted artifacts and decrypted temp files.
    pub fn file_extension(&self) -> &'static str {
        match self {
            ContentType::Video => "mp4",
            ContentType::Audio => "mp3",
            ContentType::Pdf => "pdf",
            ContentType::Other => "bin",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<Sqlite> for ContentType {
    fn type_info() -> SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as sqlx::Type<Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for ContentType {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <String as sqlx::Decode<Sqlite>>::decode(value)?;
        Ok(ContentType::parse(&raw))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for ContentType {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <String as sqlx::Encode<'q, Sqlite>>::encode(self.as_str().to_string(), buf)
    }
}

// =============================================================================
// Input Descriptors
// =============================================================================

/// A downloadable content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub content_type: ContentType,
    pub content_url: String,
    pub course_id: String,
    pub is_free: bool,
    pub is_offline_available: bool,
}

impl ContentItem {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("Content id cannot be empty".to_string());
        }
        validate_source_url(&self.content_url)
    }
}

/// Course metadata captured alongside a download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category_name: Option<String>,
    pub sub_category_name: Option<String>,
    pub subject_name: Option<String>,
    pub tags: Vec<String>,
}

impl CourseInfo {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Course id cannot be empty".to_string());
        }
        Ok(())
    }
}

fn validate_source_url(url: &str) -> Result<(), String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("Content URL cannot be empty".to_string());
    }

    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| format!("Content URL has no scheme: {}", url))?;

    match scheme.as_str() {
        "http" | "https" | "file" => Ok(()),
        other => Err(format!("Unsupported URL scheme: {}", other)),
    }
}

// =============================================================================
// Download Record
// =============================================================================

/// Persisted state of one offline download.
///
/// `is_downloaded` is only a hint: callers must re-check that
/// `encrypted_file_path` exists before treating the content as available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ContentDownloadRecord {
    pub id: ContentId,
    pub content_type: ContentType,
    pub source_url: String,
    pub course_id: String,
    pub course_name: String,
    pub course_description: Option<String>,
    pub category_name: Option<String>,
    pub sub_category_name: Option<String>,
    pub subject_name: Option<String>,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub is_free: bool,
    pub is_offline_available: bool,
    pub encrypted_file_path: Option<String>,
    pub is_downloaded: bool,
    pub downloaded_at: Option<i64>,
    pub total_bytes: Option<i64>,
    pub content_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ContentDownloadRecord {
    /// Builds a not-yet-downloaded record for a freshly requested download.
    pub fn pending(item: &ContentItem, course: &CourseInfo, now: i64) -> Self {
        Self {
            id: item.id.clone(),
            content_type: item.content_type,
            source_url: item.content_url.clone(),
            course_id: item.course_id.clone(),
            course_name: course.name.clone(),
            course_description: course.description.clone(),
            category_name: course.category_name.clone(),
            sub_category_name: course.sub_category_name.clone(),
            subject_name: course.subject_name.clone(),
            tags: course.tags.clone(),
            is_free: item.is_free,
            is_offline_available: item.is_offline_available,
            encrypted_file_path: None,
            is_downloaded: false,
            downloaded_at: None,
            total_bytes: None,
            content_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        self.content_type.file_extension()
    }

    pub fn encrypted_path(&self) -> Option<&Path> {
        self.encrypted_file_path.as_deref().map(Path::new)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("Content id cannot be empty".to_string());
        }
        if self.is_downloaded && self.encrypted_file_path.is_none() {
            return Err("Downloaded record must carry an encrypted file path".to_string());
        }
        Ok(())
    }
}
