//! Upload admission policy.
//!
//! Decides per incoming file whether it is accepted, which directory it lands
//! in and what name it is stored under. The decision is pure: directory
//! bootstrap and byte streaming live in [`crate::services::storage`] and
//! [`crate::services::upload_service`].

use crate::config::AppConfig;
use crate::utils::validation::{extension_of, is_allowed_extension, is_allowed_image_mime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadCategory {
    PropertyPhoto,
    FloorPlan,
    VrPanorama,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 3] = [
        UploadCategory::PropertyPhoto,
        UploadCategory::FloorPlan,
        UploadCategory::VrPanorama,
    ];

    /// Directory relative to the upload root
    pub fn relative_dir(self) -> &'static str {
        match self {
            UploadCategory::PropertyPhoto => "properties/photos",
            UploadCategory::FloorPlan => "properties/floor-plans",
            UploadCategory::VrPanorama => "vr-panoramas",
        }
    }

    /// Multipart field carrying files of this category
    pub fn field_name(self) -> &'static str {
        match self {
            UploadCategory::PropertyPhoto => "photos",
            UploadCategory::FloorPlan => "floorPlan",
            UploadCategory::VrPanorama => "panorama",
        }
    }

    /// Floor plans and panoramas arrive as a single file per field.
    pub fn accepts_multiple(self) -> bool {
        matches!(self, UploadCategory::PropertyPhoto)
    }

    fn index(self) -> usize {
        match self {
            UploadCategory::PropertyPhoto => 0,
            UploadCategory::FloorPlan => 1,
            UploadCategory::VrPanorama => 2,
        }
    }
}

impl std::fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UploadCategory::PropertyPhoto => "property photo",
            UploadCategory::FloorPlan => "floor plan",
            UploadCategory::VrPanorama => "VR panorama",
        };
        f.write_str(name)
    }
}

/// Storage directory and ceilings of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub directory: PathBuf,
    pub max_file_size: u64,
    pub max_file_count: Option<usize>,
}

/// What the hosting layer knows about a file when asking for admission.
/// `size` is the byte count seen so far; zero before streaming starts.
#[derive(Debug, Clone, Copy)]
pub struct FileDescriptor<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size: u64,
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFileRecord {
    pub category: UploadCategory,
    pub stored_name: String,
    pub directory: PathBuf,
}

impl StoredFileRecord {
    /// Storage key relative to the upload root, always `/`-separated.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.category.relative_dir(), self.stored_name)
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.stored_name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error(
        "Invalid file type for '{file_name}' ({content_type}). Only jpeg, jpg, png, gif and webp images are allowed"
    )]
    InvalidFileType {
        file_name: String,
        content_type: String,
    },

    #[error("File '{file_name}' exceeds the {limit} byte limit for {category} uploads")]
    SizeLimitExceeded {
        file_name: String,
        category: UploadCategory,
        limit: u64,
    },

    #[error("Too many files: at most {limit} {category} files are accepted per request")]
    CountLimitExceeded {
        category: UploadCategory,
        limit: usize,
    },
}

impl AdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::InvalidFileType { .. } => "INVALID_FILE_TYPE",
            AdmissionError::SizeLimitExceeded { .. } => "FILE_TOO_LARGE",
            AdmissionError::CountLimitExceeded { .. } => "TOO_MANY_FILES",
        }
    }
}

/// Per-category configuration table plus the admission rules applied to it.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    rules: [CategoryRule; 3],
}

impl AdmissionPolicy {
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64, max_photo_count: usize) -> Self {
        let root = root.into();
        let rule = |category: UploadCategory, max_file_count| CategoryRule {
            directory: root.join(category.relative_dir()),
            max_file_size,
            max_file_count,
        };

        let rules = [
            rule(UploadCategory::PropertyPhoto, Some(max_photo_count)),
            rule(UploadCategory::FloorPlan, None),
            rule(UploadCategory::VrPanorama, None),
        ];

        Self { rules }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.upload_root.clone(),
            config.max_file_size,
            config.max_photo_count,
        )
    }

    pub fn rule(&self, category: UploadCategory) -> &CategoryRule {
        &self.rules[category.index()]
    }

    /// Accepts the file or says why not. Type is checked before size so a
    /// mislabeled file is always reported as such.
    pub fn evaluate_admission(
        &self,
        descriptor: &FileDescriptor<'_>,
        category: UploadCategory,
    ) -> Result<StoredFileRecord, AdmissionError> {
        let extension = self.check_file_type(descriptor.file_name, descriptor.content_type)?;
        self.check_size(category, descriptor.file_name, descriptor.size)?;

        Ok(StoredFileRecord {
            category,
            stored_name: generate_stored_name(extension),
            directory: self.rule(category).directory.clone(),
        })
    }

    /// Extension and declared type must both be in the image allow-set.
    /// Returns the original extension (case kept) on success.
    pub fn check_file_type<'a>(
        &self,
        file_name: &'a str,
        content_type: &str,
    ) -> Result<&'a str, AdmissionError> {
        let rejection = || AdmissionError::InvalidFileType {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
        };

        let extension = extension_of(file_name).ok_or_else(rejection)?;
        if !is_allowed_extension(extension) || !is_allowed_image_mime(content_type) {
            return Err(rejection());
        }

        Ok(extension)
    }

    /// Limit is inclusive: a file of exactly `max_file_size` bytes passes.
    pub fn check_size(
        &self,
        category: UploadCategory,
        file_name: &str,
        size: u64,
    ) -> Result<(), AdmissionError> {
        let limit = self.rule(category).max_file_size;
        if size > limit {
            return Err(AdmissionError::SizeLimitExceeded {
                file_name: file_name.to_string(),
                category,
                limit,
            });
        }
        Ok(())
    }

    /// `count` is the 1-based position of the file within the request.
    pub fn check_count(&self, category: UploadCategory, count: usize) -> Result<(), AdmissionError> {
        match self.rule(category).max_file_count {
            Some(limit) if count > limit => {
                Err(AdmissionError::CountLimitExceeded { category, limit })
            }
            _ => Ok(()),
        }
    }
}

/// `<uuid-v4>.<ext>`, extension case preserved.
pub fn generate_stored_name(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension)
}
