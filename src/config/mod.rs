use std::env;
use std::path::PathBuf;

/// 50 MiB, shared by every upload category unless overridden.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum number of property photos accepted in one request.
pub const DEFAULT_MAX_PHOTO_COUNT: usize = 50;

/// Runtime mode, controls how much error detail reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            RuntimeMode::Production
        } else {
            RuntimeMode::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }
}

/// Upload service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory holding every upload category (default: "uploads")
    pub upload_root: PathBuf,

    /// Maximum size of a single uploaded file in bytes (default: 50 MiB)
    pub max_file_size: u64,

    /// Maximum number of photos per request (default: 50)
    pub max_photo_count: usize,

    /// "production" hides stack details in error responses
    pub runtime_mode: RuntimeMode,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_photo_count: DEFAULT_MAX_PHOTO_COUNT,
            runtime_mode: RuntimeMode::Development,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_root: env::var("UPLOAD_ROOT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.upload_root),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_photo_count: env::var("MAX_PHOTO_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_photo_count),

            runtime_mode: env::var("APP_ENV")
                .map(|v| RuntimeMode::parse(&v))
                .unwrap_or(default.runtime_mode),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Config for local development, rooted at the given directory
    pub fn development(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            ..Self::default()
        }
    }

    /// Config for production (error responses carry no stack detail)
    pub fn production(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            runtime_mode: RuntimeMode::Production,
            ..Self::default()
        }
    }
}
