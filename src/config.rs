//! Runtime settings read from the environment.
//!
//! Server and database settings stay in Rocket's figment; what lives here is
//! specific to importing and listing customers.

use crate::import::DEFAULT_BATCH_SIZE;
use std::env;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "csv,txt";

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Settings for `POST /import` and the CLI importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub max_upload_bytes: u64,
    /// Lower-cased, without leading dots.
    pub allowed_extensions: Vec<String>,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self::new(
            env_usize("IMPORT_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            env_u64("IMPORT_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            &env_string("IMPORT_ALLOWED_EXTENSIONS", DEFAULT_ALLOWED_EXTENSIONS),
        )
    }

    pub fn new(batch_size: usize, max_upload_bytes: u64, allowed_extensions: &str) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_upload_bytes: max_upload_bytes.max(1),
            allowed_extensions: parse_extensions(allowed_extensions),
        }
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == extension)
    }

    /// Human-readable upload ceiling, e.g. `5MB` or `512KB`.
    pub fn max_upload_label(&self) -> String {
        const KIB: u64 = 1024;
        const MIB: u64 = 1024 * 1024;

        match self.max_upload_bytes {
            bytes if bytes % MIB == 0 => format!("{}MB", bytes / MIB),
            bytes if bytes % KIB == 0 => format!("{}KB", bytes / KIB),
            bytes => format!("{} bytes", bytes),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_BATCH_SIZE,
            DEFAULT_MAX_UPLOAD_BYTES,
            DEFAULT_ALLOWED_EXTENSIONS,
        )
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Page size bounds for `GET /customers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerListConfig {
    pub default_per_page: i64,
    pub max_per_page: i64,
}

impl CustomerListConfig {
    pub fn from_env() -> Self {
        let max_per_page = env_usize("CUSTOMERS_MAX_PER_PAGE", 50).max(1);
        let default_per_page = env_usize("CUSTOMERS_DEFAULT_PER_PAGE", 10).clamp(1, max_per_page);

        Self {
            default_per_page: default_per_page as i64,
            max_per_page: max_per_page as i64,
        }
    }
}

impl Default for CustomerListConfig {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: 50,
        }
    }
}
