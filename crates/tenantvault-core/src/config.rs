//! Configuration module
//!
//! This module provides the gateway configuration: object store connection
//! settings, the container allow-list, temporary-access defaults, the
//! overwrite policy, and the size limit tiers.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

// Common constants
const ALLOWED_CONTAINERS: &str = "images,documents,uploads,backups";
const BACKUP_CONTAINER: &str = "backups";
const LOCAL_STORAGE_PATH: &str = "./data";
const LOCAL_STORAGE_BASE_URL: &str = "http://localhost:3000/storage";
const TEMP_ACCESS_EXPIRY_MINUTES: u32 = 60;
const TEMP_ACCESS_CLOCK_SKEW_MINUTES: u32 = 5;
const MAX_TEXT_SIZE_MB: u64 = 5;
const MAX_IMAGE_SIZE_MB: u64 = 10;
const MAX_DOCUMENT_SIZE_MB: u64 = 50;
const MAX_MEDIA_SIZE_MB: u64 = 100;
const MAX_DEFAULT_SIZE_MB: u64 = 10;

/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_TEMP_ACCESS_EXPIRY_MINUTES: u32 = 7 * 24 * 60;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Same bound S3 puts on bucket names.
pub const MAX_CONTAINER_NAME_LEN: usize = 63;

/// What an upload does when its key is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Last writer wins.
    #[default]
    Allow,
    /// Create-only precondition at the store; an existing key fails the upload.
    Reject,
}

impl FromStr for OverwritePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" | "overwrite" => Ok(OverwritePolicy::Allow),
            "reject" | "create-only" => Ok(OverwritePolicy::Reject),
            _ => Err(anyhow::anyhow!("Invalid overwrite policy: {}", s)),
        }
    }
}

impl Display for OverwritePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OverwritePolicy::Allow => write!(f, "allow"),
            OverwritePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Maximum payload sizes in bytes, by content type tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    /// SVG, plain text, CSV, JSON, XML, Markdown
    pub text_bytes: u64,
    pub image_bytes: u64,
    /// PDF, Office formats, archives
    pub document_bytes: u64,
    /// Audio and video
    pub media_bytes: u64,
    pub default_bytes: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            text_bytes: MAX_TEXT_SIZE_MB * BYTES_PER_MB,
            image_bytes: MAX_IMAGE_SIZE_MB * BYTES_PER_MB,
            document_bytes: MAX_DOCUMENT_SIZE_MB * BYTES_PER_MB,
            media_bytes: MAX_MEDIA_SIZE_MB * BYTES_PER_MB,
            default_bytes: MAX_DEFAULT_SIZE_MB * BYTES_PER_MB,
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub environment: String,
    // Object store connection
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    // Governance
    pub allowed_containers: Vec<String>,
    pub backup_container: String,
    pub temp_access_expiry_minutes: u32,
    pub temp_access_clock_skew_minutes: u32,
    pub overwrite_policy: OverwritePolicy,
    pub size_limits: SizeLimits,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: LOCAL_STORAGE_PATH.to_string(),
            local_storage_base_url: LOCAL_STORAGE_BASE_URL.to_string(),
            allowed_containers: parse_list(ALLOWED_CONTAINERS),
            backup_container: BACKUP_CONTAINER.to_string(),
            temp_access_expiry_minutes: TEMP_ACCESS_EXPIRY_MINUTES,
            temp_access_clock_skew_minutes: TEMP_ACCESS_CLOCK_SKEW_MINUTES,
            overwrite_policy: OverwritePolicy::default(),
            size_limits: SizeLimits::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| StorageBackend::Local.to_string())
            .parse::<StorageBackend>()?;

        let overwrite_policy = env::var("OVERWRITE_POLICY")
            .unwrap_or_else(|_| OverwritePolicy::default().to_string())
            .parse::<OverwritePolicy>()?;

        let size_limits = SizeLimits {
            text_bytes: env_mb("MAX_TEXT_SIZE_MB", MAX_TEXT_SIZE_MB),
            image_bytes: env_mb("MAX_IMAGE_SIZE_MB", MAX_IMAGE_SIZE_MB),
            document_bytes: env_mb("MAX_DOCUMENT_SIZE_MB", MAX_DOCUMENT_SIZE_MB),
            media_bytes: env_mb("MAX_MEDIA_SIZE_MB", MAX_MEDIA_SIZE_MB),
            default_bytes: env_mb("MAX_DEFAULT_SIZE_MB", MAX_DEFAULT_SIZE_MB),
        };

        let config = GatewayConfig {
            environment,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|_| LOCAL_STORAGE_BASE_URL.to_string()),
            allowed_containers: parse_list(
                &env::var("ALLOWED_CONTAINERS").unwrap_or_else(|_| ALLOWED_CONTAINERS.to_string()),
            ),
            backup_container: env::var("BACKUP_CONTAINER")
                .unwrap_or_else(|_| BACKUP_CONTAINER.to_string())
                .trim()
                .to_lowercase(),
            temp_access_expiry_minutes: env::var("TEMP_ACCESS_EXPIRY_MINUTES")
                .unwrap_or_else(|_| TEMP_ACCESS_EXPIRY_MINUTES.to_string())
                .parse()
                .unwrap_or(TEMP_ACCESS_EXPIRY_MINUTES),
            temp_access_clock_skew_minutes: env::var("TEMP_ACCESS_CLOCK_SKEW_MINUTES")
                .unwrap_or_else(|_| TEMP_ACCESS_CLOCK_SKEW_MINUTES.to_string())
                .parse()
                .unwrap_or(TEMP_ACCESS_CLOCK_SKEW_MINUTES),
            overwrite_policy,
            size_limits,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.allowed_containers.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTAINERS must name at least one container"));
        }

        if let Some(bad) = self
            .allowed_containers
            .iter()
            .find(|name| !is_valid_container_name(name))
        {
            return Err(anyhow::anyhow!(
                "Invalid container name '{}': use up to {} lowercase letters, digits and '-'",
                bad,
                MAX_CONTAINER_NAME_LEN
            ));
        }

        if !self.is_allowed_container(&self.backup_container) {
            return Err(anyhow::anyhow!(
                "BACKUP_CONTAINER '{}' must be one of ALLOWED_CONTAINERS",
                self.backup_container
            ));
        }

        if self.temp_access_expiry_minutes == 0
            || self.temp_access_expiry_minutes > MAX_TEMP_ACCESS_EXPIRY_MINUTES
        {
            return Err(anyhow::anyhow!(
                "TEMP_ACCESS_EXPIRY_MINUTES must be between 1 and {}",
                MAX_TEMP_ACCESS_EXPIRY_MINUTES
            ));
        }

        let limits = &self.size_limits;
        if [
            limits.text_bytes,
            limits.image_bytes,
            limits.document_bytes,
            limits.media_bytes,
            limits.default_bytes,
        ]
        .contains(&0)
        {
            return Err(anyhow::anyhow!("Size limits must be greater than zero"));
        }

        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.as_deref().map_or(true, str::is_empty) {
                return Err(anyhow::anyhow!("S3_BUCKET must be set when STORAGE_BACKEND=s3"));
            }
            if self.s3_region.as_deref().map_or(true, str::is_empty) {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3"
                ));
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn is_allowed_container(&self, name: &str) -> bool {
        self.allowed_containers.iter().any(|c| c == name)
    }
}

fn env_mb(name: &str, default_mb: u64) -> u64 {
    env::var(name)
        .unwrap_or_else(|_| default_mb.to_string())
        .parse::<u64>()
        .unwrap_or(default_mb)
        * BYTES_PER_MB
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_valid_container_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CONTAINER_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
