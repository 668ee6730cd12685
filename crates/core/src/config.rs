//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Nothing in the core reads process-wide environment variables while
//! handling a request; the binaries own that step and use the `*_from_env_value` helpers below.

use crate::constants::{
    AUDIT_DIR_NAME, CONSULTATIONS_DIR_NAME, DEFAULT_ADULT_AGE_YEARS, DEFAULT_AUDIT_READ_LIMIT,
    DEFAULT_QUEUE_CHANNEL_CAPACITY, DIRECTORY_FILENAME, MAX_AUDIT_READ_LIMIT,
};
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    audit_read_limit: usize,
    queue_channel_capacity: usize,
    adult_age_years: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if any limit is zero or the audit read limit exceeds
    /// [`MAX_AUDIT_READ_LIMIT`].
    pub fn new(
        data_dir: PathBuf,
        audit_read_limit: usize,
        queue_channel_capacity: usize,
        adult_age_years: u32,
    ) -> CoreResult<Self> {
        if audit_read_limit == 0 || audit_read_limit > MAX_AUDIT_READ_LIMIT {
            return Err(CoreError::InvalidConfig(format!(
                "audit_read_limit must be between 1 and {MAX_AUDIT_READ_LIMIT}"
            )));
        }
        if queue_channel_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "queue_channel_capacity cannot be zero".into(),
            ));
        }
        if adult_age_years == 0 {
            return Err(CoreError::InvalidConfig(
                "adult_age_years cannot be zero".into(),
            ));
        }

        Ok(Self {
            data_dir,
            audit_read_limit,
            queue_channel_capacity,
            adult_age_years,
        })
    }

    /// Configuration with every limit at its default.
    pub fn with_defaults(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            audit_read_limit: DEFAULT_AUDIT_READ_LIMIT,
            queue_channel_capacity: DEFAULT_QUEUE_CHANNEL_CAPACITY,
            adult_age_years: DEFAULT_ADULT_AGE_YEARS,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn consultations_dir(&self) -> PathBuf {
        self.data_dir.join(CONSULTATIONS_DIR_NAME)
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join(AUDIT_DIR_NAME)
    }

    pub fn directory_file(&self) -> PathBuf {
        self.data_dir.join(DIRECTORY_FILENAME)
    }

    pub fn audit_read_limit(&self) -> usize {
        self.audit_read_limit
    }

    pub fn queue_channel_capacity(&self) -> usize {
        self.queue_channel_capacity
    }

    pub fn adult_age_years(&self) -> u32 {
        self.adult_age_years
    }
}

/// Which [`ConsultationStore`](crate::store::ConsultationStore) backend to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// YAML files under the configured data directory.
    File,
    /// Process-local memory; contents are lost on exit.
    Memory,
}

impl FromStr for StoreKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreKind::File),
            "memory" => Ok(StoreKind::Memory),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown store kind '{other}' (expected 'file' or 'memory')"
            ))),
        }
    }
}

/// Parse the store kind from an optional environment value, defaulting to [`StoreKind::File`].
pub fn store_kind_from_env_value(value: Option<String>) -> CoreResult<StoreKind> {
    match non_blank(value) {
        Some(v) => v.parse(),
        None => Ok(StoreKind::File),
    }
}

/// Parse the audit read limit from an optional environment value.
///
/// If `value` is `None` or blank, returns [`DEFAULT_AUDIT_READ_LIMIT`].
pub fn audit_read_limit_from_env_value(value: Option<String>) -> CoreResult<usize> {
    match non_blank(value) {
        Some(v) => v.parse::<usize>().map_err(|e| {
            CoreError::InvalidConfig(format!("audit read limit '{v}' is not a number: {e}"))
        }),
        None => Ok(DEFAULT_AUDIT_READ_LIMIT),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
