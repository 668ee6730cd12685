//! Constants used throughout the telecare core crate.
//!
//! Storage layout names, configuration defaults and vital-sign display thresholds live here so
//! that the file store, the CLI and the tests agree on them.

/// Default directory for the file-backed store when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "telecare_data";

/// Directory name for consultation records.
pub const CONSULTATIONS_DIR_NAME: &str = "consultations";

/// Directory name for audit events.
pub const AUDIT_DIR_NAME: &str = "audit";

/// Per-consultation directory holding one file per addendum.
pub const ADDENDA_DIR_NAME: &str = "addenda";

/// Filename for the consultation record itself.
pub const CONSULTATION_FILENAME: &str = "consultation.yaml";

/// Lock file under the consultations root, held exclusively while a write checks and replaces
/// a record. Every process sharing the data directory takes the same lock.
pub const STORE_LOCK_FILENAME: &str = ".write.lock";

/// How often a file-backed queue subscription re-reads the store to catch writes made by other
/// processes.
pub const DEFAULT_QUEUE_POLL_INTERVAL_MS: u64 = 1_000;

/// Filename for the person/role directory snapshot read by the binaries.
pub const DIRECTORY_FILENAME: &str = "directory.yaml";

/// Default number of audit events returned per resource.
pub const DEFAULT_AUDIT_READ_LIMIT: usize = 50;

/// Hard ceiling on audit reads regardless of configuration.
pub const MAX_AUDIT_READ_LIMIT: usize = 500;

/// Default buffer size for the change-notification channel.
pub const DEFAULT_QUEUE_CHANNEL_CAPACITY: usize = 256;

/// Age (in whole years) at which pediatric red flags stop being offered.
pub const DEFAULT_ADULT_AGE_YEARS: u32 = 18;

/// Temperature at or above which a reading is flagged as fever (Fahrenheit).
pub const FEVER_THRESHOLD_F: f64 = 100.4;

/// Oxygen saturation below which a reading is flagged (percent).
pub const LOW_SATURATION_THRESHOLD_PCT: f64 = 95.0;

pub const TACHYCARDIA_THRESHOLD_BPM: u16 = 100;
pub const BRADYCARDIA_THRESHOLD_BPM: u16 = 50;
pub const TACHYPNOEA_THRESHOLD_RPM: u16 = 20;
pub const HYPERTENSION_SYSTOLIC_MMHG: u16 = 140;
pub const HYPERTENSION_DIASTOLIC_MMHG: u16 = 90;
