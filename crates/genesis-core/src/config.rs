//! Configuration for the GENESIS core.
//!
//! # Example
//!
//! ```
//! use genesis_core::config::{GenesisConfig, GenesisConfigBuilder};
//! use std::time::Duration;
//!
//! // Use defaults
//! let config = GenesisConfig::default();
//! assert_eq!(config.total_shards, 5);
//!
//! // Or use the builder
//! let config = GenesisConfigBuilder::new()
//!     .with_in_memory_storage()
//!     .with_shards(7, 4)
//!     .with_lock_ttl(Duration::from_secs(10))
//!     .build_validated()
//!     .unwrap();
//! assert_eq!(config.shard_threshold, 4);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use genesis_cap::{DecayConfig, RiskScorer, RiskThresholds, RiskWeights};
use genesis_crypto::HashAlgorithm;
use genesis_identity::{BiometricChannel, BiometricFuser};
use genesis_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

use crate::session::SessionPolicy;

const DEFAULT_TOTAL_SHARDS: u8 = 5;
const DEFAULT_SHARD_THRESHOLD: u8 = 3;
const DEFAULT_MIN_AUTH_LAYERS: usize = 3;
const DEFAULT_LOCK_TTL_MS: u64 = 5_000;
const DEFAULT_LOCK_WAIT_MS: u64 = 1_000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_RISK_HIGH: f64 = 6.0;
const DEFAULT_RISK_MEDIUM: f64 = 3.0;
const DEFAULT_RISK_HALF_LIFE_SECS: u64 = 300;
const DEFAULT_SESSION_IDLE_SECS: u64 = 1_800;
const DEFAULT_EVENT_BUFFER: usize = 256;
const DEFAULT_MONITOR_INTERVAL_MS: u64 = 1_000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 50;
const DEFAULT_RETRY_MAX_MS: u64 = 1_000;
const DEFAULT_CACHE_MB: usize = 64;

/// Main configuration.
///
/// Serialized as camelCase JSON. Every field has a default, so a config
/// file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenesisConfig {
    /// Shares produced per secret (n).
    pub total_shards: u8,

    /// Shares required to reconstruct (k).
    pub shard_threshold: u8,

    /// Populated biometric channels required for fusion.
    pub min_auth_layers: usize,

    /// Fingerprint digest.
    pub hash_algorithm: HashAlgorithm,

    /// Lease length for per-fingerprint locks.
    #[serde(rename = "lockTtlMs", with = "duration_ms")]
    pub lock_ttl: Duration,

    /// How long to wait for a held lock before giving up.
    #[serde(rename = "lockWaitMs", with = "duration_ms")]
    pub lock_wait: Duration,

    /// Bound on each store call.
    #[serde(rename = "storeTimeoutMs", with = "duration_ms")]
    pub store_timeout: Duration,

    /// Score at which a session is high risk.
    pub risk_high_threshold: f64,

    /// Score at which a session is medium risk.
    pub risk_medium_threshold: f64,

    /// Seconds for accumulated risk to halve.
    pub risk_half_life_secs: u64,

    /// Score at which the identity is frozen outright. Disabled when `None`.
    pub freeze_threshold: Option<f64>,

    /// Penalty weights for session signals.
    pub risk_weights: RiskWeights,

    /// What to do with a second session for the same identity.
    pub session_policy: SessionPolicy,

    /// Idle sessions are evicted after this many seconds.
    pub session_idle_timeout_secs: u64,

    /// New identities start `ACTIVE` rather than `PENDING_VERIFICATION`.
    pub activate_immediately: bool,

    /// Capacity of the outbound event channel.
    pub event_buffer: usize,

    /// Period of the maintenance monitor.
    #[serde(rename = "monitorIntervalMs", with = "duration_ms")]
    pub monitor_interval: Duration,

    /// Retry policy for transient failures.
    pub retry: RetryConfig,

    /// Storage backend.
    pub storage: StorageConfig,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            total_shards: DEFAULT_TOTAL_SHARDS,
            shard_threshold: DEFAULT_SHARD_THRESHOLD,
            min_auth_layers: DEFAULT_MIN_AUTH_LAYERS,
            hash_algorithm: HashAlgorithm::default(),
            lock_ttl: Duration::from_millis(DEFAULT_LOCK_TTL_MS),
            lock_wait: Duration::from_millis(DEFAULT_LOCK_WAIT_MS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            risk_high_threshold: DEFAULT_RISK_HIGH,
            risk_medium_threshold: DEFAULT_RISK_MEDIUM,
            risk_half_life_secs: DEFAULT_RISK_HALF_LIFE_SECS,
            freeze_threshold: None,
            risk_weights: RiskWeights::default(),
            session_policy: SessionPolicy::default(),
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_SECS,
            activate_immediately: true,
            event_buffer: DEFAULT_EVENT_BUFFER,
            monitor_interval: Duration::from_millis(DEFAULT_MONITOR_INTERVAL_MS),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl GenesisConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    pub fn builder() -> GenesisConfigBuilder {
        GenesisConfigBuilder::new()
    }

    /// Configuration backed by in-memory storage (useful for testing).
    pub fn in_memory() -> Self {
        GenesisConfigBuilder::new().with_in_memory_storage().build()
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the file cannot be read or parsed, or the first
    /// validation failure.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `Load` on malformed JSON, or the first validation failure.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Shares
        if self.shard_threshold < 2 {
            return Err(invalid("shardThreshold", "threshold must be at least 2"));
        }
        if self.shard_threshold > self.total_shards {
            return Err(invalid(
                "shardThreshold",
                format!(
                    "threshold {} exceeds total shards {}",
                    self.shard_threshold, self.total_shards
                ),
            ));
        }

        // Fusion
        let channels = BiometricChannel::ALL.len();
        if self.min_auth_layers == 0 || self.min_auth_layers > channels {
            return Err(invalid(
                "minAuthLayers",
                format!("must be between 1 and {}", channels),
            ));
        }

        // Ledger
        if self.lock_ttl.is_zero() {
            return Err(invalid("lockTtlMs", "lock TTL must be greater than zero"));
        }
        if self.store_timeout.is_zero() {
            return Err(invalid("storeTimeoutMs", "store timeout must be greater than zero"));
        }

        // Risk
        self.risk_thresholds()?;
        if self.risk_half_life_secs == 0 {
            return Err(invalid("riskHalfLifeSecs", "half-life must be greater than zero"));
        }
        if let Some(freeze) = self.freeze_threshold {
            if !(freeze > 0.0 && freeze <= genesis_cap::RISK_MAX) {
                return Err(invalid(
                    "freezeThreshold",
                    format!("must be in (0, {}]", genesis_cap::RISK_MAX),
                ));
            }
        }
        self.risk_weights
            .validate()
            .map_err(|e| invalid("riskWeights", e.to_string()))?;

        // Sessions and events
        if self.session_idle_timeout_secs == 0 {
            return Err(invalid(
                "sessionIdleTimeoutSecs",
                "idle timeout must be greater than zero",
            ));
        }
        if self.event_buffer == 0 {
            return Err(invalid("eventBuffer", "event buffer must be greater than zero"));
        }
        if self.monitor_interval.is_zero() {
            return Err(invalid(
                "monitorIntervalMs",
                "monitor interval must be greater than zero",
            ));
        }

        // Retry
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.maxAttempts", "at least one attempt is required"));
        }
        if self.retry.base_backoff > self.retry.max_backoff {
            return Err(invalid(
                "retry.baseBackoffMs",
                "base backoff cannot exceed max backoff",
            ));
        }

        // Storage
        if !self.storage.in_memory && self.storage.data_dir.as_os_str().is_empty() {
            return Err(invalid(
                "storage.dataDir",
                "data directory cannot be empty when not using in-memory storage",
            ));
        }

        Ok(())
    }

    /// Tier thresholds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` unless `0 < medium < high <= 10`.
    pub fn risk_thresholds(&self) -> Result<RiskThresholds, ConfigError> {
        RiskThresholds::new(self.risk_medium_threshold, self.risk_high_threshold)
            .map_err(|e| invalid("riskMediumThreshold", e.to_string()))
    }

    /// Risk scorer for these settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if any scoring parameter is invalid.
    pub fn scorer(&self) -> Result<RiskScorer, ConfigError> {
        let decay = DecayConfig::new(self.risk_half_life_secs)
            .map_err(|e| invalid("riskHalfLifeSecs", e.to_string()))?;
        RiskScorer::new(self.risk_weights, self.risk_thresholds()?, decay)
            .map_err(|e| invalid("riskWeights", e.to_string()))
    }

    /// Fuser for these settings.
    pub fn fuser(&self) -> BiometricFuser {
        BiometricFuser::new(self.hash_algorithm, self.min_auth_layers)
    }

    /// Ledger tuning for these settings.
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            store_timeout: self.store_timeout,
        }
    }

    /// Idle timeout as a duration.
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

/// Retry policy for transient failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Attempts including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(rename = "baseBackoffMs", with = "duration_ms")]
    pub base_backoff: Duration,

    /// Cap on the delay between retries.
    #[serde(rename = "maxBackoffMs", with = "duration_ms")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            max_backoff: Duration::from_millis(DEFAULT_RETRY_MAX_MS),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// Storage configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Use in-memory storage instead of disk.
    ///
    /// Data is lost when the process exits.
    pub in_memory: bool,

    /// Directory for the sled database.
    ///
    /// Defaults to the platform-specific data directory:
    /// - Linux: `~/.local/share/genesis`
    /// - macOS: `~/Library/Application Support/genesis`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\genesis`
    pub data_dir: PathBuf,

    /// sled page cache size in megabytes.
    pub cache_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            data_dir: default_data_dir(),
            cache_mb: DEFAULT_CACHE_MB,
        }
    }
}

/// Builder for [`GenesisConfig`].
#[derive(Clone, Debug, Default)]
pub struct GenesisConfigBuilder {
    config: GenesisConfig,
}

impl GenesisConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build without validating.
    pub fn build(self) -> GenesisConfig {
        self.config
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn build_validated(self) -> Result<GenesisConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    // ===== Shares and fusion =====

    /// Set total shares and threshold.
    pub fn with_shards(mut self, total: u8, threshold: u8) -> Self {
        self.config.total_shards = total;
        self.config.shard_threshold = threshold;
        self
    }

    /// Set the minimum number of populated biometric channels.
    pub fn with_min_auth_layers(mut self, layers: usize) -> Self {
        self.config.min_auth_layers = layers;
        self
    }

    /// Set the fingerprint digest.
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.config.hash_algorithm = algorithm;
        self
    }

    // ===== Ledger =====

    /// Set the lock lease length.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.config.lock_ttl = ttl;
        self
    }

    /// Set how long to wait for a held lock.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.config.lock_wait = wait;
        self
    }

    /// Set the bound on each store call.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, max_attempts: u32, base_backoff: Duration) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self.config.retry.base_backoff = base_backoff;
        self.config.retry.max_backoff = self.config.retry.max_backoff.max(base_backoff);
        self
    }

    // ===== Risk =====

    /// Set tier thresholds.
    pub fn with_risk_thresholds(mut self, medium: f64, high: f64) -> Self {
        self.config.risk_medium_threshold = medium;
        self.config.risk_high_threshold = high;
        self
    }

    /// Set the risk half-life.
    pub fn with_risk_half_life(mut self, half_life: Duration) -> Self {
        self.config.risk_half_life_secs = half_life.as_secs();
        self
    }

    /// Freeze identities whose session risk reaches `threshold`.
    pub fn with_freeze_threshold(mut self, threshold: f64) -> Self {
        self.config.freeze_threshold = Some(threshold);
        self
    }

    /// Set penalty weights.
    pub fn with_risk_weights(mut self, weights: RiskWeights) -> Self {
        self.config.risk_weights = weights;
        self
    }

    // ===== Sessions =====

    /// Set the second-session policy.
    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.config.session_policy = policy;
        self
    }

    /// Set the idle timeout for sessions.
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_idle_timeout_secs = timeout.as_secs();
        self
    }

    /// Start new identities as `ACTIVE` (default) or `PENDING_VERIFICATION`.
    pub fn with_activate_immediately(mut self, activate: bool) -> Self {
        self.config.activate_immediately = activate;
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    /// Set the maintenance monitor period.
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.config.monitor_interval = interval;
        self
    }

    // ===== Storage =====

    /// Use in-memory storage.
    pub fn with_in_memory_storage(mut self) -> Self {
        self.config.storage.in_memory = true;
        self
    }

    /// Use sled storage in `dir`.
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.in_memory = false;
        self.config.storage.data_dir = dir;
        self
    }

    /// Set the sled cache size.
    pub fn with_cache_mb(mut self, cache_mb: usize) -> Self {
        self.config.storage.cache_mb = cache_mb;
        self
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Get the default data directory for the current platform.
pub fn default_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("genesis");
    }

    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".genesis");
    }

    PathBuf::from(".genesis")
}

/// Durations as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GenesisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.total_shards, 5);
        assert_eq!(config.shard_threshold, 3);
        assert_eq!(config.min_auth_layers, 3);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha3_512);
        assert_eq!(config.lock_ttl, Duration::from_millis(5000));
        assert_eq!(config.risk_high_threshold, 6.0);
        assert_eq!(config.risk_medium_threshold, 3.0);
        assert!(config.activate_immediately);
        assert!(config.freeze_threshold.is_none());
        assert!(!config.storage.in_memory);
    }

    #[test]
    fn test_builder() {
        let config = GenesisConfigBuilder::new()
            .with_in_memory_storage()
            .with_shards(7, 4)
            .with_min_auth_layers(2)
            .with_hash_algorithm(HashAlgorithm::Blake3_512)
            .with_lock_wait(Duration::from_millis(250))
            .with_freeze_threshold(9.5)
            .with_session_policy(SessionPolicy::Reject)
            .with_activate_immediately(false)
            .build_validated()
            .unwrap();

        assert!(config.storage.in_memory);
        assert_eq!((config.total_shards, config.shard_threshold), (7, 4));
        assert_eq!(config.min_auth_layers, 2);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3_512);
        assert_eq!(config.lock_wait, Duration::from_millis(250));
        assert_eq!(config.freeze_threshold, Some(9.5));
        assert_eq!(config.session_policy, SessionPolicy::Reject);
        assert!(!config.activate_immediately);
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            (GenesisConfigBuilder::new().with_shards(5, 1), "shardThreshold"),
            (GenesisConfigBuilder::new().with_shards(3, 4), "shardThreshold"),
            (GenesisConfigBuilder::new().with_min_auth_layers(0), "minAuthLayers"),
            (GenesisConfigBuilder::new().with_min_auth_layers(6), "minAuthLayers"),
            (GenesisConfigBuilder::new().with_lock_ttl(Duration::ZERO), "lockTtlMs"),
            (
                GenesisConfigBuilder::new().with_risk_thresholds(6.0, 3.0),
                "riskMediumThreshold",
            ),
            (GenesisConfigBuilder::new().with_freeze_threshold(12.0), "freezeThreshold"),
            (GenesisConfigBuilder::new().with_event_buffer(0), "eventBuffer"),
            (
                GenesisConfigBuilder::new().with_retry(0, Duration::from_millis(10)),
                "retry.maxAttempts",
            ),
            (
                GenesisConfigBuilder::new().with_data_dir(PathBuf::new()),
                "storage.dataDir",
            ),
        ];

        for (builder, expected) in cases {
            match builder.build_validated() {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected InvalidValue for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_json_keys() {
        let json = serde_json::to_value(GenesisConfig::in_memory()).unwrap();
        assert_eq!(json["totalShards"], 5);
        assert_eq!(json["shardThreshold"], 3);
        assert_eq!(json["minAuthLayers"], 3);
        assert_eq!(json["hashAlgorithm"], "sha3-512");
        assert_eq!(json["lockTtlMs"], 5000);
        assert_eq!(json["storeTimeoutMs"], 2000);
        assert_eq!(json["riskHighThreshold"], 6.0);
        assert_eq!(json["sessionPolicy"], "share");
        assert_eq!(json["retry"]["baseBackoffMs"], 50);
        assert_eq!(json["storage"]["inMemory"], true);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GenesisConfig::from_json_str(
            r#"{ "totalShards": 7, "shardThreshold": 4, "lockTtlMs": 750,
                 "hashAlgorithm": "blake3-512", "storage": { "inMemory": true } }"#,
        )
        .unwrap();
        assert_eq!(config.total_shards, 7);
        assert_eq!(config.lock_ttl, Duration::from_millis(750));
        assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3_512);
        assert_eq!(config.min_auth_layers, 3);
        assert!(config.storage.in_memory);
        assert_eq!(config.storage.cache_mb, DEFAULT_CACHE_MB);
    }

    #[test]
    fn test_json_is_validated() {
        let err = GenesisConfig::from_json_str(r#"{ "shardThreshold": 9 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = GenesisConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        std::fs::write(&path, r#"{ "minAuthLayers": 4, "storage": { "inMemory": true } }"#).unwrap();

        let config = GenesisConfig::from_json_file(&path).unwrap();
        assert_eq!(config.min_auth_layers, 4);

        let missing = GenesisConfig::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(350));
        assert_eq!(retry.backoff_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_derived_components() {
        let config = GenesisConfig::in_memory();
        let scorer = config.scorer().unwrap();
        assert_eq!(scorer.thresholds().high, 6.0);
        assert_eq!(scorer.decay().half_life_secs, 300);
        assert_eq!(config.fuser().min_auth_layers(), 3);
        assert_eq!(config.ledger_config().store_timeout, Duration::from_secs(2));
    }
}
