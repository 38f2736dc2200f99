//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use possync_protocol::EntityKind;
use std::time::Duration;

/// Default period between automatic cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default timeout for a single remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the remote endpoint URL.
const ENV_REMOTE_URL: &str = "POSSYNC_REMOTE_URL";
/// Environment variable holding the access credential.
const ENV_ACCESS_KEY: &str = "POSSYNC_ACCESS_KEY";
/// Environment variable holding the sync interval in seconds.
const ENV_SYNC_INTERVAL_SECS: &str = "POSSYNC_SYNC_INTERVAL_SECS";
/// Environment variable holding the required endpoint host suffix.
const ENV_REQUIRED_HOST_SUFFIX: &str = "POSSYNC_REQUIRED_HOST_SUFFIX";

/// Configuration for sync operations.
///
/// The endpoint and credential are only checked for shape, by the
/// [`crate::ConfigGate`], at the start of every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote endpoint URL.
    pub remote_url: String,
    /// Remote access credential.
    pub access_key: String,
    /// Period between automatic cycles.
    pub sync_interval: Duration,
    /// Entity kinds synchronized, in pull/push order.
    pub entity_kinds: Vec<EntityKind>,
    /// Host suffix the endpoint must carry, e.g. `supabase.co`.
    pub required_host_suffix: Option<String>,
    /// Timeout for a single remote call.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(remote_url: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            access_key: access_key.into(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            entity_kinds: EntityKind::ALL.to_vec(),
            required_host_suffix: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads the configuration from `POSSYNC_*` environment variables.
    ///
    /// Missing endpoint or credential variables yield empty values, which
    /// the gate then refuses.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the interval is not a
    /// positive number of seconds.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let mut config = Self::new(
            lookup(ENV_REMOTE_URL).unwrap_or_default(),
            lookup(ENV_ACCESS_KEY).unwrap_or_default(),
        );

        if let Some(raw) = lookup(ENV_SYNC_INTERVAL_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                SyncError::Configuration(format!("{ENV_SYNC_INTERVAL_SECS} is not a number: {raw:?}"))
            })?;
            if secs == 0 {
                return Err(SyncError::Configuration(format!(
                    "{ENV_SYNC_INTERVAL_SECS} must be positive"
                )));
            }
            config.sync_interval = Duration::from_secs(secs);
        }

        if let Some(suffix) = lookup(ENV_REQUIRED_HOST_SUFFIX).filter(|s| !s.trim().is_empty()) {
            config.required_host_suffix = Some(suffix.trim().to_string());
        }

        Ok(config)
    }

    /// Sets the period between automatic cycles.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the synchronized entity kinds.
    pub fn with_entity_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.entity_kinds = kinds.into_iter().collect();
        self
    }

    /// Requires the endpoint host to end with `suffix`.
    pub fn with_required_host_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.required_host_suffix = Some(suffix.into());
        self
    }

    /// Sets the remote call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://pos.supabase.co", "anon-key")
            .with_sync_interval(Duration::from_secs(60))
            .with_entity_kinds([EntityKind::Expense])
            .with_required_host_suffix("supabase.co")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.remote_url, "https://pos.supabase.co");
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.entity_kinds, vec![EntityKind::Expense]);
        assert_eq!(config.required_host_suffix.as_deref(), Some("supabase.co"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval, Duration::from_secs(300));
        assert_eq!(config.entity_kinds, EntityKind::ALL.to_vec());
        assert!(config.required_host_suffix.is_none());
    }

    #[test]
    fn reads_environment() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_REMOTE_URL, "https://pos.supabase.co"),
            (ENV_ACCESS_KEY, "k"),
            (ENV_SYNC_INTERVAL_SECS, "90"),
            (ENV_REQUIRED_HOST_SUFFIX, "supabase.co"),
        ]))
        .unwrap();

        assert_eq!(config.remote_url, "https://pos.supabase.co");
        assert_eq!(config.access_key, "k");
        assert_eq!(config.sync_interval, Duration::from_secs(90));
        assert_eq!(config.required_host_suffix.as_deref(), Some("supabase.co"));
    }

    #[test]
    fn missing_environment_gives_empty_endpoint() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.remote_url.is_empty());
        assert_eq!(config.sync_interval, DEFAULT_SYNC_INTERVAL);
    }

    #[test]
    fn bad_interval_is_rejected() {
        for raw in ["soon", "0", "-5"] {
            let result = SyncConfig::from_lookup(lookup(&[(ENV_SYNC_INTERVAL_SECS, raw)]));
            assert!(matches!(result, Err(SyncError::Configuration(_))), "{raw}");
        }
    }
}
