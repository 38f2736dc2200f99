//! The configuration gate.

use crate::config::SyncConfig;
use crate::report::SkipReason;
use possync_core::Identity;
use url::Url;

/// Credential substrings that mark a value copied from a template.
pub const PLACEHOLDER_MARKERS: &[&str] = &["placeholder", "your-anon-key", "changeme"];

/// Outcome of evaluating the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The cycle may run, scoped to this identity.
    Proceed(Identity),
    /// The cycle is a no-op.
    Skip(SkipReason),
}

impl GateDecision {
    /// Returns true if the cycle may run.
    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed(_))
    }
}

/// Decides whether a cycle may run.
///
/// Evaluated fresh for every cycle and never cached: the identity and the
/// configuration are inputs, not state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigGate;

impl ConfigGate {
    /// Evaluates the gate for `identity` under `config`.
    ///
    /// The identity is checked first, so an unresolved identity skips the
    /// cycle even when the endpoint and credential look valid.
    pub fn evaluate(config: &SyncConfig, identity: Option<&Identity>) -> GateDecision {
        let Some(identity) = identity else {
            return GateDecision::Skip(SkipReason::NoIdentity);
        };
        match Self::check_remote(config) {
            Ok(()) => GateDecision::Proceed(identity.clone()),
            Err(reason) => GateDecision::Skip(SkipReason::Unconfigured(reason)),
        }
    }

    /// Checks the shape of the endpoint and credential.
    ///
    /// # Errors
    ///
    /// Returns a description of the first failing check.
    pub fn check_remote(config: &SyncConfig) -> Result<(), String> {
        let host = endpoint_host(&config.remote_url)
            .ok_or_else(|| format!("endpoint {:?} is not an http(s) URL", config.remote_url))?;

        if let Some(suffix) = &config.required_host_suffix {
            if !host.ends_with(suffix.as_str()) {
                return Err(format!("endpoint host {host:?} is not under {suffix:?}"));
            }
        }

        let key = config.access_key.trim();
        if key.is_empty() {
            return Err("access key is empty".into());
        }
        let lowered = key.to_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Err("access key is a placeholder".into());
        }
        if config.remote_url.to_lowercase().contains("placeholder") {
            return Err("endpoint is a placeholder".into());
        }
        Ok(())
    }
}

fn endpoint_host(endpoint: &str) -> Option<String> {
    let url = Url::parse(endpoint).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}
