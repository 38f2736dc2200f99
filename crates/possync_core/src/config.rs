//! Local database configuration.

/// Default number of audit entries kept before the oldest are evicted.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Configuration for opening a [`crate::LocalDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Maximum number of audit entries retained.
    pub audit_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl DatabaseConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the audit log capacity. A capacity of zero is raised to one.
    #[must_use]
    pub fn audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_one_thousand() {
        assert_eq!(DatabaseConfig::default().audit_capacity, 1000);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(DatabaseConfig::new().audit_capacity(0).audit_capacity, 1);
    }
}
