//! Mount configuration for the FUSE filesystem.

use crate::attr::{DEFAULT_ATTR_TTL, DEFAULT_NEGATIVE_TTL};
use std::time::Duration;

/// Configuration options for the FUSE filesystem.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Time-to-live for cached attributes and directory listings.
    ///
    /// Default: 1 second.
    pub attr_ttl: Duration,

    /// Time-to-live for negative lookups (ENOENT). Zero disables them.
    ///
    /// Default: 500ms.
    pub negative_ttl: Duration,

    /// Memoize virtual-to-real resolutions.
    ///
    /// Turning this off never changes what the mount shows, only how often
    /// directories are rescanned. Default: enabled.
    pub path_cache: bool,

    /// Unmount automatically when the process exits.
    ///
    /// Default: false.
    pub auto_unmount: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            attr_ttl: DEFAULT_ATTR_TTL,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            path_cache: true,
            auto_unmount: false,
        }
    }
}

impl MountConfig {
    /// Creates a configuration with custom TTL values.
    pub fn with_ttl(attr_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            attr_ttl,
            negative_ttl,
            ..Default::default()
        }
    }

    /// Sets the cache TTL for attributes and listings.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    /// Sets the cache TTL for negative entries.
    #[must_use]
    pub fn negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    /// Enables or disables the resolution cache.
    #[must_use]
    pub fn path_cache(mut self, enabled: bool) -> Self {
        self.path_cache = enabled;
        self
    }

    #[must_use]
    pub fn auto_unmount(mut self, enabled: bool) -> Self {
        self.auto_unmount = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MountConfig::default();
        assert_eq!(config.attr_ttl, Duration::from_secs(1));
        assert_eq!(config.negative_ttl, Duration::from_millis(500));
        assert!(config.path_cache);
        assert!(!config.auto_unmount);
    }

    #[test]
    fn test_with_ttl() {
        let config = MountConfig::with_ttl(Duration::from_secs(5), Duration::ZERO);
        assert_eq!(config.attr_ttl, Duration::from_secs(5));
        assert_eq!(config.negative_ttl, Duration::ZERO);
        assert!(config.path_cache);
    }

    #[test]
    fn test_builder_pattern() {
        let config = MountConfig::default()
            .attr_ttl(Duration::from_secs(10))
            .negative_ttl(Duration::from_millis(50))
            .path_cache(false)
            .auto_unmount(true);
        assert_eq!(config.attr_ttl, Duration::from_secs(10));
        assert_eq!(config.negative_ttl, Duration::from_millis(50));
        assert!(!config.path_cache);
        assert!(config.auto_unmount);
    }
}
