//! Item search settings.

use std::env;

/// Paging limits for `POST /search`.
#[derive(Debug, Clone)]
pub struct StacConfig {
    /// Items requested per page (`limit`).
    pub page_size: usize,
    /// Pages followed through `next` links before giving up.
    pub max_pages: usize,
}

impl Default for StacConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 20,
        }
    }
}

impl StacConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: env::var("STAC_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.page_size),
            max_pages: env::var("STAC_MAX_PAGES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_pages),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page_size must be > 0".to_string());
        }
        if self.max_pages == 0 {
            return Err("max_pages must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StacConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = StacConfig {
            page_size: 0,
            ..StacConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
