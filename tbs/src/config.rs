use serde::Deserialize;

use crate::broker::Priority;
use crate::error::{Error, Result};

pub const DEFAULT_LIBRARY: &str = "tbs.dll";

/// Largest response `Tbsip_Submit_Command` is given room for by default.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 4096;

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Name or path of the broker library.
    pub library: String,
    /// Capacity of the response buffer handed to the broker.
    pub max_response_size: usize,
    /// Scheduling class for submitted commands.
    pub priority: Priority,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            library: DEFAULT_LIBRARY.to_string(),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            priority: Priority::Normal,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.library.is_empty() {
            return Err(Error::Config("library name is empty".to_string()));
        }
        if self.max_response_size == 0 {
            return Err(Error::Config("max_response_size must be non-zero".to_string()));
        }
        if u32::try_from(self.max_response_size).is_err() {
            return Err(Error::Config(format!(
                "max_response_size {} does not fit in 32 bits",
                self.max_response_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.library, "tbs.dll");
        assert_eq!(config.max_response_size, 4096);
        assert_eq!(config.priority, Priority::Normal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_response_size_is_rejected() {
        let config = BrokerConfig {
            max_response_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_library_is_rejected() {
        let config = BrokerConfig {
            library: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
