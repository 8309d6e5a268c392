//! Orchestrator configuration

use serde::{Deserialize, Serialize};

/// Configuration problems detected at load time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Data series window is empty or inverted
    #[error("invalid data series window: {first}..={last}")]
    InvalidSeriesWindow {
        /// Configured first year
        first: u16,
        /// Configured last year
        last: u16,
    },

    /// A limit was configured as zero
    #[error("limit `{0}` must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Input limits applied by the mutation orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Year of the first data series cell
    pub series_first_year: u16,
    /// Year of the last data series cell
    pub series_last_year: u16,
    /// Maximum length of names and indicator parameters
    pub max_name_length: usize,
    /// Maximum number of links on one resource
    pub max_links_per_resource: usize,
}

impl OrchestratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different data series window
    #[inline]
    #[must_use]
    pub fn with_series_window(mut self, first: u16, last: u16) -> Self {
        self.series_first_year = first;
        self.series_last_year = last;
        self
    }

    /// Number of yearly cells a data series may hold
    #[inline]
    #[must_use]
    pub fn series_len(&self) -> usize {
        usize::from(self.series_last_year.saturating_sub(self.series_first_year)) + 1
    }

    /// Reject inconsistent settings
    ///
    /// # Errors
    /// [`ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.series_first_year > self.series_last_year {
            return Err(ConfigError::InvalidSeriesWindow {
                first: self.series_first_year,
                last: self.series_last_year,
            });
        }
        if self.max_name_length == 0 {
            return Err(ConfigError::ZeroLimit("max_name_length"));
        }
        if self.max_links_per_resource == 0 {
            return Err(ConfigError::ZeroLimit("max_links_per_resource"));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            series_first_year: 2020,
            series_last_year: 2050,
            max_name_length: 255,
            max_links_per_resource: 64,
        }
    }
}
