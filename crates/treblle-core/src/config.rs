//! Middleware configuration.

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_BODY_SIZE;
use crate::error::{Error, Result};
use crate::mask::FieldsToMask;

/// Configuration of a Treblle integration.
///
/// # Environment Variables
///
/// - `TREBLLE_API_KEY` - Collector credential
/// - `TREBLLE_PROJECT_ID` - Monitored project identifier
/// - `TREBLLE_ADDITIONAL_FIELDS_TO_MASK` - Comma-separated extra field names to mask
/// - `TREBLLE_MAX_BODY_SIZE` - Largest body, in bytes, captured into a payload
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct TreblleConfig {
    /// Treblle api key
    #[cfg_attr(
        feature = "config",
        arg(long = "treblle-api-key", env = "TREBLLE_API_KEY")
    )]
    #[serde(default)]
    pub api_key: Option<String>,

    /// Treblle project id
    #[cfg_attr(
        feature = "config",
        arg(long = "treblle-project-id", env = "TREBLLE_PROJECT_ID")
    )]
    #[serde(default)]
    pub project_id: Option<String>,

    /// Extra field names to mask, merged with the default set
    #[cfg_attr(
        feature = "config",
        arg(
            long = "treblle-mask-fields",
            env = "TREBLLE_ADDITIONAL_FIELDS_TO_MASK",
            value_delimiter = ','
        )
    )]
    #[serde(default)]
    pub additional_fields_to_mask: Vec<String>,

    /// Largest request or response body, in bytes, captured into a payload
    #[cfg_attr(
        feature = "config",
        arg(
            long = "treblle-max-body-size",
            env = "TREBLLE_MAX_BODY_SIZE",
            default_value_t = DEFAULT_MAX_BODY_SIZE
        )
    )]
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

impl Default for TreblleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            additional_fields_to_mask: Vec::new(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl TreblleConfig {
    /// Creates a configuration for the given credentials.
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    /// Reads the configuration from `TREBLLE_*` environment variables.
    ///
    /// Unset variables fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let additional_fields_to_mask = non_empty("TREBLLE_ADDITIONAL_FIELDS_TO_MASK")
            .map(|fields| {
                fields
                    .split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let max_body_size = match non_empty("TREBLLE_MAX_BODY_SIZE") {
            Some(size) => size.trim().parse::<usize>().map_err(|error| {
                Error::configuration()
                    .with_message(format!("TREBLLE_MAX_BODY_SIZE is not a size: {size}"))
                    .with_source(error)
            })?,
            None => default_max_body_size(),
        };

        Ok(Self {
            api_key: non_empty("TREBLLE_API_KEY"),
            project_id: non_empty("TREBLLE_PROJECT_ID"),
            additional_fields_to_mask,
            max_body_size,
        })
    }

    /// Adds extra field names to mask.
    pub fn with_additional_fields_to_mask<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_fields_to_mask
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Sets the largest captured body size.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Returns whether both the api key and the project id are set.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.api_key) && present(&self.project_id)
    }

    /// Returns the default masked fields merged with the configured ones.
    #[must_use]
    pub fn fields_to_mask(&self) -> FieldsToMask {
        FieldsToMask::with_additional(&self.additional_fields_to_mask)
    }

    /// Validates configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_body_size == 0 {
            return Err(Error::configuration().with_message("max body size must be positive"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TreblleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreblleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("project_id", &self.project_id)
            .field("additional_fields_to_mask", &self.additional_fields_to_mask)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}
