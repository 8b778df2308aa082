//! Site configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! manager_name = "++etc++site"
//! default_folder = "default"
//! max_delegation_depth = 64
//! module_suffix = ".mod"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;


/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A field holds a value the engine cannot work with.
	#[error("invalid value for {field}: {reason}")]
	Invalid {
		field: &'static str,
		reason: &'static str,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Tunables shared by every site under one global registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
	/// Path segment naming a site manager in component paths.
	pub manager_name: String,
	/// Management folder created with every site manager.
	pub default_folder: String,
	/// Upper bound on `next` hops during delegation.
	pub max_delegation_depth: usize,
	/// Suffix tried first when finding a module in a management folder.
	pub module_suffix: String,
}

impl Default for SiteConfig {
	fn default() -> Self {
		Self {
			manager_name: "++etc++site".into(),
			default_folder: "default".into(),
			max_delegation_depth: 64,
			module_suffix: ".mod".into(),
		}
	}
}

impl SiteConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&input)?;
		tracing::debug!(path = %path.display(), "loaded site config");
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.max_delegation_depth == 0 {
			return Err(ConfigError::Invalid {
				field: "max_delegation_depth",
				reason: "must be at least 1",
			});
		}
		if self.manager_name.is_empty() || self.manager_name.contains('/') {
			return Err(ConfigError::Invalid {
				field: "manager_name",
				reason: "must be a single non-empty path segment",
			});
		}
		if self.default_folder.is_empty() || self.default_folder.contains('/') {
			return Err(ConfigError::Invalid {
				field: "default_folder",
				reason: "must be a single non-empty path segment",
			});
		}
		Ok(())
	}
}
