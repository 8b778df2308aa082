use locus_component::{ConfigurationError, LookupError, RegistryError};

use crate::config::ConfigError;

/// Dotted-name resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
	/// No management folder, enclosing site, or global namespace has it.
	#[error("no module named {name:?}")]
	NotFound { name: String },
	/// The module exists but lacks the attribute.
	#[error("module {module:?} has no attribute {attr:?}")]
	Attribute { module: String, attr: String },
	/// Empty segments, or no `.` where an attribute path is expected.
	#[error("invalid dotted name {name:?}")]
	InvalidName { name: String },
}

/// Any failure a site-level operation can report.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
	#[error(transparent)]
	Lookup(#[from] LookupError),
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error(transparent)]
	Import(#[from] ImportError),
	#[error(transparent)]
	Config(#[from] ConfigError),
}
