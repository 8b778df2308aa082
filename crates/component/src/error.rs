use crate::registration::{RegistrationId, Status};

/// Malformed registration setup, detected when a registration is built or
/// installed. Fatal to that registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
	/// An adapter or view was given a component that cannot create adapters.
	#[error("no factory specified for registration {name:?}")]
	MissingFactory { name: String },
	/// A view was declared without any capabilities to adapt.
	#[error("no required capabilities specified for view {name:?}")]
	MissingRequired { name: String },
	/// Allowed names were given without the permission protecting them.
	#[error("registration {name:?} lists allowed names but no permission")]
	MissingPermission { name: String },
	/// A utility component does not provide the capability it is registered for.
	#[error("component registered as {name:?} does not provide {capability}")]
	NotProvided { name: String, capability: String },
	/// Two registrations share the same discriminator in one registry.
	#[error("conflicting registration: {discriminator}")]
	Conflict { discriminator: String },
	/// A capability id was defined twice with different bases.
	#[error("capability {id} already defined with different bases")]
	CapabilityRedefined { id: String },
	/// A registration was handed to a registry other than the one that owns it.
	#[error("{id} belongs to another registry")]
	ForeignRegistry { id: RegistrationId },
	/// Containment ended before reaching a root while attaching a site.
	#[error("not enough context information to attach site at {location:?}")]
	NotEnoughContext { location: String },
	/// A location was marked as a site twice.
	#[error("{location:?} is already a site")]
	AlreadySite { location: String },
}

/// Mutation failures against a local registry. Any of these aborts the
/// enclosing transaction; nothing staged before the failure is published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	/// Operation requires a status the registration does not have.
	#[error("{id} ({name:?}) is {status}; operation requires it inactive")]
	InvalidState {
		id: RegistrationId,
		name: String,
		status: Status,
	},
	/// More than one registration in a stack reports Active.
	#[error("invariant violation: {active} active registrations under {name:?}")]
	InvariantViolation { name: String, active: usize },
	/// The registration is not part of this registry.
	#[error("{id} is not registered")]
	NotRegistered { id: RegistrationId },
	/// The registration is already part of this registry.
	#[error("{id} is already registered under {name:?}")]
	AlreadyRegistered { id: RegistrationId, name: String },
	/// A registration was added to a stack carrying a different name.
	#[error("{id} is named {registration:?} and cannot join stack {stack:?}")]
	NameMismatch {
		id: RegistrationId,
		stack: String,
		registration: String,
	},
	/// Restoring Active after a rename would displace another active registration.
	#[error("cannot restore {id} as active under {name:?}: {active} is active there")]
	ActiveConflict {
		id: RegistrationId,
		name: String,
		active: RegistrationId,
	},
	/// The registry behind a stack handle or registration has been dropped.
	#[error("owning registry no longer exists")]
	RegistryGone,
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),
}

/// A requested component cannot be found.
///
/// Returned by the strict `get_*` lookups. The `query_*` variants return
/// `Ok(None)` for a plain miss and only fail for the non-miss cases
/// ([`LookupError::Registry`], [`LookupError::DelegationTooDeep`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
	#[error("no utility providing {capability} named {name:?}")]
	Utility { capability: String, name: String },
	#[error("no adapter to {capability} named {name:?}")]
	Adapter { capability: String, name: String },
	#[error("no view named {name:?} providing {capability}")]
	View { capability: String, name: String },
	#[error("no active component named {name:?}")]
	Component { name: String },
	#[error("no site manager for {location:?}")]
	SiteManager { location: String },
	#[error("no next site manager: chain continues at the global registry")]
	NextSiteManager,
	#[error("cannot traverse to {name:?} under {path:?}")]
	Traversal { path: String, name: String },
	/// The winning adapter names a factory that cannot be resolved.
	#[error("adapter factory {factory:?} is unavailable: {reason}")]
	Factory { factory: String, reason: String },
	#[error("delegation chain exceeded {depth} hops")]
	DelegationTooDeep { depth: usize },
	#[error(transparent)]
	Registry(#[from] RegistryError),
}
