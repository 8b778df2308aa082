//! Named, typed component registrations with activation status.
//!
//! This crate is the registration engine underneath local sites. It knows
//! nothing about containment or delegation; see `locus-site` for that.
//!
//! # Modules
//!
//! - [`capability`] - Capability descriptors and the capability catalog
//! - [`component`] - The [`Component`] trait and its optional hooks
//! - [`registration`] - [`Registration`] records and their builder
//! - [`registry`] - [`LocalRegistry`], [`RegistrationStack`], transactions
//! - [`error`] - Lookup, configuration, and mutation errors

pub mod capability;
pub mod component;
pub mod error;
pub mod registration;
pub mod registry;

pub use capability::{Capability, CapabilityCatalog, CapabilitySet};
pub use component::{
	BindingAware, Component, ComponentRef, DottedFactory, Factory, FnFactory, Object, Permission,
	SecurityPolicy, downcast_ref, same_component,
};
pub use error::{ConfigurationError, LookupError, RegistryError};
pub use registration::{
	Discriminator, Registration, RegistrationBuilder, RegistrationId, RegistrationKind, Status,
};
pub use registry::{
	ChangeKind, ChangeListener, Commit, LocalRegistry, RegistrationStack, RegistryView, StackId,
	Transaction,
};
