//! Local sites: component registries layered over a global registry.
//!
//! A site is a node of a containment tree that owns a [`SiteManager`]. Its
//! registrations override those of enclosing sites for everything inside it,
//! and lookups it cannot answer are delegated outward until the
//! [`GlobalRegistry`] is reached.
//!
//! # Modules
//!
//! - [`location`] - Containment ([`Location`], [`Folder`])
//! - [`manager`] - [`SiteManager`]: attachment, subsites, delegated lookup
//! - [`global`] - The process-wide [`GlobalRegistry`]
//! - [`lookup`] - The [`ComponentLookup`] interface both implement
//! - [`next`] - Next-site-manager helpers and site discovery
//! - [`context`] - Request-scoped current site ([`RequestContext`], [`Request`])
//! - [`module`] - Dotted-name modules and their resolution
//! - [`event`] - Site lifecycle events
//! - [`config`] - [`SiteConfig`]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod global;
pub mod location;
pub mod lookup;
pub mod manager;
pub mod module;
pub mod next;

pub use config::{ConfigError, SiteConfig};
pub use context::{Request, RequestContext, SiteScope};
pub use error::{ImportError, SiteError};
pub use event::{EventBus, SiteEvent};
pub use global::GlobalRegistry;
pub use location::{Folder, Location, inside, location_path};
pub use lookup::{AdapterMatch, ComponentLookup};
pub use manager::{ComponentEntry, ComponentFilter, ManagementFolder, Next, SiteManager};
pub use module::{Module, ModuleNamespace, module_capability};
pub use next::{get_next_site_manager, lookup_target_for, query_next_site_manager, site_manager_for};
