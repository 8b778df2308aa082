//! Registrations: named bindings of a component to a capability.
//!
//! A [`Registration`] is created detached ([`Status::Unregistered`]) and joins
//! exactly one [`LocalRegistry`] when it is registered there. From then on its
//! name and status live in that registry's published snapshot, so they always
//! read consistently with the stacks that index them.
//!
//! Identity is by reference: two registrations with equal fields are still
//! different registrations. [`RegistrationId`] exists for logging only.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use crate::capability::Capability;
use crate::component::{ComponentRef, DottedFactory, Permission, SecurityPolicy, downcast_ref};
use crate::error::{ConfigurationError, RegistryError};
use crate::registry::{LocalRegistry, Shared};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique registration number, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistrationId(u64);

impl RegistrationId {
	fn next() -> Self {
		Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for RegistrationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "registration#{}", self.0)
	}
}

/// Lifecycle status of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
	/// Not part of any registry.
	#[default]
	Unregistered,
	/// Registered but not providing its component.
	Inactive,
	/// Providing its component under its name.
	Active,
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Unregistered => "unregistered",
			Self::Inactive => "inactive",
			Self::Active => "active",
		})
	}
}

/// What kind of lookup a registration answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationKind {
	/// A singleton looked up by capability and name.
	Utility,
	/// A factory adapting objects that satisfy `required` and `with`.
	///
	/// `required: None` adapts anything. Views are adapters whose last
	/// `with` entry is the request layer.
	Adapter {
		required: Option<Capability>,
		with: Box<[Capability]>,
	},
}

impl RegistrationKind {
	pub fn is_utility(&self) -> bool {
		matches!(self, Self::Utility)
	}

	/// All capabilities adapted objects must satisfy, in position order.
	/// Empty for utilities.
	pub fn required(&self) -> Vec<Capability> {
		match self {
			Self::Utility => Vec::new(),
			Self::Adapter { required, with } => {
				let mut all = Vec::with_capacity(with.len() + 1);
				all.push(required.clone().unwrap_or_else(Capability::any));
				all.extend(with.iter().cloned());
				all
			}
		}
	}
}

/// Key identifying what a registration provides, used to detect conflicting
/// registrations in registries that allow only one per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Discriminator {
	Utility {
		provided: Box<str>,
		name: Box<str>,
	},
	Adapter {
		required: Box<[Box<str>]>,
		provided: Box<str>,
		name: Box<str>,
	},
}

impl fmt::Display for Discriminator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Utility { provided, name } => write!(f, "utility({provided}, {name:?})"),
			Self::Adapter {
				required,
				provided,
				name,
			} => write!(f, "adapter([{}], {provided}, {name:?})", required.join(", ")),
		}
	}
}

/// A named binding of a component to a capability.
pub struct Registration {
	id: RegistrationId,
	kind: RegistrationKind,
	provided: Capability,
	component: ComponentRef,
	permission: Option<Permission>,
	allowed: Box<[Box<str>]>,
	/// Last name known outside a registry; the owner's snapshot wins while
	/// registered.
	detached_name: RwLock<Box<str>>,
	owner: OnceLock<Weak<Shared>>,
}

impl Registration {
	/// Starts a utility registration.
	pub fn utility(
		name: impl Into<Box<str>>,
		provided: Capability,
		component: ComponentRef,
	) -> RegistrationBuilder {
		RegistrationBuilder::new(name.into(), RegistrationKind::Utility, provided, component)
	}

	/// Starts an adapter registration; `factory` must implement
	/// [`crate::Factory`] or be a [`DottedFactory`].
	pub fn adapter(
		name: impl Into<Box<str>>,
		provided: Capability,
		factory: ComponentRef,
	) -> RegistrationBuilder {
		RegistrationBuilder::new(
			name.into(),
			RegistrationKind::Adapter {
				required: None,
				with: Box::default(),
			},
			provided,
			factory,
		)
	}

	/// Starts a view registration: an adapter of `for_` plus the request
	/// `layer`.
	pub fn view(
		name: impl Into<Box<str>>,
		provided: Capability,
		factory: ComponentRef,
		for_: &[Capability],
		layer: Capability,
	) -> RegistrationBuilder {
		let mut builder = Self::adapter(name, provided, factory);
		builder.view = true;
		if let RegistrationKind::Adapter { required, with } = &mut builder.kind {
			*required = for_.first().cloned();
			let mut rest: Vec<Capability> = for_.iter().skip(1).cloned().collect();
			rest.push(layer);
			*with = rest.into();
		}
		builder.view_for = for_.len();
		builder
	}

	pub fn id(&self) -> RegistrationId {
		self.id
	}

	pub fn kind(&self) -> &RegistrationKind {
		&self.kind
	}

	pub fn provided(&self) -> &Capability {
		&self.provided
	}

	/// The registered component. Not owned: it lives wherever it was
	/// installed and is only referenced here.
	pub fn component(&self) -> &ComponentRef {
		&self.component
	}

	pub fn permission(&self) -> Option<&Permission> {
		self.permission.as_ref()
	}

	/// Dotted path of the factory when it is registered by name.
	pub fn factory_name(&self) -> Option<&str> {
		downcast_ref::<DottedFactory>(&*self.component).map(DottedFactory::path)
	}

	pub fn allowed(&self) -> &[Box<str>] {
		&self.allowed
	}

	/// Current name: the owning registry's view while registered, else the
	/// last name given.
	pub fn name(&self) -> String {
		if let Some(shared) = self.owner_shared()
			&& let Some(name) = shared.load().name_of(self.id)
		{
			return name.to_string();
		}
		self.detached_name.read().to_string()
	}

	pub fn status(&self) -> Status {
		match self.owner_shared() {
			Some(shared) => shared.load().status_of(self.id),
			None => Status::Unregistered,
		}
	}

	pub fn is_active(&self) -> bool {
		self.status() == Status::Active
	}

	/// Makes this registration the active one under its name.
	pub fn activate(&self) -> Result<(), RegistryError> {
		self.registry()?.activate(self)
	}

	pub fn deactivate(&self) -> Result<(), RegistryError> {
		self.registry()?.deactivate(self)
	}

	/// Changes the name of an inactive or unregistered registration.
	///
	/// Fails with [`RegistryError::InvalidState`] while active; use
	/// [`LocalRegistry::rename`] to rename whatever the status.
	pub fn rename(&self, new_name: &str) -> Result<(), RegistryError> {
		match self.owner_shared() {
			Some(shared) if shared.load().contains(self.id) => {
				LocalRegistry::from_shared(shared).rename_inactive(self, new_name)
			}
			_ => {
				self.set_detached_name(new_name);
				Ok(())
			}
		}
	}

	/// The component, wrapped by `policy` when a permission is attached.
	pub fn secured_component(&self, policy: Option<&dyn SecurityPolicy>) -> ComponentRef {
		match (policy, &self.permission) {
			(Some(policy), Some(permission)) => policy.wrap(self.component.clone(), permission),
			_ => self.component.clone(),
		}
	}

	/// Key used to detect conflicting registrations.
	pub fn discriminator(&self) -> Discriminator {
		self.keyed(self.name().into())
	}

	/// The discriminator without the name. Registrations sharing a slot
	/// compete for activation under each name; registrations in different
	/// slots never displace each other.
	pub fn slot(&self) -> Discriminator {
		self.keyed(Box::default())
	}

	fn keyed(&self, name: Box<str>) -> Discriminator {
		let provided: Box<str> = self.provided.id().into();
		match &self.kind {
			RegistrationKind::Utility => Discriminator::Utility { provided, name },
			kind @ RegistrationKind::Adapter { .. } => Discriminator::Adapter {
				required: kind.required().iter().map(|c| c.id().into()).collect(),
				provided,
				name,
			},
		}
	}

	/// The registry this registration belongs to.
	pub fn registry(&self) -> Result<LocalRegistry, RegistryError> {
		match self.owner.get() {
			None => Err(RegistryError::NotRegistered { id: self.id }),
			Some(weak) => weak
				.upgrade()
				.map(LocalRegistry::from_shared)
				.ok_or(RegistryError::RegistryGone),
		}
	}

	pub fn same(a: &Arc<Registration>, b: &Arc<Registration>) -> bool {
		Arc::ptr_eq(a, b)
	}

	fn owner_shared(&self) -> Option<Arc<Shared>> {
		self.owner.get().and_then(Weak::upgrade)
	}

	/// Binds this registration to `shared`, or fails if another registry
	/// already owns it.
	pub(crate) fn claim(&self, shared: &Arc<Shared>) -> Result<(), ConfigurationError> {
		let weak = self.owner.get_or_init(|| Arc::downgrade(shared));
		if std::ptr::eq(weak.as_ptr(), Arc::as_ptr(shared)) {
			Ok(())
		} else {
			Err(ConfigurationError::ForeignRegistry { id: self.id })
		}
	}

	pub(crate) fn detached_name(&self) -> Box<str> {
		self.detached_name.read().clone()
	}

	pub(crate) fn set_detached_name(&self, name: &str) {
		*self.detached_name.write() = name.into();
	}
}

impl fmt::Debug for Registration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registration")
			.field("id", &self.id)
			.field("name", &self.name())
			.field("kind", &self.kind)
			.field("provided", &self.provided)
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}

/// Validating builder for [`Registration`].
pub struct RegistrationBuilder {
	name: Box<str>,
	kind: RegistrationKind,
	provided: Capability,
	component: ComponentRef,
	permission: Option<Permission>,
	allowed: Vec<Box<str>>,
	view: bool,
	view_for: usize,
}

impl RegistrationBuilder {
	fn new(
		name: Box<str>,
		kind: RegistrationKind,
		provided: Capability,
		component: ComponentRef,
	) -> Self {
		Self {
			name,
			kind,
			provided,
			component,
			permission: None,
			allowed: Vec::new(),
			view: false,
			view_for: 0,
		}
	}

	/// Capability of the adapted object. Ignored for utilities.
	pub fn required(mut self, cap: Capability) -> Self {
		if let RegistrationKind::Adapter { required, .. } = &mut self.kind {
			*required = Some(cap);
		}
		self
	}

	/// Capabilities of additional adapted objects. Ignored for utilities.
	pub fn with(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
		if let RegistrationKind::Adapter { with, .. } = &mut self.kind {
			*with = caps.into_iter().collect();
		}
		self
	}

	pub fn permission(mut self, permission: Permission) -> Self {
		self.permission = Some(permission);
		self
	}

	/// Names a permission guards. Requires [`Self::permission`].
	pub fn allow(mut self, names: impl IntoIterator<Item = impl Into<Box<str>>>) -> Self {
		self.allowed.extend(names.into_iter().map(Into::into));
		self
	}

	pub fn build(self) -> Result<Arc<Registration>, ConfigurationError> {
		let name = self.name.to_string();
		match &self.kind {
			RegistrationKind::Utility => {
				if !self.provided.provided_by(&*self.component) {
					return Err(ConfigurationError::NotProvided {
						name,
						capability: self.provided.id().to_string(),
					});
				}
			}
			RegistrationKind::Adapter { .. } => {
				if self.view && self.view_for == 0 {
					return Err(ConfigurationError::MissingRequired { name });
				}
				let named = downcast_ref::<DottedFactory>(&*self.component);
				if named.is_some_and(|f| !f.path().contains('.')) {
					return Err(ConfigurationError::MissingFactory { name });
				}
				if self.component.factory().is_none() && named.is_none() {
					return Err(ConfigurationError::MissingFactory { name });
				}
			}
		}
		if !self.allowed.is_empty() && self.permission.is_none() {
			return Err(ConfigurationError::MissingPermission { name });
		}

		Ok(Arc::new(Registration {
			id: RegistrationId::next(),
			kind: self.kind,
			provided: self.provided,
			component: self.component,
			permission: self.permission,
			allowed: self.allowed.into(),
			detached_name: RwLock::new(self.name),
			owner: OnceLock::new(),
		}))
	}
}
