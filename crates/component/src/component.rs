//! Components and the optional capabilities the registry cares about.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::capability::CapabilitySet;

/// Shared reference to a component. Identity is by pointer.
pub type ComponentRef = Arc<dyn Component>;

/// Anything that can be registered, adapted, or looked up.
///
/// The registry never inspects a component beyond its capability set and the
/// two optional hooks below.
pub trait Component: Any + Send + Sync + fmt::Debug {
	/// Capabilities this component satisfies.
	fn capabilities(&self) -> &CapabilitySet;

	/// Hook for components that want `bound`/`unbound` notifications.
	fn binding(&self) -> Option<&dyn BindingAware> {
		None
	}

	/// Hook for components that create adapters or views.
	fn factory(&self) -> Option<&dyn Factory> {
		None
	}
}

/// Notified when an active registration starts or stops providing a component.
pub trait BindingAware {
	fn bound(&self, name: &str);
	fn unbound(&self, name: &str);
}

/// Creates an adapter for a tuple of adapted objects.
pub trait Factory {
	fn create(&self, objects: &[ComponentRef]) -> ComponentRef;
}

/// Returns true if both references point at the same component.
pub fn same_component(a: &ComponentRef, b: &ComponentRef) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Downcasts a component to its concrete type.
pub fn downcast_ref<T: Component>(component: &dyn Component) -> Option<&T> {
	let any: &dyn Any = component;
	any.downcast_ref::<T>()
}

/// Opaque access-control tag attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission(Box<str>);

impl Permission {
	pub const PUBLIC: &'static str = "locus.Public";

	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self(id.into())
	}

	pub fn public() -> Self {
		Self::new(Self::PUBLIC)
	}

	pub fn id(&self) -> &str {
		&self.0
	}

	pub fn is_public(&self) -> bool {
		&*self.0 == Self::PUBLIC
	}
}

impl fmt::Display for Permission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Decorates a component with access control. The registry only calls
/// [`SecurityPolicy::wrap`]; what the wrapper enforces is up to the policy.
pub trait SecurityPolicy: Send + Sync {
	fn wrap(&self, component: ComponentRef, permission: &Permission) -> ComponentRef;
}

/// A plain component: a label plus the capabilities it satisfies.
pub struct Object {
	label: Box<str>,
	capabilities: CapabilitySet,
}

impl Object {
	pub fn new(label: impl Into<Box<str>>, capabilities: impl Into<CapabilitySet>) -> Self {
		Self {
			label: label.into(),
			capabilities: capabilities.into(),
		}
	}

	/// Convenience for `Arc::new(Object::new(..))` as a [`ComponentRef`].
	pub fn shared(label: impl Into<Box<str>>, capabilities: impl Into<CapabilitySet>) -> ComponentRef {
		Arc::new(Self::new(label, capabilities))
	}

	pub fn label(&self) -> &str {
		&self.label
	}
}

impl Component for Object {
	fn capabilities(&self) -> &CapabilitySet {
		&self.capabilities
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Object").field("label", &self.label).finish()
	}
}

/// Adapter factory backed by a closure.
pub struct FnFactory<F> {
	capabilities: CapabilitySet,
	create: F,
}

impl<F> FnFactory<F>
where
	F: Fn(&[ComponentRef]) -> ComponentRef + Send + Sync + 'static,
{
	pub fn new(create: F) -> Self {
		Self {
			capabilities: CapabilitySet::new(),
			create,
		}
	}

	pub fn shared(create: F) -> ComponentRef {
		Arc::new(Self::new(create))
	}
}

impl<F> Component for FnFactory<F>
where
	F: Fn(&[ComponentRef]) -> ComponentRef + Send + Sync + 'static,
{
	fn capabilities(&self) -> &CapabilitySet {
		&self.capabilities
	}

	fn factory(&self) -> Option<&dyn Factory> {
		Some(self)
	}
}

impl<F> Factory for FnFactory<F>
where
	F: Fn(&[ComponentRef]) -> ComponentRef + Send + Sync + 'static,
{
	fn create(&self, objects: &[ComponentRef]) -> ComponentRef {
		(self.create)(objects)
	}
}

impl<F> fmt::Debug for FnFactory<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FnFactory").finish_non_exhaustive()
	}
}

/// An adapter factory named by a dotted path (`pkg.module.attr`) instead of
/// held directly.
///
/// Registries never call it. Whoever answers an adapter lookup resolves the
/// name in its own module namespace, so a site can shadow the factory of an
/// enclosing site by providing a module of the same name.
pub struct DottedFactory {
	path: Box<str>,
	capabilities: CapabilitySet,
}

impl DottedFactory {
	pub fn new(path: impl Into<Box<str>>) -> Self {
		Self {
			path: path.into(),
			capabilities: CapabilitySet::new(),
		}
	}

	pub fn shared(path: impl Into<Box<str>>) -> ComponentRef {
		Arc::new(Self::new(path))
	}

	pub fn path(&self) -> &str {
		&self.path
	}
}

impl Component for DottedFactory {
	fn capabilities(&self) -> &CapabilitySet {
		&self.capabilities
	}
}

impl fmt::Debug for DottedFactory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("DottedFactory").field(&self.path).finish()
	}
}
