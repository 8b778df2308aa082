//! Named namespaces of components, resolvable by dotted name.

use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use locus_component::{Capability, CapabilitySet, Component, ComponentRef};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ImportError;

static MODULE: LazyLock<Capability> = LazyLock::new(|| Capability::new("locus.Module"));

/// Capability every [`Module`] provides.
pub fn module_capability() -> Capability {
	MODULE.clone()
}

/// A named namespace of attributes.
///
/// Modules are components, so they can sit in management folders next to
/// any other installed object.
pub struct Module {
	name: Box<str>,
	capabilities: CapabilitySet,
	attrs: RwLock<IndexMap<Box<str>, ComponentRef>>,
}

impl Module {
	pub fn new(name: impl Into<Box<str>>) -> Arc<Self> {
		Arc::new(Self {
			name: name.into(),
			capabilities: module_capability().into(),
			attrs: RwLock::new(IndexMap::new()),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Binds `attr`, replacing any previous value.
	pub fn set(&self, attr: impl Into<Box<str>>, value: ComponentRef) {
		self.attrs.write().insert(attr.into(), value);
	}

	pub fn get(&self, attr: &str) -> Option<ComponentRef> {
		self.attrs.read().get(attr).cloned()
	}

	/// Like [`Self::get`], failing with [`ImportError::Attribute`].
	pub fn attribute(&self, attr: &str) -> Result<ComponentRef, ImportError> {
		self.get(attr).ok_or_else(|| ImportError::Attribute {
			module: self.name.to_string(),
			attr: attr.to_string(),
		})
	}

	pub fn attr_names(&self) -> Vec<String> {
		self.attrs.read().keys().map(|k| k.to_string()).collect()
	}

	/// Recovers a module stored as a plain component.
	pub fn from_component(component: &ComponentRef) -> Option<Arc<Self>> {
		let any: Arc<dyn std::any::Any + Send + Sync> = component.clone();
		any.downcast::<Self>().ok()
	}
}

impl Component for Module {
	fn capabilities(&self) -> &CapabilitySet {
		&self.capabilities
	}
}

impl fmt::Debug for Module {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Module")
			.field("name", &self.name)
			.field("attrs", &self.attrs.read().len())
			.finish()
	}
}

/// Modules indexed by full dotted name.
#[derive(Default)]
pub struct ModuleNamespace {
	modules: RwLock<FxHashMap<Box<str>, Arc<Module>>>,
}

impl ModuleNamespace {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `module` under its name, returning the module it replaced.
	pub fn insert(&self, module: Arc<Module>) -> Option<Arc<Module>> {
		let name: Box<str> = module.name().into();
		self.modules.write().insert(name, module)
	}

	pub fn get(&self, name: &str) -> Option<Arc<Module>> {
		self.modules.read().get(name).cloned()
	}

	pub fn remove(&self, name: &str) -> Option<Arc<Module>> {
		self.modules.write().remove(name)
	}

	/// Names in sorted order.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.modules.read().keys().map(|k| k.to_string()).collect();
		names.sort();
		names
	}
}

impl fmt::Debug for ModuleNamespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.names()).finish()
	}
}

/// Splits `a.b.attr` into `("a.b", "attr")`.
pub fn split_dotted(name: &str) -> Result<(&str, &str), ImportError> {
	let invalid = || ImportError::InvalidName {
		name: name.to_string(),
	};
	let (module, attr) = name.rsplit_once('.').ok_or_else(invalid)?;
	if attr.is_empty() || module.split('.').any(str::is_empty) {
		return Err(invalid());
	}
	Ok((module, attr))
}
