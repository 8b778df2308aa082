use std::fmt;

use indexmap::IndexMap;
use locus_component::ComponentRef;
use parking_lot::RwLock;

/// A named container inside a site manager holding installed components.
///
/// Registrations only reference components; the folder is where they live.
pub struct ManagementFolder {
	name: Box<str>,
	path: Box<str>,
	items: RwLock<IndexMap<Box<str>, ComponentRef>>,
}

impl ManagementFolder {
	pub(crate) fn new(name: &str, path: String) -> Self {
		Self {
			name: name.into(),
			path: path.into(),
			items: RwLock::new(IndexMap::new()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Full path, `<site>/<manager_name>/<folder>`.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Stores `component` under `name`, returning what it replaced.
	pub fn add(&self, name: &str, component: ComponentRef) -> Option<ComponentRef> {
		let replaced = self.items.write().insert(name.into(), component);
		tracing::trace!(folder = %self.path, item = name, replaced = replaced.is_some(), "item stored");
		replaced
	}

	pub fn get(&self, name: &str) -> Option<ComponentRef> {
		self.items.read().get(name).cloned()
	}

	pub fn remove(&self, name: &str) -> Option<ComponentRef> {
		self.items.write().shift_remove(name)
	}

	pub fn names(&self) -> Vec<String> {
		self.items.read().keys().map(|k| k.to_string()).collect()
	}

	/// Items in insertion order.
	pub fn items(&self) -> Vec<(String, ComponentRef)> {
		self.items
			.read()
			.iter()
			.map(|(name, component)| (name.to_string(), component.clone()))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl fmt::Debug for ManagementFolder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ManagementFolder")
			.field("path", &self.path)
			.field("items", &self.names())
			.finish()
	}
}
