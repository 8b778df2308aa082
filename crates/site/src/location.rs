//! Containment: where objects live and which of them are sites.
//!
//! Sites are discovered by walking [`Location::parent`] upward. A walk that
//! ends without reaching a root ([`Location::is_root`]) means the object graph
//! is detached, which site attachment refuses to tolerate.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use locus_component::ConfigurationError;
use parking_lot::RwLock;

use crate::global::GlobalRegistry;
use crate::manager::SiteManager;

/// A node in the containment tree.
pub trait Location: Send + Sync + fmt::Debug {
	/// Key of this node within its parent. Empty for roots.
	fn name(&self) -> &str;

	/// The containing node, or `None` for roots and detached nodes.
	fn parent(&self) -> Option<Arc<dyn Location>>;

	/// True for the containment root.
	fn is_root(&self) -> bool;

	/// The site manager if this node is a site.
	fn site_manager(&self) -> Option<Arc<SiteManager>>;

	/// Marks this node as a site. Called once by [`SiteManager::attach`].
	fn set_site_manager(&self, manager: Arc<SiteManager>);

	/// Contained node named `name`, for traversal.
	fn child(&self, _name: &str) -> Option<Arc<dyn Location>> {
		None
	}
}

/// True if `a` is `b` or is contained, at any depth, in `b`.
pub fn inside(a: &Arc<dyn Location>, b: &Arc<dyn Location>) -> bool {
	let target = Arc::as_ptr(b);
	let mut current = Some(a.clone());
	while let Some(loc) = current {
		if std::ptr::addr_eq(Arc::as_ptr(&loc), target) {
			return true;
		}
		current = loc.parent();
	}
	false
}

/// Slash-separated path from the root, `/` for the root itself.
pub fn location_path(location: &dyn Location) -> String {
	let mut names = Vec::new();
	if !location.is_root() {
		names.push(location.name().to_string());
	}
	let mut current = location.parent();
	while let Some(loc) = current {
		if !loc.is_root() {
			names.push(loc.name().to_string());
		}
		current = loc.parent();
	}
	names.reverse();
	format!("/{}", names.join("/"))
}

/// In-memory container implementing [`Location`].
///
/// Parents own their children; children hold a weak back-reference, so a
/// subtree whose root was dropped becomes detached.
pub struct Folder {
	name: Box<str>,
	parent: Option<Weak<Folder>>,
	root: bool,
	children: RwLock<IndexMap<Box<str>, Arc<Folder>>>,
	site: RwLock<Option<Arc<SiteManager>>>,
}

impl Folder {
	fn build(name: &str, parent: Option<Weak<Folder>>, root: bool) -> Arc<Self> {
		Arc::new(Self {
			name: name.into(),
			parent,
			root,
			children: RwLock::new(IndexMap::new()),
			site: RwLock::new(None),
		})
	}

	/// A containment root.
	pub fn root() -> Arc<Self> {
		Self::build("", None, true)
	}

	/// A folder with neither parent nor root marker.
	pub fn detached(name: &str) -> Arc<Self> {
		Self::build(name, None, false)
	}

	/// Returns the child named `name`, creating it if missing.
	pub fn add_folder(self: &Arc<Self>, name: &str) -> Arc<Self> {
		let mut children = self.children.write();
		if let Some(existing) = children.get(name) {
			return existing.clone();
		}
		let child = Self::build(name, Some(Arc::downgrade(self)), false);
		children.insert(name.into(), child.clone());
		child
	}

	pub fn get(&self, name: &str) -> Option<Arc<Self>> {
		self.children.read().get(name).cloned()
	}

	/// Removes and returns the child named `name`. The removed subtree keeps
	/// its own children but is detached from this folder.
	pub fn remove(&self, name: &str) -> Option<Arc<Self>> {
		self.children.write().shift_remove(name)
	}

	pub fn child_names(&self) -> Vec<String> {
		self.children.read().keys().map(|k| k.to_string()).collect()
	}

	pub fn path(&self) -> String {
		location_path(self)
	}

	/// Attaches a site manager to this folder.
	///
	/// Fails with [`ConfigurationError::AlreadySite`] if it is a site, and
	/// with [`ConfigurationError::NotEnoughContext`] if the folder is not
	/// connected to a root.
	pub fn make_site(
		self: &Arc<Self>,
		global: &Arc<GlobalRegistry>,
	) -> Result<Arc<SiteManager>, ConfigurationError> {
		let location: Arc<dyn Location> = self.clone();
		SiteManager::attach(&location, global)
	}

	pub fn is_site(&self) -> bool {
		self.site.read().is_some()
	}
}

impl Location for Folder {
	fn name(&self) -> &str {
		&self.name
	}

	fn parent(&self) -> Option<Arc<dyn Location>> {
		let parent = self.parent.as_ref()?.upgrade()?;
		Some(parent)
	}

	fn is_root(&self) -> bool {
		self.root
	}

	fn site_manager(&self) -> Option<Arc<SiteManager>> {
		self.site.read().clone()
	}

	fn set_site_manager(&self, manager: Arc<SiteManager>) {
		*self.site.write() = Some(manager);
	}

	fn child(&self, name: &str) -> Option<Arc<dyn Location>> {
		let child = self.get(name)?;
		Some(child)
	}
}

impl fmt::Debug for Folder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Folder")
			.field("path", &self.path())
			.field("site", &self.is_site())
			.finish_non_exhaustive()
	}
}
