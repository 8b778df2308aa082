//! Site managers: local registries chained to their enclosing sites.
//!
//! # Mental Model
//!
//! Every site owns a [`SiteManager`]. Lookups consult the manager's local
//! registries first and on a miss follow [`SiteManager::next`] outward, one
//! enclosing site at a time, until the [`GlobalRegistry`] answers. A local
//! registration therefore shadows any ancestor's registration under the same
//! name, and ancestors never see their subsites' registrations.
//!
//! # Slots
//!
//! A manager keeps one [`LocalRegistry`] per slot: the registration's
//! [`Discriminator`] with the name left out. Registrations only compete for
//! activation with others in their slot, so an unnamed utility providing one
//! capability never displaces an unnamed utility providing another.
//!
//! # Tree Maintenance
//!
//! `next` always names the nearest enclosing site. Sites may be created in
//! any containment order: when a new site is interposed between an existing
//! site and that site's subsites, [`SiteManager::add_subsite`] moves the
//! subsites under the newcomer.
//!
//! # Concurrency
//!
//! Attachment is serialized per global registry, so two sites created at
//! once still find each other. Tree links are behind `RwLock`s and are only
//! written during attachment. Delegation holds no lock across hops.
//!
//! # Invariants
//!
//! - The chain is acyclic and ends at exactly one global registry.
//!   - Enforced in: [`SiteManager::attach`] (`next` only ever points outward).
//!   - Checked by: the delegation walk, bounded by
//!     [`SiteConfig::max_delegation_depth`](crate::SiteConfig).
//! - A site appears in exactly one subsite list: its `next` manager's, or
//!   the global registry's top sites.
//!   - Enforced in: [`SiteManager::add_subsite`].
//! - At most one registration is active per slot and name.
//!   - Enforced in: [`SiteManager::registry_for`] (one stack per slot and name).

mod folder;
mod lookup;

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use locus_component::{
	Capability, Commit, ComponentRef, ConfigurationError, Discriminator, LocalRegistry, Registration,
	RegistrationStack, RegistryError,
};
use parking_lot::RwLock;

pub use self::folder::ManagementFolder;
pub use self::lookup::{ComponentEntry, ComponentFilter};
use crate::error::SiteError;
use crate::event::SiteEvent;
use crate::global::GlobalRegistry;
use crate::location::{Location, inside, location_path};
use crate::module::{Module, ModuleNamespace};


/// Where a site manager delegates on a miss.
#[derive(Clone)]
pub enum Next {
	Global(Arc<GlobalRegistry>),
	Site(Arc<SiteManager>),
}

impl Next {
	pub fn site_manager(&self) -> Option<&Arc<SiteManager>> {
		match self {
			Self::Site(sm) => Some(sm),
			Self::Global(_) => None,
		}
	}

	pub fn is_global(&self) -> bool {
		matches!(self, Self::Global(_))
	}
}

impl fmt::Display for Next {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Global(_) => f.write_str("<global>"),
			Self::Site(sm) => f.write_str(sm.path()),
		}
	}
}

impl fmt::Debug for Next {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Next({self})")
	}
}

/// The registry and delegation link of one site.
pub struct SiteManager {
	site: Weak<dyn Location>,
	path: Box<str>,
	next: RwLock<Next>,
	sub_sites: RwLock<Vec<Weak<SiteManager>>>,
	registries: RwLock<IndexMap<Discriminator, LocalRegistry>>,
	modules: ModuleNamespace,
	folders: RwLock<IndexMap<Box<str>, Arc<ManagementFolder>>>,
	global: Arc<GlobalRegistry>,
}

impl SiteManager {
	/// Makes `site` a site and links its manager into the tree.
	///
	/// Walks up from `site` through containment. Reaching a root links the
	/// manager to `global`; finding an enclosing site links it to that
	/// site's manager and registers it there as a subsite. A walk that runs
	/// out of parents first fails with [`ConfigurationError::NotEnoughContext`].
	///
	/// The default management folder is created and announced with
	/// [`SiteEvent::ObjectCreated`].
	pub fn attach(
		site: &Arc<dyn Location>,
		global: &Arc<GlobalRegistry>,
	) -> Result<Arc<Self>, ConfigurationError> {
		let tree = global.lock_tree();
		let path = location_path(&**site);
		if site.site_manager().is_some() {
			return Err(ConfigurationError::AlreadySite { location: path });
		}
		let next = find_next(site, global, &path)?;

		let manager = Arc::new(Self {
			site: Arc::downgrade(site),
			path: path.as_str().into(),
			next: RwLock::new(next.clone()),
			sub_sites: RwLock::new(Vec::new()),
			registries: RwLock::new(IndexMap::new()),
			modules: ModuleNamespace::new(),
			folders: RwLock::new(IndexMap::new()),
			global: global.clone(),
		});
		let default = manager.insert_folder(&global.config().default_folder);
		site.set_site_manager(manager.clone());
		match &next {
			Next::Site(parent) => parent.add_subsite(&manager),
			Next::Global(global) => global.add_top_site(&manager),
		}
		drop(tree);

		tracing::debug!(site = %path, next = %next, "site attached");
		global.events().notify(&SiteEvent::ObjectCreated {
			path: default.path().to_string(),
		});
		Ok(manager)
	}

	fn forward_registry_changes(&self, registry: &LocalRegistry) {
		let global = self.global.clone();
		let path = self.path.clone();
		registry.subscribe(move |commit: &Commit| {
			global.events().notify(&SiteEvent::RegistryChanged {
				path: path.to_string(),
				commit: commit.clone(),
			});
		});
	}

	/// Path of the site this manager belongs to.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The site, unless it has been dropped.
	pub fn site(&self) -> Option<Arc<dyn Location>> {
		self.site.upgrade()
	}

	pub fn next(&self) -> Next {
		self.next.read().clone()
	}

	pub fn global(&self) -> &Arc<GlobalRegistry> {
		&self.global
	}

	/// The local registry holding `reg`'s slot, created on first use.
	pub fn registry_for(&self, reg: &Registration) -> LocalRegistry {
		let slot = reg.slot();
		if let Some(existing) = self.registries.read().get(&slot) {
			return existing.clone();
		}
		let mut registries = self.registries.write();
		if let Some(existing) = registries.get(&slot) {
			return existing.clone();
		}
		let registry = LocalRegistry::new(format!("{} {slot}", self.path));
		self.forward_registry_changes(&registry);
		tracing::trace!(site = %self.path, %slot, "slot registry created");
		registries.insert(slot, registry.clone());
		registry
	}

	/// Every slot registry, in creation order.
	pub fn registries(&self) -> Vec<LocalRegistry> {
		self.registries.read().values().cloned().collect()
	}

	/// Adds `reg`, inactive, to the stack for its name in its slot registry.
	pub fn register(&self, reg: &Arc<Registration>) -> Result<RegistrationStack, RegistryError> {
		self.registry_for(reg).register(reg)
	}

	/// Every local registration, in slot creation order.
	pub fn registrations(&self) -> Vec<Arc<Registration>> {
		self.registries().iter().flat_map(LocalRegistry::registrations).collect()
	}

	/// Names with a registration stack in any slot, without duplicates.
	pub fn list_registration_names(&self) -> Vec<String> {
		let mut names: Vec<String> = Vec::new();
		for registry in self.registries() {
			for name in registry.list_registration_names() {
				if !names.contains(&name) {
					names.push(name);
				}
			}
		}
		names
	}

	/// Live subsites whose `next` is this manager.
	pub fn sub_sites(&self) -> Vec<Arc<SiteManager>> {
		self.sub_sites.read().iter().filter_map(Weak::upgrade).collect()
	}

	/// Records `sub` as a subsite, moving under it every existing subsite
	/// whose site lies inside `sub`'s site.
	///
	/// Moved subsites get `next = sub` and leave this manager's list, so
	/// each one stays linked to its nearest enclosing site.
	pub fn add_subsite(&self, sub: &Arc<SiteManager>) {
		splice_subsite(&self.sub_sites, sub, &self.path);
	}

	/// Stores `component` in the default folder and registers it, active, as
	/// the utility `provided` named `name`. Registration and activation
	/// commit together.
	pub fn install_utility(
		&self,
		name: &str,
		provided: Capability,
		component: ComponentRef,
	) -> Result<Arc<Registration>, SiteError> {
		let key = if name.is_empty() {
			provided.id().to_string()
		} else {
			name.to_string()
		};
		let reg = Registration::utility(name, provided, component.clone()).build()?;
		self.registry_for(&reg).transaction(|txn| {
			txn.register(&reg)?;
			txn.activate(&reg)
		})?;
		self.add_folder(&self.global.config().default_folder)
			.add(&key, component);
		tracing::debug!(site = %self.path, name, id = %reg.id(), "utility installed");
		Ok(reg)
	}

	/// Management folder named `name`.
	pub fn folder(&self, name: &str) -> Option<Arc<ManagementFolder>> {
		self.folders.read().get(name).cloned()
	}

	/// The folder created with the manager.
	pub fn default_folder(&self) -> Option<Arc<ManagementFolder>> {
		self.folder(&self.global.config().default_folder)
	}

	pub fn folders(&self) -> Vec<Arc<ManagementFolder>> {
		self.folders.read().values().cloned().collect()
	}

	/// Returns the management folder `name`, creating and announcing it if
	/// missing.
	pub fn add_folder(&self, name: &str) -> Arc<ManagementFolder> {
		if let Some(existing) = self.folder(name) {
			return existing;
		}
		let folder = self.insert_folder(name);
		self.global.events().notify(&SiteEvent::ObjectCreated {
			path: folder.path().to_string(),
		});
		folder
	}

	fn insert_folder(&self, name: &str) -> Arc<ManagementFolder> {
		let mut folders = self.folders.write();
		if let Some(existing) = folders.get(name) {
			return existing.clone();
		}
		let path = join_path(&join_path(&self.path, &self.global.config().manager_name), name);
		let folder = Arc::new(ManagementFolder::new(name, path));
		folders.insert(name.into(), folder.clone());
		folder
	}

	/// Adds `module` to this manager's own module entries.
	pub fn provide_module(&self, module: Arc<Module>) -> Option<Arc<Module>> {
		self.modules.insert(module)
	}

	pub fn modules(&self) -> &ModuleNamespace {
		&self.modules
	}
}

impl fmt::Debug for SiteManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SiteManager")
			.field("path", &self.path)
			.field("next", &self.next())
			.field("sub_sites", &self.sub_sites.read().len())
			.field("slots", &self.registries.read().len())
			.finish_non_exhaustive()
	}
}

/// Appends `sub` to `subs`, first moving every member whose site lies
/// inside `sub`'s site into `sub`'s own list.
pub(crate) fn splice_subsite(
	subs: &RwLock<Vec<Weak<SiteManager>>>,
	sub: &Arc<SiteManager>,
	parent: &str,
) {
	let Some(sub_site) = sub.site() else {
		tracing::warn!(site = parent, subsite = %sub.path, "subsite has no live site");
		return;
	};

	let mut moved = Vec::new();
	{
		let mut subs = subs.write();
		subs.retain(|weak| {
			let Some(child) = weak.upgrade() else {
				return false;
			};
			if Arc::ptr_eq(&child, sub) {
				return false;
			}
			let contained = child.site().is_some_and(|site| inside(&site, &sub_site));
			if contained {
				moved.push(child);
			}
			!contained
		});
		subs.push(Arc::downgrade(sub));
	}

	for child in moved {
		*child.next.write() = Next::Site(sub.clone());
		sub.sub_sites.write().push(Arc::downgrade(&child));
		tracing::debug!(
			subsite = %child.path,
			from = parent,
			to = %sub.path,
			"subsite reparented"
		);
	}
}

fn find_next(
	site: &Arc<dyn Location>,
	global: &Arc<GlobalRegistry>,
	path: &str,
) -> Result<Next, ConfigurationError> {
	let mut current = site.clone();
	loop {
		if current.is_root() {
			return Ok(Next::Global(global.clone()));
		}
		let Some(parent) = current.parent() else {
			tracing::warn!(site = path, stopped_at = current.name(), "containment does not reach a root");
			return Err(ConfigurationError::NotEnoughContext {
				location: path.to_string(),
			});
		};
		if let Some(manager) = parent.site_manager() {
			return Ok(Next::Site(manager));
		}
		current = parent;
	}
}

fn join_path(base: &str, segment: &str) -> String {
	if base.ends_with('/') {
		format!("{base}{segment}")
	} else {
		format!("{base}/{segment}")
	}
}
