//! The process-wide registry at the end of every delegation chain.
//!
//! Global registrations are installed once, at configuration time, and are
//! always in effect: there is no activation step and no rename. Installing
//! two registrations with the same [`Discriminator`] is a configuration
//! conflict.
//!
//! # Concurrency
//!
//! Entries are an [`ArcSwap`] snapshot. Lookups load it without locking;
//! installers clone, append, and swap under a mutex.

use std::fmt;
use std::sync::{Arc, LazyLock, Weak};

use arc_swap::ArcSwap;
use locus_component::{
	Capability, CapabilityCatalog, ComponentRef, ConfigurationError, Discriminator, LookupError,
	Registration,
};
use parking_lot::{Mutex, RwLock};

use crate::config::SiteConfig;
use crate::error::ImportError;
use crate::event::EventBus;
use crate::lookup::{AdapterMatch, ComponentLookup, adapter_score, bind_factory, utility_matches};
use crate::manager::{SiteManager, splice_subsite};
use crate::module::{Module, ModuleNamespace, split_dotted};

static DEFAULT: LazyLock<Arc<GlobalRegistry>> =
	LazyLock::new(|| GlobalRegistry::new(SiteConfig::default()));

/// Chain root: global registrations plus process-wide services.
pub struct GlobalRegistry {
	config: SiteConfig,
	catalog: CapabilityCatalog,
	events: EventBus,
	modules: ModuleNamespace,
	entries: ArcSwap<Vec<Arc<Registration>>>,
	write: Mutex<()>,
	/// Serializes site attachment so concurrent walks see each other.
	tree: Mutex<()>,
	/// Sites whose `next` is this registry.
	top_sites: RwLock<Vec<Weak<SiteManager>>>,
}

impl GlobalRegistry {
	pub fn new(config: SiteConfig) -> Arc<Self> {
		Arc::new(Self {
			config,
			catalog: CapabilityCatalog::new(),
			events: EventBus::new(),
			modules: ModuleNamespace::new(),
			entries: ArcSwap::from_pointee(Vec::new()),
			write: Mutex::new(()),
			tree: Mutex::new(()),
			top_sites: RwLock::new(Vec::new()),
		})
	}

	/// The shared default-configured instance.
	pub fn global() -> Arc<Self> {
		DEFAULT.clone()
	}

	pub fn config(&self) -> &SiteConfig {
		&self.config
	}

	pub fn catalog(&self) -> &CapabilityCatalog {
		&self.catalog
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	pub fn modules(&self) -> &ModuleNamespace {
		&self.modules
	}

	/// Adds `module` to the process-wide namespace.
	pub fn provide_module(&self, module: Arc<Module>) -> Option<Arc<Module>> {
		tracing::debug!(module = module.name(), "global module provided");
		self.modules.insert(module)
	}

	/// Resolves `module.path.attr` in the process-wide namespace.
	pub fn resolve(&self, dotted: &str) -> Result<ComponentRef, ImportError> {
		let (module, attr) = split_dotted(dotted)?;
		self.modules
			.get(module)
			.ok_or_else(|| ImportError::NotFound {
				name: module.to_string(),
			})?
			.attribute(attr)
	}

	/// Live sites delegating directly to this registry.
	pub fn top_sites(&self) -> Vec<Arc<SiteManager>> {
		self.top_sites.read().iter().filter_map(Weak::upgrade).collect()
	}

	/// Records a site attached directly below the global registry. Existing
	/// top sites contained in it move under it, as with
	/// [`SiteManager::add_subsite`].
	pub(crate) fn add_top_site(&self, site: &Arc<SiteManager>) {
		splice_subsite(&self.top_sites, site, "<global>");
	}

	pub(crate) fn lock_tree(&self) -> parking_lot::MutexGuard<'_, ()> {
		self.tree.lock()
	}

	/// Installs `reg`. Fails with [`ConfigurationError::Conflict`] if a
	/// registration with the same discriminator exists.
	pub fn register(&self, reg: Arc<Registration>) -> Result<(), ConfigurationError> {
		let _guard = self.write.lock();
		let discriminator = reg.discriminator();
		let current = self.entries.load_full();
		if current.iter().any(|r| r.discriminator() == discriminator) {
			tracing::warn!(%discriminator, "conflicting global registration");
			return Err(ConfigurationError::Conflict {
				discriminator: discriminator.to_string(),
			});
		}
		self.catalog.provide(reg.provided())?;
		for cap in reg.kind().required() {
			self.catalog.provide(&cap)?;
		}

		let mut next = (*current).clone();
		next.push(reg);
		self.entries.store(Arc::new(next));
		tracing::debug!(%discriminator, "global registration installed");
		Ok(())
	}

	/// Installs `component` as the utility providing `provided` under `name`.
	pub fn provide_utility(
		&self,
		name: &str,
		provided: Capability,
		component: ComponentRef,
	) -> Result<Arc<Registration>, ConfigurationError> {
		let reg = Registration::utility(name, provided, component).build()?;
		self.register(reg.clone())?;
		Ok(reg)
	}

	/// Installs an adapter from objects satisfying `required` (one capability
	/// per adapted object; empty adapts any single object).
	pub fn provide_adapter(
		&self,
		name: &str,
		provided: Capability,
		factory: ComponentRef,
		required: &[Capability],
	) -> Result<Arc<Registration>, ConfigurationError> {
		let mut builder = Registration::adapter(name, provided, factory);
		if let Some((first, rest)) = required.split_first() {
			builder = builder.required(first.clone()).with(rest.iter().cloned());
		}
		let reg = builder.build()?;
		self.register(reg.clone())?;
		Ok(reg)
	}

	/// Installs a view of objects satisfying `for_` for requests on `layer`.
	pub fn provide_view(
		&self,
		name: &str,
		provided: Capability,
		factory: ComponentRef,
		for_: &[Capability],
		layer: Capability,
	) -> Result<Arc<Registration>, ConfigurationError> {
		let reg = Registration::view(name, provided, factory, for_, layer).build()?;
		self.register(reg.clone())?;
		Ok(reg)
	}

	/// Every installed registration, in installation order.
	pub fn registrations(&self) -> Vec<Arc<Registration>> {
		self.entries.load().to_vec()
	}

	pub fn discriminators(&self) -> Vec<Discriminator> {
		self.entries.load().iter().map(|r| r.discriminator()).collect()
	}
}

impl ComponentLookup for GlobalRegistry {
	/// The nearest match by capability distance; later installs win ties.
	fn lookup_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<Arc<Registration>>, LookupError> {
		let entries = self.entries.load();
		let mut best: Option<(usize, &Arc<Registration>)> = None;
		for reg in entries.iter().filter(|r| r.name() == name) {
			if !utility_matches(reg, provided) {
				continue;
			}
			let Some(distance) = reg.provided().distance_to(provided) else {
				continue;
			};
			if best.is_none_or(|(current, _)| distance <= current) {
				best = Some((distance, reg));
			}
		}
		Ok(best.map(|(_, reg)| reg.clone()))
	}

	/// The most specific applicable adapter; later installs win ties.
	fn lookup_adapter(
		&self,
		objects: &[ComponentRef],
		provided: &Capability,
		name: &str,
	) -> Result<Option<AdapterMatch>, LookupError> {
		let entries = self.entries.load();
		let mut best: Option<(usize, &Arc<Registration>)> = None;
		for reg in entries.iter().filter(|r| r.name() == name) {
			let Some(score) = adapter_score(reg, objects, provided) else {
				continue;
			};
			if best.is_none_or(|(current, _)| score <= current) {
				best = Some((score, reg));
			}
		}
		match best {
			Some((_, reg)) => bind_factory(reg.clone(), |path| self.resolve(path)).map(Some),
			None => Ok(None),
		}
	}
}

impl fmt::Debug for GlobalRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GlobalRegistry")
			.field("registrations", &self.entries.load().len())
			.field("modules", &self.modules)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use locus_component::{DottedFactory, FnFactory, Object};

	use super::*;

	fn registry() -> Arc<GlobalRegistry> {
		GlobalRegistry::new(SiteConfig::default())
	}

	#[test]
	fn test_duplicate_discriminator_conflicts() {
		let global = registry();
		let cap = Capability::new("test.X");
		global
			.provide_utility("u", cap.clone(), Object::shared("a", cap.clone()))
			.unwrap();
		let err = global
			.provide_utility("u", cap.clone(), Object::shared("b", cap.clone()))
			.unwrap_err();
		assert!(matches!(err, ConfigurationError::Conflict { .. }));

		// Same capability, different name: no conflict.
		global
			.provide_utility("v", cap.clone(), Object::shared("c", cap))
			.unwrap();
		assert_eq!(global.registrations().len(), 2);
	}

	#[test]
	fn test_utility_lookup_by_subsumption() {
		let global = registry();
		let base = Capability::new("test.Base");
		let derived = Capability::extending("test.Derived", [base.clone()]);
		let component = Object::shared("d", derived.clone());
		global
			.provide_utility("", derived.clone(), component.clone())
			.unwrap();

		let found = global.get_utility(&base, "").unwrap();
		assert!(locus_component::same_component(&found, &component));
		assert!(global.query_utility(&base, "other").unwrap().is_none());
		assert_eq!(
			global.get_utility(&Capability::new("test.Unrelated"), "").unwrap_err(),
			LookupError::Utility {
				capability: "test.Unrelated".into(),
				name: "".into()
			}
		);
	}

	/// The closer provided capability wins over a more general one.
	#[test]
	fn test_utility_prefers_nearest_provided() {
		let global = registry();
		let base = Capability::new("test.Base");
		let derived = Capability::extending("test.Derived", [base.clone()]);
		let general = Object::shared("general", base.clone());
		let specific = Object::shared("specific", derived.clone());
		global.provide_utility("", derived, specific).unwrap();
		global
			.provide_utility("", base.clone(), general.clone())
			.unwrap();

		let found = global.get_utility(&base, "").unwrap();
		assert!(locus_component::same_component(&found, &general));
	}

	#[test]
	fn test_adapter_specificity() {
		let global = registry();
		let base = Capability::new("test.Base");
		let derived = Capability::extending("test.Derived", [base.clone()]);
		let out = Capability::new("test.Out");
		let tag = |label: &'static str| {
			let out = out.clone();
			FnFactory::shared(move |_: &[ComponentRef]| Object::shared(label, out.clone()))
		};
		global
			.provide_adapter("", out.clone(), tag("general"), &[base])
			.unwrap();
		global
			.provide_adapter("", out.clone(), tag("specific"), &[derived.clone()])
			.unwrap();
		global.provide_adapter("", out.clone(), tag("any"), &[]).unwrap();

		let object = Object::shared("o", derived);
		let adapted = global.get_adapter(&object, &out, "").unwrap();
		let label = locus_component::downcast_ref::<Object>(&*adapted).unwrap().label();
		assert_eq!(label, "specific");

		let unrelated = Object::shared("u", Capability::new("test.Other"));
		let adapted = global.get_adapter(&unrelated, &out, "").unwrap();
		let label = locus_component::downcast_ref::<Object>(&*adapted).unwrap().label();
		assert_eq!(label, "any");
	}

	#[test]
	fn test_view_requires_request_layer() {
		let global = registry();
		let content = Capability::new("test.Content");
		let layer = Capability::new("test.Layer");
		let page = Capability::new("test.Page");
		let factory = {
			let page = page.clone();
			FnFactory::shared(move |_: &[ComponentRef]| Object::shared("page", page.clone()))
		};
		global
			.provide_view("index", page.clone(), factory, &[content.clone()], layer.clone())
			.unwrap();

		let object = Object::shared("doc", content);
		let request = Object::shared("req", layer);
		let other_request = Object::shared("req", Capability::new("test.OtherLayer"));
		assert!(global.get_view(&object, &request, &page, "index").is_ok());
		assert_eq!(
			global
				.get_view(&object, &other_request, &page, "index")
				.unwrap_err(),
			LookupError::View {
				capability: "test.Page".into(),
				name: "index".into()
			}
		);
	}

	#[test]
	fn test_dotted_factory_resolved_in_global_modules() {
		let global = registry();
		let content = Capability::new("test.Content");
		let out = Capability::new("test.Out");
		global
			.provide_adapter("", out.clone(), DottedFactory::shared("pkg.make"), &[content.clone()])
			.unwrap();
		let object = Object::shared("doc", content);

		assert_eq!(
			global.query_adapter(&object, &out, "").unwrap_err(),
			LookupError::Factory {
				factory: "pkg.make".into(),
				reason: "no module named \"pkg\"".into()
			}
		);

		let module = Module::new("pkg");
		let made = out.clone();
		module.set(
			"make",
			FnFactory::shared(move |_: &[ComponentRef]| Object::shared("made", made.clone())),
		);
		global.provide_module(module);
		let adapted = global.get_adapter(&object, &out, "").unwrap();
		let label = locus_component::downcast_ref::<Object>(&*adapted).unwrap().label();
		assert_eq!(label, "made");
	}

	#[test]
	fn test_register_fills_catalog() {
		let global = registry();
		let base = Capability::new("test.Base");
		let derived = Capability::extending("test.Derived", [base]);
		global
			.provide_utility("", derived.clone(), Object::shared("d", derived))
			.unwrap();
		assert_eq!(global.catalog().ids(), vec!["test.Derived"]);
	}
}
