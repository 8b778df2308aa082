//! Local-first lookup with delegation along the `next` chain.

use std::fmt;
use std::sync::Arc;

use locus_component::{Capability, ComponentRef, LookupError, Registration};

use super::{Next, SiteManager, join_path};
use crate::error::ImportError;
use crate::global::GlobalRegistry;
use crate::lookup::{AdapterMatch, ComponentLookup, adapter_score, bind_factory, utility_matches};
use crate::module::{Module, split_dotted};

/// Predicate over candidate components in [`SiteManager::query_component`].
pub type ComponentFilter<'a> = &'a dyn Fn(&ComponentRef) -> bool;

/// A component found in a management folder, with its full path.
#[derive(Clone)]
pub struct ComponentEntry {
	pub path: String,
	pub component: ComponentRef,
}

impl fmt::Debug for ComponentEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentEntry")
			.field("path", &self.path)
			.finish_non_exhaustive()
	}
}

impl SiteManager {
	/// The active local utility nearest to `provided`; the older slot wins
	/// ties.
	fn local_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<Arc<Registration>>, LookupError> {
		let mut best: Option<(usize, Arc<Registration>)> = None;
		for registry in self.registries() {
			let Some(reg) = registry.active_registration(name)? else {
				continue;
			};
			if !utility_matches(&reg, provided) {
				continue;
			}
			let Some(distance) = reg.provided().distance_to(provided) else {
				continue;
			};
			if best.as_ref().is_none_or(|(current, _)| distance < *current) {
				best = Some((distance, reg));
			}
		}
		Ok(best.map(|(_, reg)| reg))
	}

	/// The most specific active local adapter, with its factory resolved
	/// from this site.
	fn local_adapter(
		&self,
		objects: &[ComponentRef],
		provided: &Capability,
		name: &str,
	) -> Result<Option<AdapterMatch>, LookupError> {
		let mut best: Option<(usize, Arc<Registration>)> = None;
		for registry in self.registries() {
			let Some(reg) = registry.active_registration(name)? else {
				continue;
			};
			let Some(score) = adapter_score(&reg, objects, provided) else {
				continue;
			};
			if best.as_ref().is_none_or(|(current, _)| score < *current) {
				best = Some((score, reg));
			}
		}
		match best {
			Some((_, reg)) => bind_factory(reg, |path| self.resolve(path)).map(Some),
			None => Ok(None),
		}
	}

	/// Tries `local` here, then along the chain, then `global`.
	fn delegate<T>(
		&self,
		mut local: impl FnMut(&SiteManager) -> Result<Option<T>, LookupError>,
		global: impl FnOnce(&GlobalRegistry) -> Result<Option<T>, LookupError>,
	) -> Result<Option<T>, LookupError> {
		if let Some(found) = local(self)? {
			return Ok(Some(found));
		}
		self.delegate_next(local, global)
	}

	/// Like [`Self::delegate`] but skips this manager.
	fn delegate_next<T>(
		&self,
		mut local: impl FnMut(&SiteManager) -> Result<Option<T>, LookupError>,
		global: impl FnOnce(&GlobalRegistry) -> Result<Option<T>, LookupError>,
	) -> Result<Option<T>, LookupError> {
		let max = self.global.config().max_delegation_depth;
		let mut next = self.next();
		let mut hops = 0;
		loop {
			match next {
				Next::Global(registry) => return global(&*registry),
				Next::Site(manager) => {
					hops += 1;
					if hops > max {
						tracing::warn!(site = %self.path, depth = max, "delegation chain too deep");
						return Err(LookupError::DelegationTooDeep { depth: max });
					}
					if let Some(found) = local(&*manager)? {
						tracing::trace!(site = %self.path, answered_by = %manager.path, hops, "delegated lookup");
						return Ok(Some(found));
					}
					next = manager.next();
				}
			}
		}
	}

	/// The utility `provided`/`name` as seen from the next site outward,
	/// ignoring this site's own registrations.
	pub fn query_next_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		let reg = self.delegate_next(
			|sm| sm.local_utility(provided, name),
			|global| global.lookup_utility(provided, name),
		)?;
		Ok(reg.map(|reg| reg.component().clone()))
	}

	pub fn get_next_utility(&self, provided: &Capability, name: &str) -> Result<ComponentRef, LookupError> {
		self.query_next_utility(provided, name)?
			.ok_or_else(|| LookupError::Utility {
				capability: provided.id().to_string(),
				name: name.to_string(),
			})
	}

	/// Active component registered locally under `name`, whatever it provides.
	///
	/// With several slots active under `name`, the oldest slot answers.
	pub fn query_active_component(&self, name: &str) -> Result<Option<ComponentRef>, LookupError> {
		for registry in self.registries() {
			if let Some(component) = registry.query_active_component(name)? {
				return Ok(Some(component));
			}
		}
		Ok(None)
	}

	pub fn get_active_component(&self, name: &str) -> Result<ComponentRef, LookupError> {
		self.query_active_component(name)?
			.ok_or_else(|| LookupError::Component {
				name: name.to_string(),
			})
	}

	/// Components in this site's management folders that provide `kind`
	/// (any, if `None`) and pass `filter`.
	///
	/// With `all`, the same search runs on every enclosing site and its
	/// results follow the local ones. Duplicate paths are not merged.
	pub fn query_component(
		&self,
		kind: Option<&Capability>,
		filter: Option<ComponentFilter<'_>>,
		all: bool,
	) -> Result<Vec<ComponentEntry>, LookupError> {
		let mut entries = self.local_components(kind, filter);
		if !all {
			return Ok(entries);
		}

		let max = self.global.config().max_delegation_depth;
		let mut next = self.next();
		let mut hops = 0;
		while let Next::Site(manager) = next {
			hops += 1;
			if hops > max {
				tracing::warn!(site = %self.path, depth = max, "delegation chain too deep");
				return Err(LookupError::DelegationTooDeep { depth: max });
			}
			entries.extend(manager.local_components(kind, filter));
			next = manager.next();
		}
		Ok(entries)
	}

	fn local_components(
		&self,
		kind: Option<&Capability>,
		filter: Option<ComponentFilter<'_>>,
	) -> Vec<ComponentEntry> {
		let mut entries = Vec::new();
		for folder in self.folders() {
			for (name, component) in folder.items() {
				if kind.is_some_and(|k| !k.provided_by(&*component)) {
					continue;
				}
				if filter.is_some_and(|f| !f(&component)) {
					continue;
				}
				entries.push(ComponentEntry {
					path: join_path(folder.path(), &name),
					component,
				});
			}
		}
		entries
	}

	/// Module `name` from this site's folders or own entries.
	fn find_local_module(&self, name: &str) -> Option<Arc<Module>> {
		let suffixed = format!("{name}{}", self.global.config().module_suffix);
		for folder in self.folders() {
			for key in [suffixed.as_str(), name] {
				if let Some(item) = folder.get(key)
					&& let Some(module) = Module::from_component(&item)
				{
					return Some(module);
				}
			}
		}
		self.modules.get(name)
	}

	/// Finds module `name`.
	///
	/// Searches this site's management folders (`name` plus the configured
	/// suffix first, then `name`), this manager's own module entries, every
	/// enclosing site found through containment, and finally the global
	/// namespace.
	pub fn find_module(&self, name: &str) -> Result<Arc<Module>, ImportError> {
		if name.is_empty() || name.split('.').any(str::is_empty) {
			return Err(ImportError::InvalidName {
				name: name.to_string(),
			});
		}
		if let Some(module) = self.find_local_module(name) {
			return Ok(module);
		}

		let mut current = self.site().and_then(|site| site.parent());
		while let Some(location) = current {
			if let Some(manager) = location.site_manager()
				&& let Some(module) = manager.find_local_module(name)
			{
				tracing::trace!(site = %self.path, module = name, found_in = %manager.path, "module found in enclosing site");
				return Ok(module);
			}
			current = location.parent();
		}

		self.global.modules().get(name).ok_or_else(|| {
			tracing::debug!(site = %self.path, module = name, "module not found");
			ImportError::NotFound {
				name: name.to_string(),
			}
		})
	}

	/// Resolves `module.path.attr` to the attribute's component.
	pub fn resolve(&self, dotted: &str) -> Result<ComponentRef, ImportError> {
		let (module, attr) = split_dotted(dotted)?;
		self.find_module(module)?.attribute(attr)
	}
}

impl ComponentLookup for SiteManager {
	fn lookup_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<Arc<Registration>>, LookupError> {
		self.delegate(
			|sm| sm.local_utility(provided, name),
			|global| global.lookup_utility(provided, name),
		)
	}

	fn lookup_adapter(
		&self,
		objects: &[ComponentRef],
		provided: &Capability,
		name: &str,
	) -> Result<Option<AdapterMatch>, LookupError> {
		self.delegate(
			|sm| sm.local_adapter(objects, provided, name),
			|global| global.lookup_adapter(objects, provided, name),
		)
	}
}
