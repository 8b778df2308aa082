//! Request-scoped current site.
//!
//! A [`RequestContext`] is threaded through the code handling one request.
//! It remembers which site the request is "in" and sends lookups there, or
//! to the global registry when no site is current. There is no process-wide
//! or thread-local current site.
//!
//! [`Request`] drives the usual lifecycle: traversal sets the site as it
//! passes through sites, and dropping the request clears it, so error paths
//! release the binding too.

use std::fmt;
use std::sync::Arc;

use locus_component::{Capability, ComponentRef, LookupError, Registration, SecurityPolicy};
use parking_lot::Mutex;

use crate::event::SiteEvent;
use crate::global::GlobalRegistry;
use crate::location::{Location, location_path};
use crate::lookup::ComponentLookup;
use crate::manager::SiteManager;

#[cfg(test)]
mod tests;

/// Per-request lookup state.
pub struct RequestContext {
	global: Arc<GlobalRegistry>,
	site: Mutex<Option<Arc<SiteManager>>>,
	policy: Option<Arc<dyn SecurityPolicy>>,
}

impl RequestContext {
	pub fn new(global: Arc<GlobalRegistry>) -> Self {
		Self {
			global,
			site: Mutex::new(None),
			policy: None,
		}
	}

	/// Wraps components with permissions through `policy` on lookup.
	pub fn with_policy(mut self, policy: Arc<dyn SecurityPolicy>) -> Self {
		self.policy = Some(policy);
		self
	}

	pub fn global(&self) -> &Arc<GlobalRegistry> {
		&self.global
	}

	/// The current site, if any.
	pub fn site(&self) -> Option<Arc<SiteManager>> {
		self.site.lock().clone()
	}

	/// Replaces the current site, returning the previous one.
	pub fn set_site(&self, site: Option<Arc<SiteManager>>) -> Option<Arc<SiteManager>> {
		tracing::trace!(site = site.as_ref().map(|sm| sm.path()), "current site set");
		std::mem::replace(&mut *self.site.lock(), site)
	}

	pub fn clear_site(&self) {
		self.set_site(None);
	}

	/// Makes `site` current until the returned scope is dropped, then
	/// restores whatever was current before.
	pub fn enter_site(&self, site: Arc<SiteManager>) -> SiteScope<'_> {
		let previous = self.set_site(Some(site));
		SiteScope {
			ctx: self,
			previous,
		}
	}

	/// Announces that traversal is entering `location`; a site becomes the
	/// current site.
	pub fn before_traverse(&self, location: &Arc<dyn Location>) {
		let manager = location.site_manager();
		self.global.events().notify(&SiteEvent::BeforeTraverse {
			path: location_path(&**location),
			is_site: manager.is_some(),
		});
		if let Some(manager) = manager {
			self.set_site(Some(manager));
		}
	}

	/// Clears the current site and announces the end of the request.
	pub fn end_request(&self) {
		self.clear_site();
		self.global.events().notify(&SiteEvent::EndRequest);
	}

	/// Where lookups currently start.
	pub fn lookup(&self) -> Arc<dyn ComponentLookup> {
		match self.site() {
			Some(manager) => manager,
			None => self.global.clone(),
		}
	}

	fn secure(&self, reg: &Registration, component: ComponentRef) -> ComponentRef {
		match (&self.policy, reg.permission()) {
			(Some(policy), Some(permission)) => policy.wrap(component, permission),
			_ => component,
		}
	}

	pub fn query_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		let reg = self.lookup().lookup_utility(provided, name)?;
		Ok(reg.map(|reg| reg.secured_component(self.policy.as_deref())))
	}

	pub fn get_utility(&self, provided: &Capability, name: &str) -> Result<ComponentRef, LookupError> {
		self.query_utility(provided, name)?
			.ok_or_else(|| LookupError::Utility {
				capability: provided.id().to_string(),
				name: name.to_string(),
			})
	}

	pub fn query_multi_adapter(
		&self,
		objects: &[ComponentRef],
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		let Some(found) = self.lookup().lookup_adapter(objects, provided, name)? else {
			return Ok(None);
		};
		Ok(found
			.create(objects)
			.map(|adapter| self.secure(&found.registration, adapter)))
	}

	pub fn query_adapter(
		&self,
		object: &ComponentRef,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		self.query_multi_adapter(std::slice::from_ref(object), provided, name)
	}

	pub fn get_adapter(
		&self,
		object: &ComponentRef,
		provided: &Capability,
		name: &str,
	) -> Result<ComponentRef, LookupError> {
		self.query_adapter(object, provided, name)?
			.ok_or_else(|| LookupError::Adapter {
				capability: provided.id().to_string(),
				name: name.to_string(),
			})
	}

	pub fn query_view(
		&self,
		object: &ComponentRef,
		request: &ComponentRef,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		self.query_multi_adapter(&[object.clone(), request.clone()], provided, name)
	}

	pub fn get_view(
		&self,
		object: &ComponentRef,
		request: &ComponentRef,
		provided: &Capability,
		name: &str,
	) -> Result<ComponentRef, LookupError> {
		self.query_view(object, request, provided, name)?
			.ok_or_else(|| LookupError::View {
				capability: provided.id().to_string(),
				name: name.to_string(),
			})
	}
}

impl fmt::Debug for RequestContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestContext")
			.field("site", &self.site().as_ref().map(|sm| sm.path().to_string()))
			.field("policy", &self.policy.is_some())
			.finish_non_exhaustive()
	}
}

/// Restores the previous current site when dropped.
#[must_use = "the site is only current while the scope is alive"]
pub struct SiteScope<'a> {
	ctx: &'a RequestContext,
	previous: Option<Arc<SiteManager>>,
}

impl Drop for SiteScope<'_> {
	fn drop(&mut self) {
		self.ctx.set_site(self.previous.take());
	}
}

/// One request traversing a containment tree.
pub struct Request {
	ctx: RequestContext,
	root: Arc<dyn Location>,
}

impl Request {
	pub fn new(global: Arc<GlobalRegistry>, root: Arc<dyn Location>) -> Self {
		Self::with_context(RequestContext::new(global), root)
	}

	pub fn with_context(ctx: RequestContext, root: Arc<dyn Location>) -> Self {
		Self { ctx, root }
	}

	pub fn context(&self) -> &RequestContext {
		&self.ctx
	}

	/// Walks `path` from the root, announcing each step and entering every
	/// site on the way. Fails with [`LookupError::Traversal`] at the first
	/// missing segment; the current site is then the last one passed.
	pub fn traverse(&self, path: &str) -> Result<Arc<dyn Location>, LookupError> {
		let mut current = self.root.clone();
		self.ctx.before_traverse(&current);
		for segment in path.split('/').filter(|s| !s.is_empty()) {
			let Some(child) = current.child(segment) else {
				return Err(LookupError::Traversal {
					path: location_path(&*current),
					name: segment.to_string(),
				});
			};
			self.ctx.before_traverse(&child);
			current = child;
		}
		Ok(current)
	}
}

impl Drop for Request {
	fn drop(&mut self) {
		self.ctx.end_request();
	}
}

impl fmt::Debug for Request {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Request")
			.field("root", &location_path(&*self.root))
			.field("ctx", &self.ctx)
			.finish()
	}
}
