//! Finding site managers from a location or from another manager.

use std::sync::Arc;

use locus_component::LookupError;

use crate::global::GlobalRegistry;
use crate::location::{Location, location_path};
use crate::lookup::ComponentLookup;
use crate::manager::SiteManager;

/// The next local site manager outward from `manager`, or `None` when the
/// chain continues at the global registry.
pub fn query_next_site_manager(manager: &SiteManager) -> Option<Arc<SiteManager>> {
	manager.next().site_manager().cloned()
}

/// Like [`query_next_site_manager`], failing with
/// [`LookupError::NextSiteManager`] when the next hop is global.
pub fn get_next_site_manager(manager: &SiteManager) -> Result<Arc<SiteManager>, LookupError> {
	query_next_site_manager(manager).ok_or(LookupError::NextSiteManager)
}

/// The manager of the nearest site containing `location`, including
/// `location` itself.
///
/// Fails with [`LookupError::SiteManager`] if containment ends before any
/// site is found.
pub fn site_manager_for(location: &Arc<dyn Location>) -> Result<Arc<SiteManager>, LookupError> {
	let mut current = Some(location.clone());
	while let Some(loc) = current {
		if let Some(manager) = loc.site_manager() {
			return Ok(manager);
		}
		current = loc.parent();
	}
	Err(LookupError::SiteManager {
		location: location_path(&**location),
	})
}

/// Where lookups for `location` start: the nearest site's manager, or the
/// global registry when no site contains it.
pub fn lookup_target_for(
	location: &Arc<dyn Location>,
	global: &Arc<GlobalRegistry>,
) -> Arc<dyn ComponentLookup> {
	match site_manager_for(location) {
		Ok(manager) => manager,
		Err(_) => global.clone(),
	}
}
