//! Shared fixtures for site integration tests.

use std::sync::Arc;

use locus_component::{Capability, ComponentRef, Object, downcast_ref};
use locus_site::{Folder, GlobalRegistry, SiteConfig};

/// A fresh registry with default configuration and logging to the test
/// writer.
pub fn global() -> Arc<GlobalRegistry> {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	GlobalRegistry::new(SiteConfig::default())
}

/// A registry whose delegation walks stop after `depth` hops.
pub fn global_with_depth(depth: usize) -> Arc<GlobalRegistry> {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	GlobalRegistry::new(SiteConfig {
		max_delegation_depth: depth,
		..SiteConfig::default()
	})
}

pub fn service() -> Capability {
	Capability::new("test.IService")
}

pub fn object(label: &str, cap: &Capability) -> ComponentRef {
	Object::shared(label, cap.clone())
}

/// Label of an [`Object`], or `"?"` for anything else.
pub fn label(component: &ComponentRef) -> String {
	downcast_ref::<Object>(&**component)
		.map(|o| o.label().to_string())
		.unwrap_or_else(|| "?".into())
}

/// Folders `root/a/b/...` for each name in `names`, returned deepest last.
pub fn chain(root: &Arc<Folder>, names: &[&str]) -> Vec<Arc<Folder>> {
	let mut current = root.clone();
	let mut out = Vec::with_capacity(names.len());
	for name in names {
		current = current.add_folder(name);
		out.push(current.clone());
	}
	out
}
