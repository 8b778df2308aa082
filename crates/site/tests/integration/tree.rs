use std::sync::Arc;

use locus_component::{ConfigurationError, LookupError, same_component};
use locus_site::{
	ComponentLookup, Folder, Location, SiteManager, get_next_site_manager, lookup_target_for,
	query_next_site_manager, site_manager_for,
};
use pretty_assertions::assert_eq;

use crate::common::{chain, global, label, object, service};

fn same(a: &Arc<SiteManager>, b: &Arc<SiteManager>) -> bool {
	Arc::ptr_eq(a, b)
}

fn is_sub(parent: &SiteManager, child: &Arc<SiteManager>) -> bool {
	parent.sub_sites().iter().any(|s| same(s, child))
}

/// root -> A -> B, then C interposed between A and B.
#[test]
fn interposed_site_adopts_subsite() {
	let global = global();
	let root = Folder::root();
	root.make_site(&global).unwrap();
	let folders = chain(&root, &["a", "c", "b"]);
	let a = folders[0].make_site(&global).unwrap();
	let b = folders[2].make_site(&global).unwrap();
	assert!(is_sub(&a, &b));

	let c = folders[1].make_site(&global).unwrap();

	assert!(same(&get_next_site_manager(&b).unwrap(), &c));
	assert!(is_sub(&c, &b));
	assert!(!is_sub(&a, &b));
	assert!(is_sub(&a, &c));
}

/// Interposition changes what a deeper site sees.
#[test]
fn interposed_site_shadows_for_descendants() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let folders = chain(&root, &["mid", "leaf"]);
	let leaf = folders[1].make_site(&global).unwrap();
	root_sm
		.install_utility("u", service(), object("root", &service()))
		.unwrap();
	assert_eq!(label(&leaf.get_utility(&service(), "u").unwrap()), "root");

	let mid = folders[0].make_site(&global).unwrap();
	mid.install_utility("u", service(), object("mid", &service()))
		.unwrap();
	assert_eq!(label(&leaf.get_utility(&service(), "u").unwrap()), "mid");
}

#[test]
fn detached_site_has_no_context() {
	let global = global();
	let loose = Folder::detached("loose");
	let inner = loose.add_folder("inner");
	assert_eq!(
		inner.make_site(&global).unwrap_err(),
		ConfigurationError::NotEnoughContext {
			location: "/loose/inner".into()
		}
	);
	assert!(global.top_sites().is_empty());
}

#[test]
fn next_site_manager_helpers() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let sub = root.add_folder("sub").make_site(&global).unwrap();

	assert!(same(&query_next_site_manager(&sub).unwrap(), &root_sm));
	assert!(query_next_site_manager(&root_sm).is_none());
	assert_eq!(
		get_next_site_manager(&root_sm).unwrap_err(),
		LookupError::NextSiteManager
	);
}

#[test]
fn site_manager_for_walks_up() {
	let global = global();
	let root = Folder::root();
	let folders = chain(&root, &["site", "x", "y"]);
	let sm = folders[0].make_site(&global).unwrap();

	let deep: Arc<dyn Location> = folders[2].clone();
	assert!(same(&site_manager_for(&deep).unwrap(), &sm));

	let outside: Arc<dyn Location> = root.add_folder("elsewhere");
	assert_eq!(
		site_manager_for(&outside).unwrap_err(),
		LookupError::SiteManager {
			location: "/elsewhere".into()
		}
	);

	let from_global = object("g", &service());
	global
		.provide_utility("u", service(), from_global.clone())
		.unwrap();
	sm.install_utility("u", service(), object("local", &service()))
		.unwrap();
	let target = lookup_target_for(&outside, &global);
	assert!(same_component(&target.get_utility(&service(), "u").unwrap(), &from_global));
	let target = lookup_target_for(&deep, &global);
	assert_eq!(label(&target.get_utility(&service(), "u").unwrap()), "local");
}

/// Local entries come first, then each enclosing site's, outward.
#[test]
fn query_component_orders_local_first() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let sub = root.add_folder("sub").make_site(&global).unwrap();
	root_sm
		.install_utility("shared", service(), object("r", &service()))
		.unwrap();
	sub.install_utility("shared", service(), object("s1", &service()))
		.unwrap();
	sub.add_folder("tools")
		.add("hammer", object("s2", &service()));

	let paths: Vec<String> = sub
		.query_component(Some(&service()), None, true)
		.unwrap()
		.into_iter()
		.map(|entry| entry.path)
		.collect();
	assert_eq!(
		paths,
		vec![
			"/sub/++etc++site/default/shared",
			"/sub/++etc++site/tools/hammer",
			"/++etc++site/default/shared",
		]
	);

	let local_only = sub.query_component(Some(&service()), None, false).unwrap();
	assert_eq!(local_only.len(), 2);
}

/// Dropping a subsite's folder leaves its parent's list pruned on the next
/// change.
#[test]
fn dropped_subsite_pruned() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	root.add_folder("gone").make_site(&global).unwrap();
	root.add_folder("kept").make_site(&global).unwrap();
	assert_eq!(root_sm.sub_sites().len(), 2);

	root.remove("gone");
	assert_eq!(root_sm.sub_sites().len(), 1);

	root.add_folder("new").make_site(&global).unwrap();
	let paths: Vec<String> = root_sm
		.sub_sites()
		.iter()
		.map(|s| s.path().to_string())
		.collect();
	assert_eq!(paths, vec!["/kept", "/new"]);
}
