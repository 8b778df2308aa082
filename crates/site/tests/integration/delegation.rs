use std::sync::Arc;

use locus_component::{
	Capability, ComponentRef, ConfigurationError, FnFactory, LookupError, Object, Registration,
	same_component,
};
use locus_site::{ComponentLookup, Folder, Next, SiteError, SiteManager};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::{chain, global, global_with_depth, label, object, service};

/// Root registers `util-a`; a subsite first sees it through delegation,
/// then shadows it, and the root never sees the subsite's copy.
#[test]
fn util_a_shadowed_by_subsite() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let u1 = object("U1", &service());
	root_sm.install_utility("util-a", service(), u1.clone()).unwrap();

	let s = root.add_folder("s").make_site(&global).unwrap();
	assert!(same_component(&s.get_utility(&service(), "util-a").unwrap(), &u1));

	let u2 = object("U2", &service());
	s.install_utility("util-a", service(), u2.clone()).unwrap();
	assert!(same_component(&s.get_utility(&service(), "util-a").unwrap(), &u2));
	assert!(same_component(&root_sm.get_utility(&service(), "util-a").unwrap(), &u1));
}

/// Deactivating or unregistering the local copy falls through to the
/// ancestor's.
#[test]
fn removal_falls_through() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let s = root.add_folder("s").make_site(&global).unwrap();
	root_sm
		.install_utility("n", service(), object("outer", &service()))
		.unwrap();
	let local = s
		.install_utility("n", service(), object("inner", &service()))
		.unwrap();
	assert_eq!(label(&s.get_utility(&service(), "n").unwrap()), "inner");

	local.deactivate().unwrap();
	assert_eq!(label(&s.get_utility(&service(), "n").unwrap()), "outer");

	local.activate().unwrap();
	assert_eq!(label(&s.get_utility(&service(), "n").unwrap()), "inner");

	local.deactivate().unwrap();
	local.registry().unwrap().unregister(&local).unwrap();
	assert_eq!(label(&s.get_utility(&service(), "n").unwrap()), "outer");
}

/// Unnamed utilities for unrelated capabilities coexist in one site, and
/// each one shadows only the ancestor's registration for its capability.
#[test]
fn unnamed_utilities_keep_their_capability() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let s = root.add_folder("s").make_site(&global).unwrap();
	let mailer = Capability::new("test.IMailer");
	let catalog = Capability::new("test.ICatalog");

	root_sm
		.install_utility("", mailer.clone(), object("root mailer", &mailer))
		.unwrap();
	s.install_utility("", catalog.clone(), object("catalog", &catalog))
		.unwrap();
	assert_eq!(label(&s.get_utility(&mailer, "").unwrap()), "root mailer");

	s.install_utility("", mailer.clone(), object("mailer", &mailer))
		.unwrap();
	assert_eq!(label(&s.get_utility(&mailer, "").unwrap()), "mailer");
	assert_eq!(label(&s.get_utility(&catalog, "").unwrap()), "catalog");
	assert_eq!(label(&root_sm.get_utility(&mailer, "").unwrap()), "root mailer");
}

/// A renamed local registration answers under the new name only.
#[test]
fn rename_moves_lookup() {
	let global = global();
	let root = Folder::root();
	let sm = root.make_site(&global).unwrap();
	let reg = sm
		.install_utility("old", service(), object("u", &service()))
		.unwrap();

	reg.deactivate().unwrap();
	reg.rename("new").unwrap();
	reg.activate().unwrap();

	assert!(sm.query_utility(&service(), "old").unwrap().is_none());
	assert_eq!(label(&sm.get_utility(&service(), "new").unwrap()), "u");
}

#[test]
fn adapters_delegate_outward() {
	let global = global();
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let s = root.add_folder("s").make_site(&global).unwrap();
	let content = Capability::new("test.Content");
	let summary = Capability::new("test.Summary");

	let factory = {
		let summary = summary.clone();
		FnFactory::shared(move |objects: &[ComponentRef]| {
			Object::shared(format!("summary of {}", label(&objects[0])), summary.clone())
		})
	};
	let reg = Registration::adapter("", summary.clone(), factory)
		.required(content.clone())
		.build()
		.unwrap();
	root_sm.register(&reg).unwrap();
	reg.activate().unwrap();

	let doc = object("doc", &content);
	let adapted = s.get_adapter(&doc, &summary, "").unwrap();
	assert_eq!(label(&adapted), "summary of doc");

	let other = object("x", &summary);
	assert_eq!(
		s.get_adapter(&other, &summary, "").unwrap_err(),
		LookupError::Adapter {
			capability: "test.Summary".into(),
			name: "".into()
		}
	);
}

/// Site setup as an application would write it, failing through `?`.
fn install_pair(root: &Arc<Folder>) -> Result<Arc<SiteManager>, SiteError> {
	let global = global();
	let root_sm = root.make_site(&global)?;
	root_sm.install_utility("a", service(), object("a", &service()))?;
	let sub = root.add_folder("sub").make_site(&global)?;
	sub.get_utility(&service(), "a")?;
	Ok(sub)
}

#[test]
fn site_errors_propagate() {
	let root = Folder::root();
	let sub = install_pair(&root).unwrap();
	assert_eq!(sub.path(), "/sub");

	let err = install_pair(&root).unwrap_err();
	assert!(matches!(
		err,
		SiteError::Configuration(ConfigurationError::AlreadySite { .. })
	));
}

/// Nesting with a depth limit below the chain length fails instead of
/// answering.
#[test]
fn depth_limit_reported() {
	let global = global_with_depth(1);
	let root = Folder::root();
	root.make_site(&global).unwrap();
	let folders = chain(&root, &["a", "b"]);
	folders[0].make_site(&global).unwrap();
	let deepest = folders[1].make_site(&global).unwrap();

	assert_eq!(
		deepest.query_utility(&service(), "missing").unwrap_err(),
		LookupError::DelegationTooDeep { depth: 1 }
	);
}

proptest! {
	/// Any pattern of nested sites reaches the global registry in exactly
	/// as many hops as there are enclosing sites.
	#[test]
	fn prop_chain_terminates(sites in proptest::collection::vec(any::<bool>(), 1..8)) {
		let global = global();
		let root = Folder::root();
		let names: Vec<String> = (0..sites.len()).map(|i| format!("f{i}")).collect();
		let refs: Vec<&str> = names.iter().map(String::as_str).collect();
		let folders = chain(&root, &refs);

		let mut depth = 0;
		let mut deepest = None;
		for (folder, is_site) in folders.iter().zip(&sites) {
			if *is_site {
				deepest = Some(folder.make_site(&global).unwrap());
				depth += 1;
			}
		}
		let Some(mut manager) = deepest else {
			return Ok(());
		};

		let mut hops = 1;
		loop {
			match manager.next() {
				Next::Global(g) => {
					prop_assert!(Arc::ptr_eq(&g, &global));
					break;
				}
				Next::Site(next) => {
					prop_assert!(hops < depth);
					manager = next;
					hops += 1;
				}
			}
		}
		prop_assert_eq!(hops, depth);
	}
}
