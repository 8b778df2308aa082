use std::sync::Arc;

use locus_component::LookupError;
use locus_site::{Folder, GlobalRegistry, Location, Request, SiteEvent};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use crate::common::{global, label, object, service};

fn site_tree(global: &Arc<GlobalRegistry>) -> Arc<Folder> {
	let root = Folder::root();
	let shop = root.add_folder("shop");
	shop.make_site(global)
		.unwrap()
		.install_utility("u", service(), object("shop", &service()))
		.unwrap();
	shop.add_folder("cart").add_folder("items");
	global
		.provide_utility("u", service(), object("global", &service()))
		.unwrap();
	root
}

fn record(global: &GlobalRegistry) -> Arc<Mutex<Vec<String>>> {
	let log = Arc::new(Mutex::new(Vec::new()));
	let sink = log.clone();
	global.events().subscribe(move |event: &SiteEvent| match event {
		SiteEvent::BeforeTraverse { path, is_site } => {
			sink.lock().push(format!("traverse {path} {is_site}"));
		}
		SiteEvent::EndRequest => sink.lock().push("end".into()),
		_ => {}
	});
	log
}

#[test]
fn traversal_sets_site_and_drop_clears() {
	let global = global();
	let root: Arc<dyn Location> = site_tree(&global);
	let log = record(&global);

	let request = Request::new(global.clone(), root);
	assert_eq!(label(&request.context().get_utility(&service(), "u").unwrap()), "global");

	let target = request.traverse("shop/cart").unwrap();
	assert_eq!(target.name(), "cart");
	assert_eq!(request.context().site().unwrap().path(), "/shop");
	assert_eq!(label(&request.context().get_utility(&service(), "u").unwrap()), "shop");
	drop(request);

	assert_eq!(
		*log.lock(),
		vec!["traverse / false", "traverse /shop true", "traverse /shop/cart false", "end"]
	);
}

/// A failed traversal still ends the request when the request goes away.
#[test]
fn failed_traversal_still_ends_request() {
	let global = global();
	let root: Arc<dyn Location> = site_tree(&global);
	let log = record(&global);

	{
		let request = Request::new(global.clone(), root);
		let err = request.traverse("shop/missing/deeper").unwrap_err();
		assert_eq!(
			err,
			LookupError::Traversal {
				path: "/shop".into(),
				name: "missing".into()
			}
		);
		assert_eq!(request.context().site().unwrap().path(), "/shop");
	}

	assert_eq!(
		*log.lock(),
		vec!["traverse / false", "traverse /shop true", "end"]
	);
}

/// Concurrent requests each see only their own current site.
#[test]
fn requests_are_independent() {
	let global = global();
	let root = site_tree(&global);
	let other = root.add_folder("other");
	other
		.make_site(&global)
		.unwrap()
		.install_utility("u", service(), object("other", &service()))
		.unwrap();
	let root: Arc<dyn Location> = root;

	std::thread::scope(|scope| {
		for (path, expected) in [("shop/cart", "shop"), ("other", "other"), ("", "global")] {
			let global = global.clone();
			let root = root.clone();
			scope.spawn(move || {
				let request = Request::new(global, root);
				request.traverse(path).unwrap();
				let found = request.context().get_utility(&service(), "u").unwrap();
				assert_eq!(label(&found), expected);
			});
		}
	});
}
