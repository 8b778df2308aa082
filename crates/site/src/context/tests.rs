use locus_component::{CapabilitySet, Component, Object, Permission, same_component};

use super::*;
use crate::config::SiteConfig;
use crate::location::Folder;

fn cap() -> Capability {
	Capability::new("test.IService")
}

/// Wrapper recording the permission it was created for.
#[derive(Debug)]
struct Guarded {
	inner: ComponentRef,
	permission: Permission,
}

impl Component for Guarded {
	fn capabilities(&self) -> &CapabilitySet {
		self.inner.capabilities()
	}
}

struct Wrapping;

impl SecurityPolicy for Wrapping {
	fn wrap(&self, component: ComponentRef, permission: &Permission) -> ComponentRef {
		Arc::new(Guarded {
			inner: component,
			permission: permission.clone(),
		})
	}
}

fn tree() -> (Arc<GlobalRegistry>, Arc<Folder>, Arc<SiteManager>) {
	let global = GlobalRegistry::new(SiteConfig::default());
	let root = Folder::root();
	let sm = root.add_folder("site").make_site(&global).unwrap();
	(global, root, sm)
}

#[test]
fn test_no_site_uses_global() {
	let (global, _root, sm) = tree();
	let from_global = Object::shared("g", cap());
	global
		.provide_utility("u", cap(), from_global.clone())
		.unwrap();
	sm.install_utility("u", cap(), Object::shared("local", cap()))
		.unwrap();

	let ctx = RequestContext::new(global);
	assert!(ctx.site().is_none());
	assert!(same_component(&ctx.get_utility(&cap(), "u").unwrap(), &from_global));
}

#[test]
fn test_enter_site_restores_previous() {
	let (global, root, sm) = tree();
	let outer = root.make_site(&global).unwrap();
	let ctx = RequestContext::new(global);
	ctx.set_site(Some(outer.clone()));

	{
		let _scope = ctx.enter_site(sm.clone());
		assert!(Arc::ptr_eq(&ctx.site().unwrap(), &sm));
	}
	assert!(Arc::ptr_eq(&ctx.site().unwrap(), &outer));

	ctx.clear_site();
	assert!(ctx.site().is_none());
}

#[test]
fn test_before_traverse_sets_site_only_for_sites() {
	let (global, root, sm) = tree();
	let ctx = RequestContext::new(global);
	let plain: Arc<dyn Location> = root.add_folder("plain");
	let site: Arc<dyn Location> = root.get("site").unwrap();

	ctx.before_traverse(&plain);
	assert!(ctx.site().is_none());
	ctx.before_traverse(&site);
	assert!(Arc::ptr_eq(&ctx.site().unwrap(), &sm));
	ctx.before_traverse(&plain);
	assert!(Arc::ptr_eq(&ctx.site().unwrap(), &sm));

	ctx.end_request();
	assert!(ctx.site().is_none());
}

/// Components registered with a permission come back wrapped.
#[test]
fn test_policy_wraps_permissioned_utilities() {
	let (global, _root, sm) = tree();
	let open = Object::shared("open", cap());
	let secret = Object::shared("secret", cap());
	sm.install_utility("open", cap(), open.clone()).unwrap();
	let reg = Registration::utility("secret", cap(), secret.clone())
		.permission(Permission::new("test.View"))
		.build()
		.unwrap();
	sm.register(&reg).unwrap();
	reg.activate().unwrap();

	let ctx = RequestContext::new(global).with_policy(Arc::new(Wrapping));
	let _scope = ctx.enter_site(sm);

	assert!(same_component(&ctx.get_utility(&cap(), "open").unwrap(), &open));
	let wrapped = ctx.get_utility(&cap(), "secret").unwrap();
	let guarded = locus_component::downcast_ref::<Guarded>(&*wrapped).unwrap();
	assert!(same_component(&guarded.inner, &secret));
	assert_eq!(guarded.permission.id(), "test.View");
}

#[test]
fn test_view_through_context() {
	let (global, _root, sm) = tree();
	let content = Capability::new("test.Content");
	let layer = Capability::new("test.Layer");
	let page = Capability::new("test.Page");
	let factory = {
		let page = page.clone();
		locus_component::FnFactory::shared(move |objects: &[ComponentRef]| {
			assert_eq!(objects.len(), 2);
			Object::shared("page", page.clone())
		})
	};
	let reg = Registration::view("index", page.clone(), factory, &[content.clone()], layer.clone())
		.build()
		.unwrap();
	sm.register(&reg).unwrap();
	reg.activate().unwrap();

	let ctx = RequestContext::new(global);
	let object = Object::shared("doc", content);
	let request = Object::shared("req", layer);
	assert!(ctx.query_view(&object, &request, &page, "index").unwrap().is_none());

	let _scope = ctx.enter_site(sm);
	assert!(ctx.get_view(&object, &request, &page, "index").is_ok());
	assert_eq!(
		ctx.get_view(&object, &object, &page, "index").unwrap_err(),
		LookupError::View {
			capability: "test.Page".into(),
			name: "index".into()
		}
	);
}

#[test]
fn test_request_traverse_and_drop() {
	let (global, root, sm) = tree();
	root.get("site").unwrap().add_folder("docs");
	let events = Arc::new(Mutex::new(Vec::new()));
	let sink = events.clone();
	global.events().subscribe(move |event: &SiteEvent| {
		sink.lock().push(event.kind());
	});

	let request = Request::new(global, root.clone());
	let leaf = request.traverse("/site/docs").unwrap();
	assert_eq!(location_path(&*leaf), "/site/docs");
	assert!(Arc::ptr_eq(&request.context().site().unwrap(), &sm));

	let err = request.traverse("site/missing").unwrap_err();
	assert_eq!(
		err,
		LookupError::Traversal {
			path: "/site".into(),
			name: "missing".into()
		}
	);
	drop(request);

	let events = events.lock();
	assert_eq!(events.last(), Some(&"end_request"));
	assert_eq!(
		events.iter().filter(|k| **k == "before_traverse").count(),
		5
	);
}
