use std::sync::Arc;

use locus_component::{Capability, ComponentRef, DottedFactory, FnFactory, LookupError, Registration};
use locus_site::{ComponentLookup, Folder, ImportError, Module};
use pretty_assertions::assert_eq;

use crate::common::{global, label, object, service};

fn module(name: &str, attr: &str, value: &str) -> Arc<Module> {
	let module = Module::new(name);
	module.set(attr, object(value, &service()));
	module
}

#[test]
fn resolve_prefers_nearest_site() {
	let global = global();
	global.provide_module(module("pkg.tools", "hammer", "global"));
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let sub = root.add_folder("sub").make_site(&global).unwrap();

	assert_eq!(label(&sub.resolve("pkg.tools.hammer").unwrap()), "global");

	let outer: ComponentRef = module("pkg.tools", "hammer", "root");
	root_sm.default_folder().unwrap().add("pkg.tools.mod", outer);
	assert_eq!(label(&sub.resolve("pkg.tools.hammer").unwrap()), "root");

	sub.provide_module(module("pkg.tools", "hammer", "sub"));
	assert_eq!(label(&sub.resolve("pkg.tools.hammer").unwrap()), "sub");
	assert_eq!(label(&root_sm.resolve("pkg.tools.hammer").unwrap()), "root");
}

#[test]
fn resolve_errors() {
	let global = global();
	global.provide_module(module("pkg", "present", "x"));
	let root = Folder::root();
	let sm = root.make_site(&global).unwrap();

	assert_eq!(
		sm.resolve("nodots").unwrap_err(),
		ImportError::InvalidName {
			name: "nodots".into()
		}
	);
	assert_eq!(
		sm.resolve("missing.attr").unwrap_err(),
		ImportError::NotFound {
			name: "missing".into()
		}
	);
	assert_eq!(
		sm.resolve("pkg.absent").unwrap_err(),
		ImportError::Attribute {
			module: "pkg".into(),
			attr: "absent".into()
		}
	);
	assert_eq!(
		sm.find_module("pkg..x").unwrap_err(),
		ImportError::InvalidName {
			name: "pkg..x".into()
		}
	);
}

/// An adapter whose factory is named by dotted path picks up a module
/// installed in its site's management folder over the global one.
#[test]
fn adapter_factory_follows_site_modules() {
	let global = global();
	let content = Capability::new("test.Content");
	let summary = Capability::new("test.Summary");
	let factories = |label: &'static str| {
		let module = Module::new("app.factories");
		let summary = summary.clone();
		module.set(
			"summarize",
			FnFactory::shared(move |_: &[ComponentRef]| object(label, &summary)),
		);
		module
	};
	global.provide_module(factories("global"));
	let root = Folder::root();
	let root_sm = root.make_site(&global).unwrap();
	let sub = root.add_folder("sub").make_site(&global).unwrap();

	let reg = Registration::adapter(
		"",
		summary.clone(),
		DottedFactory::shared("app.factories.summarize"),
	)
	.required(content.clone())
	.build()
	.unwrap();
	root_sm.register(&reg).unwrap();
	reg.activate().unwrap();
	let doc = object("doc", &content);
	assert_eq!(label(&sub.get_adapter(&doc, &summary, "").unwrap()), "global");

	let local: ComponentRef = factories("site");
	root_sm
		.default_folder()
		.unwrap()
		.add("app.factories.mod", local);
	assert_eq!(label(&sub.get_adapter(&doc, &summary, "").unwrap()), "site");

	root_sm.default_folder().unwrap().remove("app.factories.mod");
	global.modules().remove("app.factories");
	assert_eq!(
		sub.get_adapter(&doc, &summary, "").unwrap_err(),
		LookupError::Factory {
			factory: "app.factories.summarize".into(),
			reason: "no module named \"app.factories\"".into()
		}
	);
}
