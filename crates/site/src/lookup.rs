//! The lookup interface shared by site managers and the global registry.

use std::fmt;
use std::sync::Arc;

use locus_component::{Capability, ComponentRef, LookupError, Registration, RegistrationKind};

use crate::error::ImportError;

/// The adapter registration that won a lookup, with its factory resolved by
/// whoever answered.
#[derive(Clone)]
pub struct AdapterMatch {
	pub registration: Arc<Registration>,
	pub factory: ComponentRef,
}

impl AdapterMatch {
	/// Runs the factory on `objects`.
	pub fn create(&self, objects: &[ComponentRef]) -> Option<ComponentRef> {
		Some(self.factory.factory()?.create(objects))
	}
}

impl fmt::Debug for AdapterMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AdapterMatch")
			.field("registration", &self.registration.id())
			.field("factory", &self.factory)
			.finish()
	}
}

/// Resolves utilities, adapters, and views.
///
/// Implementors supply the two registration lookups; the component-level
/// `query_*`/`get_*` pairs are derived from them. `query_*` returns
/// `Ok(None)` on a miss, `get_*` turns the miss into a [`LookupError`].
pub trait ComponentLookup: Send + Sync {
	/// Registration of the utility providing `provided` under `name`.
	fn lookup_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<Arc<Registration>>, LookupError>;

	/// The adapter from `objects` to `provided` under `name`.
	fn lookup_adapter(
		&self,
		objects: &[ComponentRef],
		provided: &Capability,
		name: &str,
	) -> Result<Option<AdapterMatch>, LookupError>;

	fn query_utility(
		&self,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		Ok(self
			.lookup_utility(provided, name)?
			.map(|reg| reg.component().clone()))
	}

	fn get_utility(&self, provided: &Capability, name: &str) -> Result<ComponentRef, LookupError> {
		self.query_utility(provided, name)?
			.ok_or_else(|| LookupError::Utility {
				capability: provided.id().to_string(),
				name: name.to_string(),
			})
	}

	/// Adapts `objects` by calling the matching factory.
	fn query_multi_adapter(
		&self,
		objects: &[ComponentRef],
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		Ok(self
			.lookup_adapter(objects, provided, name)?
			.and_then(|found| found.create(objects)))
	}

	fn query_adapter(
		&self,
		object: &ComponentRef,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		self.query_multi_adapter(std::slice::from_ref(object), provided, name)
	}

	fn get_adapter(
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

	/// A view is an adapter of `object` and `request`.
	fn query_view(
		&self,
		object: &ComponentRef,
		request: &ComponentRef,
		provided: &Capability,
		name: &str,
	) -> Result<Option<ComponentRef>, LookupError> {
		self.query_multi_adapter(&[object.clone(), request.clone()], provided, name)
	}

	fn get_view(
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

/// Pairs `reg` with its factory, resolving a dotted factory name through
/// `resolve`.
pub(crate) fn bind_factory(
	reg: Arc<Registration>,
	resolve: impl FnOnce(&str) -> Result<ComponentRef, ImportError>,
) -> Result<AdapterMatch, LookupError> {
	let factory = match reg.factory_name() {
		None => reg.component().clone(),
		Some(path) => resolve(path).map_err(|err| {
			tracing::warn!(factory = path, id = %reg.id(), error = %err, "adapter factory not resolved");
			LookupError::Factory {
				factory: path.to_string(),
				reason: err.to_string(),
			}
		})?,
	};
	if factory.factory().is_none() {
		return Err(LookupError::Factory {
			factory: reg.factory_name().unwrap_or_default().to_string(),
			reason: "not an adapter factory".to_string(),
		});
	}
	Ok(AdapterMatch {
		registration: reg,
		factory,
	})
}

/// True if `reg` is a utility providing `provided`.
pub(crate) fn utility_matches(reg: &Registration, provided: &Capability) -> bool {
	reg.kind().is_utility() && reg.provided().is_or_extends(provided)
}

/// Specificity of `reg` for adapting `objects` to `provided`: the summed
/// capability distance, lower is better. `None` if it does not apply.
pub(crate) fn adapter_score(
	reg: &Registration,
	objects: &[ComponentRef],
	provided: &Capability,
) -> Option<usize> {
	let RegistrationKind::Adapter { .. } = reg.kind() else {
		return None;
	};
	let provided_distance = reg.provided().distance_to(provided)?;
	let required = reg.kind().required();
	if required.len() != objects.len() {
		return None;
	}
	let mut score = provided_distance;
	for (object, cap) in objects.iter().zip(&required) {
		score += object.capabilities().distance_to(cap)?;
	}
	Some(score)
}
