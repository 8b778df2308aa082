//! Capability descriptors.
//!
//! A [`Capability`] names something a component can do, identified by a
//! stable dotted id and optionally extending other capabilities. Components
//! carry the set of capabilities they satisfy ([`CapabilitySet`]); checks are
//! set membership plus subsumption through `bases`, never introspection.
//!
//! Every capability implicitly extends [`Capability::any`].

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::component::Component;
use crate::error::ConfigurationError;

const ANY_ID: &str = "locus.Any";

static ANY: LazyLock<Capability> = LazyLock::new(|| Capability::new(ANY_ID));

struct CapabilityInner {
	id: Box<str>,
	bases: Box<[Capability]>,
}

/// Cheap-clone handle to a capability descriptor. Equality is by id.
#[derive(Clone)]
pub struct Capability(Arc<CapabilityInner>);

impl Capability {
	/// Creates a capability with no explicit bases.
	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self::extending(id, [])
	}

	/// Creates a capability extending `bases`.
	pub fn extending(id: impl Into<Box<str>>, bases: impl IntoIterator<Item = Capability>) -> Self {
		Self(Arc::new(CapabilityInner {
			id: id.into(),
			bases: bases.into_iter().collect(),
		}))
	}

	/// The root capability every other capability extends.
	pub fn any() -> Self {
		ANY.clone()
	}

	pub fn id(&self) -> &str {
		&self.0.id
	}

	pub fn bases(&self) -> &[Capability] {
		&self.0.bases
	}

	pub fn is_any(&self) -> bool {
		self.id() == ANY_ID
	}

	/// Returns true if `self` is `other` or transitively extends it.
	pub fn is_or_extends(&self, other: &Capability) -> bool {
		self.distance_to(other).is_some()
	}

	/// Number of `extends` hops from `self` to `other`, or `None` when
	/// unrelated. Reaching [`Capability::any`] costs one hop past the
	/// deepest base, so it is always the least specific match.
	pub fn distance_to(&self, other: &Capability) -> Option<usize> {
		if self == other {
			return Some(0);
		}
		if other.is_any() {
			return Some(self.depth() + 1);
		}

		let mut seen: FxHashSet<&str> = FxHashSet::default();
		let mut queue: VecDeque<(&Capability, usize)> = VecDeque::new();
		queue.push_back((self, 0));
		while let Some((cap, hops)) = queue.pop_front() {
			for base in cap.bases() {
				if base == other {
					return Some(hops + 1);
				}
				if seen.insert(base.id()) {
					queue.push_back((base, hops + 1));
				}
			}
		}
		None
	}

	/// True if `component` provides this capability.
	pub fn provided_by(&self, component: &dyn Component) -> bool {
		component.capabilities().provides(self)
	}

	fn depth(&self) -> usize {
		self.bases().iter().map(|b| b.depth() + 1).max().unwrap_or(0)
	}
}

impl PartialEq for Capability {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0) || self.0.id == other.0.id
	}
}

impl Eq for Capability {}

impl Hash for Capability {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.id.hash(state);
	}
}

impl fmt::Debug for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Capability({})", self.id())
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.id())
	}
}

/// The capabilities a component satisfies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
	caps: Vec<Capability>,
}

impl CapabilitySet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a capability, ignoring duplicates.
	pub fn insert(&mut self, cap: Capability) {
		if !self.caps.contains(&cap) {
			self.caps.push(cap);
		}
	}

	pub fn with(mut self, cap: Capability) -> Self {
		self.insert(cap);
		self
	}

	/// True if any member is or extends `cap`.
	pub fn provides(&self, cap: &Capability) -> bool {
		cap.is_any() || self.caps.iter().any(|c| c.is_or_extends(cap))
	}

	/// Smallest hop count from any member to `cap`.
	pub fn distance_to(&self, cap: &Capability) -> Option<usize> {
		let best = self.caps.iter().filter_map(|c| c.distance_to(cap)).min();
		match best {
			None if cap.is_any() => Some(1),
			other => other,
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &Capability> {
		self.caps.iter()
	}

	pub fn len(&self) -> usize {
		self.caps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.caps.is_empty()
	}
}

impl From<Capability> for CapabilitySet {
	fn from(cap: Capability) -> Self {
		Self { caps: vec![cap] }
	}
}

impl FromIterator<Capability> for CapabilitySet {
	fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
		let mut set = CapabilitySet::new();
		for cap in iter {
			set.insert(cap);
		}
		set
	}
}

/// Explicit registry of capability descriptors by dotted id.
#[derive(Default)]
pub struct CapabilityCatalog {
	by_id: RwLock<FxHashMap<Box<str>, Capability>>,
}

impl CapabilityCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Defines `id` with `bases`.
	///
	/// Defining the same id again with the same bases returns the existing
	/// descriptor; different bases is a configuration error.
	pub fn define(
		&self,
		id: &str,
		bases: &[Capability],
	) -> Result<Capability, ConfigurationError> {
		let mut by_id = self.by_id.write();
		if let Some(existing) = by_id.get(id) {
			if existing.bases() == bases {
				return Ok(existing.clone());
			}
			return Err(ConfigurationError::CapabilityRedefined { id: id.to_string() });
		}
		let cap = Capability::extending(id, bases.iter().cloned());
		by_id.insert(id.into(), cap.clone());
		tracing::trace!(capability = id, bases = bases.len(), "capability defined");
		Ok(cap)
	}

	/// Registers an already constructed descriptor under its own id.
	pub fn provide(&self, cap: &Capability) -> Result<(), ConfigurationError> {
		self.define(cap.id(), cap.bases()).map(|_| ())
	}

	pub fn get(&self, id: &str) -> Option<Capability> {
		self.by_id.read().get(id).cloned()
	}

	/// Ids of all defined capabilities, sorted.
	pub fn ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.by_id.read().keys().map(|k| k.to_string()).collect();
		ids.sort_unstable();
		ids
	}

	pub fn len(&self) -> usize {
		self.by_id.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
