use std::fmt;
use std::sync::{Arc, Weak};

use super::bindings::{StackId, StackState};
use super::{LocalRegistry, Shared};
use crate::error::RegistryError;
use crate::registration::{Registration, Status};

/// Handle to the registrations sharing one name.
///
/// Holds only a weak reference to its registry; every read resolves against
/// the registry's current snapshot. Two handles are equal when they name the
/// same stack of the same registry.
#[derive(Clone)]
pub struct RegistrationStack {
	owner: Weak<Shared>,
	name: Box<str>,
	id: StackId,
}

impl RegistrationStack {
	pub(crate) fn new(owner: Weak<Shared>, name: Box<str>, id: StackId) -> Self {
		Self { owner, name, id }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn id(&self) -> StackId {
		self.id
	}

	/// The owning registry, if it still exists.
	pub fn owner(&self) -> Option<LocalRegistry> {
		self.owner.upgrade().map(LocalRegistry::from_shared)
	}

	fn state(&self) -> Option<Arc<StackState>> {
		let shared = self.owner.upgrade()?;
		let snap = shared.load();
		snap.stack(&self.name).filter(|s| s.id == self.id).cloned()
	}

	/// Members in insertion order.
	pub fn registrations(&self) -> Vec<Arc<Registration>> {
		self.state()
			.map(|s| s.members.iter().map(|m| m.registration.clone()).collect())
			.unwrap_or_default()
	}

	/// Members with their status, read from one snapshot.
	pub fn entries(&self) -> Vec<(Arc<Registration>, Status)> {
		self.state()
			.map(|s| {
				s.members
					.iter()
					.map(|m| (m.registration.clone(), m.status))
					.collect()
			})
			.unwrap_or_default()
	}

	pub fn len(&self) -> usize {
		self.state().map_or(0, |s| s.members.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The unique active member, if any.
	///
	/// Fails with [`RegistryError::InvariantViolation`] if several members
	/// report active.
	pub fn active(&self) -> Result<Option<Arc<Registration>>, RegistryError> {
		match self.state() {
			Some(state) => state.active(&self.name),
			None => Ok(None),
		}
	}

	/// Appends `reg` as an inactive member. `reg` must carry this stack's name.
	pub fn add_registration(&self, reg: &Arc<Registration>) -> Result<(), RegistryError> {
		self.registry()?.add_to_stack(&self.name, reg)
	}

	/// Activates a member of this stack, deactivating the current one.
	pub fn activate(&self, reg: &Registration) -> Result<(), RegistryError> {
		self.check_member(reg)?;
		self.registry()?.activate(reg)
	}

	pub fn deactivate(&self, reg: &Registration) -> Result<(), RegistryError> {
		self.check_member(reg)?;
		self.registry()?.deactivate(reg)
	}

	fn registry(&self) -> Result<LocalRegistry, RegistryError> {
		self.owner().ok_or(RegistryError::RegistryGone)
	}

	fn check_member(&self, reg: &Registration) -> Result<(), RegistryError> {
		match self.state() {
			Some(state) if state.position(reg.id()).is_some() => Ok(()),
			_ => Err(RegistryError::NotRegistered { id: reg.id() }),
		}
	}
}

impl PartialEq for RegistrationStack {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && Weak::ptr_eq(&self.owner, &other.owner)
	}
}

impl Eq for RegistrationStack {}

impl fmt::Debug for RegistrationStack {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegistrationStack")
			.field("name", &self.name)
			.field("id", &self.id)
			.field("len", &self.len())
			.finish()
	}
}
