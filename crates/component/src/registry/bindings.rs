//! Immutable registry state.
//!
//! A [`Bindings`] value is one published version of a registry. Writers clone
//! it, mutate the clone inside a transaction, and swap the result in; readers
//! only ever see whole versions.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::registration::{Registration, RegistrationId, Status};

/// Stable identity of a registration stack within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackId(pub(crate) u64);

impl fmt::Display for StackId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "stack#{}", self.0)
	}
}

#[derive(Clone)]
pub(crate) struct Member {
	pub(crate) registration: Arc<Registration>,
	pub(crate) status: Status,
}

#[derive(Clone)]
pub(crate) struct StackState {
	pub(crate) id: StackId,
	/// Insertion order; does not decide which member is active.
	pub(crate) members: Vec<Member>,
}

impl StackState {
	fn new(id: StackId) -> Self {
		Self {
			id,
			members: Vec::new(),
		}
	}

	pub(crate) fn position(&self, id: RegistrationId) -> Option<usize> {
		self.members.iter().position(|m| m.registration.id() == id)
	}

	/// Index of the unique active member.
	///
	/// More than one active member means an earlier write broke the
	/// activation discipline; that is reported, never repaired.
	pub(crate) fn active_index(&self, name: &str) -> Result<Option<usize>, RegistryError> {
		let mut found = None;
		let mut active = 0;
		for (i, member) in self.members.iter().enumerate() {
			if member.status == Status::Active {
				active += 1;
				found.get_or_insert(i);
			}
		}
		if active > 1 {
			tracing::warn!(name, active, stack = %self.id, "multiple active registrations");
			return Err(RegistryError::InvariantViolation {
				name: name.to_string(),
				active,
			});
		}
		Ok(found)
	}

	pub(crate) fn active(&self, name: &str) -> Result<Option<Arc<Registration>>, RegistryError> {
		Ok(self
			.active_index(name)?
			.map(|i| self.members[i].registration.clone()))
	}
}

#[derive(Clone, Default)]
pub(crate) struct Bindings {
	pub(crate) stacks: FxHashMap<Box<str>, Arc<StackState>>,
	/// Stack names in creation order.
	pub(crate) order: Vec<Box<str>>,
	/// Current stack name of every registered registration.
	pub(crate) names: FxHashMap<RegistrationId, Box<str>>,
	pub(crate) next_stack: u64,
	pub(crate) generation: u64,
}

impl Bindings {
	pub(crate) fn stack(&self, name: &str) -> Option<&Arc<StackState>> {
		self.stacks.get(name)
	}

	/// Creates the stack for `name` if missing. Returns its id and whether it
	/// was created.
	pub(crate) fn ensure_stack(&mut self, name: &str) -> (StackId, bool) {
		if let Some(stack) = self.stacks.get(name) {
			return (stack.id, false);
		}
		let id = StackId(self.next_stack);
		self.next_stack += 1;
		self.stacks.insert(name.into(), Arc::new(StackState::new(id)));
		self.order.push(name.into());
		(id, true)
	}

	pub(crate) fn stack_mut(&mut self, name: &str) -> Option<&mut StackState> {
		self.stacks.get_mut(name).map(Arc::make_mut)
	}

	pub(crate) fn contains(&self, id: RegistrationId) -> bool {
		self.names.contains_key(&id)
	}

	pub(crate) fn name_of(&self, id: RegistrationId) -> Option<Box<str>> {
		self.names.get(&id).cloned()
	}

	pub(crate) fn status_of(&self, id: RegistrationId) -> Status {
		self.names
			.get(&id)
			.and_then(|name| self.stacks.get(name))
			.and_then(|stack| stack.position(id).map(|i| stack.members[i].status))
			.unwrap_or(Status::Unregistered)
	}

	pub(crate) fn active(&self, name: &str) -> Result<Option<Arc<Registration>>, RegistryError> {
		match self.stacks.get(name) {
			Some(stack) => stack.active(name),
			None => Ok(None),
		}
	}

	/// Names whose stack has at least one member, in creation order.
	pub(crate) fn populated_names(&self) -> impl Iterator<Item = &str> {
		self.order
			.iter()
			.filter(|name| self.stacks.get(&**name).is_some_and(|s| !s.members.is_empty()))
			.map(|name| &**name)
	}
}
