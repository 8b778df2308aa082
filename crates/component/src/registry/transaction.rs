//! Staged registry mutations.
//!
//! A [`Transaction`] works on a private copy of the registry state. Nothing
//! it does is visible until the closure passed to
//! [`LocalRegistry::transaction`](super::LocalRegistry::transaction) returns
//! `Ok`; on `Err` the copy is dropped and the registry is untouched.
//! Binding notifications are queued and delivered only after publication.

use std::sync::Arc;

use super::Shared;
use super::bindings::{Bindings, Member, StackId};
use crate::component::ComponentRef;
use crate::error::RegistryError;
use crate::registration::{Registration, RegistrationId, Status};

/// One structural change recorded by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
	StackCreated {
		name: Box<str>,
	},
	Added {
		name: Box<str>,
		id: RegistrationId,
	},
	Removed {
		name: Box<str>,
		id: RegistrationId,
	},
	Activated {
		name: Box<str>,
		id: RegistrationId,
	},
	Deactivated {
		name: Box<str>,
		id: RegistrationId,
	},
	Renamed {
		id: RegistrationId,
		from: Box<str>,
		to: Box<str>,
	},
}

/// Everything a transaction published, in the order it happened.
#[derive(Debug, Clone)]
pub struct Commit {
	pub registry: Box<str>,
	pub generation: u64,
	pub changes: Vec<ChangeKind>,
}

/// Receives every published commit. This is the "object changed" signal for
/// whatever persistence layer wraps the registry.
pub trait ChangeListener: Send + Sync {
	fn committed(&self, commit: &Commit);
}

impl<F> ChangeListener for F
where
	F: Fn(&Commit) + Send + Sync,
{
	fn committed(&self, commit: &Commit) {
		self(commit)
	}
}

pub(crate) struct Notice {
	component: ComponentRef,
	name: Box<str>,
	bound: bool,
}

impl Notice {
	pub(crate) fn deliver(&self) {
		if let Some(aware) = self.component.binding() {
			if self.bound {
				aware.bound(&self.name);
			} else {
				aware.unbound(&self.name);
			}
		}
	}
}

pub(crate) struct Outcome {
	pub(crate) staged: Bindings,
	pub(crate) changes: Vec<ChangeKind>,
	pub(crate) notices: Vec<Notice>,
	pub(crate) settled: Vec<(Arc<Registration>, Box<str>)>,
}

/// Mutable view of a registry's next version.
pub struct Transaction<'a> {
	shared: &'a Arc<Shared>,
	staged: Bindings,
	changes: Vec<ChangeKind>,
	notices: Vec<Notice>,
	/// Detached names to record once the commit is published.
	settled: Vec<(Arc<Registration>, Box<str>)>,
}

impl<'a> Transaction<'a> {
	pub(crate) fn new(shared: &'a Arc<Shared>, staged: Bindings) -> Self {
		Self {
			shared,
			staged,
			changes: Vec::new(),
			notices: Vec::new(),
			settled: Vec::new(),
		}
	}

	pub(crate) fn finish(self) -> Outcome {
		Outcome {
			staged: self.staged,
			changes: self.changes,
			notices: self.notices,
			settled: self.settled,
		}
	}

	/// Status of `reg` as staged so far.
	pub fn status(&self, reg: &Registration) -> Status {
		self.staged.status_of(reg.id())
	}

	/// Name of `reg` as staged so far.
	pub fn name(&self, reg: &Registration) -> Option<String> {
		self.staged.name_of(reg.id()).map(String::from)
	}

	/// Idempotently creates the stack for `name`.
	pub fn create_registrations(&mut self, name: &str) -> StackId {
		let (id, created) = self.staged.ensure_stack(name);
		if created {
			tracing::trace!(registry = %self.shared.label, name, stack = %id, "stack created");
			self.changes.push(ChangeKind::StackCreated { name: name.into() });
		}
		id
	}

	/// Adds `reg` as an inactive member of the stack for its name.
	pub fn register(&mut self, reg: &Arc<Registration>) -> Result<StackId, RegistryError> {
		let name = reg.detached_name();
		self.add(&name, reg)
	}

	/// Adds `reg` to the stack for `stack`; `reg` must carry that name.
	pub(crate) fn add_to_stack(
		&mut self,
		stack: &str,
		reg: &Arc<Registration>,
	) -> Result<StackId, RegistryError> {
		let name = reg.detached_name();
		if *name != *stack {
			return Err(RegistryError::NameMismatch {
				id: reg.id(),
				stack: stack.to_string(),
				registration: name.to_string(),
			});
		}
		self.add(stack, reg)
	}

	fn add(&mut self, name: &str, reg: &Arc<Registration>) -> Result<StackId, RegistryError> {
		reg.claim(self.shared)?;
		if let Some(current) = self.staged.name_of(reg.id()) {
			return Err(RegistryError::AlreadyRegistered {
				id: reg.id(),
				name: current.to_string(),
			});
		}

		let id = self.create_registrations(name);
		let stack = self.stack_mut(name, reg.id())?;
		stack.members.push(Member {
			registration: reg.clone(),
			status: Status::Inactive,
		});
		self.staged.names.insert(reg.id(), name.into());
		self.changes.push(ChangeKind::Added {
			name: name.into(),
			id: reg.id(),
		});
		Ok(id)
	}

	/// Removes `reg`, deactivating it first if needed.
	pub fn unregister(&mut self, reg: &Registration) -> Result<(), RegistryError> {
		let name = self.current_name(reg)?;
		if self.staged.status_of(reg.id()) == Status::Active {
			self.deactivate(reg)?;
		}

		let stack = self.stack_mut(&name, reg.id())?;
		let Some(pos) = stack.position(reg.id()) else {
			return Err(RegistryError::NotRegistered { id: reg.id() });
		};
		let member = stack.members.remove(pos);
		self.staged.names.remove(&reg.id());
		self.changes.push(ChangeKind::Removed {
			name: name.clone(),
			id: reg.id(),
		});
		self.settled.push((member.registration, name));
		Ok(())
	}

	/// Makes `reg` the active member of its stack. A previously active member
	/// is deactivated (and notified) first.
	pub fn activate(&mut self, reg: &Registration) -> Result<(), RegistryError> {
		let name = self.current_name(reg)?;
		let stack = self.stack_mut(&name, reg.id())?;
		let current = stack.active_index(&name)?;
		let Some(pos) = stack.position(reg.id()) else {
			return Err(RegistryError::NotRegistered { id: reg.id() });
		};
		if current == Some(pos) {
			return Ok(());
		}

		let mut displaced = None;
		if let Some(prev) = current {
			stack.members[prev].status = Status::Inactive;
			displaced = Some(stack.members[prev].registration.clone());
		}
		stack.members[pos].status = Status::Active;
		let component = stack.members[pos].registration.component().clone();

		if let Some(prev) = displaced {
			tracing::debug!(
				registry = %self.shared.label,
				name = %name,
				displaced = %prev.id(),
				by = %reg.id(),
				"active registration displaced"
			);
			self.notices.push(Notice {
				component: prev.component().clone(),
				name: name.clone(),
				bound: false,
			});
			self.changes.push(ChangeKind::Deactivated {
				name: name.clone(),
				id: prev.id(),
			});
		}
		self.notices.push(Notice {
			component,
			name: name.clone(),
			bound: true,
		});
		self.changes.push(ChangeKind::Activated { name, id: reg.id() });
		Ok(())
	}

	/// Marks `reg` inactive. No-op if it already is.
	pub fn deactivate(&mut self, reg: &Registration) -> Result<(), RegistryError> {
		let name = self.current_name(reg)?;
		let stack = self.stack_mut(&name, reg.id())?;
		let Some(pos) = stack.position(reg.id()) else {
			return Err(RegistryError::NotRegistered { id: reg.id() });
		};
		if stack.members[pos].status != Status::Active {
			return Ok(());
		}
		stack.members[pos].status = Status::Inactive;
		let component = stack.members[pos].registration.component().clone();

		self.notices.push(Notice {
			component,
			name: name.clone(),
			bound: false,
		});
		self.changes.push(ChangeKind::Deactivated { name, id: reg.id() });
		Ok(())
	}

	/// Renames `reg` whatever its status.
	///
	/// Records the status, forces the registration inactive, moves it to the
	/// stack for `new_name`, then restores the recorded status. All four
	/// steps land in the same commit, so no reader sees the intermediate
	/// inactive state, and the component gets `unbound(old)` then
	/// `bound(new)`.
	///
	/// An active registration cannot move onto a name where a different
	/// registration is active: that fails with
	/// [`RegistryError::ActiveConflict`] before anything is staged.
	pub fn rename(&mut self, reg: &Registration, new_name: &str) -> Result<(), RegistryError> {
		let old = self.current_name(reg)?;
		if *old == *new_name {
			return Ok(());
		}

		let prior = self.staged.status_of(reg.id());
		if prior == Status::Active
			&& let Some(active) = self.staged.active(new_name)?
		{
			return Err(RegistryError::ActiveConflict {
				id: reg.id(),
				name: new_name.to_string(),
				active: active.id(),
			});
		}

		if prior == Status::Active {
			self.deactivate(reg)?;
		}
		self.rename_member(reg, new_name)?;
		if prior == Status::Active {
			self.activate(reg)?;
		}

		tracing::debug!(
			registry = %self.shared.label,
			id = %reg.id(),
			from = %old,
			to = new_name,
			status = %prior,
			"registration renamed"
		);
		Ok(())
	}

	/// Moves an inactive registration to the stack for `new_name`.
	pub(crate) fn rename_member(
		&mut self,
		reg: &Registration,
		new_name: &str,
	) -> Result<(), RegistryError> {
		let old = self.current_name(reg)?;
		let status = self.staged.status_of(reg.id());
		if status == Status::Active {
			return Err(RegistryError::InvalidState {
				id: reg.id(),
				name: old.to_string(),
				status,
			});
		}
		if *old == *new_name {
			return Ok(());
		}

		let stack = self.stack_mut(&old, reg.id())?;
		let Some(pos) = stack.position(reg.id()) else {
			return Err(RegistryError::NotRegistered { id: reg.id() });
		};
		let member = stack.members.remove(pos);

		self.create_registrations(new_name);
		let registration = member.registration.clone();
		self.stack_mut(new_name, reg.id())?.members.push(member);
		self.staged.names.insert(reg.id(), new_name.into());
		self.changes.push(ChangeKind::Renamed {
			id: reg.id(),
			from: old,
			to: new_name.into(),
		});
		self.settled.push((registration, new_name.into()));
		Ok(())
	}

	fn current_name(&self, reg: &Registration) -> Result<Box<str>, RegistryError> {
		self.staged
			.name_of(reg.id())
			.ok_or(RegistryError::NotRegistered { id: reg.id() })
	}

	fn stack_mut(
		&mut self,
		name: &str,
		id: RegistrationId,
	) -> Result<&mut super::bindings::StackState, RegistryError> {
		self.staged
			.stack_mut(name)
			.ok_or(RegistryError::NotRegistered { id })
	}
}
