//! Local registries of named registration stacks.
//!
//! # Mental Model
//!
//! A [`LocalRegistry`] maps registration names to [`RegistrationStack`]s.
//! Each stack orders the registrations sharing a name and has at most one
//! active member; that member's component is what the name resolves to.
//!
//! # Concurrency
//!
//! - **Reads:** wait-free. Every query loads one published snapshot, so a
//!   reader sees either all of a transaction or none of it.
//! - **Writes:** serialized by a per-registry mutex. A writer clones the
//!   current snapshot, applies its mutations, and swaps the result in.
//!   Check-then-create in [`LocalRegistry::create_registrations`] and the
//!   four-step [`LocalRegistry::rename`] therefore run as one unit.
//!
//! # Invariants
//!
//! - At most one active registration per stack.
//!   - Enforced in: [`Transaction::activate`] (displaces the previous one).
//!   - Checked by: [`RegistrationStack::active`], which reports
//!     [`RegistryError::InvariantViolation`] instead of picking a winner.
//! - Rename never exposes the intermediate inactive state.
//!   - Enforced in: [`Transaction::rename`] (single commit).
//! - Aborted transactions publish nothing.
//!   - Enforced in: [`LocalRegistry::transaction`].

mod bindings;
mod stack;
mod transaction;

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

pub use self::bindings::StackId;
use self::bindings::Bindings;
pub use self::stack::RegistrationStack;
pub use self::transaction::{ChangeKind, ChangeListener, Commit, Transaction};
use crate::component::ComponentRef;
use crate::error::RegistryError;
use crate::registration::Registration;


pub(crate) struct Shared {
	pub(crate) label: Box<str>,
	snap: ArcSwap<Bindings>,
	write: Mutex<()>,
	listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl Shared {
	pub(crate) fn load(&self) -> Arc<Bindings> {
		self.snap.load_full()
	}
}

/// A keyed collection of registration stacks.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct LocalRegistry {
	shared: Arc<Shared>,
}

impl LocalRegistry {
	/// Creates an empty registry. `label` identifies it in logs and commits.
	pub fn new(label: impl Into<Box<str>>) -> Self {
		Self {
			shared: Arc::new(Shared {
				label: label.into(),
				snap: ArcSwap::from_pointee(Bindings::default()),
				write: Mutex::new(()),
				listeners: RwLock::new(Vec::new()),
			}),
		}
	}

	pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
		Self { shared }
	}

	pub fn label(&self) -> &str {
		&self.shared.label
	}

	/// Number of commits published so far.
	pub fn generation(&self) -> u64 {
		self.shared.load().generation
	}

	/// Returns true if both handles refer to the same registry.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.shared, &b.shared)
	}

	/// Pins the current version for several consistent reads.
	pub fn view(&self) -> RegistryView {
		RegistryView {
			label: self.shared.label.clone(),
			snap: self.shared.load(),
		}
	}

	/// Registers a listener called after every published commit.
	pub fn subscribe(&self, listener: impl ChangeListener + 'static) {
		self.shared.listeners.write().push(Arc::new(listener));
	}

	/// Runs `f` against a staged copy and publishes the result if it returns
	/// `Ok`. On `Err` nothing is published and no notifications are sent.
	///
	/// `f` must not call back into this registry's mutating methods; use the
	/// [`Transaction`] it is given.
	pub fn transaction<T, E>(
		&self,
		f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
	) -> Result<T, E> {
		let guard = self.shared.write.lock();
		let current = self.shared.load();
		let mut txn = Transaction::new(&self.shared, (*current).clone());

		let value = match f(&mut txn) {
			Ok(value) => value,
			Err(err) => {
				tracing::debug!(registry = %self.shared.label, "transaction aborted");
				return Err(err);
			}
		};

		let outcome = txn.finish();
		if outcome.changes.is_empty() {
			return Ok(value);
		}

		let mut staged = outcome.staged;
		staged.generation += 1;
		let commit = Commit {
			registry: self.shared.label.clone(),
			generation: staged.generation,
			changes: outcome.changes,
		};
		self.shared.snap.store(Arc::new(staged));
		for (reg, name) in &outcome.settled {
			reg.set_detached_name(name);
		}
		drop(guard);

		tracing::trace!(
			registry = %commit.registry,
			generation = commit.generation,
			changes = commit.changes.len(),
			"registry commit"
		);
		for notice in &outcome.notices {
			notice.deliver();
		}
		let listeners = self.shared.listeners.read().clone();
		for listener in listeners {
			listener.committed(&commit);
		}
		Ok(value)
	}

	/// Returns the stack for `name`, creating it if missing. Repeated calls
	/// return the same stack.
	pub fn create_registrations(&self, name: &str) -> RegistrationStack {
		if let Some(stack) = self.query_registrations(name) {
			return stack;
		}
		let Ok(id) = self.transaction(|txn| Ok::<_, Infallible>(txn.create_registrations(name)));
		self.stack_handle(name, id)
	}

	/// Returns the stack for `name` without creating it.
	pub fn query_registrations(&self, name: &str) -> Option<RegistrationStack> {
		let snap = self.shared.load();
		let id = snap.stack(name)?.id;
		Some(self.stack_handle(name, id))
	}

	/// Names with at least one registration, in stack creation order.
	pub fn list_registration_names(&self) -> Vec<String> {
		self.view().list_registration_names()
	}

	/// Component of the active registration under `name`.
	pub fn query_active_component(&self, name: &str) -> Result<Option<ComponentRef>, RegistryError> {
		self.view().query_active_component(name)
	}

	/// The active registration under `name`.
	pub fn active_registration(&self, name: &str) -> Result<Option<Arc<Registration>>, RegistryError> {
		self.shared.load().active(name)
	}

	/// Every registration, grouped by stack in creation order.
	pub fn registrations(&self) -> Vec<Arc<Registration>> {
		self.view().registrations()
	}

	/// Adds `reg` (inactive) to the stack for its name.
	pub fn register(&self, reg: &Arc<Registration>) -> Result<RegistrationStack, RegistryError> {
		let name = reg.detached_name();
		let id = self.transaction(|txn| txn.register(reg))?;
		tracing::debug!(registry = %self.shared.label, name = %name, id = %reg.id(), "registered");
		Ok(self.stack_handle(&name, id))
	}

	/// Removes `reg`; active registrations are deactivated first.
	pub fn unregister(&self, reg: &Registration) -> Result<(), RegistryError> {
		self.transaction(|txn| txn.unregister(reg))?;
		tracing::debug!(registry = %self.shared.label, id = %reg.id(), "unregistered");
		Ok(())
	}

	pub fn activate(&self, reg: &Registration) -> Result<(), RegistryError> {
		self.transaction(|txn| txn.activate(reg))
	}

	pub fn deactivate(&self, reg: &Registration) -> Result<(), RegistryError> {
		self.transaction(|txn| txn.deactivate(reg))
	}

	/// Renames `reg` preserving its status. See [`Transaction::rename`].
	pub fn rename(&self, reg: &Registration, new_name: &str) -> Result<(), RegistryError> {
		self.transaction(|txn| txn.rename(reg, new_name))
	}

	pub(crate) fn rename_inactive(&self, reg: &Registration, new_name: &str) -> Result<(), RegistryError> {
		self.transaction(|txn| txn.rename_member(reg, new_name))
	}

	pub(crate) fn add_to_stack(
		&self,
		stack: &str,
		reg: &Arc<Registration>,
	) -> Result<(), RegistryError> {
		self.transaction(|txn| txn.add_to_stack(stack, reg).map(|_| ()))
	}

	fn stack_handle(&self, name: &str, id: StackId) -> RegistrationStack {
		RegistrationStack::new(Arc::downgrade(&self.shared), name.into(), id)
	}
}

impl fmt::Debug for LocalRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LocalRegistry")
			.field("label", &self.shared.label)
			.field("generation", &self.generation())
			.finish()
	}
}

/// One pinned version of a registry.
pub struct RegistryView {
	label: Box<str>,
	snap: Arc<Bindings>,
}

impl RegistryView {
	pub fn label(&self) -> &str {
		&self.label
	}

	pub fn generation(&self) -> u64 {
		self.snap.generation
	}

	pub fn list_registration_names(&self) -> Vec<String> {
		self.snap.populated_names().map(String::from).collect()
	}

	pub fn active_registration(&self, name: &str) -> Result<Option<Arc<Registration>>, RegistryError> {
		self.snap.active(name)
	}

	pub fn query_active_component(&self, name: &str) -> Result<Option<ComponentRef>, RegistryError> {
		Ok(self
			.snap
			.active(name)?
			.map(|reg| reg.component().clone()))
	}

	/// Registrations under `name` in insertion order.
	pub fn registrations_for(&self, name: &str) -> Vec<Arc<Registration>> {
		self.snap
			.stack(name)
			.map(|s| s.members.iter().map(|m| m.registration.clone()).collect())
			.unwrap_or_default()
	}

	pub fn registrations(&self) -> Vec<Arc<Registration>> {
		self.snap
			.order
			.iter()
			.filter_map(|name| self.snap.stack(name))
			.flat_map(|s| s.members.iter().map(|m| m.registration.clone()))
			.collect()
	}
}
