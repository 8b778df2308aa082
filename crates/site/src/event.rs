//! Site lifecycle notifications.
//!
//! The engine emits [`SiteEvent::ObjectCreated`] and
//! [`SiteEvent::RegistryChanged`] itself, and emits [`SiteEvent::BeforeTraverse`]
//! and [`SiteEvent::EndRequest`] on behalf of the request layer. Subscribers
//! are called synchronously, in subscription order, with no bus lock held, so
//! a subscriber may subscribe further listeners or query sites freely.

use std::fmt;
use std::sync::Arc;

use locus_component::Commit;
use parking_lot::RwLock;

/// Something that happened to a site or a request traversing sites.
#[derive(Debug, Clone)]
pub enum SiteEvent {
	/// A management folder was created.
	ObjectCreated { path: String },
	/// Traversal is about to enter `path`.
	BeforeTraverse { path: String, is_site: bool },
	/// A request finished and released its current site.
	EndRequest,
	/// A site's local registry published a commit.
	RegistryChanged { path: String, commit: Commit },
}

impl SiteEvent {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::ObjectCreated { .. } => "object_created",
			Self::BeforeTraverse { .. } => "before_traverse",
			Self::EndRequest => "end_request",
			Self::RegistryChanged { .. } => "registry_changed",
		}
	}
}

type Subscriber = Arc<dyn Fn(&SiteEvent) + Send + Sync>;

/// Ordered list of event subscribers.
#[derive(Default)]
pub struct EventBus {
	subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&self, subscriber: impl Fn(&SiteEvent) + Send + Sync + 'static) {
		self.subscribers.write().push(Arc::new(subscriber));
	}

	pub fn len(&self) -> usize {
		self.subscribers.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Delivers `event` to every current subscriber.
	pub fn notify(&self, event: &SiteEvent) {
		let subscribers = self.subscribers.read().clone();
		tracing::trace!(event = event.kind(), subscribers = subscribers.len(), "site event");
		for subscriber in subscribers {
			subscriber(event);
		}
	}
}

impl fmt::Debug for EventBus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus")
			.field("subscribers", &self.len())
			.finish()
	}
}
