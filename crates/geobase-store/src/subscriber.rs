//! The notification capability and a buffering adapter.

use std::sync::{Mutex, PoisonError};

use geobase_types::{GeoObject, SubscriberId, Update};

/// Something that wants to hear about objects in a region.
///
/// The store calls these synchronously while holding the lock for the
/// object's type, so implementations must return quickly and must not call
/// back into the store for that type. Adapters that talk to the network
/// should only enqueue.
pub trait Subscriber: Send + Sync {
    /// Stable identity; subscriptions are keyed by it.
    fn id(&self) -> SubscriberId;

    /// An object was created inside the subscriber's region.
    fn notify_created(&self, object: &GeoObject);

    /// An object changed, or came into view.
    fn notify_updated(&self, update: &Update);

    /// An object inside the subscriber's region was deleted.
    fn notify_deleted(&self, object: &GeoObject);
}

/// One recorded call on a [`RecordingSubscriber`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Created(GeoObject),
    Updated(Update),
    Deleted(GeoObject),
}

/// A subscriber that buffers every notification in memory.
///
/// Useful in tests and for callers that poll rather than push.
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    id: SubscriberId,
    received: Mutex<Vec<Notification>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains the buffer.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.received.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn created(&self) -> Vec<GeoObject> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Created(object) => Some(object),
                _ => None,
            })
            .collect()
    }

    pub fn updated(&self) -> Vec<Update> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Updated(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<GeoObject> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Deleted(object) => Some(object),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, notification: Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl Subscriber for RecordingSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn notify_created(&self, object: &GeoObject) {
        self.record(Notification::Created(object.clone()));
    }

    fn notify_updated(&self, update: &Update) {
        self.record(Notification::Updated(update.clone()));
    }

    fn notify_deleted(&self, object: &GeoObject) {
        self.record(Notification::Deleted(object.clone()));
    }
}
