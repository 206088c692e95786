//! The change engine: mutations, diffing, and fan-out.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use geobase_types::{
    ChangeSet, GeoObject, ObjectPatch, Region, RegionPatch, SubscriberId, Update, ValidationError,
};
use serde::Serialize;

use crate::objects::ObjectStore;
use crate::registry::SubscriptionRegistry;
use crate::subscriber::Subscriber;

/// Result of [`GeoStore::upsert`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertOutcome {
    /// The object did not exist before this call.
    pub created: bool,
    /// `lat` or `long` changed. Never set on creation.
    pub moved: bool,
    /// The object after the merge.
    pub object: GeoObject,
    /// What the call added or changed. Every field on creation; empty for
    /// a resend that changed nothing.
    pub changes: ChangeSet,
}

/// Result of [`GeoStore::delete`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: i64,
    /// The object's last state, or `None` if there was no such object.
    pub deleted: Option<GeoObject>,
}

/// Objects and subscriptions of one type, guarded together.
#[derive(Default)]
struct TypeSpace {
    objects: ObjectStore,
    subscriptions: SubscriptionRegistry,
}

impl TypeSpace {
    fn upsert(&mut self, patch: &ObjectPatch, now: f64) -> Result<UpsertOutcome, ValidationError> {
        let (object, changes, previous_location) = match self.objects.get_mut(patch.id) {
            Some(existing) => {
                let location = (existing.lat, existing.long);
                let changes = existing.apply(patch);
                (existing.clone(), changes, Some(location))
            }
            None => {
                let object = GeoObject::create(patch, now)?;
                self.objects.insert(object.clone());
                let changes = object.to_changes();
                (object, changes, None)
            }
        };

        let created = previous_location.is_none();
        let moved = !created && changes.touches_location();

        if changes.is_empty() {
            tracing::trace!(
                object_type = %object.object_type,
                id = object.id,
                "upsert changed nothing; skipping fan-out"
            );
            return Ok(UpsertOutcome {
                created,
                moved: false,
                object,
                changes,
            });
        }

        let partial = Update::Partial {
            object_type: object.object_type.clone(),
            id: object.id,
            changes: changes.clone(),
        };
        let mut full: Option<Update> = None;
        let mut notified = 0usize;

        for (subscriber, region) in self.subscriptions.snapshot() {
            match previous_location {
                Some((lat, long)) if moved => {
                    if region.contains(lat, long) {
                        subscriber.notify_updated(&partial);
                    } else if object.is_within(&region) {
                        // First sighting: no base state to apply a diff to.
                        let full = full.get_or_insert_with(|| Update::Full(object.clone()));
                        subscriber.notify_updated(full);
                    } else {
                        continue;
                    }
                }
                _ => {
                    if !object.is_within(&region) {
                        continue;
                    }
                    if created {
                        subscriber.notify_created(&object);
                    } else {
                        subscriber.notify_updated(&partial);
                    }
                }
            }
            notified += 1;
        }

        tracing::debug!(
            object_type = %object.object_type,
            id = object.id,
            created,
            moved,
            changed = changes.len(),
            notified,
            "object upserted"
        );

        Ok(UpsertOutcome {
            created,
            moved,
            object,
            changes,
        })
    }

    fn delete(&mut self, object_type: &str, id: i64) -> DeleteOutcome {
        let deleted = self.objects.remove(id);

        if let Some(object) = &deleted {
            let mut notified = 0usize;
            for (subscriber, region) in self.subscriptions.snapshot() {
                if object.is_within(&region) {
                    subscriber.notify_deleted(object);
                    notified += 1;
                }
            }
            tracing::debug!(object_type, id, notified, "object deleted");
        }

        DeleteOutcome {
            object_type: object_type.to_string(),
            id,
            deleted,
        }
    }

    fn subscribe(
        &mut self,
        subscriber: Arc<dyn Subscriber>,
        patch: &RegionPatch,
    ) -> Result<usize, ValidationError> {
        let change = self.subscriptions.subscribe(Arc::clone(&subscriber), patch)?;

        let backfill = self
            .objects
            .select(&change.current, change.previous.as_ref());
        for object in &backfill {
            subscriber.notify_updated(&Update::Full(object.clone()));
        }

        Ok(backfill.len())
    }
}

/// The Geobase store: live objects, subscriptions, and the change engine.
///
/// Cheap to clone; all clones share state. Create one per process and hand
/// it to every connection.
#[derive(Clone, Default)]
pub struct GeoStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    spaces: RwLock<HashMap<String, Arc<Mutex<TypeSpace>>>>,
    /// Every type that has ever had a subscription. Never pruned.
    known_types: RwLock<BTreeSet<String>>,
}

impl GeoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or merges an object and notifies matching subscribers.
    ///
    /// On creation `lat` and `long` are required and a missing `v` is set
    /// to the current time in milliseconds. On update the patch is merged
    /// shallowly. Subscribers are notified before this returns; a patch that
    /// changes nothing notifies no one.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` when creating an object
    /// without `lat` or `long`. Nothing is stored in that case.
    pub fn upsert(&self, patch: ObjectPatch) -> Result<UpsertOutcome, ValidationError> {
        let now = now_millis();
        if self.existing_space(&patch.object_type).is_none() {
            // Unseen type: the object must be creatable before a space is allocated.
            GeoObject::create(&patch, now)?;
        }
        let space = self.space(&patch.object_type);
        let mut space = lock(&space);
        space.upsert(&patch, now)
    }

    /// Deletes an object and notifies subscribers whose region contained it.
    ///
    /// Deleting an unknown object is silent: `deleted` is `None` and no one
    /// is notified.
    pub fn delete(&self, object_type: &str, id: i64) -> DeleteOutcome {
        match self.existing_space(object_type) {
            Some(space) => {
                let mut space = lock(&space);
                space.delete(object_type, id)
            }
            None => DeleteOutcome {
                object_type: object_type.to_string(),
                id,
                deleted: None,
            },
        }
    }

    pub fn get_one(&self, object_type: &str, id: i64) -> Option<GeoObject> {
        let space = self.existing_space(object_type)?;
        let space = lock(&space);
        space.objects.get(id).cloned()
    }

    /// Every object of `object_type` inside `bounds` (everything when `None`).
    pub fn get_all(&self, object_type: &str, bounds: Option<Region>) -> Vec<GeoObject> {
        let Some(space) = self.existing_space(object_type) else {
            return Vec::new();
        };
        let space = lock(&space);
        space
            .objects
            .select(&bounds.unwrap_or(Region::UNBOUNDED), None)
    }

    /// Creates or updates `subscriber`'s region for `object_type`, then
    /// backfills it.
    ///
    /// Backfill sends `notify_updated` with the full object for every stored
    /// object inside the new region that was not already inside the old one.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` if a bound is missing after
    /// merging `patch` onto the existing region. Nothing changes in that case.
    pub fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber>,
        object_type: &str,
        patch: RegionPatch,
    ) -> Result<(), ValidationError> {
        let id = subscriber.id();
        if self.existing_space(object_type).is_none() {
            patch.merge_onto(None)?;
        }
        let backfilled = {
            let space = self.space(object_type);
            let mut space = lock(&space);
            space.subscribe(subscriber, &patch)?
        };

        self.inner
            .known_types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(object_type.to_string());

        tracing::debug!(subscriber = %id, object_type, backfilled, "subscription updated");
        Ok(())
    }

    /// Removes the subscription if present. Idempotent.
    pub fn unsubscribe(&self, subscriber: SubscriberId, object_type: &str) {
        if let Some(space) = self.existing_space(object_type) {
            if lock(&space).subscriptions.unsubscribe(subscriber) {
                tracing::debug!(%subscriber, object_type, "subscription removed");
            }
        }
    }

    pub fn get_profile(&self, subscriber: SubscriberId, object_type: &str) -> Option<Region> {
        let space = self.existing_space(object_type)?;
        let space = lock(&space);
        space.subscriptions.profile(subscriber)
    }

    /// Every type that has ever had a subscription, even if none remain.
    pub fn list_known_types(&self) -> BTreeSet<String> {
        self.inner
            .known_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes `subscriber` from every known type.
    ///
    /// Used by transports when a connection goes away.
    pub fn unsubscribe_all(&self, subscriber: SubscriberId) {
        for object_type in self.list_known_types() {
            self.unsubscribe(subscriber, &object_type);
        }
    }

    #[cfg(test)]
    pub(crate) fn space_count(&self) -> usize {
        self.inner
            .spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn existing_space(&self, object_type: &str) -> Option<Arc<Mutex<TypeSpace>>> {
        self.inner
            .spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(object_type)
            .cloned()
    }

    fn space(&self, object_type: &str) -> Arc<Mutex<TypeSpace>> {
        if let Some(space) = self.existing_space(object_type) {
            return space;
        }
        let mut spaces = self
            .inner
            .spaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(spaces.entry(object_type.to_string()).or_default())
    }
}

/// Locks a type space. A panic in a subscriber poisons the lock but leaves
/// the space consistent, since fan-out runs after the store is updated.
fn lock(space: &Mutex<TypeSpace>) -> MutexGuard<'_, TypeSpace> {
    space.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}
