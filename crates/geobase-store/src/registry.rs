//! Subscriptions on a single object type.

use std::collections::HashMap;
use std::sync::Arc;

use geobase_types::{Region, RegionPatch, SubscriberId, ValidationError};

use crate::subscriber::Subscriber;

struct Subscription {
    subscriber: Arc<dyn Subscriber>,
    region: Region,
}

/// The region a subscriber had before and after a subscribe call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionChange {
    /// `None` when the subscription is new.
    pub previous: Option<Region>,
    pub current: Region,
}

/// Map from subscriber to its region of interest, for one object type.
///
/// A subscriber has at most one region per type.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<SubscriberId, Subscription>,
}

impl SubscriptionRegistry {
    /// Creates or updates `subscriber`'s region.
    ///
    /// Bounds in `patch` overwrite the existing region; omitted bounds are
    /// kept. The merged region is validated before anything is stored.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` naming the first bound still
    /// missing after the merge. The registry is unchanged in that case.
    pub fn subscribe(
        &mut self,
        subscriber: Arc<dyn Subscriber>,
        patch: &RegionPatch,
    ) -> Result<RegionChange, ValidationError> {
        let id = subscriber.id();
        let previous = self.entries.get(&id).map(|entry| entry.region);
        let current = patch.merge_onto(previous.as_ref())?;

        self.entries.insert(
            id,
            Subscription {
                subscriber,
                region: current,
            },
        );

        Ok(RegionChange { previous, current })
    }

    /// Removes the subscription, returning whether there was one.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn profile(&self, id: SubscriberId) -> Option<Region> {
        self.entries.get(&id).map(|entry| entry.region)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy of every `(subscriber, region)` pair, taken now.
    ///
    /// Fan-out iterates this copy so that the set of visited subscribers is
    /// fixed for the whole mutation.
    pub fn snapshot(&self) -> Vec<(Arc<dyn Subscriber>, Region)> {
        self.entries
            .values()
            .map(|entry| (Arc::clone(&entry.subscriber), entry.region))
            .collect()
    }
}
