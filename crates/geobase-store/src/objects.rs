//! Live objects of a single type.

use std::collections::HashMap;

use geobase_types::{GeoObject, Region};

/// Map from object id to the object's fully merged state.
///
/// Holds the canonical copy of each object. Everything handed out of the
/// store is a clone.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: HashMap<i64, GeoObject>,
}

impl ObjectStore {
    pub fn get(&self, id: i64) -> Option<&GeoObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut GeoObject> {
        self.objects.get_mut(&id)
    }

    /// Stores `object`, replacing any object with the same id.
    pub fn insert(&mut self, object: GeoObject) {
        self.objects.insert(object.id, object);
    }

    pub fn remove(&mut self, id: i64) -> Option<GeoObject> {
        self.objects.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects inside `include` and, when given, outside `exclude`.
    ///
    /// Order is unspecified.
    pub fn select(&self, include: &Region, exclude: Option<&Region>) -> Vec<GeoObject> {
        self.objects
            .values()
            .filter(|object| object.is_within(include))
            .filter(|object| !exclude.is_some_and(|region| object.is_within(region)))
            .cloned()
            .collect()
    }
}
