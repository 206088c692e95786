//! Geolocated objects, the patches that mutate them, and change-sets.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::fields;
use crate::region::Region;
use crate::RESERVED_KEYS;

/// Largest integer a JSON consumer can represent exactly as a double.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A single property value.
///
/// Objects only carry scalar properties; nested arrays and maps are
/// rejected at the wire boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Converts a JSON value into a scalar, or `None` for arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Numbers are written as integers when they are whole and exactly
/// representable, so `5.0` goes out as `5`.
struct Number(f64);

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let n = self.0;
        if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            serializer.serialize_i64(n as i64)
        } else {
            serializer.serialize_f64(n)
        }
    }
}

/// `serialize_with` adapter applying the same integer rule to plain `f64` fields.
pub(crate) fn serialize_number<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    Number(*n).serialize(serializer)
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => Number(*n).serialize(serializer),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| de::Error::custom(format!("expected a scalar value, got {}", value)))
    }
}

/// The set of properties that a patch added or changed.
///
/// Keys are property names; `lat`, `long` and `v` appear here like any other
/// property when they change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, Scalar>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the change moved the object, i.e. carries a numeric `lat` or `long`.
    pub fn touches_location(&self) -> bool {
        matches!(self.0.get("lat"), Some(Scalar::Number(_)))
            || matches!(self.0.get("long"), Some(Scalar::Number(_)))
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A live object: typed, identified, located, versioned.
///
/// `(object_type, id)` is the identity. Objects of different types never
/// interact, even when their ids collide.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoObject {
    pub object_type: String,
    pub id: i64,
    pub lat: f64,
    pub long: f64,
    /// Version stamp. Carried along but never consulted for ordering.
    pub v: f64,
    pub props: BTreeMap<String, Scalar>,
}

impl GeoObject {
    /// Builds a new object from the patch that first mentions it.
    ///
    /// An object cannot exist without a location, so `lat` and `long` are
    /// mandatory here. `default_version` is used when the patch has no `v`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` naming `lat` or `long`.
    pub fn create(patch: &ObjectPatch, default_version: f64) -> Result<Self, ValidationError> {
        let lat = patch
            .lat
            .ok_or_else(|| ValidationError::missing("lat", "number"))?;
        let long = patch
            .long
            .ok_or_else(|| ValidationError::missing("long", "number"))?;

        Ok(Self {
            object_type: patch.object_type.clone(),
            id: patch.id,
            lat,
            long,
            v: patch.v.unwrap_or(default_version),
            props: patch.props.clone(),
        })
    }

    /// Whether this object's location falls inside `region` (edges inclusive).
    pub fn is_within(&self, region: &Region) -> bool {
        region.contains(self.lat, self.long)
    }

    /// Looks up a property by wire name, including `lat`, `long` and `v`.
    pub fn get(&self, key: &str) -> Option<Scalar> {
        match key {
            "type" => Some(Scalar::Text(self.object_type.clone())),
            "id" => Some(Scalar::from(self.id)),
            "lat" => Some(Scalar::Number(self.lat)),
            "long" => Some(Scalar::Number(self.long)),
            "v" => Some(Scalar::Number(self.v)),
            other => self.props.get(other).cloned(),
        }
    }

    /// Merges `patch` into this object and reports what actually changed.
    ///
    /// Keys present in the patch overwrite; keys absent from the patch are
    /// kept. A key lands in the returned change-set only if the object did
    /// not have it or held a different value.
    pub fn apply(&mut self, patch: &ObjectPatch) -> ChangeSet {
        let mut changes = ChangeSet::new();

        for (key, slot, incoming) in [
            ("lat", &mut self.lat, patch.lat),
            ("long", &mut self.long, patch.long),
            ("v", &mut self.v, patch.v),
        ] {
            if let Some(value) = incoming {
                if *slot != value {
                    *slot = value;
                    changes.insert(key, value);
                }
            }
        }

        for (key, value) in &patch.props {
            if self.props.get(key) != Some(value) {
                self.props.insert(key.clone(), value.clone());
                changes.insert(key.clone(), value.clone());
            }
        }

        changes
    }

    /// Every field except the identity, as a change-set.
    ///
    /// This is what "changed" when an object comes into existence.
    pub fn to_changes(&self) -> ChangeSet {
        let mut changes: ChangeSet = self
            .props
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        changes.insert("lat", self.lat);
        changes.insert("long", self.long);
        changes.insert("v", self.v);
        changes
    }
}

impl Serialize for GeoObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5 + self.props.len()))?;
        map.serialize_entry("type", &self.object_type)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("lat", &Number(self.lat))?;
        map.serialize_entry("long", &Number(self.long))?;
        map.serialize_entry("v", &Number(self.v))?;
        for (key, value) in &self.props {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// An upsert request: identity plus whichever fields the caller supplied.
///
/// `None` means "not supplied", which is distinct from any value including
/// `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatch {
    pub object_type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub v: Option<f64>,
    pub props: BTreeMap<String, Scalar>,
}

impl ObjectPatch {
    pub fn new(object_type: impl Into<String>, id: i64) -> Self {
        Self {
            object_type: object_type.into(),
            id,
            lat: None,
            long: None,
            v: None,
            props: BTreeMap::new(),
        }
    }

    /// Sets both coordinates.
    pub fn at(mut self, lat: f64, long: f64) -> Self {
        self.lat = Some(lat);
        self.long = Some(long);
        self
    }

    pub fn version(mut self, v: f64) -> Self {
        self.v = Some(v);
        self
    }

    /// Sets a free-form property. Reserved keys have dedicated setters.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        let key = key.into();
        debug_assert!(
            !RESERVED_KEYS.contains(&key.as_str()),
            "reserved key {key} set as property"
        );
        self.props.insert(key, value.into());
        self
    }

    /// Parses a wire body such as `{type: "bus", id: 7, lat: 60.1, long: 24.9, line: "55"}`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming the first offending field: `type`
    /// must be a string, `id` an integer, `lat`/`long`/`v` numbers when
    /// present, and every other property a scalar.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let body = fields::as_body(value)?;

        let mut patch = Self::new(fields::object_type(body)?, fields::object_id(body)?);
        patch.lat = fields::optional_number(body, "lat")?;
        patch.long = fields::optional_number(body, "long")?;
        patch.v = fields::optional_number(body, "v")?;

        for (key, value) in body {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let scalar = Scalar::from_json(value)
                .ok_or_else(|| ValidationError::NotScalar { field: key.clone() })?;
            patch.props.insert(key.clone(), scalar);
        }

        Ok(patch)
    }
}

/// Payload of an update notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Only the changed properties, for subscribers that already hold the object.
    Partial {
        object_type: String,
        id: i64,
        changes: ChangeSet,
    },
    /// The whole object, for subscribers seeing it for the first time.
    Full(GeoObject),
}

impl Update {
    pub fn object_type(&self) -> &str {
        match self {
            Self::Partial { object_type, .. } => object_type,
            Self::Full(object) => &object.object_type,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Partial { id, .. } => *id,
            Self::Full(object) => object.id,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Full(object) => object.serialize(serializer),
            Self::Partial {
                object_type,
                id,
                changes,
            } => {
                let mut map = serializer.serialize_map(Some(2 + changes.len()))?;
                map.serialize_entry("type", object_type)?;
                map.serialize_entry("id", id)?;
                for (key, value) in changes.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
