//! Rectangular regions of interest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::fields;
use crate::object::serialize_number;

/// Wire names of the four bounds, in validation order.
pub const BOUND_FIELDS: [&str; 4] = ["minLat", "maxLat", "minLong", "maxLong"];

/// An axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(serialize_with = "serialize_number")]
    pub min_lat: f64,
    #[serde(serialize_with = "serialize_number")]
    pub max_lat: f64,
    #[serde(serialize_with = "serialize_number")]
    pub min_long: f64,
    #[serde(serialize_with = "serialize_number")]
    pub max_long: f64,
}

impl Region {
    /// The region containing every finite location.
    pub const UNBOUNDED: Region = Region {
        min_lat: f64::NEG_INFINITY,
        max_lat: f64::INFINITY,
        min_long: f64::NEG_INFINITY,
        max_long: f64::INFINITY,
    };

    pub fn new(min_lat: f64, max_lat: f64, min_long: f64, max_long: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_long,
            max_long,
        }
    }

    /// Inclusive containment: a point on any edge is inside.
    pub fn contains(&self, lat: f64, long: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_long <= long && long <= self.max_long
    }
}

/// A partial region as supplied to a subscribe call.
///
/// Only the supplied bounds are merged into an existing subscription; the
/// merged result must have all four.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionPatch {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_long: Option<f64>,
    pub max_long: Option<f64>,
}

impl RegionPatch {
    pub fn with_min_lat(mut self, value: f64) -> Self {
        self.min_lat = Some(value);
        self
    }

    pub fn with_max_lat(mut self, value: f64) -> Self {
        self.max_lat = Some(value);
        self
    }

    pub fn with_min_long(mut self, value: f64) -> Self {
        self.min_long = Some(value);
        self
    }

    pub fn with_max_long(mut self, value: f64) -> Self {
        self.max_long = Some(value);
        self
    }

    /// Reads `minLat`, `maxLat`, `minLong`, `maxLong` from a wire body.
    /// Other keys (such as `type`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongType` for the first bound that is
    /// present but not a number.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let body = fields::as_body(value)?;
        Ok(Self {
            min_lat: fields::optional_number(body, "minLat")?,
            max_lat: fields::optional_number(body, "maxLat")?,
            min_long: fields::optional_number(body, "minLong")?,
            max_long: fields::optional_number(body, "maxLong")?,
        })
    }

    /// Overlays this patch onto `base` and checks the result is complete.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` naming the first bound that is
    /// neither in the patch nor in `base`.
    pub fn merge_onto(&self, base: Option<&Region>) -> Result<Region, ValidationError> {
        let pick = |supplied: Option<f64>, existing: Option<f64>, field: &str| {
            supplied
                .or(existing)
                .ok_or_else(|| ValidationError::missing(field, "number"))
        };

        Ok(Region {
            min_lat: pick(self.min_lat, base.map(|r| r.min_lat), BOUND_FIELDS[0])?,
            max_lat: pick(self.max_lat, base.map(|r| r.max_lat), BOUND_FIELDS[1])?,
            min_long: pick(self.min_long, base.map(|r| r.min_long), BOUND_FIELDS[2])?,
            max_long: pick(self.max_long, base.map(|r| r.max_long), BOUND_FIELDS[3])?,
        })
    }

    /// Overlays this patch onto `defaults`; never fails.
    pub fn fill(&self, defaults: &Region) -> Region {
        Region {
            min_lat: self.min_lat.unwrap_or(defaults.min_lat),
            max_lat: self.max_lat.unwrap_or(defaults.max_lat),
            min_long: self.min_long.unwrap_or(defaults.min_long),
            max_long: self.max_long.unwrap_or(defaults.max_long),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_lat.is_none()
            && self.max_lat.is_none()
            && self.min_long.is_none()
            && self.max_long.is_none()
    }
}

impl From<Region> for RegionPatch {
    fn from(region: Region) -> Self {
        Self {
            min_lat: Some(region.min_lat),
            max_lat: Some(region.max_lat),
            min_long: Some(region.min_long),
            max_long: Some(region.max_long),
        }
    }
}
