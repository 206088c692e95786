//! Shared types and validation for the Geobase platform.
//!
//! This crate holds the data model every other Geobase crate speaks:
//! typed, geolocated objects ([`GeoObject`]), the partial updates that
//! create and mutate them ([`ObjectPatch`]), the change-sets computed when a
//! patch is merged ([`ChangeSet`]), and the rectangular regions that
//! subscribers listen on ([`Region`], [`RegionPatch`]).
//!
//! Loose JSON bodies coming off the wire are converted into these types
//! through the helpers in [`fields`], which produce a [`ValidationError`]
//! naming the first missing or mis-typed field.

pub mod error;
pub mod fields;
pub mod ids;
pub mod object;
pub mod region;

pub use error::ValidationError;
pub use ids::SubscriberId;
pub use object::{ChangeSet, GeoObject, ObjectPatch, Scalar, Update};
pub use region::{Region, RegionPatch};

/// Property keys that are modelled as dedicated fields rather than free-form
/// properties.
pub const RESERVED_KEYS: [&str; 5] = ["type", "id", "lat", "long", "v"];
