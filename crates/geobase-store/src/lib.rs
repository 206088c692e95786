//! In-memory spatial publish/subscribe store for the Geobase platform.
//!
//! Holds live objects per type, the rectangular subscriptions listening on
//! each type, and the change engine that decides who hears about a mutation
//! and what they hear.
//!
//! # Components
//!
//! - [`ObjectStore`] — per-type map from object id to its merged state
//! - [`SubscriptionRegistry`] — per-type map from subscriber to region
//! - [`GeoStore`] — the change engine; the only entry point callers use
//! - [`Subscriber`] — the notification capability implemented by adapters
//!
//! # Delivery rules
//!
//! | Situation | Subscriber sees |
//! |-----------|-----------------|
//! | object created inside region | `notify_created(full object)` |
//! | stationary update inside region | `notify_updated(type, id + changes)` |
//! | moved, was inside before | `notify_updated(type, id + changes)` |
//! | moved in from outside | `notify_updated(full object)` |
//! | deleted inside region | `notify_deleted(full object)` |
//! | resend with nothing changed | nothing |
//!
//! # Concurrency
//!
//! Every object type has its own lock. Upserts, deletes and subscription
//! changes for a type run to completion, fan-out included, under that lock.
//! Subscribers must not call back into the store for the same type from
//! inside a notification.

mod engine;
mod objects;
mod registry;
mod subscriber;

pub use engine::{DeleteOutcome, GeoStore, UpsertOutcome};
pub use objects::ObjectStore;
pub use registry::{RegionChange, SubscriptionRegistry};
pub use subscriber::{Notification, RecordingSubscriber, Subscriber};

pub use geobase_types::{
    ChangeSet, GeoObject, ObjectPatch, Region, RegionPatch, Scalar, SubscriberId, Update,
    ValidationError,
};
