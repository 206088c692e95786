//! Command keywords.

pub const HELLO: &str = "HELLO";
pub const PING: &str = "PING";
pub const PONG: &str = "PONG";

pub const GET: &str = "GET";
pub const LISTEN: &str = "LISTEN";
pub const UNLISTEN: &str = "UNLISTEN";
pub const PROFILE: &str = "PROFILE";
pub const TYPES: &str = "TYPES";

/// Sent by clients to upsert, and by the server to notify.
pub const UPDATE: &str = "UPDATE";
/// Sent by clients to delete, and by the server to notify.
pub const DELETE: &str = "DELETE";
pub const CREATE: &str = "CREATE";

pub const OK: &str = "OK";
pub const ERROR: &str = "ERROR";
pub const OBJECT: &str = "OBJECT";
pub const OBJECTS: &str = "OBJECTS";
