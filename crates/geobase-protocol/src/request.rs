use geobase_types::{fields, ObjectPatch, Region, RegionPatch};
use serde_json::Value;

use crate::{command, Frame, ProtocolError};

/// A validated inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Pong,
    /// `GET {type, id}`
    Get { object_type: String, id: i64 },
    /// `GET {type, minLat?, maxLat?, minLong?, maxLong?}`. Omitted bounds are
    /// open; `None` selects every object of the type.
    Query {
        object_type: String,
        bounds: Option<Region>,
    },
    Update(ObjectPatch),
    Delete { object_type: String, id: i64 },
    Listen {
        object_type: String,
        region: RegionPatch,
    },
    Unlisten { object_type: String },
    Profile { object_type: String },
    Types,
}

impl Request {
    /// Validates a frame's body against its command.
    ///
    /// # Errors
    ///
    /// `UnknownCommand` for keywords outside the protocol, `MissingBody` when
    /// a command that needs a body has none, and `Validation` naming the first
    /// offending field otherwise.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let request = match frame.command.as_str() {
            command::PING => Self::Ping,
            command::PONG => Self::Pong,
            command::TYPES => Self::Types,
            command::GET => {
                let body = fields::as_body(require_body(frame)?)?;
                let object_type = fields::object_type(body)?;
                if body.contains_key("id") {
                    Self::Get {
                        object_type,
                        id: fields::object_id(body)?,
                    }
                } else {
                    let patch = RegionPatch::from_json(require_body(frame)?)?;
                    let bounds = (!patch.is_empty()).then(|| patch.fill(&Region::UNBOUNDED));
                    Self::Query {
                        object_type,
                        bounds,
                    }
                }
            }
            command::UPDATE => Self::Update(ObjectPatch::from_json(require_body(frame)?)?),
            command::DELETE => {
                let body = fields::as_body(require_body(frame)?)?;
                Self::Delete {
                    object_type: fields::object_type(body)?,
                    id: fields::object_id(body)?,
                }
            }
            command::LISTEN => {
                let value = require_body(frame)?;
                let object_type = fields::object_type(fields::as_body(value)?)?;
                Self::Listen {
                    object_type,
                    region: RegionPatch::from_json(value)?,
                }
            }
            command::UNLISTEN => Self::Unlisten {
                object_type: type_only(frame)?,
            },
            command::PROFILE => Self::Profile {
                object_type: type_only(frame)?,
            },
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        Ok(request)
    }

    /// Keyword this request was sent with.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Ping => command::PING,
            Self::Pong => command::PONG,
            Self::Get { .. } | Self::Query { .. } => command::GET,
            Self::Update(_) => command::UPDATE,
            Self::Delete { .. } => command::DELETE,
            Self::Listen { .. } => command::LISTEN,
            Self::Unlisten { .. } => command::UNLISTEN,
            Self::Profile { .. } => command::PROFILE,
            Self::Types => command::TYPES,
        }
    }
}

fn require_body(frame: &Frame) -> Result<&Value, ProtocolError> {
    frame.body.as_ref().ok_or_else(|| ProtocolError::MissingBody {
        command: frame.command.clone(),
    })
}

fn type_only(frame: &Frame) -> Result<String, ProtocolError> {
    let body = fields::as_body(require_body(frame)?)?;
    Ok(fields::object_type(body)?)
}
