//! Text wire protocol for Geobase connections.
//!
//! Every message is a single line: an upper-case command keyword, optionally
//! followed by a space and a JSON body, e.g. `LISTEN {type: "bus", minLat: 60}`.
//! Inbound bodies are parsed leniently ([`relaxed`]): bare identifier keys,
//! single-quoted strings, trailing commas and comments are accepted. Outbound
//! bodies are always compact, strict JSON.
//!
//! [`parse`] splits a message into a [`Frame`], [`Request::from_frame`] turns a
//! frame into a typed request, and [`stringify`] renders a reply.

pub mod command;
pub mod error;
pub mod frame;
pub mod relaxed;
pub mod request;

pub use error::ProtocolError;
pub use frame::{parse, stringify, stringify_command, Frame};
pub use request::Request;
