//! Domain layer
//!
//! Pure data types of the relay (value objects, entities) and the traits the
//! rest of the server depends on. Nothing here touches sockets.

pub mod entity;
pub mod error;
pub mod repository;
pub mod value_object;

pub use entity::{ConnectedClient, Message};
pub use error::{StampError, ValueObjectError};
pub use repository::MessageLog;
pub use value_object::{ConnectionId, ConnectionIdFactory, MAX_BODY_BYTES, MessageBody, Timestamp};
