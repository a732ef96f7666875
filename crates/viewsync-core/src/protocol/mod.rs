//! Protocol module: the server/client message taxonomy and the graph codec.

pub mod codec;
pub mod messages;
pub mod value;

pub use codec::{decode, decode_from_str, encode, encode_to_string, KindLists, Payload, SerializationError};
pub use messages::*;
pub use value::{NativeFunction, Timestamp, Value};
