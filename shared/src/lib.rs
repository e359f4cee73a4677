//! # Room Protocol Library
//!
//! Runtime-free pieces of the room client: everything needed to read and
//! write room frames without touching a socket.
//!
//! ## Modules
//!
//! - [`protocol`]: frame codes, schema markers and close codes
//! - [`decode`]: the [`Cursor`] every frame and state decoder reads from
//! - [`encode`]: string and number encoders matching the decoders
//! - [`schema`]: schema types, decoded state values and state changes
//! - [`serializer`]: the [`Serializer`] trait a room feeds state frames to
//! - [`compare`]: add/remove/replace diff between two MessagePack documents
//!
//! ## Example
//!
//! ```rust
//! use shared::schema::{PrimitiveType, SchemaType};
//! use shared::{SchemaSerializer, Serializer};
//!
//! let root = SchemaType::builder("State")
//!     .primitive("turn", PrimitiveType::Uint8)
//!     .build();
//! let mut serializer = SchemaSerializer::new(root);
//!
//! serializer.set_state(&[0x00, 0x03]).unwrap();
//! assert_eq!(serializer.state().get_number("turn"), Some(3.0));
//! ```

pub mod compare;
pub mod decode;
pub mod encode;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod serializer;

pub use decode::Cursor;
pub use error::DecodeError;
pub use protocol::Protocol;
pub use serializer::{NoneSerializer, SchemaSerializer, Serializer};
