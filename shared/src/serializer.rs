//! Room state serializers
//!
//! A room hands every state frame to its serializer. The server announces
//! which serializer it uses when the room is joined; the room compares that
//! id with [`Serializer::ID`].

use std::sync::Arc;

use log::debug;

use crate::decode::Cursor;
use crate::error::Result;
use crate::schema::{Change, Schema, SchemaType};

pub trait Serializer {
    /// Serializer id announced by the server on join
    const ID: &'static str;

    type State;
    type Change;

    fn state(&self) -> &Self::State;

    /// Replaces the state with a full snapshot
    fn set_state(&mut self, bytes: &[u8]) -> Result<Vec<Self::Change>>;

    /// Applies an incremental update on top of the current state
    fn patch(&mut self, bytes: &[u8]) -> Result<Vec<Self::Change>>;

    /// Handles the serializer-specific part of the join frame
    fn handshake(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drops the state; a room calls this once its connection has closed
    fn teardown(&mut self);
}

/// Decodes schema-encoded state into a [`Schema`] instance
#[derive(Debug, Clone)]
pub struct SchemaSerializer {
    state: Schema,
}

impl SchemaSerializer {
    pub fn new(root: Arc<SchemaType>) -> Self {
        Self {
            state: Schema::new(root),
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Change>> {
        let mut cursor = Cursor::new(bytes);
        let mut changes = Vec::new();
        self.state.decode(&mut cursor, &mut changes)?;
        Ok(changes)
    }
}

impl Serializer for SchemaSerializer {
    const ID: &'static str = "schema";

    type State = Schema;
    type Change = Change;

    fn state(&self) -> &Schema {
        &self.state
    }

    fn set_state(&mut self, bytes: &[u8]) -> Result<Vec<Change>> {
        self.decode(bytes)
    }

    fn patch(&mut self, bytes: &[u8]) -> Result<Vec<Change>> {
        self.decode(bytes)
    }

    fn handshake(&mut self, bytes: &[u8]) -> Result<()> {
        // Reflection data is accepted as-is; the local type is authoritative
        debug!("Schema handshake with {} bytes of reflection data", bytes.len());
        Ok(())
    }

    fn teardown(&mut self) {
        let root = Arc::clone(self.state.schema_type());
        self.state = Schema::new(root);
    }
}

/// Serializer for rooms that carry no synchronized state
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneSerializer;

impl Serializer for NoneSerializer {
    const ID: &'static str = "none";

    type State = ();
    type Change = ();

    fn state(&self) -> &() {
        &()
    }

    fn set_state(&mut self, bytes: &[u8]) -> Result<Vec<()>> {
        debug!("Ignoring {} bytes of state for a stateless room", bytes.len());
        Ok(Vec::new())
    }

    fn patch(&mut self, bytes: &[u8]) -> Result<Vec<()>> {
        debug!("Ignoring {} bytes of patch for a stateless room", bytes.len());
        Ok(Vec::new())
    }

    fn handshake(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn teardown(&mut self) {}
}
