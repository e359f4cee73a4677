//! JSON descriptions of schema types
//!
//! ```json
//! { "root": "State",
//!   "types": {
//!     "State":  { "fields": [["players", "map", "Player"], ["turn", "number"]] },
//!     "Player": { "fields": [["name", "string"], ["x", "float32"]] } } }
//! ```
//!
//! A field's position in `fields` is its wire index.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use super::{ChildType, FieldType, PrimitiveType, SchemaType};
use crate::protocol::NIL;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("invalid schema description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("type '{0}' is not described")]
    UnknownType(String),

    #[error("field {field} of type '{type_name}' is malformed: {reason}")]
    InvalidField {
        type_name: String,
        field: usize,
        reason: String,
    },

    #[error("type '{0}' references itself")]
    Cycle(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDefinition {
    pub root: String,
    pub types: HashMap<String, TypeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDefinition {
    pub fields: Vec<Vec<String>>,
}

impl SchemaDefinition {
    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Resolves the root type and everything it references
    pub fn build(&self) -> Result<Arc<SchemaType>, DefinitionError> {
        let mut built = HashMap::new();
        let mut visiting = HashSet::new();
        self.resolve(&self.root, &mut built, &mut visiting)
    }

    fn resolve(
        &self,
        name: &str,
        built: &mut HashMap<String, Arc<SchemaType>>,
        visiting: &mut HashSet<String>,
    ) -> Result<Arc<SchemaType>, DefinitionError> {
        if let Some(schema_type) = built.get(name) {
            return Ok(Arc::clone(schema_type));
        }

        let definition = self
            .types
            .get(name)
            .ok_or_else(|| DefinitionError::UnknownType(name.to_string()))?;

        if !visiting.insert(name.to_string()) {
            return Err(DefinitionError::Cycle(name.to_string()));
        }

        // Indexes from NIL upwards collide with the schema markers
        if definition.fields.len() > NIL as usize {
            return Err(DefinitionError::InvalidField {
                type_name: name.to_string(),
                field: NIL as usize,
                reason: format!("at most {} fields are supported", NIL),
            });
        }

        let mut builder = SchemaType::builder(name);
        for (position, entry) in definition.fields.iter().enumerate() {
            let invalid = |reason: &str| DefinitionError::InvalidField {
                type_name: name.to_string(),
                field: position,
                reason: reason.to_string(),
            };

            let kind = match entry.as_slice() {
                [_, primitive] => FieldType::Primitive(
                    primitive
                        .parse::<PrimitiveType>()
                        .map_err(|_| invalid("unknown primitive type"))?,
                ),
                [_, kind, child] => match kind.as_str() {
                    "ref" => FieldType::Ref(self.resolve(child, built, visiting)?),
                    "array" => FieldType::Array(self.child_type(child, built, visiting)?),
                    "map" => FieldType::Map(self.child_type(child, built, visiting)?),
                    _ => return Err(invalid("expected 'ref', 'array' or 'map'")),
                },
                _ => return Err(invalid("expected [name, type] or [name, kind, child]")),
            };

            builder = builder.field(entry[0].clone(), kind);
        }

        visiting.remove(name);

        let schema_type = builder.build();
        built.insert(name.to_string(), Arc::clone(&schema_type));
        Ok(schema_type)
    }

    fn child_type(
        &self,
        child: &str,
        built: &mut HashMap<String, Arc<SchemaType>>,
        visiting: &mut HashSet<String>,
    ) -> Result<ChildType, DefinitionError> {
        match child.parse::<PrimitiveType>() {
            Ok(primitive) => Ok(ChildType::Primitive(primitive)),
            Err(_) => Ok(ChildType::Schema(self.resolve(child, built, visiting)?)),
        }
    }
}
