//! Schema-described room state
//!
//! A [`SchemaType`] lists the fields of a structure by wire index. A
//! [`Schema`] is one instance of such a type; decoding a state or patch frame
//! into it assigns fields, grows and shrinks collections and records every
//! [`Change`] it applies, innermost structures first.

mod definition;
mod value;

pub use definition::{DefinitionError, SchemaDefinition};
pub use value::{ArraySchema, Change, ItemKey, MapSchema, Value};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::decode::Cursor;
use crate::error::{DecodeError, Result};
use crate::protocol::END_OF_STRUCTURE;

/// Scalar encodings a field or collection entry can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl PrimitiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Uint8 => "uint8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Uint16 => "uint16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Uint64 => "uint64",
            PrimitiveType::Float32 => "float32",
            PrimitiveType::Float64 => "float64",
        }
    }
}

impl FromStr for PrimitiveType {
    type Err = DecodeError;

    fn from_str(name: &str) -> Result<Self> {
        let primitive = match name {
            "string" => PrimitiveType::String,
            "number" => PrimitiveType::Number,
            "boolean" => PrimitiveType::Boolean,
            "int8" => PrimitiveType::Int8,
            "uint8" => PrimitiveType::Uint8,
            "int16" => PrimitiveType::Int16,
            "uint16" => PrimitiveType::Uint16,
            "int32" => PrimitiveType::Int32,
            "uint32" => PrimitiveType::Uint32,
            "int64" => PrimitiveType::Int64,
            "uint64" => PrimitiveType::Uint64,
            "float32" => PrimitiveType::Float32,
            "float64" => PrimitiveType::Float64,
            other => return Err(DecodeError::UnknownType(other.to_string())),
        };
        Ok(primitive)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry type of an array or map field
#[derive(Debug, Clone)]
pub enum ChildType {
    Primitive(PrimitiveType),
    Schema(Arc<SchemaType>),
}

#[derive(Debug, Clone)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Ref(Arc<SchemaType>),
    Array(ChildType),
    Map(ChildType),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub index: u8,
    pub name: String,
    pub kind: FieldType,
}

/// Field layout of one structure
#[derive(Debug)]
pub struct SchemaType {
    name: String,
    fields: BTreeMap<u8, Field>,
}

impl SchemaType {
    pub fn builder(name: impl Into<String>) -> SchemaTypeBuilder {
        SchemaTypeBuilder {
            name: name.into(),
            fields: BTreeMap::new(),
            next_index: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, index: u8) -> Option<&Field> {
        self.fields.get(&index)
    }

    /// Fields in wire index order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }
}

/// Assigns wire indexes in declaration order
pub struct SchemaTypeBuilder {
    name: String,
    fields: BTreeMap<u8, Field>,
    next_index: u8,
}

impl SchemaTypeBuilder {
    pub fn field(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        let index = self.next_index;
        self.next_index = self.next_index.saturating_add(1);
        self.fields.insert(
            index,
            Field {
                index,
                name: name.into(),
                kind,
            },
        );
        self
    }

    pub fn primitive(self, name: impl Into<String>, primitive: PrimitiveType) -> Self {
        self.field(name, FieldType::Primitive(primitive))
    }

    pub fn build(self) -> Arc<SchemaType> {
        Arc::new(SchemaType {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Instance of a [`SchemaType`]
#[derive(Debug, Clone)]
pub struct Schema {
    schema_type: Arc<SchemaType>,
    values: HashMap<String, Value>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.schema_type.name == other.schema_type.name && self.values == other.values
    }
}

impl Schema {
    pub fn new(schema_type: Arc<SchemaType>) -> Self {
        Self {
            schema_type,
            values: HashMap::new(),
        }
    }

    pub fn schema_type(&self) -> &Arc<SchemaType> {
        &self.schema_type
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_ref(&self, field: &str) -> Option<&Schema> {
        self.get(field).and_then(Value::as_schema)
    }

    pub fn get_array(&self, field: &str) -> Option<&ArraySchema> {
        self.get(field).and_then(Value::as_array)
    }

    pub fn get_map(&self, field: &str) -> Option<&MapSchema> {
        self.get(field).and_then(Value::as_map)
    }

    /// Applies a full state or a patch starting at the cursor position
    ///
    /// Decoding stops at the end of input or at this structure's
    /// end-of-structure marker. Changes are appended to `changes`.
    pub fn decode(&mut self, cursor: &mut Cursor<'_>, changes: &mut Vec<Change>) -> Result<()> {
        self.decode_at(cursor, &[], changes)
    }

    fn decode_at(
        &mut self,
        cursor: &mut Cursor<'_>,
        path: &[String],
        changes: &mut Vec<Change>,
    ) -> Result<()> {
        let mut changed_fields = Vec::new();

        while cursor.has_remaining() {
            let is_nil = cursor.nil_check();
            if is_nil {
                cursor.skip(1)?;
            }

            let index = cursor.decode_uint8()?;
            if index == END_OF_STRUCTURE {
                break;
            }

            let field = self
                .schema_type
                .field(index)
                .cloned()
                .ok_or_else(|| DecodeError::UnknownField {
                    schema: self.schema_type.name.clone(),
                    index,
                })?;

            let has_change = if is_nil {
                self.values.remove(&field.name);
                true
            } else {
                self.decode_field(&field, cursor, path, changes)?
            };

            if has_change {
                changed_fields.push(field.name);
            }
        }

        if !changed_fields.is_empty() {
            changes.push(Change::Fields {
                path: path.to_vec(),
                fields: changed_fields,
            });
        }

        Ok(())
    }

    fn decode_field(
        &mut self,
        field: &Field,
        cursor: &mut Cursor<'_>,
        path: &[String],
        changes: &mut Vec<Change>,
    ) -> Result<bool> {
        let field_path = child_path(path, &field.name);

        match &field.kind {
            FieldType::Primitive(primitive) => {
                let value = decode_primitive(cursor, *primitive)?;
                self.values.insert(field.name.clone(), value);
                Ok(true)
            }
            FieldType::Ref(schema_type) => {
                let mut child = match self.values.remove(&field.name) {
                    Some(Value::Schema(child)) => child,
                    _ => Schema::new(Arc::clone(schema_type)),
                };
                let result = child.decode_at(cursor, &field_path, changes);
                self.values.insert(field.name.clone(), Value::Schema(child));
                result.map(|_| true)
            }
            FieldType::Array(child_type) => {
                let mut array = match self.values.remove(&field.name) {
                    Some(Value::Array(array)) => array,
                    _ => ArraySchema::new(),
                };
                let result = decode_array(&mut array, child_type, cursor, &field_path, changes);
                self.values.insert(field.name.clone(), Value::Array(array));
                result
            }
            FieldType::Map(child_type) => {
                let mut map = match self.values.remove(&field.name) {
                    Some(Value::Map(map)) => map,
                    _ => MapSchema::new(),
                };
                let result = decode_map(&mut map, child_type, cursor, &field_path, changes);
                self.values.insert(field.name.clone(), Value::Map(map));
                result
            }
        }
    }
}

fn child_path(path: &[String], segment: &str) -> Vec<String> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment.to_string());
    child
}

pub fn decode_primitive(cursor: &mut Cursor<'_>, primitive: PrimitiveType) -> Result<Value> {
    let value = match primitive {
        PrimitiveType::String => Value::String(cursor.decode_string()?),
        PrimitiveType::Number => Value::Number(cursor.decode_number()?),
        PrimitiveType::Boolean => Value::Boolean(cursor.decode_boolean()?),
        PrimitiveType::Int8 => Value::Int8(cursor.decode_int8()?),
        PrimitiveType::Uint8 => Value::Uint8(cursor.decode_uint8()?),
        PrimitiveType::Int16 => Value::Int16(cursor.decode_int16()?),
        PrimitiveType::Uint16 => Value::Uint16(cursor.decode_uint16()?),
        PrimitiveType::Int32 => Value::Int32(cursor.decode_int32()?),
        PrimitiveType::Uint32 => Value::Uint32(cursor.decode_uint32()?),
        PrimitiveType::Int64 => Value::Int64(cursor.decode_int64()?),
        PrimitiveType::Uint64 => Value::Uint64(cursor.decode_uint64()?),
        PrimitiveType::Float32 => Value::Float32(cursor.decode_float32()?),
        PrimitiveType::Float64 => Value::Float64(cursor.decode_float64()?),
    };
    Ok(value)
}

fn decode_array(
    array: &mut ArraySchema,
    child_type: &ChildType,
    cursor: &mut Cursor<'_>,
    path: &[String],
    changes: &mut Vec<Change>,
) -> Result<bool> {
    let new_length = cursor.decode_index()?;
    let num_changes = cursor.decode_index()?;

    let has_removal = array.len() > new_length;
    let has_change = num_changes > 0 || has_removal;

    // Moved entries are looked up in the array as it was before this patch
    let previous = match child_type {
        ChildType::Schema(_) if num_changes > 0 => Some(array.clone()),
        _ => None,
    };

    if has_removal {
        for (offset, removed) in array.truncate(new_length).into_iter().enumerate() {
            changes.push(Change::ItemRemoved {
                path: path.to_vec(),
                key: ItemKey::Index(new_length + offset),
                value: Some(removed),
            });
        }
    }

    // Once an entry reports a move, the rest of this array is read as moves too
    let mut has_index_change = false;

    for _ in 0..num_changes {
        let new_index = cursor.decode_index()?;

        let mut index_changed_from = None;
        if cursor.index_change_check() {
            cursor.decode_uint8()?;
            index_changed_from = Some(cursor.decode_index()?);
            has_index_change = true;
        }

        let mut is_new = (!has_index_change && !array.has(new_index))
            || (has_index_change && index_changed_from.is_none());

        let value = match child_type {
            ChildType::Schema(schema_type) => {
                let existing = match (is_new, index_changed_from) {
                    (true, _) => None,
                    (false, Some(from)) => previous.as_ref().and_then(|items| items.at(from)),
                    (false, None) => array.at(new_index),
                };

                let mut item = match existing {
                    Some(Value::Schema(item)) => item.clone(),
                    _ => {
                        is_new = true;
                        Schema::new(Arc::clone(schema_type))
                    }
                };

                let item_path = child_path(path, &new_index.to_string());
                item.decode_at(cursor, &item_path, changes)?;
                Value::Schema(item)
            }
            ChildType::Primitive(primitive) => decode_primitive(cursor, *primitive)?,
        };

        array.set_at(new_index, value.clone())?;

        let key = ItemKey::Index(new_index);
        changes.push(if is_new {
            Change::ItemAdded {
                path: path.to_vec(),
                key,
                value,
            }
        } else {
            Change::ItemChanged {
                path: path.to_vec(),
                key,
                value,
            }
        });
    }

    Ok(has_change)
}

fn previous_key(keys: &[String], index: usize) -> Result<String> {
    keys.get(index)
        .cloned()
        .ok_or(DecodeError::IndexOutOfRange {
            index,
            len: keys.len(),
        })
}

fn decode_map(
    map: &mut MapSchema,
    child_type: &ChildType,
    cursor: &mut Cursor<'_>,
    path: &[String],
    changes: &mut Vec<Change>,
) -> Result<bool> {
    let length = cursor.decode_index()?;
    let has_change = length > 0;

    let previous_keys = map.keys();
    let mut has_index_change = false;

    for _ in 0..length {
        if !cursor.has_remaining() || cursor.peek() == Some(END_OF_STRUCTURE) {
            break;
        }

        let is_nil_item = cursor.nil_check();
        if is_nil_item {
            cursor.skip(1)?;
        }

        let mut moved_from = None;
        if cursor.index_change_check() {
            cursor.skip(1)?;
            moved_from = Some(previous_key(&previous_keys, cursor.decode_index()?)?);
            has_index_change = true;
        }

        let has_map_index = cursor.number_check();
        let new_key = if has_map_index {
            previous_key(&previous_keys, cursor.decode_index()?)?
        } else {
            cursor.decode_string()?
        };

        let mut is_new = (!has_index_change && !map.has(&new_key))
            || (has_index_change && moved_from.is_none() && has_map_index);

        if is_nil_item {
            let removed = map.remove(&new_key);
            changes.push(Change::ItemRemoved {
                path: path.to_vec(),
                key: ItemKey::Key(new_key),
                value: removed,
            });
            continue;
        }

        let value = match child_type {
            ChildType::Primitive(primitive) => decode_primitive(cursor, *primitive)?,
            ChildType::Schema(schema_type) => {
                let existing = if is_new {
                    None
                } else {
                    map.at(moved_from.as_deref().unwrap_or(&new_key))
                };

                let mut item = match existing {
                    Some(Value::Schema(item)) => item.clone(),
                    _ => {
                        is_new = true;
                        Schema::new(Arc::clone(schema_type))
                    }
                };

                let item_path = child_path(path, &new_key);
                item.decode_at(cursor, &item_path, changes)?;
                Value::Schema(item)
            }
        };

        map.insert(new_key.clone(), value.clone());

        let key = ItemKey::Key(new_key);
        changes.push(if is_new {
            Change::ItemAdded {
                path: path.to_vec(),
                key,
                value,
            }
        } else {
            Change::ItemChanged {
                path: path.to_vec(),
                key,
                value,
            }
        });
    }

    Ok(has_change)
}
