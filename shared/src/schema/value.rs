//! Decoded state values and the changes reported while decoding them

use std::fmt;

use indexmap::IndexMap;

use super::Schema;
use crate::error::{DecodeError, Result};

/// A decoded field or collection entry
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Schema(Schema),
    Array(ArraySchema),
    Map(MapSchema),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Any numeric variant widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Number(v) | Value::Float64(v) => Some(v),
            Value::Float32(v) => Some(v as f64),
            Value::Int8(v) => Some(v as f64),
            Value::Uint8(v) => Some(v as f64),
            Value::Int16(v) => Some(v as f64),
            Value::Uint16(v) => Some(v as f64),
            Value::Int32(v) => Some(v as f64),
            Value::Uint32(v) => Some(v as f64),
            Value::Int64(v) => Some(v as f64),
            Value::Uint64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            Value::Schema(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArraySchema> {
        match self {
            Value::Array(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapSchema> {
        match self {
            Value::Map(value) => Some(value),
            _ => None,
        }
    }
}

/// Ordered collection field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArraySchema {
    items: Vec<Value>,
}

impl ArraySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn has(&self, index: usize) -> bool {
        index < self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    /// Replaces the item at `index`, or appends when `index` equals the length
    pub fn set_at(&mut self, index: usize, value: Value) -> Result<()> {
        let len = self.items.len();
        if index == len {
            self.items.push(value);
        } else if index < len {
            self.items[index] = value;
        } else {
            return Err(DecodeError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Drops every item from `len` onwards and returns them in order
    pub(crate) fn truncate(&mut self, len: usize) -> Vec<Value> {
        if len >= self.items.len() {
            return Vec::new();
        }
        self.items.drain(len..).collect()
    }
}

/// String-keyed collection field; iteration follows insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSchema {
    items: IndexMap<String, Value>,
}

impl MapSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.items.iter()
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.items.insert(key, value);
    }

    /// Removes `key` keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.items.shift_remove(key)
    }
}

/// Position of an entry inside a collection field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Index(usize),
    Key(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Index(index) => write!(f, "{}", index),
            ItemKey::Key(key) => f.write_str(key),
        }
    }
}

/// A change observed while applying a state frame
///
/// `path` locates the structure that changed, starting from the root state:
/// field names for nested structures, indexes or keys for collection items.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Fields of the structure at `path` were assigned
    Fields { path: Vec<String>, fields: Vec<String> },
    /// A new entry appeared in the collection at `path`
    ItemAdded {
        path: Vec<String>,
        key: ItemKey,
        value: Value,
    },
    /// An existing entry of the collection at `path` was updated
    ItemChanged {
        path: Vec<String>,
        key: ItemKey,
        value: Value,
    },
    /// An entry left the collection at `path`
    ItemRemoved {
        path: Vec<String>,
        key: ItemKey,
        value: Option<Value>,
    },
}

impl Change {
    pub fn path(&self) -> &[String] {
        match self {
            Change::Fields { path, .. }
            | Change::ItemAdded { path, .. }
            | Change::ItemChanged { path, .. }
            | Change::ItemRemoved { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_set_at_appends_and_replaces() {
        let mut array = ArraySchema::new();
        array.set_at(0, Value::Number(1.0)).unwrap();
        array.set_at(1, Value::Number(2.0)).unwrap();
        array.set_at(0, Value::Number(3.0)).unwrap();

        assert_eq!(array.len(), 2);
        assert_eq!(array.at(0), Some(&Value::Number(3.0)));
        assert!(array.has(1));
        assert!(!array.has(2));
    }

    #[test]
    fn test_array_set_at_past_end() {
        let mut array = ArraySchema::new();
        match array.set_at(2, Value::Boolean(true)) {
            Err(DecodeError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 0);
            }
            other => panic!("Expected out of range error, got {:?}", other),
        }
    }

    #[test]
    fn test_array_truncate_returns_removed() {
        let mut array = ArraySchema::new();
        for i in 0..4 {
            array.set_at(i, Value::Uint8(i as u8)).unwrap();
        }

        let removed = array.truncate(2);
        assert_eq!(removed, vec![Value::Uint8(2), Value::Uint8(3)]);
        assert_eq!(array.len(), 2);
        assert!(array.truncate(5).is_empty());
    }

    #[test]
    fn test_map_keeps_insertion_order_after_removal() {
        let mut map = MapSchema::new();
        map.insert("c".to_string(), Value::Int8(1));
        map.insert("a".to_string(), Value::Int8(2));
        map.insert("b".to_string(), Value::Int8(3));

        assert_eq!(map.remove("a"), Some(Value::Int8(2)));
        assert_eq!(map.keys(), vec!["c".to_string(), "b".to_string()]);
        assert!(!map.has("a"));
    }

    #[test]
    fn test_value_numeric_widening() {
        assert_eq!(Value::Int16(-4).as_f64(), Some(-4.0));
        assert_eq!(Value::Uint64(9).as_f64(), Some(9.0));
        assert_eq!(Value::String("x".into()).as_f64(), None);
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
    }

    #[test]
    fn test_item_key_display() {
        assert_eq!(ItemKey::Index(3).to_string(), "3");
        assert_eq!(ItemKey::Key("abc".into()).to_string(), "abc");
    }
}
