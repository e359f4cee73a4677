//! Structural diff between two MessagePack documents
//!
//! Produces the add/remove/replace operations that turn one decoded
//! document into another. Objects are compared key by key and recursed into;
//! arrays are addressed by their index rendered as a string, and an array
//! nested in an object is replaced as a whole when it differs.

use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOperation {
    Add,
    Remove,
    Replace,
}

impl PatchOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            PatchOperation::Add => "add",
            PatchOperation::Remove => "remove",
            PatchOperation::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchObject {
    pub path: Vec<String>,
    pub op: PatchOperation,
    /// New value; `Null` for removals
    pub value: Value,
}

impl PatchObject {
    fn new(path: Vec<String>, op: PatchOperation, value: Value) -> Self {
        Self { path, op, value }
    }
}

/// Operations turning `old` into `new`
pub fn get_patch_list(old: &Value, new: &Value) -> Vec<PatchObject> {
    let mut patches = Vec::new();
    generate(old, new, &mut patches, &[]);
    patches
}

/// Decodes two MessagePack documents and diffs them
pub fn get_patch_list_from_msgpack(old: &[u8], new: &[u8]) -> Result<Vec<PatchObject>> {
    let old: Value = rmp_serde::from_slice(old)?;
    let new: Value = rmp_serde::from_slice(new)?;
    Ok(get_patch_list(&old, &new))
}

fn entries(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(key, item)| (key.clone(), item)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Vec::new(),
    }
}

fn lookup<'a>(entries: &[(String, &'a Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| *value)
}

fn extend(path: &[String], key: &str) -> Vec<String> {
    let mut extended = path.to_vec();
    extended.push(key.to_string());
    extended
}

fn generate(mirror: &Value, obj: &Value, patches: &mut Vec<PatchObject>, path: &[String]) {
    let old_entries = entries(mirror);
    let new_entries = entries(obj);
    let mut deleted = false;

    for (key, old_value) in old_entries.iter().rev() {
        match lookup(&new_entries, key) {
            Some(new_value) if !obj.is_array() => {
                if old_value.is_object() && new_value.is_object() {
                    generate(old_value, new_value, patches, &extend(path, key));
                } else if *old_value != new_value {
                    patches.push(PatchObject::new(
                        extend(path, key),
                        PatchOperation::Replace,
                        new_value.clone(),
                    ));
                }
            }
            _ => {
                patches.push(PatchObject::new(
                    extend(path, key),
                    PatchOperation::Remove,
                    Value::Null,
                ));
                deleted = true;
            }
        }
    }

    if !deleted && old_entries.len() == new_entries.len() {
        return;
    }

    let empty = Value::Object(serde_json::Map::new());

    for (key, new_value) in new_entries.iter().rev() {
        if lookup(&old_entries, key).is_some() {
            continue;
        }

        let add_path = extend(path, key);
        if new_value.is_object() || new_value.is_array() {
            generate(&empty, new_value, patches, &add_path);
        }
        patches.push(PatchObject::new(
            add_path,
            PatchOperation::Add,
            (*new_value).clone(),
        ));
    }
}
