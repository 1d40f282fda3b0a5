//! Conversion between the external and internal element representations.
//!
//! Callers see collection children (and a submodel's elements) as ordered
//! arrays. Stores hold them as insertion-ordered `idShort -> element` maps so
//! children are addressable by path segment.

use crate::element::{classify, id_short, is_submodel, ElementKind, ID_SHORT, SUBMODEL_ELEMENTS, VALUE};
use crate::error::{VabError, VabResult};
use serde_json::{Map, Value};

/// Convert an element from the external to the internal representation.
///
/// # Errors
///
/// Returns [`VabError::MalformedRequest`] if a child has no idShort, uses the
/// reserved `value` idShort, or appears twice.
pub fn internalize(raw: &Value) -> VabResult<Value> {
    let mut out = raw.clone();
    if is_submodel(raw) {
        if let Some(children) = raw.get(SUBMODEL_ELEMENTS) {
            out[SUBMODEL_ELEMENTS] = Value::Object(children_to_map(children)?);
        }
    } else if classify(raw) == ElementKind::Collection {
        if let Some(children) = raw.get(VALUE) {
            out[VALUE] = Value::Object(children_to_map(children)?);
        }
    }
    Ok(out)
}

/// Convert an element from the internal to the external representation.
#[must_use]
pub fn externalize(raw: &Value) -> Value {
    let mut out = raw.clone();
    if is_submodel(raw) {
        if let Some(Value::Object(children)) = raw.get(SUBMODEL_ELEMENTS) {
            out[SUBMODEL_ELEMENTS] = Value::Array(map_to_children(children));
        }
    } else if classify(raw) == ElementKind::Collection {
        if let Some(Value::Object(children)) = raw.get(VALUE) {
            out[VALUE] = Value::Array(map_to_children(children));
        }
    }
    out
}

/// Convert a list (or map) of external child elements into an internal map.
///
/// # Errors
///
/// See [`internalize`].
pub fn children_to_map(children: &Value) -> VabResult<Map<String, Value>> {
    let mut map = Map::new();
    match children {
        Value::Array(list) => {
            for child in list {
                let id = id_short(child)
                    .ok_or_else(|| VabError::malformed("child element without idShort"))?
                    .to_string();
                insert_child(&mut map, id, child)?;
            }
        }
        Value::Object(entries) => {
            for (id, child) in entries {
                if !child.is_object() {
                    return Err(VabError::malformed(format!(
                        "child '{id}' is not an element"
                    )));
                }
                insert_child(&mut map, id.clone(), child)?;
            }
        }
        Value::Null => {}
        _ => return Err(VabError::malformed("children must be a list of elements")),
    }
    Ok(map)
}

fn insert_child(map: &mut Map<String, Value>, id: String, child: &Value) -> VabResult<()> {
    check_id_short(&id)?;
    if map.contains_key(&id) {
        return Err(VabError::malformed(format!("duplicate idShort '{id}'")));
    }
    let mut child = internalize(child)?;
    child[ID_SHORT] = Value::String(id.clone());
    map.insert(id, child);
    Ok(())
}

/// Convert an internal child map into an ordered list of external elements.
#[must_use]
pub fn map_to_children(children: &Map<String, Value>) -> Vec<Value> {
    children.values().map(externalize).collect()
}

/// Reject idShorts that cannot be addressed as a child path segment.
///
/// # Errors
///
/// Returns [`VabError::MalformedRequest`] for an empty or reserved idShort.
pub fn check_id_short(id: &str) -> VabResult<()> {
    if id.is_empty() {
        return Err(VabError::malformed("empty idShort"));
    }
    if id == VALUE {
        return Err(VabError::malformed(
            "idShort 'value' is reserved for the value view",
        ));
    }
    Ok(())
}
